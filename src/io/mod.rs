//! Copy manifest persistence

pub mod manifest;

pub use manifest::{
    CopyManifest, ManifestMeta, ManifestRow, RecordStatus, ResubmitOutcome, read_manifest,
    resubmit_pending, write_manifest,
};
