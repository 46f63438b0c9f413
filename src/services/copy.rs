//! Copy orchestration: validate, copy every gathered file, submit metadata.
//!
//! A [`CopyJob`] owns the gathered file list, one pending record per file and
//! the drive record. Identifiers are applied to all of them at once through
//! [`CopyJob::set_identifiers`]. One call to [`CopyJob::copy`] walks the
//! stages
//!
//! `Unvalidated -> Validated -> Copying -> DriveRecordSubmitted -> FileRecordsSubmitted -> Done`
//!
//! Preconditions fail before any filesystem mutation. Per-file copy errors
//! are collected in the outcome and never abort the batch. A rejected drive
//! record is fatal; a rejected file-record batch is reported in the outcome
//! with the records kept for re-submission.

use crate::models::{
    CopyFailure, CopyOutcome, DiscoveredFile, DriveRecord, EntityKind, ForeignKeys,
    SensorDataRecord,
};
use crate::services::drive::probe_drive;
use crate::services::gather::gather_files;
use crate::services::records::build_records;
use crate::services::resolve::DestinationTarget;
use crate::services::sink::{MetadataRequest, MetadataSink, is_truthy};
use crate::services::system::SystemProbe;
use crate::taxonomy::FolderMapping;
use crate::{Error, Result};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Progress of one copy invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CopyStage {
    Unvalidated,
    Validated,
    Copying,
    DriveRecordSubmitted,
    FileRecordsSubmitted,
    Done,
}

impl fmt::Display for CopyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CopyStage::Unvalidated => "unvalidated",
            CopyStage::Validated => "validated",
            CopyStage::Copying => "copying",
            CopyStage::DriveRecordSubmitted => "drive_record_submitted",
            CopyStage::FileRecordsSubmitted => "file_records_submitted",
            CopyStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// How destination paths are derived from source paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationLayout {
    /// `<root>/<directory relative to the source root>/<file>`
    #[default]
    Mirror,
    /// `<root>/<CATEGORY>/<path relative to the matching pattern directory>`
    Category,
}

impl DestinationLayout {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationLayout::Mirror => "mirror",
            DestinationLayout::Category => "category",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "mirror" => Ok(DestinationLayout::Mirror),
            "category" => Ok(DestinationLayout::Category),
            other => Err(Error::InvalidInput(format!(
                "unknown layout '{other}' (expected mirror or category)"
            ))),
        }
    }

    /// Directory `file` is copied into.
    #[must_use]
    pub fn target_dir(&self, source_root: &Path, dest_root: &Path, file: &DiscoveredFile) -> PathBuf {
        let base = match self {
            DestinationLayout::Mirror => source_root.to_path_buf(),
            DestinationLayout::Category => source_root.join(&file.pattern_dir),
        };
        let relative_dir = file
            .path
            .parent()
            .and_then(|parent| parent.strip_prefix(&base).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        match self {
            DestinationLayout::Mirror => dest_root.join(relative_dir),
            DestinationLayout::Category => dest_root
                .join(file.category.dir_name())
                .join(relative_dir),
        }
    }
}

/// Copies one file into place.
pub trait FileCopier {
    /// Copy `from` to `to`, creating `to`'s parent directories. Returns bytes copied.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;
}

/// Copies contents and permissions, then restores access and modification times.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreservingCopier;

impl FileCopier for PreservingCopier {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = fs::copy(from, to)?;
        let metadata = fs::metadata(from)?;
        filetime::set_file_times(
            to,
            FileTime::from_last_access_time(&metadata),
            FileTime::from_last_modification_time(&metadata),
        )?;
        Ok(bytes)
    }
}

/// Collaborators used by [`CopyJob::copy`].
#[derive(Clone, Copy)]
pub struct CopyContext<'a> {
    pub sink: &'a dyn MetadataSink,
    pub system: &'a dyn SystemProbe,
    pub copier: &'a dyn FileCopier,
}

impl<'a> CopyContext<'a> {
    #[must_use]
    pub fn new(sink: &'a dyn MetadataSink, system: &'a dyn SystemProbe) -> Self {
        Self {
            sink,
            system,
            copier: &PreservingCopier,
        }
    }

    #[must_use]
    pub fn with_copier(mut self, copier: &'a dyn FileCopier) -> Self {
        self.copier = copier;
        self
    }
}

/// One drive's copy to network storage.
#[derive(Debug)]
pub struct CopyJob {
    source: PathBuf,
    mapping_name: String,
    files: Vec<DiscoveredFile>,
    records: Vec<SensorDataRecord>,
    drive: DriveRecord,
    keys: ForeignKeys,
    destination: Option<DestinationTarget>,
    layout: DestinationLayout,
    stage: CopyStage,
}

impl CopyJob {
    /// Gather `source` through `mapping`, build pending records and probe the drive.
    ///
    /// # Errors
    /// [`Error::InvalidSource`] if `source` does not exist, or
    /// [`Error::FileNotFound`] if a file vanishes between discovery and record building.
    pub fn new<P: AsRef<Path>>(
        source: P,
        mapping: &FolderMapping,
        system: &dyn SystemProbe,
    ) -> Result<Self> {
        let files = gather_files(source.as_ref(), mapping)?;
        let source = std::path::absolute(source.as_ref())?;
        let keys = ForeignKeys::unset();
        let records = build_records(&files, keys)?;
        let drive = probe_drive(&source, system, keys);

        Ok(Self {
            source,
            mapping_name: mapping.name().to_string(),
            files,
            records,
            drive,
            keys,
            destination: None,
            layout: DestinationLayout::default(),
            stage: CopyStage::Unvalidated,
        })
    }

    /// Assign NAS and delivery identifiers to the drive record and every
    /// pending record.
    pub fn set_identifiers(&mut self, nas_id: i64, delivery_id: i64) {
        let keys = ForeignKeys::new(nas_id, delivery_id);
        self.keys = keys;
        self.drive.assign_keys(keys);
        for record in &mut self.records {
            record.assign_keys(keys);
        }
        log::debug!(
            "Identifiers set: nas_id={}, delivery_id={} ({} records)",
            keys.nas_id,
            keys.delivery_id,
            self.records.len()
        );
    }

    pub fn set_destination(&mut self, destination: DestinationTarget) {
        self.destination = Some(destination);
    }

    pub fn set_layout(&mut self, layout: DestinationLayout) {
        self.layout = layout;
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn mapping_name(&self) -> &str {
        &self.mapping_name
    }

    #[must_use]
    pub fn files(&self) -> &[DiscoveredFile] {
        &self.files
    }

    #[must_use]
    pub fn records(&self) -> &[SensorDataRecord] {
        &self.records
    }

    #[must_use]
    pub fn drive(&self) -> &DriveRecord {
        &self.drive
    }

    #[must_use]
    pub fn keys(&self) -> ForeignKeys {
        self.keys
    }

    #[must_use]
    pub fn destination(&self) -> Option<&DestinationTarget> {
        self.destination.as_ref()
    }

    #[must_use]
    pub fn layout(&self) -> DestinationLayout {
        self.layout
    }

    #[must_use]
    pub fn stage(&self) -> CopyStage {
        self.stage
    }

    /// Copy every gathered file and submit the drive and file records.
    ///
    /// # Errors
    /// - [`Error::MissingDestination`] when no destination is set or it has no local root
    /// - [`Error::MissingForeignKey`] unless both identifiers are positive
    /// - [`Error::MissingNetworkProperties`] when the address is unusable or unreachable
    /// - [`Error::Connection`] when the drive record is not accepted
    pub fn copy(&mut self, ctx: &CopyContext<'_>) -> Result<CopyOutcome> {
        self.stage = CopyStage::Unvalidated;
        let dest_root = self.validate(ctx)?.to_path_buf();
        self.advance(CopyStage::Validated);

        self.advance(CopyStage::Copying);
        let (copied, failures, copied_indices) = self.copy_files(ctx, &dest_root);

        self.submit_drive(ctx.sink)?;
        self.advance(CopyStage::DriveRecordSubmitted);

        let records: Vec<SensorDataRecord> = copied_indices
            .iter()
            .map(|&i| self.records[i].clone())
            .collect();
        let records_submitted = self.submit_records(ctx.sink, &records);
        self.advance(CopyStage::FileRecordsSubmitted);

        self.advance(CopyStage::Done);
        log::info!(
            "Copy finished: {} copied, {} failed, file records {}",
            copied.len(),
            failures.len(),
            if records_submitted { "submitted" } else { "pending" }
        );

        Ok(CopyOutcome {
            copied,
            failures,
            records_submitted,
            records,
        })
    }

    fn advance(&mut self, stage: CopyStage) {
        log::debug!("Copy stage {} -> {stage}", self.stage);
        self.stage = stage;
    }

    fn validate(&self, ctx: &CopyContext<'_>) -> Result<&Path> {
        let destination = self
            .destination
            .as_ref()
            .ok_or_else(|| Error::MissingDestination("no destination has been set".to_string()))?;
        let root = destination.root().ok_or_else(|| {
            Error::MissingDestination(format!(
                "'{}' resolved to {} but is not mounted on this host",
                destination.descriptor, destination.address
            ))
        })?;

        if !self.keys.is_complete() {
            return Err(Error::MissingForeignKey {
                nas_id: self.keys.nas_id,
                delivery_id: self.keys.delivery_id,
            });
        }

        if !destination.has_network_properties() {
            return Err(Error::MissingNetworkProperties(format!(
                "'{}' has no usable address ({})",
                destination.descriptor, destination.address
            )));
        }
        if !destination.probe_reachable(ctx.system) {
            return Err(Error::MissingNetworkProperties(format!(
                "{} is not reachable",
                destination.socket_addr()
            )));
        }

        Ok(root)
    }

    /// Copy each distinct path once, in discovery order. A file whose target
    /// was already written earlier in the run is recorded as a failure.
    fn copy_files(
        &self,
        ctx: &CopyContext<'_>,
        dest_root: &Path,
    ) -> (Vec<PathBuf>, Vec<CopyFailure>, Vec<usize>) {
        let mut seen: HashSet<&Path> = HashSet::new();
        let mut written: HashMap<PathBuf, &Path> = HashMap::new();
        let mut copied = Vec::new();
        let mut failures = Vec::new();
        let mut copied_indices = Vec::new();

        for (index, file) in self.files.iter().enumerate() {
            if !seen.insert(file.path.as_path()) {
                log::debug!(
                    "Skipping {} already copied under an earlier category",
                    file.path.display()
                );
                continue;
            }

            let target_dir = self.layout.target_dir(&self.source, dest_root, file);
            let Some(file_name) = file.path.file_name() else {
                continue;
            };
            let target = target_dir.join(file_name);

            if let Some(earlier) = written.get(&target) {
                log::warn!(
                    "Not copying {}: {} already holds {}",
                    file.path.display(),
                    target.display(),
                    earlier.display()
                );
                failures.push(CopyFailure::collision(&file.path, &target, earlier));
                continue;
            }

            match ctx.copier.copy_file(&file.path, &target) {
                Ok(bytes) => {
                    log::debug!(
                        "Copied {} -> {} ({bytes} bytes)",
                        file.path.display(),
                        target.display()
                    );
                    written.insert(target.clone(), file.path.as_path());
                    copied.push(target);
                    copied_indices.push(index);
                }
                Err(e) => {
                    log::warn!("Failed to copy {}: {e}", file.path.display());
                    failures.push(CopyFailure::from_io(&file.path, &e));
                }
            }
        }

        (copied, failures, copied_indices)
    }

    fn submit_drive(&self, sink: &dyn MetadataSink) -> Result<()> {
        let request = MetadataRequest::post(EntityKind::Drive, &self.drive)?;
        match sink.send(&request) {
            Ok(reply) if is_truthy(&reply) => Ok(()),
            Ok(_) => Err(Error::Connection(
                "drive record was not accepted by the backend".to_string(),
            )),
            Err(e) => Err(Error::Connection(format!(
                "drive record submission failed: {e}"
            ))),
        }
    }

    /// Submit `records` as one batch. Rejection is logged, not raised.
    fn submit_records(&self, sink: &dyn MetadataSink, records: &[SensorDataRecord]) -> bool {
        if records.is_empty() {
            return true;
        }

        let accepted = MetadataRequest::post(EntityKind::SensorData, records)
            .and_then(|request| sink.send(&request))
            .map(|reply| is_truthy(&reply));

        match accepted {
            Ok(true) => true,
            Ok(false) => {
                log::warn!(
                    "{} file records were not accepted; kept for re-submission",
                    records.len()
                );
                false
            }
            Err(e) => {
                log::warn!(
                    "{} file records could not be submitted: {e}; kept for re-submission",
                    records.len()
                );
                false
            }
        }
    }
}
