//! Field Data Ingestion Library
//!
//! This library catalogues external drives delivered by acquisition contractors,
//! gathers their files according to a vendor-to-standard folder mapping, copies
//! them to network storage and submits drive and file metadata to the Eclipse
//! REST backend.

pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod services;
pub mod taxonomy;

pub use models::{
    CopyFailure, CopyOutcome, DiscoveredFile, DriveRecord, EntityKind, ForeignKeys,
    SensorDataRecord,
};
pub use services::copy::{CopyContext, CopyJob, CopyStage, DestinationLayout};
pub use services::gather::gather_files;
pub use services::records::build_records;
pub use services::resolve::{DestinationResolver, DestinationTarget, Port};
pub use taxonomy::{Category, FolderMapping};

use std::path::PathBuf;
use std::result;

/// Errors raised by ingestion operations.
///
/// Configuration and resolution problems are raised before any filesystem
/// mutation. Per-file copy problems are never raised; they are collected in
/// [`CopyOutcome::failures`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid source: path does not exist: {}", .0.display())]
    InvalidSource(PathBuf),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unresolvable destination '{descriptor}': {reason}")]
    UnresolvableDestination { descriptor: String, reason: String },

    #[error("Port {0} is in well-known range [0-1023]")]
    WellKnownPort(u16),

    #[error("Missing destination: {0}")]
    MissingDestination(String),

    #[error(
        "Missing foreign keys: make sure 'nas_id' and 'delivery_id' are set (nas_id={nas_id}, delivery_id={delivery_id})"
    )]
    MissingForeignKey { nas_id: i64, delivery_id: i64 },

    #[error("Invalid network configuration: {0}")]
    MissingNetworkProperties(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),
}

impl Error {
    /// Build an [`Error::UnresolvableDestination`] for `descriptor`.
    pub(crate) fn unresolvable(descriptor: &str, reason: impl Into<String>) -> Self {
        Error::UnresolvableDestination {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error stems from configuration or destination resolution,
    /// i.e. it was raised before any I/O against the destination.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::InvalidSource(_)
                | Error::UnresolvableDestination { .. }
                | Error::WellKnownPort(_)
                | Error::MissingDestination(_)
                | Error::MissingForeignKey { .. }
                | Error::MissingNetworkProperties(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Request(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;
