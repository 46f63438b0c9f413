//! Data models for discovered files, metadata records and copy outcomes

use crate::taxonomy::Category;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Sentinel stored in identifier fields that have not been assigned yet.
pub const UNSET_ID: i64 = -1;

/// Bytes per gigabyte used for every size reported to the backend.
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Convert a byte count to the floating-point gigabyte value stored in records.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Kind of backend entity a record belongs to.
///
/// Assigned once when a record is constructed; it selects the REST endpoint
/// and the attributes accepted as GET query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Drive,
    Delivery,
    Nasbox,
    SensorData,
    Trajectory,
    LidarRaw,
    LidarClassified,
    DerivedProduct,
    SpatialReference,
}

impl EntityKind {
    /// Table name, which is also the last segment of the REST endpoint.
    #[must_use]
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Drive => "drive",
            EntityKind::Delivery => "delivery",
            EntityKind::Nasbox => "nasbox",
            EntityKind::SensorData => "sensordata",
            EntityKind::Trajectory => "trajectory",
            EntityKind::LidarRaw => "lidarraw",
            EntityKind::LidarClassified => "lidarclassified",
            EntityKind::DerivedProduct => "derivedproduct",
            EntityKind::SpatialReference => "spatialreference",
        }
    }

    /// Attributes that may be used as query parameters for this entity.
    #[must_use]
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Drive => &[
                "file_count",
                "serial_number",
                "storage_total_gb",
                "storage_used_gb",
                "nas_id",
                "delivery_id",
            ],
            EntityKind::SensorData => &[
                "file_path",
                "file_name",
                "file_size",
                "delivery_id",
                "nas_id",
                "trajectory_id",
            ],
            EntityKind::Delivery => &["receiver_name", "comments", "date"],
            EntityKind::Nasbox => &["nas_id", "name", "location", "ipv4_addr"],
            _ => &[],
        }
    }

    /// REST endpoint path relative to the backend root.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("/api/{}", self.table_name())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// NAS and delivery identifiers shared by the drive record and every file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeys {
    pub nas_id: i64,
    pub delivery_id: i64,
}

impl Default for ForeignKeys {
    fn default() -> Self {
        Self::unset()
    }
}

impl ForeignKeys {
    /// Build identifiers, mapping non-positive values to [`UNSET_ID`].
    #[must_use]
    pub fn new(nas_id: i64, delivery_id: i64) -> Self {
        Self {
            nas_id: normalize_id(nas_id),
            delivery_id: normalize_id(delivery_id),
        }
    }

    #[must_use]
    pub const fn unset() -> Self {
        Self {
            nas_id: UNSET_ID,
            delivery_id: UNSET_ID,
        }
    }

    #[must_use]
    pub fn has_nas_id(&self) -> bool {
        self.nas_id > 0
    }

    #[must_use]
    pub fn has_delivery_id(&self) -> bool {
        self.delivery_id > 0
    }

    /// Both identifiers are set; required before any submission.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.has_nas_id() && self.has_delivery_id()
    }
}

fn normalize_id(id: i64) -> i64 {
    if id > 0 { id } else { UNSET_ID }
}

/// A file found under the source root by the gatherer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Category whose pattern and extension matched.
    pub category: Category,
    /// Directory of the matching source pattern, relative to the source root.
    pub pattern_dir: PathBuf,
}

/// Metadata record submitted for each copied file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDataRecord {
    #[serde(skip)]
    kind: EntityKind,
    pub file_path: String,
    pub file_name: String,
    /// Size in gigabytes (bytes / 2^30).
    pub file_size: f64,
    pub nas_id: i64,
    pub delivery_id: i64,
}

impl SensorDataRecord {
    #[must_use]
    pub fn new(file_path: String, file_name: String, file_size: f64, keys: ForeignKeys) -> Self {
        Self {
            kind: EntityKind::SensorData,
            file_path,
            file_name,
            file_size,
            nas_id: keys.nas_id,
            delivery_id: keys.delivery_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn keys(&self) -> ForeignKeys {
        ForeignKeys {
            nas_id: self.nas_id,
            delivery_id: self.delivery_id,
        }
    }

    pub(crate) fn assign_keys(&mut self, keys: ForeignKeys) {
        self.nas_id = keys.nas_id;
        self.delivery_id = keys.delivery_id;
    }
}

/// Metadata about the physical source drive, submitted once per copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveRecord {
    #[serde(skip)]
    kind: EntityKind,
    pub serial_number: String,
    pub storage_total_gb: f64,
    pub storage_used_gb: f64,
    pub file_count: i64,
    pub nas_id: i64,
    pub delivery_id: i64,
}

impl DriveRecord {
    #[must_use]
    pub fn new(
        serial_number: String,
        storage_total_gb: f64,
        storage_used_gb: f64,
        file_count: i64,
        keys: ForeignKeys,
    ) -> Self {
        Self {
            kind: EntityKind::Drive,
            serial_number,
            storage_total_gb,
            storage_used_gb,
            file_count,
            nas_id: keys.nas_id,
            delivery_id: keys.delivery_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn keys(&self) -> ForeignKeys {
        ForeignKeys {
            nas_id: self.nas_id,
            delivery_id: self.delivery_id,
        }
    }

    pub(crate) fn assign_keys(&mut self, keys: ForeignKeys) {
        self.nas_id = keys.nas_id;
        self.delivery_id = keys.delivery_id;
    }
}

/// A delivery logged by staff when a drive arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    #[serde(skip)]
    kind: EntityKind,
    pub receiver_name: String,
    pub date: String,
    pub comments: String,
}

impl DeliveryRecord {
    #[must_use]
    pub fn new(receiver_name: String, date: String, comments: String) -> Self {
        Self {
            kind: EntityKind::Delivery,
            receiver_name,
            date,
            comments,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

/// A file that could not be copied, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFailure {
    pub path: String,
    pub code: String,
    pub message: String,
}

impl CopyFailure {
    #[must_use]
    pub fn from_io(path: &std::path::Path, error: &std::io::Error) -> Self {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => "ENOENT",
            std::io::ErrorKind::PermissionDenied => "EACCES",
            std::io::ErrorKind::StorageFull => "ENOSPC",
            std::io::ErrorKind::AlreadyExists => "EEXIST",
            _ => "IO",
        };

        Self {
            path: path.to_string_lossy().to_string(),
            code: code.to_string(),
            message: error.to_string(),
        }
    }

    /// `path` maps to a destination already written by `earlier` in the same run.
    #[must_use]
    pub fn collision(
        path: &std::path::Path,
        target: &std::path::Path,
        earlier: &std::path::Path,
    ) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            code: "EEXIST".to_string(),
            message: format!(
                "{} was already written from {}",
                target.display(),
                earlier.display()
            ),
        }
    }
}

/// Result of one copy invocation.
#[derive(Debug, Clone, Default)]
pub struct CopyOutcome {
    /// Destination paths of every file copied successfully, in discovery order.
    pub copied: Vec<PathBuf>,
    /// Files that failed to copy; empty on full success.
    pub failures: Vec<CopyFailure>,
    /// Whether the backend accepted the file-record batch.
    pub records_submitted: bool,
    /// Records of copied files; retained for re-submission when
    /// `records_submitted` is false.
    pub records: Vec<SensorDataRecord>,
}

impl CopyOutcome {
    /// No per-file failures and every record was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.records_submitted
    }
}
