//! Standardized directory taxonomy and the vendor layouts mapped onto it
//!
//! Categories name the GeoBC destination folders. Each category is bound to
//! the vendor source directories that hold its files and to the file
//! extensions recognized for it. The tables here are static; a different
//! vendor layout is supported by building another [`FolderMapping`].

pub mod mapping;

pub use mapping::{ExtensionPattern, ExtensionSet, FolderMapping, MappingEntry, SourcePattern};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker closing a source pattern whose directory is searched recursively.
pub const RECURSIVE_MARKER: &str = "**";

/// Standardized destination folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Auxiliary,
    Coverage,
    BaseStation,
    Control,
    RawLidar,
    ImuGps,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Auxiliary,
        Category::Coverage,
        Category::BaseStation,
        Category::Control,
        Category::RawLidar,
        Category::ImuGps,
    ];

    /// Folder name used in the destination tree.
    #[must_use]
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Auxiliary => "AUXILIARY",
            Category::Coverage => "COVERAGE",
            Category::BaseStation => "BASE_STATION",
            Category::Control => "CONTROL",
            Category::RawLidar => "RAW_LIDAR",
            Category::ImuGps => "IMU_GPS",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.dir_name().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.dir_name())
    }
}

/// Shapefile and shapefile auxiliary extensions.
pub const SHAPEFILE_EXTENSIONS: &[&str] = &[
    ".shp", ".shx", ".dbf", ".prj", ".sbn", ".sbx", ".fbn", ".fbx", ".ain", ".aih", ".ixs",
    ".mxs", ".atx", ".shp.xml", ".cpg",
];

/// Common vector formats other than shapefiles.
pub const VECTOR_EXTENSIONS: &[&str] = &[".kml", ".kmz", ".csv", ".gpkg"];

/// Extensions recognized per category in RiPROCESS deliveries.
pub mod riprocess_ext {
    pub const AUXILIARY: &[&str] = &[".rxp", ".rdp"];
    pub const BASE_STATION: &[&str] = &[".rinex", ".obs"];
    pub const RAW_LIDAR: &[&str] = &[".laz", ".las"];
    pub const IMU_GPS: &[&str] = &[".dat", ".imu", ".igs", ".out", ".raw", "pos.*"];
}

/// Source directories per category in the RiPROCESS default output tree.
///
/// Patterns always use `/`; they are converted to native separators when
/// parsed into a [`SourcePattern`].
pub mod riprocess_dir {
    pub const AUXILIARY: &[&str] = &["03_RIEGL_RAW/02_RXP/**", "06_RIEGL_PROC/07_RDB"];
    pub const COVERAGE: &[&str] = &["06_RIEGL_PROC/09_EXPORT", "06_RIEGL_PROC/06_GEOIMAGES"];
    pub const BASE_STATION: &[&str] = &["05_INS-GPS_PROC/03_BASE"];
    pub const CONTROL: &[&str] = &["09_EXPORT"];
    pub const RAW_LIDAR: &[&str] = &["06_RIEGL_PROC/04_EXPORT"];
    pub const IMU_GPS: &[&str] = &[
        "05_INS-GPS_PROC/01_POS",
        "01_MON/INS-GPS_1",
        "02_FULL/INS-GPS_1",
    ];
}

/// Vector extensions followed by the shapefile set.
#[must_use]
pub fn vector_with_shapefile_extensions() -> Vec<&'static str> {
    VECTOR_EXTENSIONS
        .iter()
        .chain(SHAPEFILE_EXTENSIONS)
        .copied()
        .collect()
}
