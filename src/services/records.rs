//! Record building for discovered files.

use crate::models::{DiscoveredFile, ForeignKeys, SensorDataRecord, bytes_to_gb};
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Build one record per discovered file.
///
/// # Errors
/// Returns [`Error::FileNotFound`] if a file disappeared since discovery.
pub fn build_records(files: &[DiscoveredFile], keys: ForeignKeys) -> Result<Vec<SensorDataRecord>> {
    files.iter().map(|file| build_record(&file.path, keys)).collect()
}

/// Build the record for a single file, reading its size now.
pub fn build_record(path: &Path, keys: ForeignKeys) -> Result<SensorDataRecord> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;

    if !metadata.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let size_gb = bytes_to_gb(metadata.len());
    log::trace!("Record for {}: {} bytes", path.display(), metadata.len());

    Ok(SensorDataRecord::new(
        path.to_string_lossy().to_string(),
        file_name,
        size_gb,
        ForeignKeys::new(keys.nas_id, keys.delivery_id),
    ))
}
