//! Parquet copy manifest read/write operations
//!
//! A manifest lists every distinct file of a copy run with its record values
//! and what happened to it. Rows whose record was not accepted by the backend
//! are `pending` and can be re-posted later with [`resubmit_pending`].
//! Run metadata is stored in the Parquet key-value metadata.

use crate::models::{CopyOutcome, EntityKind, ForeignKeys, SensorDataRecord};
use crate::services::copy::CopyJob;
use crate::services::sink::{MetadataRequest, MetadataSink, is_truthy};
use crate::{Error, Result};
use arrow_array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const META_SOURCE_ROOT: &str = "ecp.source_root";
const META_DESTINATION: &str = "ecp.destination";
const META_MAPPING: &str = "ecp.mapping";
const META_DRIVE_SERIAL: &str = "ecp.drive_serial";
const META_CREATED_AT: &str = "ecp.created_at";

/// What happened to one file of a copy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Copied, record accepted.
    Submitted,
    /// Copied, record not accepted yet.
    Pending,
    /// Not copied; no record was submitted.
    CopyFailed,
}

impl RecordStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Submitted => "submitted",
            RecordStatus::Pending => "pending",
            RecordStatus::CopyFailed => "copy_failed",
        }
    }

    fn parse(text: &str) -> Result<Self> {
        match text {
            "submitted" => Ok(RecordStatus::Submitted),
            "pending" => Ok(RecordStatus::Pending),
            "copy_failed" => Ok(RecordStatus::CopyFailed),
            other => Err(Error::Manifest(format!("unknown status '{other}'"))),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file of a copy run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestRow {
    pub file_path: String,
    pub file_name: String,
    pub file_size_gb: f64,
    pub nas_id: i64,
    pub delivery_id: i64,
    pub status: RecordStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl ManifestRow {
    fn from_record(record: &SensorDataRecord, status: RecordStatus) -> Self {
        Self {
            file_path: record.file_path.clone(),
            file_name: record.file_name.clone(),
            file_size_gb: record.file_size,
            nas_id: record.nas_id,
            delivery_id: record.delivery_id,
            status,
            error_code: None,
            error_message: None,
        }
    }

    /// The record this row stands for.
    #[must_use]
    pub fn record(&self) -> SensorDataRecord {
        SensorDataRecord::new(
            self.file_path.clone(),
            self.file_name.clone(),
            self.file_size_gb,
            ForeignKeys::new(self.nas_id, self.delivery_id),
        )
    }
}

/// Run-level information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ManifestMeta {
    pub source_root: String,
    pub destination: String,
    pub mapping: String,
    pub drive_serial: String,
    /// Seconds since the Unix epoch.
    pub created_at: String,
}

/// Manifest of one copy run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyManifest {
    pub meta: ManifestMeta,
    pub rows: Vec<ManifestRow>,
}

impl CopyManifest {
    /// Describe the run that produced `outcome`.
    #[must_use]
    pub fn from_copy(job: &CopyJob, outcome: &CopyOutcome) -> Self {
        let status = if outcome.records_submitted {
            RecordStatus::Submitted
        } else {
            RecordStatus::Pending
        };

        let mut rows: Vec<ManifestRow> = outcome
            .records
            .iter()
            .map(|record| ManifestRow::from_record(record, status))
            .collect();

        for failure in &outcome.failures {
            let mut row = job
                .records()
                .iter()
                .find(|record| record.file_path == failure.path)
                .map(|record| ManifestRow::from_record(record, RecordStatus::CopyFailed))
                .unwrap_or_else(|| ManifestRow {
                    file_path: failure.path.clone(),
                    file_name: Path::new(&failure.path)
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    file_size_gb: f64::NAN,
                    nas_id: job.keys().nas_id,
                    delivery_id: job.keys().delivery_id,
                    status: RecordStatus::CopyFailed,
                    error_code: None,
                    error_message: None,
                });
            row.error_code = Some(failure.code.clone());
            row.error_message = Some(failure.message.clone());
            rows.push(row);
        }

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_default();

        Self {
            meta: ManifestMeta {
                source_root: job.source().to_string_lossy().to_string(),
                destination: job
                    .destination()
                    .map(|d| d.descriptor.clone())
                    .unwrap_or_default(),
                mapping: job.mapping_name().to_string(),
                drive_serial: job.drive().serial_number.clone(),
                created_at,
            },
            rows,
        }
    }

    /// Records of the rows still waiting for submission.
    #[must_use]
    pub fn pending(&self) -> Vec<SensorDataRecord> {
        self.rows
            .iter()
            .filter(|row| row.status == RecordStatus::Pending)
            .map(ManifestRow::record)
            .collect()
    }

    #[must_use]
    pub fn count(&self, status: RecordStatus) -> usize {
        self.rows.iter().filter(|row| row.status == status).count()
    }
}

/// Return the Arrow schema of manifest files.
#[must_use]
pub fn manifest_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("file_path", DataType::Utf8, false),
        Field::new("file_name", DataType::Utf8, false),
        Field::new("file_size_gb", DataType::Float64, false),
        Field::new("nas_id", DataType::Int64, false),
        Field::new("delivery_id", DataType::Int64, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("error_code", DataType::Utf8, true),
        Field::new("error_message", DataType::Utf8, true),
    ]))
}

/// Write `manifest` to a Parquet file, replacing any existing file.
pub fn write_manifest(path: &Path, manifest: &CopyManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let meta = &manifest.meta;
    let key_values = vec![
        KeyValue::new(META_SOURCE_ROOT.to_string(), meta.source_root.clone()),
        KeyValue::new(META_DESTINATION.to_string(), meta.destination.clone()),
        KeyValue::new(META_MAPPING.to_string(), meta.mapping.clone()),
        KeyValue::new(META_DRIVE_SERIAL.to_string(), meta.drive_serial.clone()),
        KeyValue::new(META_CREATED_AT.to_string(), meta.created_at.clone()),
    ];

    let file = File::create(path)?;
    let schema = manifest_schema();
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(key_values))
        .build();
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
        .map_err(|e| Error::Manifest(e.to_string()))?;

    if !manifest.rows.is_empty() {
        let batch = create_rows_batch(&schema, &manifest.rows)?;
        writer
            .write(&batch)
            .map_err(|e| Error::Manifest(e.to_string()))?;
    }

    writer.close().map_err(|e| Error::Manifest(e.to_string()))?;
    log::info!(
        "Wrote manifest {} ({} rows)",
        path.display(),
        manifest.rows.len()
    );
    Ok(())
}

/// Read a manifest written by [`write_manifest`].
pub fn read_manifest(path: &Path) -> Result<CopyManifest> {
    let file = File::open(path)?;

    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| Error::Manifest(e.to_string()))?;

    let mut meta = ManifestMeta::default();
    let mut found_meta = false;
    if let Some(key_values) = builder.metadata().file_metadata().key_value_metadata() {
        for kv in key_values {
            let value = kv.value.clone().unwrap_or_default();
            let slot = match kv.key.as_str() {
                META_SOURCE_ROOT => &mut meta.source_root,
                META_DESTINATION => &mut meta.destination,
                META_MAPPING => &mut meta.mapping,
                META_DRIVE_SERIAL => &mut meta.drive_serial,
                META_CREATED_AT => &mut meta.created_at,
                _ => continue,
            };
            *slot = value;
            found_meta = true;
        }
    }
    if !found_meta {
        return Err(Error::Manifest(format!(
            "{} has no run metadata",
            path.display()
        )));
    }

    let reader = builder
        .build()
        .map_err(|e| Error::Manifest(e.to_string()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| Error::Manifest(e.to_string()))?;
        for row in 0..batch.num_rows() {
            rows.push(extract_row(&batch, row)?);
        }
    }

    Ok(CopyManifest { meta, rows })
}

/// Result of re-posting a manifest's pending records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResubmitOutcome {
    pub pending: usize,
    pub submitted: bool,
}

/// Re-post the pending records of the manifest at `path` as one batch and,
/// when accepted, mark them submitted in place.
///
/// # Errors
/// Manifest read/write failures. A rejected batch is not an error; it is
/// reported with `submitted == false` and the manifest is left untouched.
pub fn resubmit_pending(path: &Path, sink: &dyn MetadataSink) -> Result<ResubmitOutcome> {
    let mut manifest = read_manifest(path)?;
    let pending = manifest.pending();
    if pending.is_empty() {
        log::info!("No pending records in {}", path.display());
        return Ok(ResubmitOutcome {
            pending: 0,
            submitted: true,
        });
    }

    if let Some(record) = pending.iter().find(|r| !r.keys().is_complete()) {
        return Err(Error::MissingForeignKey {
            nas_id: record.nas_id,
            delivery_id: record.delivery_id,
        });
    }

    let request = MetadataRequest::post(EntityKind::SensorData, pending.as_slice())?;
    let accepted = match sink.send(&request) {
        Ok(reply) => is_truthy(&reply),
        Err(e) => {
            log::warn!("Re-submission of {} records failed: {e}", pending.len());
            false
        }
    };

    if accepted {
        let submitted: HashSet<&str> = pending.iter().map(|r| r.file_path.as_str()).collect();
        for row in &mut manifest.rows {
            if row.status == RecordStatus::Pending && submitted.contains(row.file_path.as_str()) {
                row.status = RecordStatus::Submitted;
            }
        }
        write_manifest(path, &manifest)?;
    }

    Ok(ResubmitOutcome {
        pending: pending.len(),
        submitted: accepted,
    })
}

fn create_rows_batch(schema: &Arc<Schema>, rows: &[ManifestRow]) -> Result<RecordBatch> {
    let file_paths: ArrayRef = Arc::new(StringArray::from(
        rows.iter().map(|r| r.file_path.as_str()).collect::<Vec<_>>(),
    ));
    let file_names: ArrayRef = Arc::new(StringArray::from(
        rows.iter().map(|r| r.file_name.as_str()).collect::<Vec<_>>(),
    ));
    let sizes: ArrayRef = Arc::new(Float64Array::from(
        rows.iter().map(|r| r.file_size_gb).collect::<Vec<_>>(),
    ));
    let nas_ids: ArrayRef = Arc::new(Int64Array::from(
        rows.iter().map(|r| r.nas_id).collect::<Vec<_>>(),
    ));
    let delivery_ids: ArrayRef = Arc::new(Int64Array::from(
        rows.iter().map(|r| r.delivery_id).collect::<Vec<_>>(),
    ));
    let statuses: ArrayRef = Arc::new(StringArray::from(
        rows.iter().map(|r| r.status.as_str()).collect::<Vec<_>>(),
    ));
    let error_codes: ArrayRef = Arc::new(StringArray::from(
        rows.iter()
            .map(|r| r.error_code.as_deref())
            .collect::<Vec<_>>(),
    ));
    let error_messages: ArrayRef = Arc::new(StringArray::from(
        rows.iter()
            .map(|r| r.error_message.as_deref())
            .collect::<Vec<_>>(),
    ));

    RecordBatch::try_new(
        schema.clone(),
        vec![
            file_paths,
            file_names,
            sizes,
            nas_ids,
            delivery_ids,
            statuses,
            error_codes,
            error_messages,
        ],
    )
    .map_err(|e| Error::Manifest(e.to_string()))
}

fn extract_row(batch: &RecordBatch, row: usize) -> Result<ManifestRow> {
    let required = |name: &str| -> Result<String> {
        string_value(batch, name, row)?
            .ok_or_else(|| Error::Manifest(format!("missing {name} in row {row}")))
    };

    Ok(ManifestRow {
        file_path: required("file_path")?,
        file_name: required("file_name")?,
        file_size_gb: column::<Float64Array>(batch, "file_size_gb")?.value(row),
        nas_id: column::<Int64Array>(batch, "nas_id")?.value(row),
        delivery_id: column::<Int64Array>(batch, "delivery_id")?.value(row),
        status: RecordStatus::parse(&required("status")?)?,
        error_code: string_value(batch, "error_code", row)?,
        error_message: string_value(batch, "error_message", row)?,
    })
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::Manifest(format!("missing column: {name}")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Manifest(format!("invalid type for: {name}")))
}

fn string_value(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<String>> {
    let array = column::<StringArray>(batch, name)?;
    if array.is_null(row) {
        Ok(None)
    } else {
        Ok(Some(array.value(row).to_string()))
    }
}
