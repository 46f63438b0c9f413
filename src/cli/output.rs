//! Output formatting for CLI

use crate::io::CopyManifest;
use crate::models::{CopyOutcome, DiscoveredFile, DriveRecord};
use crate::services::resolve::DestinationTarget;
use crate::taxonomy::Category;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Gigabyte values as stored in records; NaN means unknown.
#[must_use]
pub fn format_gb(gb: f64) -> String {
    if gb.is_nan() {
        "unknown".to_string()
    } else {
        format!("{gb:.2} GB")
    }
}

/// Pretty JSON for any serializable value.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Per-category counts followed by every discovered path.
#[must_use]
pub fn format_gather_text(files: &[DiscoveredFile]) -> String {
    if files.is_empty() {
        return "No matching files found.\n".to_string();
    }

    let mut per_category: BTreeMap<Category, usize> = BTreeMap::new();
    for file in files {
        *per_category.entry(file.category).or_default() += 1;
    }

    let mut out = String::new();
    let _ = writeln!(out, "Discovered {} file(s)", files.len());
    for (category, count) in &per_category {
        let _ = writeln!(out, "  {category:<14} {count:>6}");
    }
    let _ = writeln!(out);
    for file in files {
        let _ = writeln!(out, "[{}] {}", file.category, file.path.display());
    }
    out
}

#[must_use]
pub fn format_target_text(target: &DestinationTarget, reachable: Option<bool>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Descriptor: {}", target.descriptor);
    let _ = writeln!(out, "Form:       {}", target.kind);
    let _ = writeln!(out, "Address:    {}", target.socket_addr());
    let _ = writeln!(
        out,
        "Root:       {}",
        target
            .root()
            .map_or_else(|| "(not mounted)".to_string(), |r| r.display().to_string())
    );
    if let Some(reachable) = reachable {
        let _ = writeln!(
            out,
            "Reachable:  {}",
            if reachable { "yes" } else { "no" }
        );
    }
    out
}

#[must_use]
pub fn format_drive_text(drive: &DriveRecord) -> String {
    let serial = if drive.serial_number.is_empty() {
        "unknown"
    } else {
        drive.serial_number.as_str()
    };
    format!(
        "Drive {serial}: {} used of {}, {} files\n",
        format_gb(drive.storage_used_gb),
        format_gb(drive.storage_total_gb),
        drive.file_count
    )
}

#[must_use]
pub fn format_outcome_text(outcome: &CopyOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Copied:   {}", outcome.copied.len());
    let _ = writeln!(out, "Failed:   {}", outcome.failures.len());
    let _ = writeln!(
        out,
        "Records:  {} ({})",
        outcome.records.len(),
        if outcome.records_submitted {
            "submitted"
        } else {
            "pending re-submission"
        }
    );

    if !outcome.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures:");
        for failure in &outcome.failures {
            let _ = writeln!(out, "  [{}] {}: {}", failure.code, failure.path, failure.message);
        }
    }
    out
}

/// JSON view of a copy run.
#[derive(Debug, Serialize)]
pub struct OutcomeReport<'a> {
    pub copied: &'a [std::path::PathBuf],
    pub failures: &'a [crate::models::CopyFailure],
    pub records_submitted: bool,
    pub record_count: usize,
    pub drive: &'a DriveRecord,
    pub manifest: Option<&'a CopyManifest>,
}
