//! File gathering: walk each category's source patterns and collect matches.

use crate::models::DiscoveredFile;
use crate::taxonomy::FolderMapping;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Gather every file under `root` matched by `mapping`.
///
/// Results are category-major: categories in mapping order, then source
/// patterns in listed order, then extensions in listed order, then file
/// names in sorted order. Files matched by more than one category (or more
/// than one extension of a category) appear once per match.
///
/// # Errors
/// Returns [`Error::InvalidSource`] when `root` does not exist.
pub fn gather_files<P: AsRef<Path>>(root: P, mapping: &FolderMapping) -> Result<Vec<DiscoveredFile>> {
    let root = root.as_ref();

    if !root.exists() {
        return Err(Error::InvalidSource(root.to_path_buf()));
    }

    let root = std::path::absolute(root)?;
    let mut files = Vec::new();

    for entry in mapping.entries() {
        for source in &entry.sources {
            let search_dir = root.join(source.dir());
            let candidates = list_candidates(&search_dir, source.is_recursive());
            let before = files.len();

            for extension in entry.extensions.iter() {
                let matcher = extension.compile()?;

                for path in &candidates {
                    let Some(name) = path.file_name() else {
                        continue;
                    };
                    if matcher.matches(&name.to_string_lossy()) {
                        log::debug!(
                            "{}: {} matched '{}'",
                            entry.category,
                            path.display(),
                            extension.as_str()
                        );
                        files.push(DiscoveredFile {
                            path: path.clone(),
                            category: entry.category,
                            pattern_dir: source.dir().to_path_buf(),
                        });
                    }
                }
            }

            log::debug!(
                "{}: {} file(s) under {} (recursive: {})",
                entry.category,
                files.len() - before,
                search_dir.display(),
                source.is_recursive()
            );
        }
    }

    log::info!(
        "Gathered {} file(s) from {} using mapping '{}'",
        files.len(),
        root.display(),
        mapping.name()
    );

    Ok(files)
}

/// Regular files directly inside `dir`, or anywhere below it when
/// `recursive`. Hidden entries are skipped. A missing directory yields
/// nothing.
fn list_candidates(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        log::trace!("Source directory absent: {}", dir.display());
        return Vec::new();
    }

    let max_depth = if recursive { usize::MAX } else { 1 };

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                log::warn!("Skipping unreadable entry under {}: {err}", dir.display());
                None
            }
        })
        .map(DirEntry::into_path)
        .filter(|path| path.is_file())
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}
