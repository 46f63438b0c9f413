//! Folder mapping definitions binding categories to vendor source layouts.

use super::{Category, RECURSIVE_MARKER, riprocess_dir, riprocess_ext};
use crate::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Name of the only binding shipped today.
pub const RIPROCESS_TO_GEOBC: &str = "riprocess-geobc";

/// Glob options applied to every extension match.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A source directory, relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePattern {
    dir: PathBuf,
    recursive: bool,
}

impl SourcePattern {
    /// Parse a `/`- or `\`-separated pattern. A trailing `**` segment marks
    /// the directory as recursive.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let mut segments: Vec<&str> = pattern
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect();

        let recursive = segments.last() == Some(&RECURSIVE_MARKER);
        if recursive {
            segments.pop();
        }

        Self {
            dir: segments.iter().collect(),
            recursive,
        }
    }

    /// Directory relative to the source root, with native separators.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
}

/// One recognized extension, possibly holding a `*` wildcard (e.g. `pos.*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPattern {
    raw: String,
}

impl ExtensionPattern {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Compile to a file-name glob equivalent to `*<ext>`.
    pub fn compile(&self) -> Result<CompiledExtension> {
        let escaped: Vec<String> = self.raw.split('*').map(Pattern::escape).collect();
        let glob = format!("*{}", escaped.join("*"));
        let pattern = Pattern::new(&glob)
            .map_err(|e| Error::InvalidInput(format!("bad extension '{}': {e}", self.raw)))?;
        Ok(CompiledExtension { pattern })
    }
}

/// Compiled file-name matcher for one extension.
#[derive(Debug, Clone)]
pub struct CompiledExtension {
    pattern: Pattern,
}

impl CompiledExtension {
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.matches_with(file_name, MATCH_OPTIONS)
    }
}

/// Ordered set of extensions recognized for a category.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionSet {
    extensions: Vec<ExtensionPattern>,
}

impl ExtensionSet {
    /// Build a set, dropping repeated entries while keeping first-seen order.
    #[must_use]
    pub fn new(extensions: &[&str]) -> Self {
        let mut seen = HashSet::new();
        let extensions = extensions
            .iter()
            .filter(|ext| seen.insert(**ext))
            .map(|ext| ExtensionPattern::new(ext))
            .collect();
        Self { extensions }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionPattern> {
        self.extensions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Source patterns and extensions bound to one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub category: Category,
    pub sources: Vec<SourcePattern>,
    pub extensions: ExtensionSet,
}

impl MappingEntry {
    #[must_use]
    pub fn new(category: Category, sources: &[&str], extensions: &[&str]) -> Self {
        Self {
            category,
            sources: sources.iter().map(|s| SourcePattern::parse(s)).collect(),
            extensions: ExtensionSet::new(extensions),
        }
    }
}

/// A named binding of the taxonomy onto one vendor layout.
///
/// Entries keep their definition order, which is the order the gatherer
/// visits them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMapping {
    name: String,
    entries: Vec<MappingEntry>,
}

impl FolderMapping {
    /// Build a mapping. Each category may appear only once.
    pub fn new(name: impl Into<String>, entries: Vec<MappingEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.category) {
                return Err(Error::InvalidInput(format!(
                    "category {} defined twice in folder mapping",
                    entry.category
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            entries,
        })
    }

    /// RiPROCESS default output tree to the GeoBC delivery folder layout.
    #[must_use]
    pub fn riprocess_to_geobc() -> Self {
        let vector = super::vector_with_shapefile_extensions();

        Self {
            name: RIPROCESS_TO_GEOBC.to_string(),
            entries: vec![
                MappingEntry::new(
                    Category::Auxiliary,
                    riprocess_dir::AUXILIARY,
                    riprocess_ext::AUXILIARY,
                ),
                MappingEntry::new(Category::Coverage, riprocess_dir::COVERAGE, &vector),
                MappingEntry::new(
                    Category::BaseStation,
                    riprocess_dir::BASE_STATION,
                    riprocess_ext::BASE_STATION,
                ),
                MappingEntry::new(Category::Control, riprocess_dir::CONTROL, &vector),
                MappingEntry::new(
                    Category::RawLidar,
                    riprocess_dir::RAW_LIDAR,
                    riprocess_ext::RAW_LIDAR,
                ),
                MappingEntry::new(
                    Category::ImuGps,
                    riprocess_dir::IMU_GPS,
                    riprocess_ext::IMU_GPS,
                ),
            ],
        }
    }

    /// Look up a built-in mapping by name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            RIPROCESS_TO_GEOBC | "kisik" | "riprocess" => Some(Self::riprocess_to_geobc()),
            _ => None,
        }
    }

    /// Names accepted by [`FolderMapping::by_name`].
    #[must_use]
    pub fn available() -> &'static [&'static str] {
        &[RIPROCESS_TO_GEOBC]
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, category: Category) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.category == category)
    }

    /// Copy of this mapping holding only `categories`, in mapping order.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for a category this mapping does not bind.
    pub fn restricted_to(&self, categories: &[Category]) -> Result<Self> {
        if let Some(missing) = categories.iter().find(|c| self.entry(**c).is_none()) {
            return Err(Error::InvalidInput(format!(
                "mapping '{}' has no {missing} category",
                self.name
            )));
        }

        Ok(Self {
            name: self.name.clone(),
            entries: self
                .entries
                .iter()
                .filter(|e| categories.contains(&e.category))
                .cloned()
                .collect(),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
