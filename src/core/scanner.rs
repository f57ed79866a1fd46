//! Scanner - Enumerates candidate documents under a root directory
//!
//! Walks with `walkdir`, sorted by file name inside each directory. Any walk
//! error aborts enumeration.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;

/// File-name suffix filter. `*.json` and `.json` are equivalent; `*` or an
/// empty pattern matches every file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    suffix: String,
}

impl FilePattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            suffix: pattern.trim().trim_start_matches('*').to_string(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.suffix)
    }
}

impl Default for FilePattern {
    fn default() -> Self {
        Self::new("*.json")
    }
}

/// Walk configuration
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub pattern: FilePattern,
    /// Skip hidden files and directories (the root itself is always walked)
    pub skip_hidden: bool,
    /// Maximum traversal depth
    pub max_depth: Option<usize>,
}

/// Collects matching regular files under a root
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    options: WalkOptions,
}

impl Scanner {
    pub fn new(options: WalkOptions) -> Self {
        Self { options }
    }

    /// Matching files in traversal order.
    pub fn collect(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let mut walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
        if let Some(depth) = self.options.max_depth {
            walker = walker.max_depth(depth);
        }

        let skip_hidden = self.options.skip_hidden;
        let mut files = Vec::new();
        for entry in walker
            .into_iter()
            .filter_entry(move |e| !skip_hidden || e.depth() == 0 || !is_hidden(e))
        {
            let entry = entry.map_err(|source| ScanError::Walk {
                root: root.to_path_buf(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            // Lossy so non-UTF-8 names still match on their suffix.
            if self.options.pattern.matches(&entry.file_name().to_string_lossy()) {
                files.push(entry.into_path());
            } else {
                tracing::debug!("Pattern excludes {}", entry.path().display());
            }
        }

        tracing::debug!("Found {} matching files under {}", files.len(), root.display());
        Ok(files)
    }
}

/// Check if entry is hidden (starts with .)
fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
