/*
 * discovery.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template discovery.

use crate::error::{BuildError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Find every file under `root` with the given extension, sorted by path.
///
/// The position of a file in the returned list is its discovery ordinal.
/// A missing root yields no files.
pub fn discover_templates(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        warn!(dir = %root.display(), "Template directory does not exist");
        return Ok(Vec::new());
    }

    let extension = extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| BuildError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == extension)
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    debug!(dir = %root.display(), count = files.len(), "Discovered templates");
    Ok(files)
}
