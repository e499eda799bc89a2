/*
 * style.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Stylesheet compilation.
//!
//! The site's SCSS entry is compiled with grass and written under the
//! output root after the pages are rendered.

use crate::config::StylesheetOptions;
use crate::error::{BuildError, Result, StyleError};
use grass::{Options, OutputStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compiles a stylesheet entry to CSS.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, entry: &Path) -> std::result::Result<String, StyleError>;
}

/// SCSS compilation with grass.
#[derive(Debug, Clone, Default)]
pub struct GrassCompiler {
    load_paths: Vec<PathBuf>,
    minified: bool,
}

impl GrassCompiler {
    pub fn new(load_paths: Vec<PathBuf>, minified: bool) -> Self {
        Self {
            load_paths,
            minified,
        }
    }
}

impl StyleCompiler for GrassCompiler {
    fn compile(&self, entry: &Path) -> std::result::Result<String, StyleError> {
        if !entry.is_file() {
            return Err(StyleError::NotFound);
        }
        let scss = fs::read_to_string(entry)?;

        // Relative imports resolve against the entry's directory first.
        let mut load_paths = Vec::with_capacity(self.load_paths.len() + 1);
        if let Some(dir) = entry.parent() {
            load_paths.push(dir.to_path_buf());
        }
        load_paths.extend(self.load_paths.iter().cloned());

        let style = if self.minified {
            OutputStyle::Compressed
        } else {
            OutputStyle::Expanded
        };

        let options = Options::default().load_paths(&load_paths).style(style);

        grass::from_string(scss, &options).map_err(|e| StyleError::Sass(e.to_string()))
    }
}

/// Compile the configured entry and write the CSS. Returns the path written.
pub fn build_stylesheet(
    options: &StylesheetOptions,
    compiler: &dyn StyleCompiler,
) -> Result<PathBuf> {
    let css = compiler
        .compile(&options.entry)
        .map_err(|source| BuildError::Style {
            path: options.entry.clone(),
            source,
        })?;

    if let Some(parent) = options.output.parent() {
        fs::create_dir_all(parent).map_err(|source| BuildError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&options.output, css).map_err(|source| BuildError::Write {
        path: options.output.clone(),
        source,
    })?;

    debug!(
        entry = %options.entry.display(),
        output = %options.output.display(),
        "Compiled stylesheet"
    );
    Ok(options.output.clone())
}
