/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Site configuration.
//!
//! A project may carry a `_sitegen.yml` (or `_sitegen.yaml`) at its root.
//! Every key is optional; relative paths are resolved against the project
//! root when the file is turned into [`BuildOptions`].

use crate::error::{BuildError, Result};
use serde::Deserialize;
use sitegen_template::DuplicatePolicy;
use std::path::{Path, PathBuf};

/// Config file names, checked in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["_sitegen.yml", "_sitegen.yaml"];

/// How to treat two component files that derive the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateComponents {
    #[default]
    Overwrite,
    Error,
}

impl From<DuplicateComponents> for DuplicatePolicy {
    fn from(value: DuplicateComponents) -> Self {
        match value {
            DuplicateComponents::Overwrite => DuplicatePolicy::Overwrite,
            DuplicateComponents::Error => DuplicatePolicy::Error,
        }
    }
}

/// Parsed `_sitegen.yml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SiteConfig {
    /// Component template root
    pub components: PathBuf,

    /// Page template root
    pub pages: PathBuf,

    /// Output root
    pub output_dir: PathBuf,

    /// Template file extension, without the dot
    pub extension: String,

    pub duplicate_components: DuplicateComponents,

    /// Worker threads; 0 uses the available parallelism
    pub jobs: usize,

    /// `null` disables the stylesheet step
    pub stylesheet: Option<StylesheetConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            components: PathBuf::from("src/react"),
            pages: PathBuf::from("src/pages"),
            output_dir: PathBuf::from("dist"),
            extension: "html".to_string(),
            duplicate_components: DuplicateComponents::default(),
            jobs: 0,
            stylesheet: Some(StylesheetConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StylesheetConfig {
    /// SCSS entry, relative to the project root
    pub entry: PathBuf,

    /// CSS output, relative to the output root
    pub output: PathBuf,

    pub minified: bool,

    /// Extra directories for `@use` and `@import`
    pub load_paths: Vec<PathBuf>,
}

impl Default for StylesheetConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("src/css/app.scss"),
            output: PathBuf::from("css/app.css"),
            minified: false,
            load_paths: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Load the config file in `root`, or the defaults if there is none.
    pub fn discover(root: &Path) -> Result<Self> {
        match Self::find(root) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Find the config file in `root`.
    pub fn find(root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// Load a specific config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BuildError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|e| BuildError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse config text. An empty document gives the defaults.
    pub fn parse(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

/// Fully resolved build settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub root: PathBuf,
    pub components_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub output_dir: PathBuf,
    pub extension: String,
    pub duplicate_policy: DuplicatePolicy,
    pub jobs: usize,
    pub stylesheet: Option<StylesheetOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StylesheetOptions {
    pub entry: PathBuf,
    pub output: PathBuf,
    pub minified: bool,
    pub load_paths: Vec<PathBuf>,
}

impl BuildOptions {
    /// Resolve `config` against the project `root`.
    pub fn resolve(root: impl Into<PathBuf>, config: &SiteConfig) -> Self {
        let root = root.into();
        let output_dir = root.join(&config.output_dir);
        let stylesheet = config.stylesheet.as_ref().map(|style| StylesheetOptions {
            entry: root.join(&style.entry),
            output: output_dir.join(&style.output),
            minified: style.minified,
            load_paths: style.load_paths.iter().map(|p| root.join(p)).collect(),
        });

        Self {
            components_dir: root.join(&config.components),
            pages_dir: root.join(&config.pages),
            output_dir,
            extension: config.extension.trim_start_matches('.').to_string(),
            duplicate_policy: config.duplicate_components.into(),
            jobs: config.jobs,
            stylesheet,
            root,
        }
    }
}
