/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for sitegen-core

use sitegen_template::TemplateError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A batch of independent per-file tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Components,
    Pages,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Components => "components",
            Stage::Pages => "pages",
        })
    }
}

/// Stylesheet compilation failures.
#[derive(Error, Debug)]
pub enum StyleError {
    #[error("entry file does not exist")]
    NotFound,

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Sass(String),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },

    #[error("Cannot derive a component name from {}", path.display())]
    InvalidComponentName { path: PathBuf },

    #[error("Failed to compile stylesheet {}: {source}", path.display())]
    Style {
        path: PathBuf,
        #[source]
        source: StyleError,
    },

    #[error("Invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("{} of {total} {stage} failed", errors.len())]
    Batch {
        stage: Stage,
        total: usize,
        errors: Vec<BuildError>,
    },

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl BuildError {
    pub(crate) fn template(path: impl Into<PathBuf>, source: TemplateError) -> Self {
        Self::Template {
            path: path.into(),
            source,
        }
    }

    /// The individual failures behind this error. A batch error yields
    /// its members, anything else yields itself.
    pub fn failures(&self) -> Vec<&BuildError> {
        match self {
            BuildError::Batch { errors, .. } => {
                errors.iter().flat_map(BuildError::failures).collect()
            }
            other => vec![other],
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_message_and_failures() {
        let err = BuildError::Batch {
            stage: Stage::Pages,
            total: 3,
            errors: vec![
                BuildError::InvalidComponentName {
                    path: PathBuf::from("a/-.html"),
                },
                BuildError::template(
                    "b.html",
                    TemplateError::MissingComponent {
                        name: "Nav".to_string(),
                    },
                ),
            ],
        };
        assert_eq!(err.to_string(), "2 of 3 pages failed");
        assert_eq!(err.failures().len(), 2);
        assert_eq!(
            err.failures()[1].to_string(),
            "b.html: Missing component: <Nav> is not defined"
        );
    }
}
