/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template transformation, evaluation and rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while transforming, evaluating or rendering a template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// The template text is not a valid expression.
    #[error("Transform error at {line}:{column}: {message}")]
    Transform {
        message: String,
        line: usize,
        column: usize,
    },

    /// A runtime fault while executing a transformed expression.
    #[error("Evaluation error: {message}")]
    Evaluation { message: String },

    /// A forwarding handle was invoked but its component was never bound.
    #[error("Unresolved component reference: {name} was never compiled")]
    UnresolvedReference { name: String },

    /// A page used a component name that is not in the registry.
    #[error("Missing component: <{name}> is not defined")]
    MissingComponent { name: String },

    /// The render tree cannot be serialized.
    #[error("Render error: {message}")]
    Render { message: String },

    /// Two component files derived the same name under the strict policy.
    #[error("Duplicate component {name}: defined by {} and {}", first.display(), second.display())]
    DuplicateComponent {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl TemplateError {
    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        TemplateError::Evaluation {
            message: message.into(),
        }
    }

    pub(crate) fn render(message: impl Into<String>) -> Self {
        TemplateError::Render {
            message: message.into(),
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
