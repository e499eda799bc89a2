/*
 * component.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Component compilation.
//!
//! A component file is transformed, evaluated as
//! `Name = (props) => (<expr>)` against the registry proxy, and the
//! resulting function is bound under the name derived from the file.

use crate::error::{BuildError, Result};
use sitegen_template::{
    BindOutcome, ComponentEntry, ComponentRegistry, Program, Sandbox, TemplateError, Value,
    transform,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A component that was compiled and bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledComponent {
    pub name: String,
    pub path: PathBuf,
    pub outcome: BindOutcome,
}

/// Compile one component file into `registry`.
///
/// `ordinal` is the file's position in discovery order.
pub fn compile_component(
    registry: &Arc<ComponentRegistry>,
    path: &Path,
    ordinal: usize,
) -> Result<CompiledComponent> {
    let name = component_name(path)?;
    let source = std::fs::read_to_string(path).map_err(|source| BuildError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let body = transform(&source).map_err(|e| BuildError::template(path, e))?;
    let program = Program::component(&name, body.into_expr());
    registry.declare_references(&program);

    let sandbox = Sandbox::new(Arc::new(registry.proxy()));
    let render = match sandbox.run(&program) {
        Ok(Value::Function(render)) => render,
        Ok(other) => {
            return Err(BuildError::template(
                path,
                TemplateError::Evaluation {
                    message: format!("{} evaluated to {}, not a function", name, other.type_name()),
                },
            ));
        }
        Err(e) => return Err(BuildError::template(path, e)),
    };

    let outcome = registry
        .bind(ComponentEntry {
            name: name.clone(),
            ordinal,
            origin: path.to_path_buf(),
            render,
        })
        .map_err(|e| BuildError::template(path, e))?;

    match &outcome {
        BindOutcome::Bound => {
            debug!(component = %name, path = %path.display(), "Compiled component")
        }
        BindOutcome::Replaced { previous } => warn!(
            component = %name,
            path = %path.display(),
            replaced = %previous.display(),
            "Duplicate component name; the later file wins"
        ),
        BindOutcome::Superseded { by } => warn!(
            component = %name,
            path = %path.display(),
            kept = %by.display(),
            "Duplicate component name; the later file wins"
        ),
    }

    Ok(CompiledComponent {
        name,
        path: path.to_path_buf(),
        outcome,
    })
}

/// Derive a component name from a file's base name.
///
/// The base name is split into words at `_ . - space` and at case
/// transitions, then each word is capitalised: `nav-bar.html` gives
/// `NavBar`, `XMLParser.html` gives `XmlParser`. A name that would not
/// start with a letter is rejected.
pub fn component_name(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let name: String = split_words(stem).iter().map(|w| capitalize(w)).collect();
    if !name.chars().next().is_some_and(|c| c.is_alphabetic()) {
        return Err(BuildError::InvalidComponentName {
            path: path.to_path_buf(),
        });
    }
    Ok(name)
}

fn split_words(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // fooBar, XMLParser
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
