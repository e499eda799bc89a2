/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Build pipeline for sitegen.
//!
//! This crate wires the template engine to the file system: it reads the
//! site configuration, discovers component and page templates, compiles
//! components into a shared registry, renders pages against it, and
//! compiles the site stylesheet.

pub mod build;
pub mod component;
pub mod config;
pub mod discovery;
pub mod error;
pub mod page;
pub mod style;

pub use build::{BuildSummary, Builder, build};
pub use component::{CompiledComponent, compile_component, component_name};
pub use config::{
    BuildOptions, DuplicateComponents, SiteConfig, StylesheetConfig, StylesheetOptions,
};
pub use discovery::discover_templates;
pub use error::{BuildError, Result, Stage, StyleError};
pub use page::{output_path, render_page};
pub use style::{GrassCompiler, StyleCompiler, build_stylesheet};
