/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! JSX-style templates for static site generation.
//!
//! This crate turns template source into static HTML in three steps:
//!
//! - **Transform**: [`transform`] parses a template body (one expression in
//!   which markup tags are element constructors) with `oxc_parser` and
//!   lowers it into an expression tree.
//! - **Evaluate**: a [`Sandbox`] runs the expression against a set of
//!   [`Globals`]. Component templates evaluate to functions of `props`;
//!   page templates evaluate to a render tree.
//! - **Serialize**: [`render_document`] walks the render tree, invoking
//!   components, and produces markup prefixed with a doctype.
//!
//! # Architecture
//!
//! Components reference each other through a shared [`ComponentRegistry`].
//! A name is looked up as a [`ForwardingHandle`] that reads the registry
//! when it is invoked, so components may be compiled in any order and in
//! parallel. Pages are evaluated only after every component is bound, and
//! see a [`ResolvedComponents`] snapshot.
//!
//! # Example
//!
//! ```
//! use sitegen_template::{
//!     ComponentEntry, ComponentRegistry, DuplicatePolicy, PageGlobals, Program, Sandbox, Value,
//!     render_document, transform,
//! };
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ComponentRegistry::new(DuplicatePolicy::Overwrite));
//!
//! // Compile a component
//! let body = transform("<strong>{props.text}</strong>")?;
//! let sandbox = Sandbox::new(Arc::new(registry.proxy()));
//! let Value::Function(render) = sandbox.run(&Program::component("Bold", body.into_expr()))? else {
//!     unreachable!()
//! };
//! registry.bind(ComponentEntry {
//!     name: "Bold".to_string(),
//!     ordinal: 0,
//!     origin: PathBuf::from("bold.jsx"),
//!     render,
//! })?;
//!
//! // Render a page
//! let page = transform(r#"<p><Bold text="hi" /></p>"#)?;
//! let sandbox = Sandbox::new(Arc::new(PageGlobals::new(registry.resolved())));
//! let tree = sandbox.run(&Program::page(page.into_expr()))?;
//! assert_eq!(render_document(&tree)?, "<!DOCTYPE html><p><strong>hi</strong></p>");
//! # Ok::<(), sitegen_template::TemplateError>(())
//! ```

pub mod ast;
pub mod entities;
pub mod error;
pub mod evaluator;
pub mod globals;
pub mod markup;
pub mod parser;
pub mod registry;
pub mod scope;
pub mod value;

// Re-export main types at crate root
pub use ast::{Expr, PAGE_RESULT, Program};
pub use error::{TemplateError, TemplateResult};
pub use evaluator::{MAX_CALL_DEPTH, Sandbox, call_function};
pub use globals::{
    ComponentGlobals, Globals, MemoryGlobals, NullGlobals, PageGlobals, RENDER_PRIMITIVE,
    is_component_name, render_primitive,
};
pub use markup::{DOCTYPE, escape_html, render_document, render_to_static_markup};
pub use parser::{Transformed, transform};
pub use registry::{
    BindOutcome, ComponentEntry, ComponentRegistry, DuplicatePolicy, ForwardingHandle,
    ResolvedComponents,
};
pub use value::{Element, ElementType, Function, Props, Value};
