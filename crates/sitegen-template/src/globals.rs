/*
 * globals.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Global bindings visible to a sandboxed template.
//!
//! Every sandbox sees the render primitive under [`RENDER_PRIMITIVE`].
//! Other free identifiers are answered by a [`Globals`] implementation:
//! components see the registry through forwarding handles, pages see a
//! snapshot of the resolved registry.

use crate::registry::{ComponentRegistry, ResolvedComponents};
use crate::value::{Function, Native, Props, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

/// The global name of the render primitive.
pub const RENDER_PRIMITIVE: &str = "React";

/// Trait for answering free identifiers during evaluation.
///
/// Implementations must be shareable across worker threads; closures
/// created by a template keep their globals alive.
pub trait Globals: Send + Sync + Debug {
    /// Look up a global by name.
    ///
    /// # Returns
    /// The bound value, or `None` if the name is not a global. Unknown
    /// names evaluate to `undefined`.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// The render primitive object, `{ createElement, Fragment }`.
pub fn render_primitive() -> Value {
    let mut primitive = Props::new();
    primitive.insert(
        "createElement".to_string(),
        Value::Function(Arc::new(Function::Native(Native::CreateElement))),
    );
    primitive.insert("Fragment".to_string(), Value::Fragment);
    Value::Object(primitive)
}

/// Globals with nothing but the render primitive.
#[derive(Debug, Clone, Default)]
pub struct NullGlobals;

impl Globals for NullGlobals {
    fn lookup(&self, name: &str) -> Option<Value> {
        (name == RENDER_PRIMITIVE).then(render_primitive)
    }
}

/// Globals from an in-memory map, plus the render primitive.
///
/// Useful for evaluating a single template against fixed bindings.
#[derive(Debug, Clone, Default)]
pub struct MemoryGlobals {
    bindings: HashMap<String, Value>,
}

impl MemoryGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn with_bindings(bindings: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        let mut globals = Self::new();
        for (name, value) in bindings {
            globals.add(name, value);
        }
        globals
    }
}

impl Globals for MemoryGlobals {
    fn lookup(&self, name: &str) -> Option<Value> {
        if name == RENDER_PRIMITIVE {
            return Some(render_primitive());
        }
        self.bindings.get(name).cloned()
    }
}

/// Whether `name` can refer to a component: it starts with an uppercase
/// letter, as JSX requires of component tags.
pub fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase) && name != RENDER_PRIMITIVE
}

/// Globals for component templates.
///
/// A component name yields a forwarding handle from the registry, so a
/// component may reference another component that has not been compiled
/// yet. Other names evaluate to `undefined`. The registry is held weakly; closures
/// stored in the registry refer back to it through these globals.
#[derive(Debug, Clone)]
pub struct ComponentGlobals {
    registry: Weak<ComponentRegistry>,
}

impl ComponentGlobals {
    pub fn new(registry: &Arc<ComponentRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
        }
    }
}

impl Globals for ComponentGlobals {
    fn lookup(&self, name: &str) -> Option<Value> {
        if name == RENDER_PRIMITIVE {
            return Some(render_primitive());
        }
        if !is_component_name(name) {
            return None;
        }
        let registry = self.registry.upgrade()?;
        Some(Value::Function(Arc::new(Function::Handle(
            registry.declare(name),
        ))))
    }
}

/// Globals for page templates: the resolved components plus the render
/// primitive. Names that are not components evaluate to `undefined`.
#[derive(Debug, Clone, Default)]
pub struct PageGlobals {
    components: ResolvedComponents,
}

impl PageGlobals {
    pub fn new(components: ResolvedComponents) -> Self {
        Self { components }
    }
}

impl Globals for PageGlobals {
    fn lookup(&self, name: &str) -> Option<Value> {
        if name == RENDER_PRIMITIVE {
            return Some(render_primitive());
        }
        self.components.get(name)
    }
}
