/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The shared component registry.
//!
//! Components are compiled independently and in any order. A reference
//! to another component is a [`ForwardingHandle`]: a named slot that is
//! filled in when that component is bound, and read again every time the
//! handle is invoked. After all components are bound, every handle
//! reaches its target regardless of compilation order.

use crate::ast::Program;
use crate::error::{TemplateError, TemplateResult};
use crate::globals::{ComponentGlobals, is_component_name};
use crate::value::{Function, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// What to do when two component files derive the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The entry discovered last wins.
    #[default]
    Overwrite,
    /// Binding a second entry is an error.
    Error,
}

/// A compiled component ready to be bound.
#[derive(Debug, Clone)]
pub struct ComponentEntry {
    pub name: String,
    /// Position in discovery order; decides which duplicate wins.
    pub ordinal: usize,
    pub origin: PathBuf,
    pub render: Arc<Function>,
}

/// The result of binding an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    /// The entry replaced one discovered earlier.
    Replaced { previous: PathBuf },
    /// An entry discovered later was already bound and was kept.
    Superseded { by: PathBuf },
}

#[derive(Debug)]
struct Slot {
    name: String,
    entry: RwLock<Option<ComponentEntry>>,
}

impl Slot {
    fn render(&self) -> Option<Arc<Function>> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|entry| entry.render.clone())
    }
}

/// A late-bound reference to a component by name.
#[derive(Debug, Clone)]
pub struct ForwardingHandle {
    slot: Arc<Slot>,
}

impl ForwardingHandle {
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    pub fn is_bound(&self) -> bool {
        self.slot.render().is_some()
    }

    /// The component currently bound to this name.
    pub fn target(&self) -> TemplateResult<Arc<Function>> {
        self.slot
            .render()
            .ok_or_else(|| TemplateError::UnresolvedReference {
                name: self.slot.name.clone(),
            })
    }
}

/// A point-in-time copy of every bound component, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedComponents {
    components: HashMap<String, Arc<Function>>,
}

impl ResolvedComponents {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.components
            .get(name)
            .map(|render| Value::Function(render.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Name-to-component registry shared by every component sandbox.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    slots: RwLock<HashMap<String, Arc<Slot>>>,
    policy: DuplicatePolicy,
}

impl ComponentRegistry {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Globals for compiling a component against this registry.
    pub fn proxy(self: &Arc<Self>) -> ComponentGlobals {
        ComponentGlobals::new(self)
    }

    fn slot(&self, name: &str) -> Arc<Slot> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return slot.clone();
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Slot {
                    name: name.to_string(),
                    entry: RwLock::new(None),
                })
            })
            .clone()
    }

    /// Get a forwarding handle for `name`, creating its slot if needed.
    pub fn declare(&self, name: &str) -> ForwardingHandle {
        ForwardingHandle {
            slot: self.slot(name),
        }
    }

    /// Declare every component name `program` references.
    ///
    /// References are otherwise declared only when a render function runs;
    /// declaring them up front lets [`Self::unbound_names`] report names
    /// that no file defines as soon as every component is bound.
    pub fn declare_references(&self, program: &Program) {
        for name in program.free_names() {
            if is_component_name(&name) {
                self.declare(&name);
            }
        }
    }

    /// Bind a compiled component to its name.
    ///
    /// Under [`DuplicatePolicy::Overwrite`] the entry with the greater
    /// ordinal is kept, so the outcome does not depend on which worker
    /// finished first.
    pub fn bind(&self, entry: ComponentEntry) -> TemplateResult<BindOutcome> {
        let slot = self.slot(&entry.name);
        let mut current = slot.entry.write().unwrap_or_else(PoisonError::into_inner);

        let Some(existing) = current.as_ref() else {
            *current = Some(entry);
            return Ok(BindOutcome::Bound);
        };

        match self.policy {
            DuplicatePolicy::Error => {
                let (first, second) = if existing.ordinal <= entry.ordinal {
                    (existing.origin.clone(), entry.origin)
                } else {
                    (entry.origin, existing.origin.clone())
                };
                Err(TemplateError::DuplicateComponent {
                    name: entry.name,
                    first,
                    second,
                })
            }
            DuplicatePolicy::Overwrite if entry.ordinal >= existing.ordinal => {
                let previous = existing.origin.clone();
                *current = Some(entry);
                Ok(BindOutcome::Replaced { previous })
            }
            DuplicatePolicy::Overwrite => Ok(BindOutcome::Superseded {
                by: existing.origin.clone(),
            }),
        }
    }

    /// The component bound to `name`, if any.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        let slot = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        slot.render().map(Value::Function)
    }

    /// Snapshot every bound component.
    pub fn resolved(&self) -> ResolvedComponents {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let components = slots
            .iter()
            .filter_map(|(name, slot)| slot.render().map(|render| (name.clone(), render)))
            .collect();
        ResolvedComponents { components }
    }

    /// Names that were referenced but never bound, sorted.
    pub fn unbound_names(&self) -> Vec<String> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.render().is_none())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::transform;
    use crate::value::Native;

    fn entry(name: &str, ordinal: usize, origin: &str) -> ComponentEntry {
        ComponentEntry {
            name: name.to_string(),
            ordinal,
            origin: PathBuf::from(origin),
            render: Arc::new(Function::Native(Native::CreateElement)),
        }
    }

    #[test]
    fn test_handle_resolves_after_bind() {
        let registry = ComponentRegistry::default();
        let handle = registry.declare("Card");
        assert!(!handle.is_bound());
        assert_eq!(
            handle.target().unwrap_err(),
            TemplateError::UnresolvedReference {
                name: "Card".to_string()
            }
        );

        registry.bind(entry("Card", 0, "card.jsx")).unwrap();
        assert!(handle.is_bound());
        assert!(handle.target().is_ok());
        assert!(registry.resolve("Card").is_some());
        assert!(registry.resolve("Other").is_none());
    }

    #[test]
    fn test_overwrite_keeps_greater_ordinal() {
        let registry = ComponentRegistry::new(DuplicatePolicy::Overwrite);
        assert_eq!(
            registry.bind(entry("Nav", 3, "b/nav.jsx")).unwrap(),
            BindOutcome::Bound
        );
        assert_eq!(
            registry.bind(entry("Nav", 1, "a/nav.jsx")).unwrap(),
            BindOutcome::Superseded {
                by: PathBuf::from("b/nav.jsx")
            }
        );
        assert_eq!(
            registry.bind(entry("Nav", 5, "c/nav.jsx")).unwrap(),
            BindOutcome::Replaced {
                previous: PathBuf::from("b/nav.jsx")
            }
        );
    }

    #[test]
    fn test_error_policy_reports_both_origins() {
        let registry = ComponentRegistry::new(DuplicatePolicy::Error);
        registry.bind(entry("Nav", 4, "b/nav.jsx")).unwrap();
        let err = registry.bind(entry("Nav", 2, "a/nav.jsx")).unwrap_err();
        assert_eq!(
            err,
            TemplateError::DuplicateComponent {
                name: "Nav".to_string(),
                first: PathBuf::from("a/nav.jsx"),
                second: PathBuf::from("b/nav.jsx"),
            }
        );
    }

    #[test]
    fn test_resolved_and_unbound() {
        let registry = ComponentRegistry::default();
        registry.declare("Missing");
        registry.bind(entry("Card", 0, "card.jsx")).unwrap();
        registry.bind(entry("Alpha", 1, "alpha.jsx")).unwrap();

        let resolved = registry.resolved();
        assert_eq!(resolved.names(), vec!["Alpha", "Card"]);
        assert!(!resolved.contains("Missing"));
        assert_eq!(registry.unbound_names(), vec!["Missing"]);
    }

    #[test]
    fn test_declare_references_before_rendering() {
        let body = transform("<div>{window.title}<Ghost />{props.items.map(Row => <Row />)}</div>")
            .unwrap()
            .into_expr();
        let registry = ComponentRegistry::default();
        registry.declare_references(&Program::component("Shell", body));
        assert_eq!(registry.unbound_names(), vec!["Ghost"]);
    }
}
