/*
 * scope.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lexical scopes for arrow function bodies.

use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A chain of variable frames. Closures capture a `Scope` by value;
/// cloning only bumps a reference count.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frame: Option<Arc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    variables: HashMap<String, Value>,
    parent: Option<Arc<Frame>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child scope. The child sees every variable of its
    /// parents unless it shadows it.
    pub fn child(&self, variables: HashMap<String, Value>) -> Scope {
        Scope {
            frame: Some(Arc::new(Frame {
                variables,
                parent: self.frame.clone(),
            })),
        }
    }

    /// Look up a variable, checking parent scopes.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            if let Some(value) = current.variables.get(name) {
                return Some(value);
            }
            frame = current.parent.as_deref();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_shadowing() {
        let parent = Scope::new().child(HashMap::from([
            ("x".to_string(), Value::string("parent_x")),
            ("y".to_string(), Value::string("parent_y")),
        ]));
        let child = parent.child(HashMap::from([(
            "x".to_string(),
            Value::string("child_x"),
        )]));

        // Child shadows parent for 'x'
        assert_eq!(child.get("x"), Some(&Value::string("child_x")));
        assert_eq!(child.get("y"), Some(&Value::string("parent_y")));
        assert_eq!(parent.get("x"), Some(&Value::string("parent_x")));
        assert_eq!(child.get("z"), None);
        assert_eq!(Scope::new().get("x"), None);
    }
}
