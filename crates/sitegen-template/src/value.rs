/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Runtime values and render-tree elements.
//!
//! Values follow JavaScript semantics closely enough for templates:
//! truthiness, string conversion, loose and strict equality. Everything
//! is `Send + Sync` so a batch of templates can be evaluated on a
//! worker pool.

use crate::ast::ArrowFunction;
use crate::error::{TemplateError, TemplateResult};
use crate::globals::Globals;
use crate::registry::ForwardingHandle;
use crate::scope::Scope;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// An ordered property map. Attribute order in the output follows it.
pub type Props = IndexMap<String, Value>;

/// A value produced by evaluating an expression.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Props),
    Function(Arc<Function>),
    /// The element type behind `React.Fragment` and `<>...</>`.
    Fragment,
    Element(Arc<Element>),
}

/// A callable value.
#[derive(Debug)]
pub enum Function {
    /// An arrow function together with the scope it closed over.
    Closure(Closure),
    /// A registry reference resolved when it is called.
    Handle(ForwardingHandle),
    Native(Native),
}

/// Functions provided by the render primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Native {
    CreateElement,
}

pub struct Closure {
    pub(crate) arrow: Arc<ArrowFunction>,
    pub(crate) scope: Scope,
    pub(crate) globals: Arc<dyn Globals>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.arrow.params)
            .field("globals", &self.globals)
            .finish_non_exhaustive()
    }
}

/// A render-tree node: `{ type, key, props }`.
#[derive(Debug, Clone)]
pub struct Element {
    pub element_type: ElementType,
    pub key: Option<String>,
    /// Attributes plus `children`.
    pub props: Props,
}

#[derive(Debug, Clone)]
pub enum ElementType {
    Tag(String),
    Fragment,
    /// A component to invoke with the element's props at render time.
    Component { name: String, render: Arc<Function> },
    /// A component name that resolved to `undefined`.
    Missing(String),
}

impl Element {
    /// Build an element the way `createElement(type, config, ...children)`
    /// does: `key` and `ref` are lifted out of the config and a single
    /// child is stored unwrapped.
    pub fn new(element_type: ElementType, config: Props, mut children: Vec<Value>) -> Self {
        let mut props = config;
        let key = props
            .shift_remove("key")
            .filter(|k| !k.is_nullish())
            .map(|k| k.to_display_string());
        props.shift_remove("ref");

        match children.len() {
            0 => {}
            1 => {
                props.insert("children".to_string(), children.remove(0));
            }
            _ => {
                props.insert("children".to_string(), Value::Array(children));
            }
        }

        Self {
            element_type,
            key,
            props,
        }
    }

    pub fn children(&self) -> Option<&Value> {
        self.props.get("children").filter(|c| !c.is_nullish())
    }
}

impl ElementType {
    /// Interpret a value passed as an element type. `name` is used for
    /// components and for reporting a missing one.
    pub fn from_value(value: Value, name: &str) -> TemplateResult<Self> {
        match value {
            Value::String(tag) => Ok(ElementType::Tag(tag)),
            Value::Fragment => Ok(ElementType::Fragment),
            Value::Function(render) => Ok(ElementType::Component {
                name: name.to_string(),
                render,
            }),
            Value::Undefined => Ok(ElementType::Missing(name.to_string())),
            other => Err(TemplateError::evaluation(format!(
                "Element type is invalid: expected a string or a component but got {}",
                other.type_name()
            ))),
        }
    }
}

impl Function {
    /// Name used in diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Function::Handle(handle) => handle.name(),
            Function::Native(Native::CreateElement) => "createElement",
            Function::Closure(_) => "anonymous",
        }
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// The `typeof` result.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Fragment
            | Value::Element(_) => "object",
        }
    }

    /// A descriptive name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Element(_) => "element",
            Value::Fragment => "fragment",
            other => other.type_of(),
        }
    }

    /// JavaScript `String(value)`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Element(_) | Value::Fragment => "[object Object]".to_string(),
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        }
    }

    /// JavaScript `Number(value)`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else if let Some(hex) = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64)
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) if items.is_empty() => 0.0,
            Value::Array(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    /// `===`. Arrays and objects compare by contents because values are
    /// copied rather than shared; functions and elements by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        self == other
    }

    /// `==`.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined)
            | (Value::Null, Value::Null)
            | (Value::Fragment, Value::Fragment) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Element(a), Value::Element(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Props> for Value {
    fn from(props: Props) -> Self {
        Value::Object(props)
    }
}

/// Format a number the way JavaScript prints it for integral and
/// common fractional values.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}
