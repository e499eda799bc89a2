/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Sandboxed evaluation of transformed templates.
//!
//! A [`Sandbox`] runs a [`Program`] against a set of [`Globals`] and
//! returns the value assigned to the program's target. Evaluation is
//! side-effect free apart from declaring registry slots for forward
//! references.

use crate::ast::{
    BinaryOp, Expr, JsxAttribute, JsxElement, JsxName, ListItem, MemberProp, ObjectProp, Param,
    Program, UnaryOp,
};
use crate::error::{TemplateError, TemplateResult};
use crate::globals::Globals;
use crate::scope::Scope;
use crate::value::{
    Closure, Element, ElementType, Function, Native, Props, Value, format_number,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Nested function and component calls allowed before evaluation fails.
/// Catches components that render themselves.
pub const MAX_CALL_DEPTH: usize = 256;

/// Longest string a builtin may produce, in bytes.
const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

/// An isolated evaluation context.
#[derive(Debug, Clone)]
pub struct Sandbox {
    globals: Arc<dyn Globals>,
}

impl Sandbox {
    pub fn new(globals: Arc<dyn Globals>) -> Self {
        Self { globals }
    }

    /// Run `target = value` and return the assigned global.
    pub fn run(&self, program: &Program) -> TemplateResult<Value> {
        self.eval(&program.value)
    }

    /// Evaluate a bare expression.
    pub fn eval(&self, expr: &Expr) -> TemplateResult<Value> {
        let scope = Scope::new();
        Env {
            scope: &scope,
            globals: &self.globals,
            depth: 0,
        }
        .eval(expr)
    }
}

/// Call a function value with `args`. `depth` counts the calls already
/// on the stack.
pub fn call_function(
    function: &Arc<Function>,
    args: Vec<Value>,
    depth: usize,
) -> TemplateResult<Value> {
    if depth >= MAX_CALL_DEPTH {
        return Err(TemplateError::evaluation(format!(
            "Maximum call depth of {} exceeded while calling {}",
            MAX_CALL_DEPTH,
            function.name()
        )));
    }
    match function.as_ref() {
        Function::Closure(closure) => {
            let variables = bind_params(&closure.arrow.params, args)?;
            let scope = closure.scope.child(variables);
            Env {
                scope: &scope,
                globals: &closure.globals,
                depth: depth + 1,
            }
            .eval(&closure.arrow.body)
        }
        Function::Handle(handle) => {
            let target = handle.target()?;
            call_function(&target, args, depth + 1)
        }
        Function::Native(Native::CreateElement) => create_element(args),
    }
}

struct Env<'a> {
    scope: &'a Scope,
    globals: &'a Arc<dyn Globals>,
    depth: usize,
}

impl Env<'_> {
    fn eval(&self, expr: &Expr) -> TemplateResult<Value> {
        match expr {
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(i) {
                        out.push_str(&self.eval(expr)?.to_display_string());
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Ident(name) => Ok(self.lookup(name)),
            Expr::Array(items) => Ok(Value::Array(self.eval_list(items)?)),
            Expr::Object(props) => {
                let mut object = Props::new();
                for prop in props {
                    match prop {
                        ObjectProp::KeyValue(key, value) => {
                            object.insert(key.clone(), self.eval(value)?);
                        }
                        ObjectProp::Spread(expr) => spread_into(&mut object, self.eval(expr)?),
                    }
                }
                Ok(Value::Object(object))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let target = self.eval(object)?;
                if *optional && target.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.property_key(property)?;
                get_property(&target, &key)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional),
            Expr::Arrow(arrow) => Ok(Value::Function(Arc::new(Function::Closure(Closure {
                arrow: arrow.clone(),
                scope: self.scope.clone(),
                globals: self.globals.clone(),
            })))),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuits = match op {
                    BinaryOp::And => !left.is_truthy(),
                    BinaryOp::Or => left.is_truthy(),
                    BinaryOp::Nullish => !left.is_nullish(),
                    _ => false,
                };
                if short_circuits {
                    return Ok(left);
                }
                let right = self.eval(right)?;
                Ok(binary(*op, left, right))
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Element(element) => self.eval_element(element),
        }
    }

    fn lookup(&self, name: &str) -> Value {
        if let Some(value) = self.scope.get(name) {
            return value.clone();
        }
        match name {
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            _ => self.globals.lookup(name).unwrap_or(Value::Undefined),
        }
    }

    fn property_key(&self, property: &MemberProp) -> TemplateResult<String> {
        match property {
            MemberProp::Name(name) => Ok(name.clone()),
            MemberProp::Computed(expr) => Ok(self.eval(expr)?.to_display_string()),
        }
    }

    fn eval_list(&self, items: &[ListItem]) -> TemplateResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ListItem::Value(expr) => values.push(self.eval(expr)?),
                ListItem::Spread(expr) => match self.eval(expr)? {
                    Value::Array(more) => values.extend(more),
                    Value::String(s) => values.extend(s.chars().map(|c| Value::String(c.into()))),
                    other => {
                        return Err(TemplateError::evaluation(format!(
                            "{} is not iterable",
                            other.to_display_string()
                        )));
                    }
                },
            }
        }
        Ok(values)
    }

    fn eval_call(&self, callee: &Expr, args: &[ListItem], optional: bool) -> TemplateResult<Value> {
        if let Expr::Member {
            object,
            property,
            optional: optional_member,
        } = callee
        {
            let receiver = self.eval(object)?;
            if *optional_member && receiver.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key = self.property_key(property)?;
            let function = match &receiver {
                Value::Array(_) | Value::String(_) | Value::Number(_) => None,
                other => Some(get_property(other, &key)?),
            };
            if optional && function.as_ref().is_some_and(Value::is_nullish) {
                return Ok(Value::Undefined);
            }
            let args = self.eval_list(args)?;
            return match function {
                Some(function) => self.apply(function, args, || format!("{}.{}", object, key)),
                None => call_builtin(&receiver, &key, args, self.depth),
            };
        }

        let function = self.eval(callee)?;
        if optional && function.is_nullish() {
            return Ok(Value::Undefined);
        }
        let args = self.eval_list(args)?;
        self.apply(function, args, || callee.to_string())
    }

    fn apply(
        &self,
        function: Value,
        args: Vec<Value>,
        describe: impl FnOnce() -> String,
    ) -> TemplateResult<Value> {
        match function {
            Value::Function(function) => call_function(&function, args, self.depth),
            _ => Err(TemplateError::evaluation(format!(
                "{} is not a function",
                describe()
            ))),
        }
    }

    fn eval_element(&self, element: &JsxElement) -> TemplateResult<Value> {
        let element_type = match &element.name {
            JsxName::Intrinsic(tag) => ElementType::Tag(tag.clone()),
            JsxName::Fragment => ElementType::Fragment,
            JsxName::Component(path) => {
                let Some((head, rest)) = path.split_first() else {
                    return Err(TemplateError::evaluation("Empty component name"));
                };
                let mut value = self.lookup(head);
                for segment in rest {
                    value = get_property(&value, segment)?;
                }
                ElementType::from_value(value, &element.name.source_name())?
            }
        };

        let mut props = Props::new();
        for attribute in &element.attributes {
            match attribute {
                JsxAttribute::Named { name, value } => {
                    let value = match value {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Bool(true),
                    };
                    props.insert(name.clone(), value);
                }
                JsxAttribute::Spread(expr) => spread_into(&mut props, self.eval(expr)?),
            }
        }

        let children = element
            .children
            .iter()
            .map(|child| self.eval(child))
            .collect::<TemplateResult<Vec<_>>>()?;

        Ok(Value::Element(Arc::new(Element::new(
            element_type,
            props,
            children,
        ))))
    }
}

fn bind_params(params: &[Param], args: Vec<Value>) -> TemplateResult<HashMap<String, Value>> {
    let mut args = args.into_iter();
    let mut variables = HashMap::new();
    for param in params {
        let arg = args.next().unwrap_or_default();
        match param {
            Param::Ident(name) => {
                variables.insert(name.clone(), arg);
            }
            Param::Object(pairs) => {
                if arg.is_nullish() {
                    let first = pairs.first().map_or("", |(key, _)| key.as_str());
                    return Err(TemplateError::evaluation(format!(
                        "Cannot destructure property '{}' of '{}' as it is {}",
                        first,
                        arg.to_display_string(),
                        arg.to_display_string()
                    )));
                }
                for (key, local) in pairs {
                    variables.insert(local.clone(), get_property(&arg, key)?);
                }
            }
        }
    }
    Ok(variables)
}

/// `createElement(type, config, ...children)`
fn create_element(args: Vec<Value>) -> TemplateResult<Value> {
    let mut args = args.into_iter();
    let element_type = args.next().unwrap_or_default();
    let name = match &element_type {
        Value::Function(function) => function.name().to_string(),
        other => other.to_display_string(),
    };
    let element_type = ElementType::from_value(element_type, &name)?;
    let config = match args.next() {
        None | Some(Value::Undefined) | Some(Value::Null) => Props::new(),
        Some(Value::Object(config)) => config,
        Some(other) => {
            return Err(TemplateError::evaluation(format!(
                "createElement props must be an object, got {}",
                other.type_name()
            )));
        }
    };
    Ok(Value::Element(Arc::new(Element::new(
        element_type,
        config,
        args.collect(),
    ))))
}

fn spread_into(props: &mut Props, value: Value) {
    match value {
        Value::Object(map) => props.extend(map),
        Value::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                props.insert(i.to_string(), item);
            }
        }
        Value::String(s) => {
            for (i, c) in s.chars().enumerate() {
                props.insert(i.to_string(), Value::String(c.into()));
            }
        }
        _ => {}
    }
}

/// Read `target[key]`.
pub(crate) fn get_property(target: &Value, key: &str) -> TemplateResult<Value> {
    match target {
        Value::Undefined | Value::Null => Err(TemplateError::evaluation(format!(
            "Cannot read properties of {} (reading '{}')",
            target.to_display_string(),
            key
        ))),
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or_default()),
        Value::Array(items) => Ok(if key == "length" {
            Value::Number(items.len() as f64)
        } else {
            key.parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default()
        }),
        Value::String(s) => Ok(if key == "length" {
            Value::Number(s.encode_utf16().count() as f64)
        } else {
            key.parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.into()))
                .unwrap_or_default()
        }),
        Value::Element(element) => Ok(match key {
            "props" => Value::Object(element.props.clone()),
            "key" => element.key.clone().map_or(Value::Null, Value::String),
            "type" => match &element.element_type {
                ElementType::Tag(tag) => Value::String(tag.clone()),
                ElementType::Fragment => Value::Fragment,
                ElementType::Component { render, .. } => Value::Function(render.clone()),
                ElementType::Missing(_) => Value::Undefined,
            },
            _ => Value::Undefined,
        }),
        Value::Function(function) if key == "name" => Ok(Value::string(function.name())),
        _ => Ok(Value::Undefined),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    match op {
        BinaryOp::Add => add(&left, &right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(&right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(&right)),
        BinaryOp::LooseEq => Value::Bool(left.loose_equals(&right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_equals(&right)),
        BinaryOp::Lt => Value::Bool(compare(&left, &right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(&left, &right) == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::And => {
            if left.is_truthy() {
                right
            } else {
                left
            }
        }
        BinaryOp::Or => {
            if left.is_truthy() {
                left
            } else {
                right
            }
        }
        BinaryOp::Nullish => {
            if left.is_nullish() {
                right
            } else {
                left
            }
        }
    }
}

fn add(left: &Value, right: &Value) -> Value {
    let concatenates = |v: &Value| {
        !matches!(
            v,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
        )
    };
    if concatenates(left) || concatenates(right) {
        Value::String(left.to_display_string() + &right.to_display_string())
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn call_builtin(
    receiver: &Value,
    method: &str,
    args: Vec<Value>,
    depth: usize,
) -> TemplateResult<Value> {
    let result = match receiver {
        Value::Array(items) => array_method(items, method, &args, depth)?,
        Value::String(s) => string_method(s, method, &args)?,
        Value::Number(n) => number_method(*n, method, &args),
        _ => None,
    };
    result.ok_or_else(|| {
        TemplateError::evaluation(format!(
            "{}.{} is not a function",
            receiver.type_of(),
            method
        ))
    })
}

fn callback(args: &[Value]) -> TemplateResult<Arc<Function>> {
    match args.first() {
        Some(Value::Function(function)) => Ok(function.clone()),
        other => Err(TemplateError::evaluation(format!(
            "{} is not a function",
            other.map_or_else(|| "undefined".to_string(), Value::to_display_string)
        ))),
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

/// Resolve a possibly negative `slice` argument against `len`.
fn relative_index(arg: Option<&Value>, len: usize, default: usize) -> usize {
    match arg {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = value.to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let len = len as f64;
            let index = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
            index as usize
        }
    }
}

fn array_method(
    items: &[Value],
    method: &str,
    args: &[Value],
    depth: usize,
) -> TemplateResult<Option<Value>> {
    let index = |i: usize| Value::Number(i as f64);
    let value = match method {
        "map" => {
            let f = callback(args)?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(call_function(&f, vec![item.clone(), index(i)], depth)?);
            }
            Value::Array(out)
        }
        "filter" => {
            let f = callback(args)?;
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if call_function(&f, vec![item.clone(), index(i)], depth)?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Value::Array(out)
        }
        "find" => {
            let f = callback(args)?;
            let mut found = Value::Undefined;
            for (i, item) in items.iter().enumerate() {
                if call_function(&f, vec![item.clone(), index(i)], depth)?.is_truthy() {
                    found = item.clone();
                    break;
                }
            }
            found
        }
        "some" | "every" => {
            let f = callback(args)?;
            let every = method == "every";
            let mut result = every;
            for (i, item) in items.iter().enumerate() {
                if call_function(&f, vec![item.clone(), index(i)], depth)?.is_truthy() != every {
                    result = !every;
                    break;
                }
            }
            Value::Bool(result)
        }
        "join" => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(value) => value.to_display_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect();
            Value::String(parts.join(&separator))
        }
        "slice" => {
            let start = relative_index(args.first(), items.len(), 0);
            let end = relative_index(args.get(1), items.len(), items.len()).max(start);
            Value::Array(items[start..end].to_vec())
        }
        "concat" => {
            let mut out = items.to_vec();
            for arg in args {
                match arg {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "includes" => {
            let needle = args.first().cloned().unwrap_or_default();
            Value::Bool(items.iter().any(|v| same_value_zero(v, &needle)))
        }
        "indexOf" => {
            let needle = args.first().cloned().unwrap_or_default();
            Value::Number(
                items
                    .iter()
                    .position(|v| v.strict_equals(&needle))
                    .map_or(-1.0, |i| i as f64),
            )
        }
        "reverse" => Value::Array(items.iter().rev().cloned().collect()),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn string_method(s: &str, method: &str, args: &[Value]) -> TemplateResult<Option<Value>> {
    let arg = |i: usize| {
        args.get(i)
            .map(Value::to_display_string)
            .unwrap_or_else(|| "undefined".to_string())
    };
    let value = match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "trimStart" => Value::string(s.trim_start()),
        "trimEnd" => Value::string(s.trim_end()),
        "includes" => Value::Bool(s.contains(&arg(0))),
        "startsWith" => Value::Bool(s.starts_with(&arg(0))),
        "endsWith" => Value::Bool(s.ends_with(&arg(0))),
        "indexOf" => {
            let needle = arg(0);
            Value::Number(
                s.find(&needle)
                    .map_or(-1.0, |byte| s[..byte].chars().count() as f64),
            )
        }
        "split" => match args.first() {
            None | Some(Value::Undefined) => Value::Array(vec![Value::string(s)]),
            Some(separator) => {
                let separator = separator.to_display_string();
                if separator.is_empty() {
                    Value::Array(s.chars().map(|c| Value::String(c.into())).collect())
                } else {
                    Value::Array(s.split(separator.as_str()).map(Value::string).collect())
                }
            }
        },
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let start = relative_index(args.first(), chars.len(), 0);
            let end = relative_index(args.get(1), chars.len(), chars.len()).max(start);
            Value::String(chars[start..end].iter().collect())
        }
        "replace" => Value::String(s.replacen(&arg(0), &arg(1), 1)),
        "replaceAll" => Value::String(s.replace(&arg(0), &arg(1))),
        "repeat" => Value::String(repeat(s, args.first())?),
        "toString" => Value::string(s),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// `String.prototype.repeat`, refusing counts that cannot produce a string.
fn repeat(s: &str, count: Option<&Value>) -> TemplateResult<String> {
    let count = count.map_or(0.0, Value::to_number);
    let count = if count.is_nan() { 0.0 } else { count.trunc() };
    if count < 0.0 || count.is_infinite() {
        return Err(TemplateError::evaluation(format!(
            "Invalid count value: {}",
            format_number(count)
        )));
    }
    match s.len().checked_mul(count as usize) {
        Some(len) if len <= MAX_STRING_LENGTH => Ok(s.repeat(count as usize)),
        _ => Err(TemplateError::evaluation("Invalid string length")),
    }
}

fn number_method(n: f64, method: &str, args: &[Value]) -> Option<Value> {
    match method {
        "toFixed" => {
            let digits = args.first().map_or(0.0, Value::to_number);
            let digits = if digits.is_finite() {
                digits.clamp(0.0, 100.0) as usize
            } else {
                0
            };
            Some(Value::String(format!("{:.*}", digits, n)))
        }
        "toString" => Some(Value::String(crate::value::format_number(n))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::{MemoryGlobals, NullGlobals};
    use crate::parser::transform;
    use pretty_assertions::assert_eq;

    fn eval_with(source: &str, globals: MemoryGlobals) -> TemplateResult<Value> {
        let transformed = transform(source)?;
        Sandbox::new(Arc::new(globals)).run(&Program::page(transformed.into_expr()))
    }

    fn eval(source: &str) -> Value {
        eval_with(source, MemoryGlobals::new()).unwrap()
    }

    fn strings(items: &[&str]) -> Value {
        Value::Array(items.iter().map(|s| Value::string(*s)).collect())
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("'a' + 1"), Value::string("a1"));
        assert_eq!(eval("1 + '2'"), Value::string("12"));
        assert_eq!(eval("7 % 4"), Value::Number(3.0));
        assert_eq!(eval("`n=${1 + 1}!`"), Value::string("n=2!"));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(eval("0 || 'fallback'"), Value::string("fallback"));
        assert_eq!(eval("'' && missing.prop"), Value::string(""));
        assert_eq!(eval("null ?? 'x'"), Value::string("x"));
        assert_eq!(eval("0 ?? 'x'"), Value::Number(0.0));
        assert_eq!(eval("!undefined"), Value::Bool(true));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("'1' == 1"), Value::Bool(true));
        assert_eq!(eval("'1' === 1"), Value::Bool(false));
        assert_eq!(eval("'b' > 'a'"), Value::Bool(true));
        assert_eq!(eval("2 <= 2"), Value::Bool(true));
        assert_eq!(eval("typeof 'x'"), Value::string("string"));
    }

    #[test]
    fn test_array_builtins() {
        let globals = MemoryGlobals::with_bindings([(
            "items",
            strings(&["a", "b", "c"]),
        )]);
        assert_eq!(
            eval_with("items.map((x, i) => x + i)", globals.clone()).unwrap(),
            strings(&["a0", "b1", "c2"])
        );
        assert_eq!(
            eval_with("items.filter(x => x !== 'b').join('-')", globals.clone()).unwrap(),
            Value::string("a-c")
        );
        assert_eq!(
            eval_with("items.slice(-2)", globals.clone()).unwrap(),
            strings(&["b", "c"])
        );
        assert_eq!(
            eval_with("items.length", globals.clone()).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            eval_with("items.includes('c')", globals).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval("[1, ...[2, 3]].concat([4], 5)").to_display_string(), "1,2,3,4,5");
    }

    #[test]
    fn test_string_and_number_builtins() {
        assert_eq!(eval("' Hi '.trim().toUpperCase()"), Value::string("HI"));
        assert_eq!(eval("'a,b'.split(',')"), strings(&["a", "b"]));
        assert_eq!(eval("'hello'.slice(1, -1)"), Value::string("ell"));
        assert_eq!(eval("(3.14159).toFixed(2)"), Value::string("3.14"));
        assert_eq!(eval("'abc'.length"), Value::Number(3.0));
    }

    #[test]
    fn test_repeat_bounds() {
        assert_eq!(eval("'ab'.repeat(3)"), Value::string("ababab"));
        assert_eq!(eval("'ab'.repeat(NaN)"), Value::string(""));
        assert_eq!(eval("''.repeat(1e19)"), Value::string(""));

        let err = eval_with("'ab'.repeat(1e19)", MemoryGlobals::new()).unwrap_err();
        assert_eq!(err, TemplateError::evaluation("Invalid string length"));
        let err = eval_with("'ab'.repeat(-1)", MemoryGlobals::new()).unwrap_err();
        assert_eq!(err, TemplateError::evaluation("Invalid count value: -1"));
        assert!(eval_with("'ab'.repeat(Infinity)", MemoryGlobals::new()).is_err());
    }

    #[test]
    fn test_number_globals_are_not_overridable() {
        let globals = MemoryGlobals::with_bindings([
            ("NaN", Value::string("shadow")),
            ("Infinity", Value::string("shadow")),
        ]);
        assert!(matches!(
            eval_with("NaN", globals.clone()).unwrap(),
            Value::Number(n) if n.is_nan()
        ));
        assert_eq!(
            eval_with("Infinity", globals).unwrap(),
            Value::Number(f64::INFINITY)
        );
    }

    #[test]
    fn test_closures_capture_scope() {
        let value = eval("((a) => (b) => a + b)(1)(2)");
        assert_eq!(value, Value::Number(3.0));
    }

    #[test]
    fn test_destructuring_params() {
        let value = eval("(({ title, n: count }) => title + count)({ title: 'x', n: 2 })");
        assert_eq!(value, Value::string("x2"));
    }

    #[test]
    fn test_optional_chaining() {
        assert_eq!(eval("undefined?.a"), Value::Undefined);
        assert_eq!(eval("null?.a()"), Value::Undefined);
        assert_eq!(eval("({ a: { b: 1 } })?.a.b"), Value::Number(1.0));
    }

    #[test]
    fn test_reading_property_of_undefined_is_an_error() {
        let err = eval_with("missing.prop", MemoryGlobals::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Evaluation {
                message: "Cannot read properties of undefined (reading 'prop')".to_string()
            }
        );
    }

    #[test]
    fn test_calling_non_function_is_an_error() {
        let err = eval_with("({ a: 1 }).a()", MemoryGlobals::new()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Evaluation { message } if message.ends_with("is not a function")
        ));
    }

    #[test]
    fn test_element_construction() {
        let Value::Element(element) = eval(r#"<a href="/" key="k">Home</a>"#) else {
            panic!("expected an element");
        };
        assert!(matches!(&element.element_type, ElementType::Tag(tag) if tag == "a"));
        assert_eq!(element.key.as_deref(), Some("k"));
        assert_eq!(element.props.get("href"), Some(&Value::string("/")));
        assert_eq!(element.children(), Some(&Value::string("Home")));
    }

    #[test]
    fn test_explicit_create_element() {
        let Value::Element(element) =
            eval(r#"React.createElement("p", { id: "x" }, "a", "b")"#)
        else {
            panic!("expected an element");
        };
        assert!(matches!(&element.element_type, ElementType::Tag(tag) if tag == "p"));
        assert_eq!(element.children(), Some(&strings(&["a", "b"])));
    }

    #[test]
    fn test_unknown_component_is_missing() {
        let transformed = transform("<Nav />").unwrap();
        let value = Sandbox::new(Arc::new(NullGlobals))
            .run(&Program::page(transformed.into_expr()))
            .unwrap();
        let Value::Element(element) = value else {
            panic!("expected an element");
        };
        assert!(matches!(&element.element_type, ElementType::Missing(name) if name == "Nav"));
    }

    #[test]
    fn test_component_program_yields_function() {
        let transformed = transform("<div>{props.text}</div>").unwrap();
        let value = Sandbox::new(Arc::new(NullGlobals))
            .run(&Program::component("Card", transformed.into_expr()))
            .unwrap();
        let Value::Function(card) = value else {
            panic!("expected a function");
        };

        let mut props = Props::new();
        props.insert("text".to_string(), Value::string("hi"));
        let Value::Element(element) = call_function(&card, vec![Value::Object(props)], 0).unwrap()
        else {
            panic!("expected an element");
        };
        assert_eq!(element.children(), Some(&Value::string("hi")));
    }

    #[test]
    fn test_call_depth_is_limited() {
        // Deep recursion needs more than the default test thread stack.
        let err = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let transformed = transform("(f => f(f))(f => f(f))").unwrap();
                Sandbox::new(Arc::new(NullGlobals))
                    .run(&Program::page(transformed.into_expr()))
                    .unwrap_err()
            })
            .unwrap()
            .join()
            .unwrap();
        assert!(matches!(
            err,
            TemplateError::Evaluation { message } if message.starts_with("Maximum call depth")
        ));
    }
}
