/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression tree for transformed templates.
//!
//! A template body is a single expression in which markup tags are
//! element constructors. The tree printed through [`std::fmt::Display`]
//! is the lowered form, where every element is written as a
//! `React.createElement(type, props, ...children)` call.

use crate::value::format_number;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter, Write};
use std::sync::Arc;

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),

    /// Template literal: `quasis[0] ${exprs[0]} quasis[1] ...`
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },

    Ident(String),

    Array(Vec<ListItem>),

    Object(Vec<ObjectProp>),

    Member {
        object: Box<Expr>,
        property: MemberProp,
        optional: bool,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<ListItem>,
        optional: bool,
    },

    Arrow(Arc<ArrowFunction>),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },

    /// A markup element; evaluates through the render primitive.
    Element(Box<JsxElement>),
}

/// An array element or call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Value(Expr),
    Spread(Expr),
}

/// An object literal entry. Shorthand `{ a }` is parsed as `a: a`.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProp {
    KeyValue(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Name(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFunction {
    pub params: Vec<Param>,
    pub body: Expr,
}

/// An arrow function parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Ident(String),
    /// `{ key, key: local }` destructuring; pairs are (key, local).
    Object(Vec<(String, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Nullish,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::LooseEq => "==",
            BinaryOp::LooseNe => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Nullish => "??",
        }
    }

    /// Binding power, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Nullish | BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::StrictEq | BinaryOp::StrictNe | BinaryOp::LooseEq | BinaryOp::LooseNe => 5,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 6,
            BinaryOp::Add | BinaryOp::Sub => 7,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 8,
        }
    }
}

/// A markup element `<name ...attributes>children</name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsxElement {
    pub name: JsxName,
    pub attributes: Vec<JsxAttribute>,
    /// Text children are already whitespace-cleaned string literals.
    pub children: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxName {
    /// Lowercase or hyphenated tag, passed to the primitive as a string.
    Intrinsic(String),
    /// Component reference, `Card` or `UI.Card`.
    Component(Vec<String>),
    /// `<>...</>`
    Fragment,
}

impl JsxName {
    /// The name as written in the source.
    pub fn source_name(&self) -> String {
        match self {
            JsxName::Intrinsic(tag) => tag.clone(),
            JsxName::Component(path) => path.join("."),
            JsxName::Fragment => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxAttribute {
    /// `name`, `name="text"` or `name={expr}`; a bare name is `true`.
    Named { name: String, value: Option<Expr> },
    Spread(Expr),
}

/// An assignment of an expression to a sandbox global, `target = value`.
///
/// Components are evaluated as `Name = (props) => (<expr>)` and pages as
/// `__result__ = <expr>`; the sandbox returns the assigned global.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub target: String,
    pub value: Expr,
}

/// The global a page program assigns its render tree to.
pub const PAGE_RESULT: &str = "__result__";

impl Program {
    pub fn new(target: impl Into<String>, value: Expr) -> Self {
        Self {
            target: target.into(),
            value,
        }
    }

    /// `name = (props) => (body)`
    pub fn component(name: impl Into<String>, body: Expr) -> Self {
        Self::new(
            name,
            Expr::Arrow(Arc::new(ArrowFunction {
                params: vec![Param::Ident("props".to_string())],
                body,
            })),
        )
    }

    /// `__result__ = body`
    pub fn page(body: Expr) -> Self {
        Self::new(PAGE_RESULT, body)
    }

    /// Identifiers the value reads without binding them, sorted.
    ///
    /// Component tags count as identifiers; for `<UI.Card>` only `UI` is
    /// free. The assignment target itself is not included.
    pub fn free_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.value.collect_free_names(&mut Vec::new(), &mut names);
        names
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.target, self.value)
    }
}

const PREC_CONDITIONAL: u8 = 2;
const PREC_UNARY: u8 = 9;
const PREC_POSTFIX: u8 = 10;
const PREC_PRIMARY: u8 = 11;

impl Expr {
    fn collect_free_names(&self, bound: &mut Vec<String>, names: &mut BTreeSet<String>) {
        match self {
            Expr::Undefined | Expr::Null | Expr::Bool(_) | Expr::Number(_) | Expr::String(_) => {}
            Expr::Ident(name) => {
                if !bound.contains(name) {
                    names.insert(name.clone());
                }
            }
            Expr::Template { exprs, .. } => {
                for expr in exprs {
                    expr.collect_free_names(bound, names);
                }
            }
            Expr::Array(items) => collect_list(items, bound, names),
            Expr::Call { callee, args, .. } => {
                callee.collect_free_names(bound, names);
                collect_list(args, bound, names);
            }
            Expr::Object(props) => {
                for prop in props {
                    match prop {
                        ObjectProp::KeyValue(_, expr) | ObjectProp::Spread(expr) => {
                            expr.collect_free_names(bound, names)
                        }
                    }
                }
            }
            Expr::Member {
                object, property, ..
            } => {
                object.collect_free_names(bound, names);
                if let MemberProp::Computed(expr) = property {
                    expr.collect_free_names(bound, names);
                }
            }
            Expr::Arrow(arrow) => {
                let outer = bound.len();
                for param in &arrow.params {
                    match param {
                        Param::Ident(name) => bound.push(name.clone()),
                        Param::Object(pairs) => {
                            bound.extend(pairs.iter().map(|(_, local)| local.clone()))
                        }
                    }
                }
                arrow.body.collect_free_names(bound, names);
                bound.truncate(outer);
            }
            Expr::Unary { operand, .. } => operand.collect_free_names(bound, names),
            Expr::Binary { left, right, .. } => {
                left.collect_free_names(bound, names);
                right.collect_free_names(bound, names);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.collect_free_names(bound, names);
                consequent.collect_free_names(bound, names);
                alternate.collect_free_names(bound, names);
            }
            Expr::Element(element) => {
                if let JsxName::Component(path) = &element.name
                    && let Some(head) = path.first()
                    && !bound.contains(head)
                {
                    names.insert(head.clone());
                }
                for attribute in &element.attributes {
                    match attribute {
                        JsxAttribute::Named {
                            value: Some(expr), ..
                        }
                        | JsxAttribute::Spread(expr) => expr.collect_free_names(bound, names),
                        JsxAttribute::Named { value: None, .. } => {}
                    }
                }
                for child in &element.children {
                    child.collect_free_names(bound, names);
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Arrow(_) => 1,
            Expr::Conditional { .. } => PREC_CONDITIONAL,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => PREC_UNARY,
            Expr::Member { .. } | Expr::Call { .. } | Expr::Element(_) => PREC_POSTFIX,
            // Negative literals print with a leading minus.
            Expr::Number(n) if n.is_sign_negative() => PREC_UNARY,
            _ => PREC_PRIMARY,
        }
    }

    fn fmt_operand(&self, f: &mut Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Undefined => f.write_str("undefined"),
            Expr::Null => f.write_str("null"),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Number(n) => f.write_str(&format_number(*n)),
            Expr::String(s) => write_quoted(f, s),
            Expr::Template { quasis, exprs } => {
                f.write_char('`')?;
                for (i, quasi) in quasis.iter().enumerate() {
                    for c in quasi.chars() {
                        match c {
                            '`' => f.write_str("\\`")?,
                            '\\' => f.write_str("\\\\")?,
                            '$' => f.write_str("\\$")?,
                            _ => f.write_char(c)?,
                        }
                    }
                    if let Some(expr) = exprs.get(i) {
                        write!(f, "${{{}}}", expr)?;
                    }
                }
                f.write_char('`')
            }
            Expr::Ident(name) => f.write_str(name),
            Expr::Array(items) => {
                f.write_char('[')?;
                write_list(f, items)?;
                f.write_char(']')
            }
            Expr::Object(props) => write_object(f, props),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                object.fmt_operand(f, PREC_POSTFIX)?;
                match (property, optional) {
                    (MemberProp::Name(name), false) => write!(f, ".{}", name),
                    (MemberProp::Name(name), true) => write!(f, "?.{}", name),
                    (MemberProp::Computed(expr), false) => write!(f, "[{}]", expr),
                    (MemberProp::Computed(expr), true) => write!(f, "?.[{}]", expr),
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                callee.fmt_operand(f, PREC_POSTFIX)?;
                if *optional {
                    f.write_str("?.")?;
                }
                f.write_char('(')?;
                write_list(f, args)?;
                f.write_char(')')
            }
            Expr::Arrow(arrow) => {
                f.write_char('(')?;
                for (i, param) in arrow.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match param {
                        Param::Ident(name) => f.write_str(name)?,
                        Param::Object(pairs) => {
                            f.write_str("{ ")?;
                            for (j, (key, local)) in pairs.iter().enumerate() {
                                if j > 0 {
                                    f.write_str(", ")?;
                                }
                                if key == local {
                                    f.write_str(key)?;
                                } else {
                                    write!(f, "{}: {}", key, local)?;
                                }
                            }
                            f.write_str(" }")?;
                        }
                    }
                }
                write!(f, ") => ({})", arrow.body)
            }
            Expr::Unary { op, operand } => {
                f.write_str(match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::TypeOf => "typeof ",
                })?;
                operand.fmt_operand(f, PREC_UNARY)
            }
            Expr::Binary { op, left, right } => {
                left.fmt_operand(f, op.precedence())?;
                write!(f, " {} ", op.as_str())?;
                right.fmt_operand(f, op.precedence() + 1)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.fmt_operand(f, PREC_CONDITIONAL + 1)?;
                f.write_str(" ? ")?;
                consequent.fmt_operand(f, PREC_CONDITIONAL)?;
                f.write_str(" : ")?;
                alternate.fmt_operand(f, PREC_CONDITIONAL)
            }
            Expr::Element(element) => write!(f, "{}", element),
        }
    }
}

impl Display for JsxElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("React.createElement(")?;
        match &self.name {
            JsxName::Intrinsic(tag) => write_quoted(f, tag)?,
            JsxName::Component(path) => f.write_str(&path.join("."))?,
            JsxName::Fragment => f.write_str("React.Fragment")?,
        }
        f.write_str(", ")?;
        if self.attributes.is_empty() {
            f.write_str("null")?;
        } else {
            let props: Vec<ObjectProp> = self
                .attributes
                .iter()
                .map(|attr| match attr {
                    JsxAttribute::Named { name, value } => ObjectProp::KeyValue(
                        name.clone(),
                        value.clone().unwrap_or(Expr::Bool(true)),
                    ),
                    JsxAttribute::Spread(expr) => ObjectProp::Spread(expr.clone()),
                })
                .collect();
            write_object(f, &props)?;
        }
        for child in &self.children {
            write!(f, ", {}", child)?;
        }
        f.write_char(')')
    }
}

fn collect_list(items: &[ListItem], bound: &mut Vec<String>, names: &mut BTreeSet<String>) {
    for item in items {
        match item {
            ListItem::Value(expr) | ListItem::Spread(expr) => expr.collect_free_names(bound, names),
        }
    }
}

fn write_list(f: &mut Formatter<'_>, items: &[ListItem]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match item {
            ListItem::Value(expr) => write!(f, "{}", expr)?,
            ListItem::Spread(expr) => write!(f, "...{}", expr)?,
        }
    }
    Ok(())
}

fn write_object(f: &mut Formatter<'_>, props: &[ObjectProp]) -> fmt::Result {
    if props.is_empty() {
        return f.write_str("{}");
    }
    f.write_str("{ ")?;
    for (i, prop) in props.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match prop {
            ObjectProp::KeyValue(key, value) => {
                if is_identifier(key) {
                    f.write_str(key)?;
                } else {
                    write_quoted(f, key)?;
                }
                write!(f, ": {}", value)?;
            }
            ObjectProp::Spread(expr) => write!(f, "...{}", expr)?,
        }
    }
    f.write_str(" }")
}

fn write_quoted(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Whether `s` can be written as a bare identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    #[test]
    fn test_binary_parenthesization() {
        let expr = Expr::Binary {
            op: BinaryOp::Mul,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(ident("a")),
                right: Box::new(ident("b")),
            }),
            right: Box::new(ident("c")),
        };
        assert_eq!(expr.to_string(), "(a + b) * c");
    }

    #[test]
    fn test_right_associated_subtraction_keeps_parens() {
        let expr = Expr::Binary {
            op: BinaryOp::Sub,
            left: Box::new(ident("a")),
            right: Box::new(Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(ident("b")),
                right: Box::new(ident("c")),
            }),
        };
        assert_eq!(expr.to_string(), "a - (b - c)");
    }

    #[test]
    fn test_element_lowering() {
        let element = JsxElement {
            name: JsxName::Intrinsic("a".to_string()),
            attributes: vec![
                JsxAttribute::Named {
                    name: "href".to_string(),
                    value: Some(Expr::String("/".to_string())),
                },
                JsxAttribute::Named {
                    name: "data-x".to_string(),
                    value: None,
                },
            ],
            children: vec![Expr::String("Home".to_string())],
        };
        assert_eq!(
            element.to_string(),
            r#"React.createElement("a", { href: "/", "data-x": true }, "Home")"#
        );
    }

    #[test]
    fn test_program_display() {
        let program = Program::component(
            "Card",
            Expr::Member {
                object: Box::new(ident("props")),
                property: MemberProp::Name("text".to_string()),
                optional: false,
            },
        );
        assert_eq!(program.to_string(), "Card = (props) => (props.text)");
        assert_eq!(
            Program::page(Expr::Null).to_string(),
            "__result__ = null"
        );
    }

    #[test]
    fn test_free_names_skip_bound_parameters() {
        let body = Expr::Element(Box::new(JsxElement {
            name: JsxName::Component(vec!["UI".to_string(), "Card".to_string()]),
            attributes: vec![JsxAttribute::Named {
                name: "items".to_string(),
                value: Some(Expr::Call {
                    callee: Box::new(Expr::Member {
                        object: Box::new(ident("links")),
                        property: MemberProp::Name("map".to_string()),
                        optional: false,
                    }),
                    args: vec![ListItem::Value(Expr::Arrow(Arc::new(ArrowFunction {
                        params: vec![Param::Object(vec![(
                            "href".to_string(),
                            "to".to_string(),
                        )])],
                        body: Expr::Binary {
                            op: BinaryOp::Add,
                            left: Box::new(ident("to")),
                            right: Box::new(ident("props")),
                        },
                    })))],
                    optional: false,
                }),
            }],
            children: vec![Expr::Element(Box::new(JsxElement {
                name: JsxName::Component(vec!["Footer".to_string()]),
                attributes: Vec::new(),
                children: Vec::new(),
            }))],
        }));

        let names: Vec<String> = Program::component("Nav", body).free_names().into_iter().collect();
        assert_eq!(names, vec!["Footer", "UI", "links"]);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("className"));
        assert!(is_identifier("$x_1"));
        assert!(!is_identifier("data-x"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier(""));
    }
}
