/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template transformer.
//!
//! The body of a template file is a single JSX expression. It is parsed
//! with `oxc_parser` and lowered into an [`Expr`] tree. Markup text
//! follows the usual JSX whitespace rules and character references are
//! decoded here, so the evaluator only ever sees string literals.
//!
//! Only the expression subset the evaluator understands is accepted;
//! anything else (`new`, `this`, assignments, block-bodied arrows, ...)
//! is a transform error pointing at the offending code.

use crate::ast::{
    ArrowFunction, BinaryOp, Expr, JsxAttribute, JsxElement, JsxName, ListItem, MemberProp,
    ObjectProp, Param, UnaryOp,
};
use crate::entities::decode_entities;
use crate::error::{TemplateError, TemplateResult};
use crate::value::format_number;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, ArrayExpressionElement, ArrowFunctionExpression, BindingPattern, CallExpression,
    ChainElement, ComputedMemberExpression, Expression, JSXAttributeItem, JSXAttributeName,
    JSXAttributeValue, JSXChild, JSXElement, JSXElementName, JSXMemberExpression,
    JSXMemberExpressionObject, ObjectPropertyKind, PropertyKey, PropertyKind, Statement,
    StaticMemberExpression,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Deepest nesting of brackets and tags a template may use.
pub const MAX_NESTING_DEPTH: usize = 128;

/// The transformed form of one template file.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    expr: Expr,
}

impl Transformed {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }
}

/// Prints the lowered expression code.
impl Display for Transformed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// Transform template text into a single expression.
///
/// A trailing `;` is accepted and dropped so the result composes as a
/// sub-expression. Anything else after the expression is an error.
pub fn transform(source: &str) -> TemplateResult<Transformed> {
    if is_blank(source) {
        return Err(error_at(source, 0, "Template is empty"));
    }
    check_nesting(source)?;

    let trimmed = source.trim_end();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);

    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_jsx(true);
    let parsed = Parser::new(&allocator, body, source_type)
        .parse_expression()
        .map_err(|errors| match errors.first() {
            Some(error) => {
                let offset = error
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.first())
                    .map_or(0, |label| label.offset());
                error_at(source, offset, error.message.to_string())
            }
            None => error_at(source, 0, "Invalid template"),
        })?;

    let mut lowering = Lowering { source, depth: 0 };
    let expr = lowering.expr(&parsed)?;
    Ok(Transformed { expr })
}

/// Whether `source` holds nothing but whitespace and comments.
fn is_blank(source: &str) -> bool {
    let mut rest = source.trim_start();
    loop {
        if let Some(comment) = rest.strip_prefix("//") {
            rest = comment.find('\n').map_or("", |i| &comment[i..]).trim_start();
        } else if let Some(comment) = rest.strip_prefix("/*") {
            match comment.find("*/") {
                Some(i) => rest = comment[i + 2..].trim_start(),
                None => return false,
            }
        } else {
            return rest.is_empty();
        }
    }
}

/// Reject templates nested deeper than [`MAX_NESTING_DEPTH`] before they
/// reach the recursive parser.
///
/// The count is conservative: brackets and tags are tracked without
/// regard to strings or comments.
fn check_nesting(source: &str) -> TemplateResult<()> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    for (i, &byte) in bytes.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + 1).copied();
        match byte {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'<' if next == Some(b'/') => depth = depth.saturating_sub(1),
            b'<' if next.is_some_and(|c| c.is_ascii_alphabetic() || c == b'>') => depth += 1,
            b'/' if next == Some(b'>') && prev != Some(b'<') => {
                depth = depth.saturating_sub(1)
            }
            _ => {}
        }
        if depth > MAX_NESTING_DEPTH {
            return Err(error_at(source, i, "Template nesting is too deep"));
        }
    }
    Ok(())
}

fn error_at(source: &str, offset: usize, message: impl Into<String>) -> TemplateError {
    let (line, column) = line_col(source, offset);
    TemplateError::Transform {
        message: message.into(),
        line,
        column,
    }
}

/// Lowers an oxc expression tree into [`Expr`].
struct Lowering<'s> {
    source: &'s str,
    depth: usize,
}

impl Lowering<'_> {
    fn error(&self, span: Span, message: impl Into<String>) -> TemplateError {
        error_at(self.source, span.start as usize, message)
    }

    fn unsupported(&self, span: Span) -> TemplateError {
        let text = self.text(span);
        let line = text.lines().next().unwrap_or_default();
        let snippet = match line.char_indices().nth(40) {
            Some((i, _)) => &line[..i],
            None => line,
        };
        self.error(span, format!("Unsupported syntax `{}`", snippet))
    }

    fn text(&self, span: Span) -> &str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
    }

    fn nested<T>(
        &mut self,
        span: Span,
        lower: impl FnOnce(&mut Self) -> TemplateResult<T>,
    ) -> TemplateResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(span, "Template nesting is too deep"));
        }
        self.depth += 1;
        let result = lower(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self, expr: &Expression<'_>) -> TemplateResult<Expr> {
        self.nested(expr.span(), |this| this.lower_expr(expr))
    }

    fn lower_expr(&mut self, expr: &Expression<'_>) -> TemplateResult<Expr> {
        Ok(match expr {
            Expression::BooleanLiteral(b) => Expr::Bool(b.value),
            Expression::NullLiteral(_) => Expr::Null,
            Expression::NumericLiteral(n) => Expr::Number(n.value),
            Expression::StringLiteral(s) => Expr::String(s.value.to_string()),
            Expression::TemplateLiteral(template) => {
                let quasis = template
                    .quasis
                    .iter()
                    .map(|quasi| match &quasi.value.cooked {
                        Some(cooked) => cooked.to_string(),
                        None => quasi.value.raw.to_string(),
                    })
                    .collect();
                let exprs = template
                    .expressions
                    .iter()
                    .map(|e| self.expr(e))
                    .collect::<TemplateResult<_>>()?;
                Expr::Template { quasis, exprs }
            }
            Expression::Identifier(ident) => match ident.name.as_str() {
                "undefined" => Expr::Undefined,
                name => Expr::Ident(name.to_string()),
            },
            Expression::ArrayExpression(array) => {
                let mut items = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    items.push(match element {
                        ArrayExpressionElement::SpreadElement(spread) => {
                            ListItem::Spread(self.expr(&spread.argument)?)
                        }
                        ArrayExpressionElement::Elision(hole) => {
                            return Err(self.error(hole.span, "Array holes are not supported"));
                        }
                        other => match other.as_expression() {
                            Some(e) => ListItem::Value(self.expr(e)?),
                            None => return Err(self.unsupported(array.span)),
                        },
                    });
                }
                Expr::Array(items)
            }
            Expression::ObjectExpression(object) => {
                let mut props = Vec::with_capacity(object.properties.len());
                for property in &object.properties {
                    props.push(match property {
                        ObjectPropertyKind::ObjectProperty(p) => {
                            if !matches!(p.kind, PropertyKind::Init) || p.method || p.computed {
                                return Err(self.unsupported(p.span));
                            }
                            let key = self.property_key(&p.key, p.span)?;
                            ObjectProp::KeyValue(key, self.expr(&p.value)?)
                        }
                        ObjectPropertyKind::SpreadProperty(spread) => {
                            ObjectProp::Spread(self.expr(&spread.argument)?)
                        }
                    });
                }
                Expr::Object(props)
            }
            Expression::StaticMemberExpression(member) => self.static_member(member)?,
            Expression::ComputedMemberExpression(member) => self.computed_member(member)?,
            Expression::CallExpression(call) => self.call(call)?,
            Expression::ChainExpression(chain) => match &chain.expression {
                ChainElement::CallExpression(call) => self.call(call)?,
                ChainElement::StaticMemberExpression(member) => self.static_member(member)?,
                ChainElement::ComputedMemberExpression(member) => self.computed_member(member)?,
                _ => return Err(self.unsupported(chain.span)),
            },
            Expression::ArrowFunctionExpression(arrow) => self.arrow(arrow)?,
            Expression::UnaryExpression(unary) => {
                let op = match unary.operator {
                    UnaryOperator::LogicalNot => UnaryOp::Not,
                    UnaryOperator::UnaryNegation => UnaryOp::Neg,
                    UnaryOperator::UnaryPlus => UnaryOp::Plus,
                    UnaryOperator::Typeof => UnaryOp::TypeOf,
                    _ => return Err(self.unsupported(unary.span)),
                };
                match (op, self.expr(&unary.argument)?) {
                    (UnaryOp::Neg, Expr::Number(n)) => Expr::Number(-n),
                    (op, operand) => Expr::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                }
            }
            Expression::BinaryExpression(binary) => {
                let op = match binary.operator {
                    BinaryOperator::Addition => BinaryOp::Add,
                    BinaryOperator::Subtraction => BinaryOp::Sub,
                    BinaryOperator::Multiplication => BinaryOp::Mul,
                    BinaryOperator::Division => BinaryOp::Div,
                    BinaryOperator::Remainder => BinaryOp::Rem,
                    BinaryOperator::StrictEquality => BinaryOp::StrictEq,
                    BinaryOperator::StrictInequality => BinaryOp::StrictNe,
                    BinaryOperator::Equality => BinaryOp::LooseEq,
                    BinaryOperator::Inequality => BinaryOp::LooseNe,
                    BinaryOperator::LessThan => BinaryOp::Lt,
                    BinaryOperator::GreaterThan => BinaryOp::Gt,
                    BinaryOperator::LessEqualThan => BinaryOp::Le,
                    BinaryOperator::GreaterEqualThan => BinaryOp::Ge,
                    _ => return Err(self.unsupported(binary.span)),
                };
                Expr::Binary {
                    op,
                    left: Box::new(self.expr(&binary.left)?),
                    right: Box::new(self.expr(&binary.right)?),
                }
            }
            Expression::LogicalExpression(logical) => Expr::Binary {
                op: match logical.operator {
                    LogicalOperator::And => BinaryOp::And,
                    LogicalOperator::Or => BinaryOp::Or,
                    LogicalOperator::Coalesce => BinaryOp::Nullish,
                },
                left: Box::new(self.expr(&logical.left)?),
                right: Box::new(self.expr(&logical.right)?),
            },
            Expression::ConditionalExpression(conditional) => Expr::Conditional {
                test: Box::new(self.expr(&conditional.test)?),
                consequent: Box::new(self.expr(&conditional.consequent)?),
                alternate: Box::new(self.expr(&conditional.alternate)?),
            },
            Expression::ParenthesizedExpression(paren) => self.expr(&paren.expression)?,
            Expression::JSXElement(element) => Expr::Element(Box::new(self.element(element)?)),
            Expression::JSXFragment(fragment) => Expr::Element(Box::new(JsxElement {
                name: JsxName::Fragment,
                attributes: Vec::new(),
                children: self.children(&fragment.children)?,
            })),
            other => return Err(self.unsupported(other.span())),
        })
    }

    fn property_key(&self, key: &PropertyKey<'_>, span: Span) -> TemplateResult<String> {
        match key {
            PropertyKey::StaticIdentifier(ident) => Ok(ident.name.to_string()),
            PropertyKey::StringLiteral(s) => Ok(s.value.to_string()),
            PropertyKey::NumericLiteral(n) => Ok(format_number(n.value)),
            _ => Err(self.unsupported(span)),
        }
    }

    fn static_member(&mut self, member: &StaticMemberExpression<'_>) -> TemplateResult<Expr> {
        Ok(Expr::Member {
            object: Box::new(self.expr(&member.object)?),
            property: MemberProp::Name(member.property.name.to_string()),
            optional: member.optional,
        })
    }

    fn computed_member(&mut self, member: &ComputedMemberExpression<'_>) -> TemplateResult<Expr> {
        Ok(Expr::Member {
            object: Box::new(self.expr(&member.object)?),
            property: MemberProp::Computed(Box::new(self.expr(&member.expression)?)),
            optional: member.optional,
        })
    }

    fn call(&mut self, call: &CallExpression<'_>) -> TemplateResult<Expr> {
        let callee = self.expr(&call.callee)?;
        let mut args = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            args.push(match argument {
                Argument::SpreadElement(spread) => ListItem::Spread(self.expr(&spread.argument)?),
                other => match other.as_expression() {
                    Some(e) => ListItem::Value(self.expr(e)?),
                    None => return Err(self.unsupported(call.span)),
                },
            });
        }
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            optional: call.optional,
        })
    }

    fn arrow(&mut self, arrow: &ArrowFunctionExpression<'_>) -> TemplateResult<Expr> {
        if arrow.r#async || arrow.params.rest.is_some() {
            return Err(self.unsupported(arrow.span));
        }

        let mut params = Vec::with_capacity(arrow.params.items.len());
        for param in &arrow.params.items {
            params.push(match &param.pattern {
                BindingPattern::BindingIdentifier(ident) => Param::Ident(ident.name.to_string()),
                BindingPattern::ObjectPattern(pattern) if pattern.rest.is_none() => {
                    let mut pairs = Vec::with_capacity(pattern.properties.len());
                    for property in &pattern.properties {
                        let BindingPattern::BindingIdentifier(local) = &property.value else {
                            return Err(self.unsupported(property.span));
                        };
                        if property.computed {
                            return Err(self.unsupported(property.span));
                        }
                        let key = self.property_key(&property.key, property.span)?;
                        pairs.push((key, local.name.to_string()));
                    }
                    Param::Object(pairs)
                }
                _ => return Err(self.unsupported(param.span)),
            });
        }

        let body = match arrow.body.statements.first() {
            Some(Statement::ExpressionStatement(statement)) if arrow.expression => {
                self.expr(&statement.expression)?
            }
            _ => {
                return Err(self.error(
                    arrow.body.span,
                    "Arrow function bodies must be expressions; wrap object literals in parentheses",
                ));
            }
        };
        Ok(Expr::Arrow(Arc::new(ArrowFunction { params, body })))
    }

    fn element(&mut self, element: &JSXElement<'_>) -> TemplateResult<JsxElement> {
        self.nested(element.span, |this| this.lower_element(element))
    }

    fn lower_element(&mut self, element: &JSXElement<'_>) -> TemplateResult<JsxElement> {
        let opening = &element.opening_element;
        let name = self.element_name(&opening.name)?;

        let mut attributes = Vec::with_capacity(opening.attributes.len());
        for item in &opening.attributes {
            attributes.push(match item {
                JSXAttributeItem::Attribute(attribute) => {
                    let name = match &attribute.name {
                        JSXAttributeName::Identifier(ident) => ident.name.to_string(),
                        JSXAttributeName::NamespacedName(ns) => {
                            format!("{}:{}", ns.namespace.name, ns.name.name)
                        }
                    };
                    let value = match &attribute.value {
                        None => None,
                        // Attribute strings take no backslash escapes, only references.
                        Some(JSXAttributeValue::StringLiteral(s)) => {
                            let quoted = self.text(s.span);
                            let inner = quoted.get(1..quoted.len().saturating_sub(1));
                            Some(Expr::String(decode_entities(inner.unwrap_or_default())))
                        }
                        Some(JSXAttributeValue::ExpressionContainer(container)) => {
                            match container.expression.as_expression() {
                                Some(e) => Some(self.expr(e)?),
                                None => {
                                    return Err(self.error(
                                        container.span,
                                        "JSX attributes must only be assigned a non-empty expression",
                                    ));
                                }
                            }
                        }
                        Some(JSXAttributeValue::Element(nested)) => {
                            Some(Expr::Element(Box::new(self.element(nested)?)))
                        }
                        Some(JSXAttributeValue::Fragment(fragment)) => {
                            Some(Expr::Element(Box::new(JsxElement {
                                name: JsxName::Fragment,
                                attributes: Vec::new(),
                                children: self.children(&fragment.children)?,
                            })))
                        }
                    };
                    JsxAttribute::Named { name, value }
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    JsxAttribute::Spread(self.expr(&spread.argument)?)
                }
            });
        }

        Ok(JsxElement {
            name,
            attributes,
            children: self.children(&element.children)?,
        })
    }

    fn element_name(&self, name: &JSXElementName<'_>) -> TemplateResult<JsxName> {
        let tag = match name {
            JSXElementName::Identifier(ident) => ident.name.to_string(),
            JSXElementName::IdentifierReference(ident) => ident.name.to_string(),
            JSXElementName::NamespacedName(ns) => {
                return Ok(JsxName::Intrinsic(format!(
                    "{}:{}",
                    ns.namespace.name, ns.name.name
                )));
            }
            JSXElementName::MemberExpression(member) => {
                return Ok(JsxName::Component(self.member_path(member)?));
            }
            JSXElementName::ThisExpression(this) => return Err(self.unsupported(this.span)),
        };
        if tag.starts_with(|c: char| c.is_ascii_lowercase()) || tag.contains('-') {
            Ok(JsxName::Intrinsic(tag))
        } else {
            Ok(JsxName::Component(vec![tag]))
        }
    }

    fn member_path(&self, member: &JSXMemberExpression<'_>) -> TemplateResult<Vec<String>> {
        let mut path = match &member.object {
            JSXMemberExpressionObject::IdentifierReference(ident) => vec![ident.name.to_string()],
            JSXMemberExpressionObject::MemberExpression(inner) => self.member_path(inner)?,
            _ => return Err(self.unsupported(member.span)),
        };
        path.push(member.property.name.to_string());
        Ok(path)
    }

    fn children(&mut self, children: &[JSXChild<'_>]) -> TemplateResult<Vec<Expr>> {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            match child {
                JSXChild::Text(text) => {
                    let text = clean_jsx_text(&decode_entities(self.text(text.span)));
                    if !text.is_empty() {
                        out.push(Expr::String(text));
                    }
                }
                JSXChild::Element(element) => {
                    out.push(Expr::Element(Box::new(self.element(element)?)));
                }
                JSXChild::Fragment(fragment) => {
                    let children = self.children(&fragment.children)?;
                    out.push(Expr::Element(Box::new(JsxElement {
                        name: JsxName::Fragment,
                        attributes: Vec::new(),
                        children,
                    })));
                }
                // `{}` and `{/* comment */}` hold no expression.
                JSXChild::ExpressionContainer(container) => {
                    if let Some(e) = container.expression.as_expression() {
                        out.push(self.expr(e)?);
                    }
                }
                JSXChild::Spread(spread) => {
                    return Err(self.error(spread.span, "Spread children are not supported"));
                }
            }
        }
        Ok(out)
    }
}

/// Collapse markup text the way JSX does: lines are trimmed where they
/// meet a line break, blank lines vanish and the rest join with one space.
fn clean_jsx_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t'))
        .unwrap_or(0);

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut trimmed = line.replace('\t', " ");
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ').to_string();
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ').to_string();
        }
        if !trimmed.is_empty() {
            if i != last_non_empty {
                trimmed.push(' ');
            }
            out.push_str(&trimmed);
        }
    }
    out
}

fn line_col(src: &str, pos: usize) -> (usize, usize) {
    let mut pos = pos.min(src.len());
    while !src.is_char_boundary(pos) {
        pos -= 1;
    }
    let before = &src[..pos];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, before[line_start..].chars().count() + 1)
}
