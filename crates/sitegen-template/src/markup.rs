/*
 * markup.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Static markup serialization of render trees.
//!
//! Output matches what a React static renderer produces for the same
//! tree: attribute names are mapped to their HTML spelling, event
//! handlers are dropped, void elements self-close, and text and attribute
//! values are escaped. Components are invoked with their props as the
//! tree is walked.

use crate::error::{TemplateError, TemplateResult};
use crate::evaluator::call_function;
use crate::value::{Element, ElementType, Props, Value, format_number};

/// Prepended to every page.
pub const DOCTYPE: &str = "<!DOCTYPE html>";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Props that never become attributes.
const RESERVED_PROPS: &[&str] = &[
    "children",
    "key",
    "ref",
    "dangerouslySetInnerHTML",
    "suppressContentEditableWarning",
    "suppressHydrationWarning",
];

/// Enumerated attributes that take the strings "true" and "false".
const BOOLEANISH_ATTRIBUTES: &[&str] = &["contenteditable", "draggable", "spellcheck", "value"];

/// Attributes rendered as `name=""` when true and omitted when false.
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "allowfullscreen",
    "async",
    "autofocus",
    "autoplay",
    "checked",
    "controls",
    "default",
    "defer",
    "disabled",
    "formnovalidate",
    "hidden",
    "itemscope",
    "loop",
    "multiple",
    "muted",
    "nomodule",
    "novalidate",
    "open",
    "playsinline",
    "readonly",
    "required",
    "reversed",
    "selected",
];

const ATTRIBUTE_ALIASES: &[(&str, &str)] = &[
    ("className", "class"),
    ("htmlFor", "for"),
    ("acceptCharset", "accept-charset"),
    ("httpEquiv", "http-equiv"),
    ("charSet", "charset"),
    ("tabIndex", "tabindex"),
    ("readOnly", "readonly"),
    ("maxLength", "maxlength"),
    ("minLength", "minlength"),
    ("colSpan", "colspan"),
    ("rowSpan", "rowspan"),
    ("cellPadding", "cellpadding"),
    ("cellSpacing", "cellspacing"),
    ("crossOrigin", "crossorigin"),
    ("autoComplete", "autocomplete"),
    ("autoFocus", "autofocus"),
    ("autoPlay", "autoplay"),
    ("allowFullScreen", "allowfullscreen"),
    ("contentEditable", "contenteditable"),
    ("dateTime", "datetime"),
    ("encType", "enctype"),
    ("formAction", "formaction"),
    ("formNoValidate", "formnovalidate"),
    ("noValidate", "novalidate"),
    ("noModule", "nomodule"),
    ("playsInline", "playsinline"),
    ("itemProp", "itemprop"),
    ("itemScope", "itemscope"),
    ("itemType", "itemtype"),
    ("inputMode", "inputmode"),
    ("spellCheck", "spellcheck"),
    ("srcSet", "srcset"),
    ("srcDoc", "srcdoc"),
    ("useMap", "usemap"),
    ("frameBorder", "frameborder"),
    ("referrerPolicy", "referrerpolicy"),
    ("defaultValue", "value"),
    ("defaultChecked", "checked"),
    ("strokeWidth", "stroke-width"),
    ("strokeLinecap", "stroke-linecap"),
    ("strokeLinejoin", "stroke-linejoin"),
    ("strokeDasharray", "stroke-dasharray"),
    ("fillRule", "fill-rule"),
    ("clipRule", "clip-rule"),
    ("fillOpacity", "fill-opacity"),
    ("stopColor", "stop-color"),
    ("xlinkHref", "xlink:href"),
];

/// Style properties whose numeric values take no `px` suffix.
const UNITLESS_STYLES: &[&str] = &[
    "animationIterationCount",
    "aspectRatio",
    "borderImageOutset",
    "borderImageSlice",
    "borderImageWidth",
    "boxFlex",
    "boxFlexGroup",
    "boxOrdinalGroup",
    "columnCount",
    "columns",
    "flex",
    "flexGrow",
    "flexPositive",
    "flexShrink",
    "flexNegative",
    "flexOrder",
    "gridArea",
    "gridRow",
    "gridRowEnd",
    "gridRowSpan",
    "gridRowStart",
    "gridColumn",
    "gridColumnEnd",
    "gridColumnSpan",
    "gridColumnStart",
    "fontWeight",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "scale",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
    "fillOpacity",
    "floodOpacity",
    "stopOpacity",
    "strokeDasharray",
    "strokeDashoffset",
    "strokeMiterlimit",
    "strokeOpacity",
    "strokeWidth",
];

/// Serialize a page's render tree as a complete document.
pub fn render_document(root: &Value) -> TemplateResult<String> {
    let body = render_to_static_markup(root)?;
    Ok(format!("{}{}", DOCTYPE, body))
}

/// Serialize a render tree. The root must be an element.
pub fn render_to_static_markup(root: &Value) -> TemplateResult<String> {
    if !matches!(root, Value::Element(_)) {
        return Err(TemplateError::render(format!(
            "Expected the template to produce an element, got {}",
            root.type_name()
        )));
    }
    let mut out = String::new();
    render_node(root, &mut out, 0)?;
    Ok(out)
}

fn render_node(node: &Value, out: &mut String, depth: usize) -> TemplateResult<()> {
    match node {
        Value::Undefined | Value::Null | Value::Bool(_) => Ok(()),
        Value::String(s) => {
            escape_into(s, out);
            Ok(())
        }
        Value::Number(n) => {
            out.push_str(&format_number(*n));
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                render_node(item, out, depth)?;
            }
            Ok(())
        }
        Value::Element(element) => render_element(element, out, depth),
        Value::Object(map) => Err(TemplateError::render(format!(
            "Objects are not valid as a child (found: object with keys {{{}}})",
            map.keys().cloned().collect::<Vec<_>>().join(", ")
        ))),
        Value::Function(function) => Err(TemplateError::render(format!(
            "Functions are not valid as a child (found: {})",
            function.name()
        ))),
        Value::Fragment => Err(TemplateError::render(
            "Fragment is an element type and is not valid as a child",
        )),
    }
}

fn render_element(element: &Element, out: &mut String, depth: usize) -> TemplateResult<()> {
    match &element.element_type {
        ElementType::Tag(tag) => render_tag(tag, element, out, depth),
        ElementType::Fragment => match element.children() {
            Some(children) => render_node(children, out, depth),
            None => Ok(()),
        },
        ElementType::Component { render, .. } => {
            let props = Value::Object(element.props.clone());
            let rendered = call_function(render, vec![props], depth)?;
            render_node(&rendered, out, depth + 1)
        }
        ElementType::Missing(name) => Err(TemplateError::MissingComponent { name: name.clone() }),
    }
}

fn render_tag(tag: &str, element: &Element, out: &mut String, depth: usize) -> TemplateResult<()> {
    let inner_html = inner_html(&element.props)?;
    let children = element.children();
    if inner_html.is_some() && children.is_some() {
        return Err(TemplateError::render(format!(
            "<{}> can only set one of `children` or `dangerouslySetInnerHTML`",
            tag
        )));
    }

    out.push('<');
    out.push_str(tag);
    render_attributes(&element.props, out)?;

    if VOID_ELEMENTS.contains(&tag) {
        if children.is_some() || inner_html.is_some() {
            return Err(TemplateError::render(format!(
                "<{}> is a void element and must not have children",
                tag
            )));
        }
        out.push_str("/>");
        return Ok(());
    }

    out.push('>');
    if let Some(html) = inner_html {
        out.push_str(&html);
    } else if let Some(children) = children {
        render_node(children, out, depth)?;
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    Ok(())
}

fn inner_html(props: &Props) -> TemplateResult<Option<String>> {
    match props.get("dangerouslySetInnerHTML") {
        None | Some(Value::Undefined) | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(map
            .get("__html")
            .filter(|html| !html.is_nullish())
            .map(Value::to_display_string)),
        Some(_) => Err(TemplateError::render(
            "`dangerouslySetInnerHTML` must be an object of the form `{ __html: ... }`",
        )),
    }
}

fn render_attributes(props: &Props, out: &mut String) -> TemplateResult<()> {
    for (name, value) in props {
        if RESERVED_PROPS.contains(&name.as_str()) || is_event_handler(name) {
            continue;
        }
        let attribute = attribute_name(name);
        let rendered = match value {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Fragment => None,
            Value::Bool(b) => {
                if BOOLEAN_ATTRIBUTES.contains(&attribute.to_ascii_lowercase().as_str()) {
                    b.then(String::new)
                } else if BOOLEANISH_ATTRIBUTES.contains(&attribute)
                    || attribute.starts_with("data-")
                    || attribute.starts_with("aria-")
                {
                    Some(b.to_string())
                } else {
                    None
                }
            }
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Array(_) => Some(value.to_display_string()),
            Value::Object(map) if name == "style" => {
                Some(style_string(map)).filter(|style| !style.is_empty())
            }
            Value::Object(_) | Value::Element(_) => {
                return Err(TemplateError::render(format!(
                    "Invalid value for attribute `{}`: {}",
                    name,
                    value.type_name()
                )));
            }
        };
        if let Some(rendered) = rendered {
            out.push(' ');
            out.push_str(attribute);
            out.push_str("=\"");
            escape_into(&rendered, out);
            out.push('"');
        }
    }
    Ok(())
}

fn attribute_name(name: &str) -> &str {
    ATTRIBUTE_ALIASES
        .iter()
        .find(|(prop, _)| *prop == name)
        .map_or(name, |(_, attribute)| attribute)
}

/// `onClick`, `onMouseOver`, ...
fn is_event_handler(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 2 && bytes.starts_with(b"on") && bytes[2].is_ascii_uppercase()
}

fn style_string(style: &Props) -> String {
    let mut declarations = Vec::new();
    for (property, value) in style {
        let custom = property.starts_with("--");
        let css_value = match value {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => {
                if *n == 0.0 || custom || UNITLESS_STYLES.contains(&property.as_str()) {
                    format_number(*n)
                } else {
                    format!("{}px", format_number(*n))
                }
            }
            _ => continue,
        };
        let css_property = if custom {
            property.clone()
        } else {
            hyphenate_style_name(property)
        };
        declarations.push(format!("{}:{}", css_property, css_value));
    }
    declarations.join(";")
}

/// `backgroundColor` becomes `background-color`, `msTransform` becomes
/// `-ms-transform`.
fn hyphenate_style_name(property: &str) -> String {
    let mut out = String::with_capacity(property.len() + 4);
    for c in property.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    if out.starts_with("ms-") {
        out.insert(0, '-');
    }
    out
}

/// Escape text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(text, &mut out);
    out
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::globals::MemoryGlobals;
    use crate::evaluator::Sandbox;
    use crate::parser::transform;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn render_with(source: &str, globals: MemoryGlobals) -> TemplateResult<String> {
        let transformed = transform(source)?;
        let tree = Sandbox::new(Arc::new(globals)).run(&Program::page(transformed.into_expr()))?;
        render_to_static_markup(&tree)
    }

    fn render(source: &str) -> String {
        render_with(source, MemoryGlobals::new()).unwrap()
    }

    #[test]
    fn test_basic_element() {
        assert_eq!(render("<p>Hello</p>"), "<p>Hello</p>");
        assert_eq!(render("<div></div>"), "<div></div>");
    }

    #[test]
    fn test_attribute_aliases_and_escaping() {
        assert_eq!(
            render(r#"<label className="a&b" htmlFor="x" title={"say \"hi\""}>{"1 < 2"}</label>"#),
            r#"<label class="a&amp;b" for="x" title="say &quot;hi&quot;">1 &lt; 2</label>"#
        );
        assert_eq!(render("<p>{\"it's\"}</p>"), "<p>it&#x27;s</p>");
    }

    #[test]
    fn test_void_elements() {
        assert_eq!(
            render(r#"<div><br /><img src="a.png" alt="" /></div>"#),
            r#"<div><br/><img src="a.png" alt=""/></div>"#
        );
        let err = render_with("<br>x</br>", MemoryGlobals::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn test_boolean_attributes() {
        assert_eq!(
            render(r#"<input disabled checked={false} data-on={true} aria-hidden={false} draggable={true} />"#),
            r#"<input disabled="" data-on="true" aria-hidden="false" draggable="true"/>"#
        );
    }

    #[test]
    fn test_dropped_props() {
        assert_eq!(
            render(r#"<button key="k" onClick={() => 1} ref={null} type="button">Go</button>"#),
            r#"<button type="button">Go</button>"#
        );
    }

    #[test]
    fn test_style_objects() {
        assert_eq!(
            render(r#"<div style={{ marginTop: 4, lineHeight: 1.5, backgroundColor: "red", opacity: 0, msTransform: "none" }} />"#),
            r#"<div style="margin-top:4px;line-height:1.5;background-color:red;opacity:0;-ms-transform:none"></div>"#
        );
    }

    #[test]
    fn test_children_values() {
        assert_eq!(
            render("<ul>{[1, 2].map(n => <li>{n}</li>)}{null}{false}{undefined}{0}</ul>"),
            "<ul><li>1</li><li>2</li>0</ul>"
        );
    }

    #[test]
    fn test_fragments_render_children_only() {
        assert_eq!(render("<><b>a</b>text</>"), "<b>a</b>text");
    }

    #[test]
    fn test_inner_html_is_not_escaped() {
        assert_eq!(
            render(r#"<div dangerouslySetInnerHTML={{ __html: "<em>x</em>" }} />"#),
            "<div><em>x</em></div>"
        );
    }

    #[test]
    fn test_object_child_is_an_error() {
        let err = render_with("<p>{{ a: 1 }}</p>", MemoryGlobals::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Render {
                message: "Objects are not valid as a child (found: object with keys {a})"
                    .to_string()
            }
        );
    }

    #[test]
    fn test_root_must_be_element() {
        let err = render_with("'text'", MemoryGlobals::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn test_missing_component() {
        let err = render_with("<main><Nav /></main>", MemoryGlobals::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingComponent {
                name: "Nav".to_string()
            }
        );
    }

    #[test]
    fn test_component_invocation() {
        let card = Sandbox::new(Arc::new(MemoryGlobals::new()))
            .run(&Program::component(
                "Card",
                transform(r#"<div className="card"><h2>{props.title}</h2>{props.children}</div>"#)
                    .unwrap()
                    .into_expr(),
            ))
            .unwrap();
        let globals = MemoryGlobals::with_bindings([("Card", card)]);
        let html = render_with(r#"<Card title="Hi"><p>Body</p></Card>"#, globals).unwrap();
        assert_snapshot!(html, @r#"<div class="card"><h2>Hi</h2><p>Body</p></div>"#);
    }

    #[test]
    fn test_render_document_prefixes_doctype() {
        let transformed = transform("<html><body /></html>").unwrap();
        let tree = Sandbox::new(Arc::new(MemoryGlobals::new()))
            .run(&Program::page(transformed.into_expr()))
            .unwrap();
        assert_eq!(
            render_document(&tree).unwrap(),
            "<!DOCTYPE html><html><body></body></html>"
        );
    }

    #[test]
    fn test_hyphenate_style_name() {
        assert_eq!(hyphenate_style_name("borderTopWidth"), "border-top-width");
        assert_eq!(hyphenate_style_name("WebkitTransition"), "-webkit-transition");
        assert_eq!(escape_html("<&>"), "&lt;&amp;&gt;");
    }
}
