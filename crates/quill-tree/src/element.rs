//! Output tree nodes.

use std::collections::BTreeMap;

use crate::escape::{escape_html, escape_latex};

/// HTML elements serialised without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

/// Node in an output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element with a tag, attributes and children.
    Element(Element),
    /// Text, escaped on serialisation.
    Text(String),
}

/// Element in an output tree.
///
/// The meaning of the tag depends on the output format: an HTML tag name, or
/// a LaTeX command name. An element with an empty tag is a transparent
/// container and serialises only its children (see [`Element::root`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl Element {
    /// Create an element with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Create a transparent root container.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Element tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Get an attribute value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set an attribute. Empty values are stored but not serialised.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Direct children.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Append a child element and return a mutable reference to it.
    pub fn append_element(&mut self, element: Element) -> &mut Element {
        self.children.push(Node::Element(element));
        match self.children.last_mut() {
            Some(Node::Element(element)) => element,
            _ => unreachable!("element was just pushed"),
        }
    }

    /// Append a text node.
    pub fn append_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Serialise as HTML.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    /// Serialise as LaTeX.
    ///
    /// Non-empty tags become commands, `\tag[key=value]{children}`.
    #[must_use]
    pub fn to_latex(&self) -> String {
        let mut out = String::new();
        self.write_latex(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        if self.tag.is_empty() {
            write_children_html(&self.children, out);
            return;
        }

        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in self.attributes.iter().filter(|(_, v)| !v.is_empty()) {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }

        write_children_html(&self.children, out);
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }

    fn write_latex(&self, out: &mut String) {
        if self.tag.is_empty() {
            write_children_latex(&self.children, out);
            return;
        }

        out.push('\\');
        out.push_str(&self.tag);

        let options: Vec<String> = self
            .attributes
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}={}", latex_option_value(v)))
            .collect();
        if !options.is_empty() {
            out.push('[');
            out.push_str(&options.join(","));
            out.push(']');
        }

        out.push('{');
        write_children_latex(&self.children, out);
        out.push('}');
    }
}

/// Option value for `\cmd[key=value]`: braces, `%` and `#` escaped, and the
/// value grouped in braces when it contains `,`, `=`, `[` or `]`.
fn latex_option_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '{' | '}' | '%' | '#') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    if value.contains([',', '=', '[', ']']) {
        format!("{{{escaped}}}")
    } else {
        escaped
    }
}

fn write_children_html(children: &[Node], out: &mut String) {
    for child in children {
        match child {
            Node::Element(element) => element.write_html(out),
            Node::Text(text) => out.push_str(&escape_html(text)),
        }
    }
}

fn write_children_latex(children: &[Node], out: &mut String) {
    for child in children {
        match child {
            Node::Element(element) => element.write_latex(out),
            Node::Text(text) => out.push_str(&escape_latex(text)),
        }
    }
}
