//! Abstract syntax tree tokens.

use std::collections::BTreeMap;

/// Name of the token at the top of every document's syntax tree.
pub const ROOT: &str = "Root";

/// Name of the token holding plain text that no pattern claimed.
pub const STRING: &str = "String";

/// Name of the placeholder token emitted for matches of a disabled extension.
pub const DISABLED: &str = "DisabledToken";

/// Attribute holding the text of [`STRING`] and [`DISABLED`] tokens.
const CONTENT: &str = "content";

/// Node in the abstract syntax tree.
///
/// A token has a name (its kind, e.g. `"Heading"`), string attributes and
/// owned children. Attributes are kept sorted so trees compare and print
/// deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    name: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Token>,
}

impl Token {
    /// Create a token of the given kind without attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an empty [`ROOT`] token.
    #[must_use]
    pub fn root() -> Self {
        Self::new(ROOT)
    }

    /// Create a [`STRING`] token holding `content`.
    #[must_use]
    pub fn string(content: impl Into<String>) -> Self {
        Self::new(STRING).with_attr(CONTENT, content)
    }

    /// Create a [`DISABLED`] placeholder preserving the matched text verbatim.
    #[must_use]
    pub fn disabled(text: impl Into<String>) -> Self {
        Self::new(DISABLED).with_attr(CONTENT, text)
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Token kind.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this token is a disabled-extension placeholder.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.name == DISABLED
    }

    /// Get an attribute value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set an attribute, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// All attributes in key order.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Text carried by [`STRING`] and [`DISABLED`] tokens.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.get(CONTENT)
    }

    /// Direct children.
    #[must_use]
    pub fn children(&self) -> &[Token] {
        &self.children
    }

    /// Mutable access to the direct children.
    pub fn children_mut(&mut self) -> &mut Vec<Token> {
        &mut self.children
    }

    /// Append a child and return a mutable reference to it.
    pub fn append(&mut self, child: Token) -> &mut Token {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append text, merging into a trailing [`STRING`] child when present.
    pub fn append_text(&mut self, text: &str) {
        if let Some(last) = self.children.last_mut()
            && last.name == STRING
        {
            last.attributes
                .entry(CONTENT.to_owned())
                .or_default()
                .push_str(text);
            return;
        }
        self.children.push(Self::string(text));
    }

    /// Concatenated text content of this token and its descendants.
    #[must_use]
    pub fn text(&self) -> String {
        self.iter().filter_map(Token::content).collect()
    }

    /// Depth-first, pre-order iterator over this token and its descendants.
    #[must_use]
    pub fn iter(&self) -> TokenIter<'_> {
        TokenIter { stack: vec![self] }
    }

    /// First token named `name` in pre-order, including `self`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Token> {
        self.iter().find(|token| token.name == name)
    }
}

/// Pre-order iterator returned by [`Token::iter`].
pub struct TokenIter<'a> {
    stack: Vec<&'a Token>,
}

impl<'a> Iterator for TokenIter<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.stack.pop()?;
        self.stack.extend(token.children.iter().rev());
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_append_returns_child() {
        let mut root = Token::root();
        let child = root.append(Token::new("Heading"));
        child.set("level", "2");

        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].get("level"), Some("2"));
    }

    #[test]
    fn test_disabled_preserves_text() {
        let token = Token::disabled("[x]");
        assert!(token.is_disabled());
        assert_eq!(token.content(), Some("[x]"));
    }

    #[test]
    fn test_append_text_merges_strings() {
        let mut root = Token::root();
        root.append_text("a");
        root.append_text("b");
        root.append(Token::new("Break"));
        root.append_text("c");

        assert_eq!(root.children().len(), 3);
        assert_eq!(root.children()[0].content(), Some("ab"));
        assert_eq!(root.children()[2].content(), Some("c"));
    }

    #[test]
    fn test_iter_pre_order() {
        let mut root = Token::root();
        let para = root.append(Token::new("Paragraph"));
        para.append(Token::string("one"));
        para.append(Token::new("Bold")).append(Token::string("two"));
        root.append(Token::string("three"));

        let names: Vec<&str> = root.iter().map(Token::name).collect();
        assert_eq!(
            names,
            vec!["Root", "Paragraph", "String", "Bold", "String", "String"]
        );
        assert_eq!(root.text(), "onetwothree");
    }

    #[test]
    fn test_find() {
        let mut root = Token::root();
        root.append(Token::new("Paragraph"))
            .append(Token::new("Link").with_attr("url", "a.md"));

        assert_eq!(root.find("Link").and_then(|t| t.get("url")), Some("a.md"));
        assert!(root.find("Table").is_none());
    }
}
