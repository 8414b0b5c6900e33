//! Reader: pattern registry and tokenization driver.
//!
//! Extensions register `(name, regex, component)` patterns through a
//! [`ReaderScope`]. [`Reader::tokenize`] walks the source text and, at each
//! position, invokes the first registered pattern whose match starts there.
//! Text no pattern claims is collected into [`quill_tree::STRING`] tokens.
//!
//! Two named captures have fixed meaning:
//!
//! - `settings`: inline settings text, resolved against the component's
//!   defaults.
//! - `inner`: nested source, tokenized recursively into the node returned by
//!   the component when that node is new (not the parent it was given).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Weak;

use quill_tree::Token;
use regex::{Captures, Match, Regex};

use crate::error::ComponentError;
use crate::extension::Extension;
use crate::page::Page;
use crate::token::{TokenComponent, TokenUnit};

/// Capture holding inline settings text.
pub const SETTINGS_GROUP: &str = "settings";

/// Capture holding nested source to tokenize into the created token.
pub const INNER_GROUP: &str = "inner";

/// Information about one pattern match, handed to token components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerInfo {
    pattern: String,
    text: String,
    groups: BTreeMap<String, String>,
    line: usize,
}

impl LexerInfo {
    /// Create match information for `text` matched by `pattern`, on line 1.
    #[must_use]
    pub fn new(pattern: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            text: text.into(),
            groups: BTreeMap::new(),
            line: 1,
        }
    }

    /// Add a named capture.
    #[must_use]
    pub fn with_group(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.groups.insert(name.into(), value.into());
        self
    }

    /// Set the line number.
    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    fn from_captures(pattern: &str, regex: &Regex, caps: &Captures<'_>, line: usize) -> Self {
        let groups = regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_owned(), m.as_str().to_owned())))
            .collect();

        Self {
            pattern: pattern.to_owned(),
            text: caps.get(0).map_or("", |m| m.as_str()).to_owned(),
            groups,
            line,
        }
    }

    /// Name of the pattern that matched.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Complete matched text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Named capture, if it participated in the match.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.groups.get(name).map(String::as_str)
    }

    /// Raw inline settings text.
    #[must_use]
    pub fn settings(&self) -> Option<&str> {
        self.get(SETTINGS_GROUP)
    }

    /// Line of the match start (1-indexed).
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}

struct Pattern {
    name: String,
    regex: Regex,
    unit: TokenUnit,
}

/// Registry of token patterns and the tokenization driver.
#[derive(Default)]
pub struct Reader {
    patterns: Vec<Pattern>,
}

impl Reader {
    /// Create an empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration handle whose components belong to `extension`.
    pub fn scoped(&mut self, extension: Weak<dyn Extension>) -> ReaderScope<'_> {
        ReaderScope {
            reader: self,
            extension,
        }
    }

    /// Registered pattern names in priority order.
    pub fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name.as_str())
    }

    /// Registered unit for a pattern.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&TokenUnit> {
        self.patterns.iter().find(|p| p.name == name).map(|p| &p.unit)
    }

    /// Tokenize `text` into `parent`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a token unit; tokens created before
    /// the failure stay in `parent`.
    pub fn tokenize(&self, parent: &mut Token, text: &str, page: &Page) -> Result<(), ComponentError> {
        tracing::debug!(page = %page, patterns = self.patterns.len(), "Tokenizing");
        self.tokenize_from(parent, text, page, 1)
    }

    fn tokenize_from(
        &self,
        parent: &mut Token,
        text: &str,
        page: &Page,
        first_line: usize,
    ) -> Result<(), ComponentError> {
        let mut pos = 0;
        let mut line = first_line;
        let mut lookahead = Lookahead::new(&self.patterns, text);

        while pos < text.len() {
            let Some((pattern, caps)) = lookahead.next_match(pos) else {
                parent.append_text(&text[pos..]);
                break;
            };

            let (start, end) = caps.get(0).map_or((pos, pos), |m| (m.start(), m.end()));
            if start > pos {
                let unmatched = &text[pos..start];
                parent.append_text(unmatched);
                line += unmatched.matches('\n').count();
            }

            let info = LexerInfo::from_captures(&pattern.name, &pattern.regex, &caps, line);
            tracing::trace!(pattern = %pattern.name, line, "Pattern matched");

            let parent_ptr: *const Token = &*parent;
            let node = pattern.unit.invoke(parent, &info, page)?;

            if !std::ptr::eq(node, parent_ptr)
                && let Some(inner) = caps.name(INNER_GROUP)
            {
                let inner_line = line + text[start..inner.start()].matches('\n').count();
                self.tokenize_from(node, inner.as_str(), page, inner_line)?;
            }

            line += text[start..end].matches('\n').count();
            pos = end;
        }

        Ok(())
    }
}

/// Next match of every pattern at or after the scan position.
///
/// Each pattern is searched again only once the scan has moved past its
/// cached match, so a scan over `text` costs one forward pass per pattern.
struct Lookahead<'p, 't> {
    patterns: &'p [Pattern],
    text: &'t str,
    next: Vec<Option<Match<'t>>>,
}

impl<'p, 't> Lookahead<'p, 't> {
    fn new(patterns: &'p [Pattern], text: &'t str) -> Self {
        let next = patterns.iter().map(|p| p.regex.find_at(text, 0)).collect();
        Self {
            patterns,
            text,
            next,
        }
    }

    /// Earliest non-empty match starting at or after `pos`; on equal starts
    /// the pattern registered first wins.
    fn next_match(&mut self, pos: usize) -> Option<(&'p Pattern, Captures<'t>)> {
        let mut best: Option<(usize, usize)> = None;

        for index in 0..self.patterns.len() {
            let Some(start) = self.refresh(index, pos) else {
                continue;
            };
            if best.is_none_or(|(best_start, _)| start < best_start) {
                best = Some((start, index));
            }
        }

        let (start, index) = best?;
        let patterns = self.patterns;
        let pattern = &patterns[index];
        let caps = pattern.regex.captures_at(self.text, start)?;
        Some((pattern, caps))
    }

    /// Bring the cached match of pattern `index` up to `pos`, skipping empty
    /// matches, and return its start.
    fn refresh(&mut self, index: usize, pos: usize) -> Option<usize> {
        let patterns = self.patterns;
        let regex = &patterns[index].regex;
        loop {
            let found = self.next[index]?;
            let from = if found.start() < pos {
                pos
            } else if found.is_empty() {
                let ch = self.text[found.start()..].chars().next()?;
                found.start() + ch.len_utf8()
            } else {
                return Some(found.start());
            };
            self.next[index] = regex.find_at(self.text, from);
        }
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("patterns", &self.pattern_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Registration handle passed to [`Extension::register`].
pub struct ReaderScope<'r> {
    reader: &'r mut Reader,
    extension: Weak<dyn Extension>,
}

impl ReaderScope<'_> {
    /// Register a pattern after all previously registered patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::InvalidComponent`] if the component's default
    /// settings are invalid or a pattern with the same name already exists.
    pub fn add<C>(&mut self, name: impl Into<String>, regex: Regex, component: C) -> Result<(), ComponentError>
    where
        C: TokenComponent + 'static,
    {
        let name = name.into();
        let unit = TokenUnit::new(component, Weak::clone(&self.extension))?;

        if self.reader.patterns.iter().any(|p| p.name == name) {
            return Err(ComponentError::InvalidComponent {
                component: unit.name().to_owned(),
                reason: format!("pattern '{name}' is already registered"),
            });
        }

        tracing::debug!(pattern = %name, component = unit.name(), "Registered token component");
        self.reader.patterns.push(Pattern { name, regex, unit });
        Ok(())
    }
}
