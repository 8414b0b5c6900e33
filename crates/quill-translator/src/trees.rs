//! Completed syntax trees of a translation run.

use std::collections::HashMap;

use quill_extension::SyntaxTreeSource;
use quill_tree::Token;

/// Syntax trees of every document of a run, keyed by page name.
///
/// Built only after all documents are tokenized, so every tree reachable
/// through [`SyntaxTreeSource`] is complete and immutable.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTrees {
    trees: HashMap<String, Token>,
}

impl SyntaxTrees {
    /// Syntax tree of a page.
    #[must_use]
    pub fn get(&self, page: &str) -> Option<&Token> {
        self.trees.get(page)
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Whether no document was tokenized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Remove and return a page's syntax tree.
    pub(crate) fn take(&mut self, page: &str) -> Option<Token> {
        self.trees.remove(page)
    }
}

impl FromIterator<(String, Token)> for SyntaxTrees {
    fn from_iter<I: IntoIterator<Item = (String, Token)>>(iter: I) -> Self {
        Self {
            trees: iter.into_iter().collect(),
        }
    }
}

impl SyntaxTreeSource for SyntaxTrees {
    fn syntax_tree(&self, page: &str) -> Option<&Token> {
        self.get(page)
    }
}
