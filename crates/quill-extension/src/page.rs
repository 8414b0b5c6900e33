//! Document handles and per-document metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Handle to a document being translated.
///
/// The `name` is the document's unique key within a run (e.g.
/// `"guide/intro.md"`) and is used for cross-document syntax tree lookups.
/// The `source` path is where the translator reads the raw text from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Page {
    name: String,
    source: PathBuf,
}

impl Page {
    /// Create a page whose source path equals its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let source = PathBuf::from(&name);
        Self { name, source }
    }

    /// Set the source path.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Unique document key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the raw text is read from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Metadata collected for a document by extension hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: BTreeMap<String, Value>,
}

impl Metadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Set a value only if the key is not present yet.
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// All values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Whether no metadata is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
