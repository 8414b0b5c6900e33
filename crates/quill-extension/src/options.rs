//! Option tables shared by extension configuration and component settings.
//!
//! An [`Options`] table declares option names with a default value and a
//! human-readable description. A [`Config`] is a working copy of the defaults
//! with caller overrides merged in; overrides for undeclared names are
//! rejected.

use indexmap::IndexMap;
pub use serde_json::Value;

use crate::error::OptionsError;

/// Declared option: default value and description.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    /// Value used when no override is given.
    pub default: Value,
    /// Human-readable description.
    pub description: String,
}

/// Ordered table of declared options.
///
/// Declaring a name twice replaces the earlier declaration, which lets a
/// specialised component override a base default while keeping its position.
///
/// # Example
///
/// ```
/// use quill_extension::{Options, Value};
///
/// let options = Options::new()
///     .with("active", true, "Enable the extension")
///     .with("prefix", "fig", "Caption prefix");
///
/// assert_eq!(options.names().collect::<Vec<_>>(), ["active", "prefix"]);
/// assert_eq!(options.get("prefix").map(|o| &o.default), Some(&Value::from("fig")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    specs: IndexMap<String, OptionSpec>,
}

impl Options {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an option.
    #[must_use]
    pub fn with(
        mut self,
        name: impl Into<String>,
        default: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        self.insert(name, default, description);
        self
    }

    /// Declare an option in place.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        default: impl Into<Value>,
        description: impl Into<String>,
    ) {
        self.specs.insert(
            name.into(),
            OptionSpec {
                default: default.into(),
                description: description.into(),
            },
        );
    }

    /// Merge another table into this one; `other` wins on conflicts.
    #[must_use]
    pub fn merge(mut self, other: Options) -> Self {
        self.specs.extend(other.specs);
        self
    }

    /// Get a declared option.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.get(name)
    }

    /// Whether `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Declared options in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Number of declared options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether no options are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Default values, without descriptions.
    #[must_use]
    pub fn defaults(&self) -> IndexMap<String, Value> {
        self.specs
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default.clone()))
            .collect()
    }

    pub(crate) fn unknown(&self, name: &str) -> OptionsError {
        OptionsError::UnknownOption {
            name: name.to_owned(),
            available: self.names().collect::<Vec<_>>().join(", "),
        }
    }
}

/// Working configuration: declared defaults with overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: IndexMap<String, Value>,
}

impl Config {
    /// Build a configuration from declared defaults and overrides.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::UnknownOption`] if an override names an option
    /// that is not declared in `defaults`.
    pub fn new<I, K>(defaults: &Options, overrides: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut values = defaults.defaults();
        for (name, value) in overrides {
            let name = name.into();
            if !defaults.contains(&name) {
                return Err(defaults.unknown(&name));
            }
            values.insert(name, value);
        }
        Ok(Self { values })
    }

    /// Configuration holding the declared defaults only.
    #[must_use]
    pub fn from_defaults(defaults: &Options) -> Self {
        Self {
            values: defaults.defaults(),
        }
    }

    /// Apply overrides on top of the current values.
    ///
    /// Either every override is applied or, on error, none is.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::UnknownOption`] if an override names an option
    /// this configuration does not hold.
    pub fn update<I, K>(&mut self, overrides: I) -> Result<(), OptionsError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let overrides: Vec<(String, Value)> =
            overrides.into_iter().map(|(k, v)| (k.into(), v)).collect();

        if let Some((name, _)) = overrides
            .iter()
            .find(|(name, _)| !self.values.contains_key(name))
        {
            return Err(OptionsError::UnknownOption {
                name: name.clone(),
                available: self
                    .values
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        self.values.extend(overrides);
        Ok(())
    }

    /// Restore the declared defaults.
    pub fn reset(&mut self, defaults: &Options) {
        self.values = defaults.defaults();
    }

    /// Current value of an option.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Current value of a boolean option.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Current value of a string option.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// All current values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
