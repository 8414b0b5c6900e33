//! Inline settings resolution.
//!
//! Token components accept per-match settings written inline in the source,
//! e.g. `!media image.png id=fig-1 style=width:50%`. The settings text is a
//! sequence of `key=value` pairs with no whitespace around `=`. A value runs
//! until the next `key=` pair, so it may contain spaces; values are trimmed.
//!
//! Values are coerced to scalars: `true`/`false` (any case) become booleans,
//! `none` becomes null, decimal numerals become numbers and everything else
//! stays a string.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::SettingsError;
use crate::options::{Options, Value};

/// Start of a `key=` pair: a key at the start of the text or after whitespace.
static KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|\s)([^\s=]+)=").unwrap());

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").unwrap());

/// Keys exposed through [`Settings::attributes`].
const ATTRIBUTE_KEYS: [&str; 3] = ["style", "id", "class"];

/// How [`resolve`] treats keys that are not declared in the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Unknown keys and malformed text are errors.
    #[default]
    Reject,
    /// Unknown keys and malformed text are returned to the caller.
    Collect,
}

/// Effective settings for one component invocation.
///
/// A `Settings` value is handed to the component for the duration of a
/// single call and dropped afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: IndexMap<String, Value>,
}

impl Settings {
    /// Empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings holding the declared default values.
    #[must_use]
    pub fn from_defaults(defaults: &Options) -> Self {
        Self {
            values: defaults.defaults(),
        }
    }

    /// Set a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Get a boolean value.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Common output attributes: trimmed `style`, `id` and `class`.
    ///
    /// Only keys present in the settings are returned, so empty settings give
    /// an empty mapping.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<&'static str, String> {
        ATTRIBUTE_KEYS
            .iter()
            .filter_map(|&key| {
                self.get(key)
                    .map(|value| (key, value_to_string(value).trim().to_owned()))
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Result of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolved {
    /// Defaults with the recognised overrides applied.
    pub settings: Settings,
    /// Pairs whose key is not declared (only with [`UnknownKeys::Collect`]).
    pub unknown: IndexMap<String, Value>,
    /// Trimmed text preceding the first `key=value` pair, e.g. a positional
    /// argument such as an image path.
    pub leftover: String,
}

/// Resolve inline settings text against declared defaults.
///
/// # Errors
///
/// With [`UnknownKeys::Reject`], returns [`SettingsError::UnknownKey`] for the
/// first undeclared key and [`SettingsError::Malformed`] if the leftover text
/// contains an `=` that does not start a pair, as in `id = x`. Plain leftover
/// text is not an error; it is returned in [`Resolved::leftover`].
///
/// # Example
///
/// ```
/// use quill_extension::{Options, UnknownKeys, Value, resolve};
///
/// let defaults = Options::new()
///     .with("id", "", "Element id")
///     .with("caption", "", "Caption text");
///
/// let resolved = resolve(&defaults, "id=fig caption=A red car", UnknownKeys::Reject).unwrap();
/// assert_eq!(resolved.settings.get_str("id"), Some("fig"));
/// assert_eq!(resolved.settings.get_str("caption"), Some("A red car"));
/// ```
pub fn resolve(defaults: &Options, raw: &str, unknown: UnknownKeys) -> Result<Resolved, SettingsError> {
    let mut resolved = Resolved {
        settings: Settings::from_defaults(defaults),
        ..Default::default()
    };

    // (key start, value start, key)
    let pairs: Vec<(usize, usize, &str)> = KEY_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let key = caps.get(1)?;
            let whole = caps.get(0)?;
            Some((key.start(), whole.end(), key.as_str()))
        })
        .collect();

    let leftover_end = pairs.first().map_or(raw.len(), |&(start, _, _)| start);
    resolved.leftover = raw[..leftover_end].trim().to_owned();

    if resolved.leftover.contains('=') && unknown == UnknownKeys::Reject {
        return Err(SettingsError::Malformed {
            text: resolved.leftover,
        });
    }

    for (idx, &(_, value_start, key)) in pairs.iter().enumerate() {
        let value_end = pairs.get(idx + 1).map_or(raw.len(), |&(start, _, _)| start);
        let value = parse_value(raw[value_start..value_end].trim());

        if defaults.contains(key) {
            resolved.settings.values.insert(key.to_owned(), value);
        } else if unknown == UnknownKeys::Reject {
            return Err(SettingsError::UnknownKey {
                key: key.to_owned(),
            });
        } else {
            resolved.unknown.insert(key.to_owned(), value);
        }
    }

    Ok(resolved)
}

/// Coerce a raw settings value to a scalar.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    match raw.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "none" => return Value::Null,
        _ => {}
    }

    if NUMBER_RE.is_match(raw) {
        if let Ok(int) = raw.parse::<i64>() {
            return Value::from(int);
        }
        if let Some(number) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(number);
        }
    }

    Value::String(raw.to_owned())
}

/// Text form of a setting value; null is empty.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
