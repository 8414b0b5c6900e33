//! Configuration management for Quill.
//!
//! Parses `quill.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! ```toml
//! [translator]
//! formats = ["html", "latex"]
//! parallel = true
//! source_dir = "docs"
//!
//! [extensions.figures]
//! prefix = "Fig."
//! active = false
//! ```
//!
//! Each `[extensions.<name>]` table holds option overrides for the extension
//! called `<name>`; they are validated against the extension's declared
//! options when the extension is constructed, not here.
//!
//! Settings passed to [`Config::load`] via [`LoadOverrides`] take
//! precedence over file values.
//!
//! ## Environment Variable Expansion
//!
//! String values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `translator.source_dir`
//! - every string inside `[extensions.*]`, including nested arrays and tables

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quill_extension::{OutputFormat, Value};
use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quill.toml";

/// Settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct LoadOverrides {
    /// Override output formats.
    pub formats: Option<Vec<OutputFormat>>,
    /// Override parallel translation.
    pub parallel: Option<bool>,
    /// Override the source directory.
    pub source_dir: Option<PathBuf>,
}

/// Quill configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Translator section as parsed from TOML.
    translator: TranslatorConfigRaw,
    /// Per-extension option tables.
    extensions: BTreeMap<String, toml::Table>,

    /// Resolved translator configuration (set after loading).
    #[serde(skip)]
    pub translator_resolved: TranslatorConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw translator configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct TranslatorConfigRaw {
    formats: Option<Vec<String>>,
    parallel: Option<bool>,
    source_dir: Option<String>,
}

/// Resolved translator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Output formats, in rendering order.
    pub formats: Vec<OutputFormat>,
    /// Whether documents are tokenized and rendered in parallel.
    pub parallel: bool,
    /// Directory relative document sources are resolved against.
    pub source_dir: PathBuf,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Html],
            parallel: false,
            source_dir: PathBuf::from("."),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`extensions.links.base_url`").
        field: String,
        /// Error message (e.g., "${`DOCS_HOST`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional overrides.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `quill.toml` in the current directory and its
    /// parents, falling back to defaults when none is found.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, or reading,
    /// parsing, expansion or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        overrides: Option<&LoadOverrides>,
    ) -> Result<Self, ConfigError> {
        let discovered = match config_path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Some(path) => Some(path.to_path_buf()),
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| Self::discover_config(&cwd)),
        };

        let mut config = match discovered {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                tracing::debug!("No {CONFIG_FILENAME} found, using defaults");
                Self::default_with_cwd()
            }
        };

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
            config.validate()?;
        }

        Ok(config)
    }

    /// Search for a config file in `start` and its parents.
    #[must_use]
    pub fn discover_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Names of extensions with an `[extensions.<name>]` table.
    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    /// Option overrides for an extension, in key order.
    ///
    /// Returns an empty list for extensions without a table.
    #[must_use]
    pub fn extension_overrides(&self, name: &str) -> Vec<(String, Value)> {
        self.extensions
            .get(name)
            .map(|table| {
                table
                    .iter()
                    .map(|(key, value)| (key.clone(), to_option_value(value)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Apply overrides to the configuration.
    fn apply_overrides(&mut self, overrides: &LoadOverrides) {
        if let Some(formats) = &overrides.formats {
            self.translator_resolved.formats.clone_from(formats);
        }
        if let Some(parallel) = overrides.parallel {
            self.translator_resolved.parallel = parallel;
        }
        if let Some(source_dir) = &overrides.source_dir {
            self.translator_resolved.source_dir.clone_from(source_dir);
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            translator: TranslatorConfigRaw::default(),
            extensions: BTreeMap::new(),
            translator_resolved: TranslatorConfig {
                source_dir: base.to_path_buf(),
                ..TranslatorConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            extensions = config.extensions.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.translator_resolved.formats.is_empty() {
            return Err(ConfigError::Validation(
                "translator.formats cannot be empty".to_owned(),
            ));
        }

        if let Some(name) = self.extensions.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "extension name '{name}' cannot be empty"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref source_dir) = self.translator.source_dir {
            self.translator.source_dir =
                Some(expand::expand_env(source_dir, "translator.source_dir")?);
        }

        for (name, table) in &mut self.extensions {
            for (key, value) in table.iter_mut() {
                expand::expand_value(value, &format!("extensions.{name}.{key}"))?;
            }
        }

        Ok(())
    }

    /// Resolve raw values: parse format names and make the source directory
    /// absolute relative to the config directory.
    fn resolve(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let formats = match &self.translator.formats {
            Some(names) => names
                .iter()
                .map(|name| {
                    name.parse::<OutputFormat>().map_err(|e| {
                        ConfigError::Validation(format!("translator.formats: {e}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => TranslatorConfig::default().formats,
        };

        let mut unique = Vec::with_capacity(formats.len());
        for format in formats {
            if !unique.contains(&format) {
                unique.push(format);
            }
        }

        self.translator_resolved = TranslatorConfig {
            formats: unique,
            parallel: self.translator.parallel.unwrap_or(false),
            source_dir: self
                .translator
                .source_dir
                .as_deref()
                .map_or_else(|| config_dir.to_path_buf(), |dir| config_dir.join(dir)),
        };

        Ok(())
    }
}

/// Convert a TOML value into an option value.
///
/// Datetimes become their TOML string form; non-finite floats become null.
fn to_option_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(to_option_value).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(key, value)| (key.clone(), to_option_value(value)))
                .collect(),
        ),
    }
}
