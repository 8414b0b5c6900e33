//! Error types for extensions and components.

use crate::render::OutputFormat;

/// Error from option tables and configuration.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum OptionsError {
    /// Override for an option that is not declared in the defaults table.
    #[error("unknown option '{name}', available options: {available}")]
    UnknownOption {
        /// Rejected option name.
        name: String,
        /// Comma-separated declared option names.
        available: String,
    },
}

/// Error while resolving inline settings text.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// Setting that is not declared in the component's defaults.
    #[error("unknown setting '{key}'")]
    UnknownKey {
        /// Rejected setting name.
        key: String,
    },
    /// Text that is not part of any `key=value` pair.
    #[error("malformed settings, unexpected text '{text}'")]
    Malformed {
        /// Unconsumed text.
        text: String,
    },
}

/// Error from token and render components.
///
/// All variants propagate to the orchestrator, which decides whether to abort
/// the run or skip the document.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ComponentError {
    /// Component rejected at construction.
    #[error("invalid component '{component}': {reason}")]
    InvalidComponent {
        /// Component name.
        component: String,
        /// Why the component was rejected.
        reason: String,
    },

    /// Inline settings could not be resolved.
    #[error("invalid settings for '{component}'")]
    Settings {
        /// Component name.
        component: String,
        /// Underlying settings error.
        #[source]
        source: SettingsError,
    },

    /// Syntax tree lookup before the syntax tree source was bound.
    #[error("syntax trees are only available while rendering")]
    TranslatorNotSet,

    /// Syntax tree lookup for a document without a syntax tree.
    #[error("no syntax tree for page '{page}'")]
    UnknownPage {
        /// Requested page name.
        page: String,
    },

    /// Render component does not support the requested output format.
    #[error("component '{component}' does not support {format} output")]
    UnsupportedFormat {
        /// Component name.
        component: String,
        /// Requested format.
        format: OutputFormat,
    },

    /// No render component registered for a token kind.
    #[error("no render component registered for token '{token}'")]
    MissingRenderer {
        /// Token name.
        token: String,
    },

    /// The component's owning extension has been dropped.
    #[error("extension owning '{component}' is no longer available")]
    ExtensionUnavailable {
        /// Component name.
        component: String,
    },

    /// Configuration error.
    #[error("configuration error")]
    Options(#[from] OptionsError),

    /// Failure raised by component or hook code.
    #[error("{0}")]
    Failed(String),
}

impl ComponentError {
    /// Create a [`ComponentError::Failed`] from any message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
