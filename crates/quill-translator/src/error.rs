//! Error type for translation runs.

use std::io;
use std::path::PathBuf;

use quill_extension::{ComponentError, OptionsError, OutputFormat};

/// Error from setting up or executing a translation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TranslatorError {
    /// Two extensions share a name.
    #[error("extension '{0}' is loaded more than once")]
    DuplicateExtension(String),

    /// An extension requires one that is not loaded.
    #[error("extension '{extension}' requires '{requirement}', which is not loaded")]
    MissingRequirement {
        /// Requiring extension.
        extension: String,
        /// Missing extension.
        requirement: String,
    },

    /// Requirements cannot be ordered.
    #[error("extension requirements form a cycle among: {}", .extensions.join(", "))]
    RequirementCycle {
        /// Extensions whose requirements cannot be satisfied.
        extensions: Vec<String>,
    },

    /// An extension failed to register its components.
    #[error("failed to register extension '{extension}'")]
    Register {
        /// Extension name.
        extension: String,
        /// Underlying error.
        #[source]
        source: ComponentError,
    },

    /// Configuration overrides were rejected by an extension.
    #[error("invalid configuration for extension '{extension}'")]
    Configure {
        /// Extension name.
        extension: String,
        /// Underlying error.
        #[source]
        source: OptionsError,
    },

    /// The same page was passed twice.
    #[error("page '{0}' is listed more than once")]
    DuplicatePage(String),

    /// A page's source could not be read.
    #[error("failed to read page '{page}' from {}", .path.display())]
    Read {
        /// Page name.
        page: String,
        /// Resolved source path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A lifecycle hook failed.
    #[error("{hook} hook of extension '{extension}' failed{}", .page.as_ref().map(|p| format!(" for page '{p}'")).unwrap_or_default())]
    Hook {
        /// Extension name.
        extension: String,
        /// Hook name.
        hook: &'static str,
        /// Page being processed, for per-page hooks.
        page: Option<String>,
        /// Underlying error.
        #[source]
        source: ComponentError,
    },

    /// Tokenization of a page failed.
    #[error("failed to tokenize page '{page}'")]
    Tokenize {
        /// Page name.
        page: String,
        /// Underlying error.
        #[source]
        source: ComponentError,
    },

    /// Rendering of a page failed.
    #[error("failed to render page '{page}' as {format}")]
    Render {
        /// Page name.
        page: String,
        /// Output format.
        format: OutputFormat,
        /// Underlying error.
        #[source]
        source: ComponentError,
    },
}
