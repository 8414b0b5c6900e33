//! Translation orchestrator for the Quill pipeline.
//!
//! A [`Translator`] takes a set of extensions, orders them by their declared
//! requirements, registers their components and drives a document set
//! through reading, tokenization and rendering, calling extension hooks at
//! each stage. All documents are tokenized before any is rendered, so render
//! components can look up the syntax tree of any other document of the run.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use quill_extension::{Extension, OutputFormat, Page};
//! use quill_translator::Translator;
//!
//! # fn extensions() -> Vec<Arc<dyn Extension>> { Vec::new() }
//! let config = quill_config::Config::load(Some(Path::new("quill.toml")), None)?;
//! let mut translator = Translator::from_config(extensions(), &config)?;
//!
//! for translation in translator.execute(&[Page::new("index.md")])? {
//!     if let Some(html) = translation.output(OutputFormat::Html) {
//!         println!("{}", html.to_html());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod requirements;
mod translator;
mod trees;

pub use error::TranslatorError;
pub use translator::{ReadFileFn, Translation, Translator, TranslatorConfig};
pub use trees::SyntaxTrees;
