//! Extensions: configurable units that register components and hook into the
//! translation lifecycle.
//!
//! An extension keeps two independent pieces of state in its
//! [`ExtensionCore`]:
//!
//! - a configuration snapshot, built from declared defaults and overrides,
//!   which may be updated or reset between documents;
//! - a runtime `active` flag, initialised from the `active` option and changed
//!   only through [`ExtensionCore::set_active`]. Configuration updates never
//!   touch it, so an embedding caller can disable an extension after
//!   construction and keep it disabled.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use quill_tree::{Element, Token};

use crate::error::{ComponentError, OptionsError};
use crate::options::{Config, Options, Value};
use crate::page::{Metadata, Page};
use crate::reader::ReaderScope;
use crate::render::OutputFormat;
use crate::renderer::RendererScope;

/// Option controlling the initial `active` state.
pub const ACTIVE: &str = "active";

/// State shared by every extension: configuration, runtime flag and declared
/// requirements.
#[derive(Debug)]
pub struct ExtensionCore {
    defaults: Options,
    config: RwLock<Arc<Config>>,
    active: AtomicBool,
    requires: BTreeSet<String>,
}

impl ExtensionCore {
    /// Options every extension declares.
    #[must_use]
    pub fn default_config() -> Options {
        Options::new().with(
            ACTIVE,
            true,
            "Toggle for disabling the extension. This only changes the initial \
             active state; use set_active to control it at runtime.",
        )
    }

    /// Create the core from extension-specific options and overrides.
    ///
    /// `options` is merged over [`ExtensionCore::default_config`], so an
    /// extension only declares what it adds (or redeclares `active` to change
    /// its default).
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::UnknownOption`] for overrides of undeclared
    /// options.
    ///
    /// # Example
    ///
    /// ```
    /// use quill_extension::{ExtensionCore, Options, Value};
    ///
    /// let options = Options::new().with("prefix", "Figure", "Caption prefix");
    /// let core = ExtensionCore::new(options, [("active", Value::Bool(false))]).unwrap();
    ///
    /// assert!(!core.is_active());
    /// assert_eq!(core.get("prefix"), Some(Value::from("Figure")));
    /// ```
    pub fn new<I, K>(options: Options, overrides: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let defaults = Self::default_config().merge(options);
        let config = Config::new(&defaults, overrides)?;
        let active = config.get_bool(ACTIVE).unwrap_or(true);

        Ok(Self {
            defaults,
            config: RwLock::new(Arc::new(config)),
            active: AtomicBool::new(active),
            requires: BTreeSet::new(),
        })
    }

    /// Create the core with default configuration values only.
    #[must_use]
    pub fn with_options(options: Options) -> Self {
        let defaults = Self::default_config().merge(options);
        let config = Config::from_defaults(&defaults);
        let active = config.get_bool(ACTIVE).unwrap_or(true);

        Self {
            defaults,
            config: RwLock::new(Arc::new(config)),
            active: AtomicBool::new(active),
            requires: BTreeSet::new(),
        }
    }

    /// Declared options, including the base `active` option.
    #[must_use]
    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Current configuration snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config.read().unwrap())
    }

    /// Current value of a configuration option.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.config().get(name).cloned()
    }

    /// Apply overrides on top of the current configuration.
    ///
    /// Readers holding an earlier snapshot keep it. The runtime `active` flag
    /// is not changed, even when `active` is among the overrides.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::UnknownOption`] if any override is undeclared;
    /// the configuration is then left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn update_config<I, K>(&self, overrides: I) -> Result<(), OptionsError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut config = Config::clone(&self.config());
        config.update(overrides)?;
        *self.config.write().unwrap() = Arc::new(config);
        Ok(())
    }

    /// Restore the declared defaults. The runtime `active` flag is kept.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    pub fn reset_config(&self) {
        let mut config = Config::clone(&self.config());
        config.reset(&self.defaults);
        *self.config.write().unwrap() = Arc::new(config);
    }

    /// Runtime enable state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Override the runtime enable state.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Declare extensions this extension depends on.
    ///
    /// Names accumulate across calls; resolution and ordering are the
    /// translator's responsibility.
    pub fn requires<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
    }

    /// Declared required extension names.
    #[must_use]
    pub fn requirements(&self) -> &BTreeSet<String> {
        &self.requires
    }
}

/// A translation extension.
///
/// Implementors provide a name and an [`ExtensionCore`]; every other method
/// has a default. The orchestrator calls [`register`](Self::register) once
/// at setup, then the lifecycle hooks at fixed points of each run:
///
/// | hook | called |
/// |------|--------|
/// | [`pre_execute`](Self::pre_execute) | once per run, before any document is read |
/// | [`pre_read`](Self::pre_read) | per document, before its text is read |
/// | [`update_metadata`](Self::update_metadata) | per document, after its text is read |
/// | [`pre_tokenize`](Self::pre_tokenize) / [`post_tokenize`](Self::post_tokenize) | per document, around tokenization |
/// | [`pre_render`](Self::pre_render) / [`post_render`](Self::post_render) | per document and output format, around rendering |
/// | [`post_execute`](Self::post_execute) | once per run, after all documents are rendered |
///
/// Hooks are only called while the extension is active. Hooks take `&self`
/// and may run for several documents concurrently.
pub trait Extension: Send + Sync {
    /// Unique extension name, used for requirement resolution.
    fn name(&self) -> &str;

    /// Shared extension state.
    fn core(&self) -> &ExtensionCore;

    /// Runtime enable state.
    fn is_active(&self) -> bool {
        self.core().is_active()
    }

    /// Override the runtime enable state.
    fn set_active(&self, active: bool) {
        self.core().set_active(active);
    }

    /// Declared required extension names.
    fn requirements(&self) -> &BTreeSet<String> {
        self.core().requirements()
    }

    /// Attach token and render components.
    fn register(
        &self,
        _reader: &mut ReaderScope<'_>,
        _renderer: &mut RendererScope<'_>,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called before a document's text is read.
    fn pre_read(&self, _meta: &mut Metadata, _page: &Page) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called after a document's text is read, with a copy of the text.
    fn update_metadata(
        &self,
        _meta: &mut Metadata,
        _content: &str,
        _page: &Page,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called once per run before any document is processed.
    ///
    /// Runs before any source is read and receives the page list rather than
    /// document content: documents are read one by one inside the run,
    /// possibly in parallel, so there is no point where every text exists
    /// before tokenizing starts. Per-document text is available to
    /// [`update_metadata`](Self::update_metadata), and every complete syntax
    /// tree to render components through the render context.
    fn pre_execute(&self, _pages: &[Page]) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called once per run after every document is rendered.
    fn post_execute(&self, _pages: &[Page]) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called before a document is tokenized, with its empty root token.
    fn pre_tokenize(&self, _ast: &mut Token, _page: &Page) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called after a document is tokenized, with its complete syntax tree.
    fn post_tokenize(&self, _ast: &mut Token, _page: &Page) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called before a document is rendered to `format`.
    fn pre_render(
        &self,
        _result: &mut Element,
        _format: OutputFormat,
        _page: &Page,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called after a document is rendered to `format`.
    fn post_render(
        &self,
        _result: &mut Element,
        _format: OutputFormat,
        _page: &Page,
    ) -> Result<(), ComponentError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Figures {
        core: ExtensionCore,
    }

    impl Extension for Figures {
        fn name(&self) -> &'static str {
            "figures"
        }

        fn core(&self) -> &ExtensionCore {
            &self.core
        }
    }

    fn options() -> Options {
        Options::new().with("prefix", "Figure", "Caption prefix")
    }

    #[test]
    fn test_default_config_declares_active() {
        let config = ExtensionCore::default_config();
        assert_eq!(
            config.get(ACTIVE).map(|o| &o.default),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_active_from_config() {
        let core = ExtensionCore::new(options(), [(ACTIVE, Value::Bool(false))]).unwrap();
        assert!(!core.is_active());

        let core = ExtensionCore::with_options(options());
        assert!(core.is_active());
    }

    #[test]
    fn test_redeclared_active_default() {
        let core = ExtensionCore::with_options(Options::new().with(ACTIVE, false, "Off by default"));
        assert!(!core.is_active());
    }

    #[test]
    fn test_unknown_override_rejected() {
        let result = ExtensionCore::new(options(), [("colour", Value::from("red"))]);
        assert!(matches!(result, Err(OptionsError::UnknownOption { .. })));
    }

    #[test]
    fn test_set_active_survives_config_update() {
        let ext = Figures {
            core: ExtensionCore::with_options(options()),
        };
        ext.set_active(false);

        ext.core()
            .update_config([(ACTIVE, Value::Bool(true)), ("prefix", Value::from("Fig."))])
            .unwrap();
        assert!(!ext.is_active());
        assert_eq!(ext.core().get("prefix"), Some(Value::from("Fig.")));

        ext.core().reset_config();
        assert!(!ext.is_active());
        assert_eq!(ext.core().get("prefix"), Some(Value::from("Figure")));
    }

    #[test]
    fn test_failed_update_keeps_config() {
        let core = ExtensionCore::with_options(options());
        let result = core.update_config([("prefix", Value::from("Fig.")), ("x", Value::Null)]);

        assert!(result.is_err());
        assert_eq!(core.get("prefix"), Some(Value::from("Figure")));
    }

    #[test]
    fn test_snapshot_unaffected_by_update() {
        let core = ExtensionCore::with_options(options());
        let before = core.config();
        core.update_config([("prefix", Value::from("Fig."))]).unwrap();

        assert_eq!(before.get_str("prefix"), Some("Figure"));
        assert_eq!(core.config().get_str("prefix"), Some("Fig."));
    }

    #[test]
    fn test_requires_accumulates() {
        let mut core = ExtensionCore::with_options(Options::new());
        core.requires(["foo", "bar"]);
        core.requires(["baz"]);
        core.requires(["foo"]);

        let names: Vec<&str> = core.requirements().iter().map(String::as_str).collect();
        assert_eq!(names, ["bar", "baz", "foo"]);
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let ext = Figures {
            core: ExtensionCore::with_options(options()),
        };
        let page = Page::new("index.md");
        let mut meta = Metadata::new();
        let mut ast = Token::root();
        let mut result = Element::root();

        ext.pre_execute(std::slice::from_ref(&page)).unwrap();
        ext.pre_read(&mut meta, &page).unwrap();
        ext.update_metadata(&mut meta, "text", &page).unwrap();
        ext.pre_tokenize(&mut ast, &page).unwrap();
        ext.post_tokenize(&mut ast, &page).unwrap();
        ext.pre_render(&mut result, OutputFormat::Html, &page).unwrap();
        ext.post_render(&mut result, OutputFormat::Html, &page).unwrap();
        ext.post_execute(std::slice::from_ref(&page)).unwrap();

        assert!(meta.is_empty());
        assert_eq!(ast, Token::root());
        assert_eq!(result, Element::root());
    }
}
