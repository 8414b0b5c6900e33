//! Translation orchestrator.
//!
//! A [`Translator`] owns the extensions of a run together with the reader
//! and renderer their components are registered in. [`Translator::execute`]
//! drives a document set through the lifecycle:
//!
//! 1. `pre_execute` hooks, once.
//! 2. Per document: `pre_read` hooks, read the source, `update_metadata`
//!    hooks, `pre_tokenize` hooks, tokenize, `post_tokenize` hooks.
//! 3. Bind the completed syntax trees into the renderer.
//! 4. Per document and output format: `pre_render` hooks, render,
//!    `post_render` hooks.
//! 5. `post_execute` hooks, once.
//!
//! Every document is tokenized before any is rendered. Steps 2 and 4 run
//! documents in parallel when configured.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use quill_extension::{
    ComponentError, Extension, Metadata, OutputFormat, Page, Reader, Renderer, SyntaxTreeSource,
};
use quill_tree::{Element, Token};
use rayon::prelude::*;

use crate::error::TranslatorError;
use crate::requirements;
use crate::trees::SyntaxTrees;

/// Type alias for the file reading callback function.
pub type ReadFileFn = dyn Fn(&Path) -> io::Result<String> + Send + Sync;

/// Configuration for a translator.
pub struct TranslatorConfig {
    /// Base directory for resolving relative page sources.
    ///
    /// Default: empty, i.e. the current directory.
    pub base_dir: PathBuf,
    /// Output formats, in rendering order.
    ///
    /// Default: HTML only.
    pub formats: Vec<OutputFormat>,
    /// Whether documents are tokenized and rendered in parallel.
    ///
    /// Default: `false`
    pub parallel: bool,
    /// Callback to read page sources.
    ///
    /// Default: `std::fs::read_to_string`
    pub read_file: Option<Box<ReadFileFn>>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslatorConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::new(),
            formats: vec![OutputFormat::Html],
            parallel: false,
            read_file: None,
        }
    }

    /// Create a configuration from a loaded `quill.toml`.
    #[must_use]
    pub fn from_config(config: &quill_config::Config) -> Self {
        let resolved = &config.translator_resolved;
        Self::new()
            .with_base_dir(&resolved.source_dir)
            .with_formats(resolved.formats.iter().copied())
            .with_parallel(resolved.parallel)
    }

    /// Set the base directory for resolving relative page sources.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Set the output formats. Repeated formats are rendered once.
    #[must_use]
    pub fn with_formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.formats.clear();
        for format in formats {
            if !self.formats.contains(&format) {
                self.formats.push(format);
            }
        }
        self
    }

    /// Enable or disable parallel translation.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the file reading callback.
    #[must_use]
    pub fn with_read_file<F>(mut self, read_file: F) -> Self
    where
        F: Fn(&Path) -> io::Result<String> + Send + Sync + 'static,
    {
        self.read_file = Some(Box::new(read_file));
        self
    }

    fn source_path(&self, page: &Page) -> PathBuf {
        if page.source().is_absolute() {
            page.source().to_path_buf()
        } else {
            self.base_dir.join(page.source())
        }
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        match &self.read_file {
            Some(read_file) => read_file(path),
            None => std::fs::read_to_string(path),
        }
    }
}

impl fmt::Debug for TranslatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorConfig")
            .field("base_dir", &self.base_dir)
            .field("formats", &self.formats)
            .field("parallel", &self.parallel)
            .field("read_file", &self.read_file.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Result of translating one document.
#[derive(Debug, Clone)]
pub struct Translation {
    page: Page,
    metadata: Metadata,
    ast: Token,
    outputs: BTreeMap<OutputFormat, Element>,
}

impl Translation {
    /// Translated page.
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Metadata collected by extension hooks.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Syntax tree.
    #[must_use]
    pub fn ast(&self) -> &Token {
        &self.ast
    }

    /// Output tree for a format, if the format was rendered.
    #[must_use]
    pub fn output(&self, format: OutputFormat) -> Option<&Element> {
        self.outputs.get(&format)
    }

    /// Output trees in format order.
    pub fn outputs(&self) -> impl Iterator<Item = (OutputFormat, &Element)> {
        self.outputs.iter().map(|(format, element)| (*format, element))
    }
}

/// Per-document state between tokenizing and rendering.
struct Tokenized {
    metadata: Metadata,
    ast: Token,
}

/// Orchestrator driving extensions over a document set.
pub struct Translator {
    extensions: Vec<Arc<dyn Extension>>,
    reader: Reader,
    renderer: Renderer,
    config: TranslatorConfig,
}

impl Translator {
    /// Create a translator.
    ///
    /// Extensions are ordered so that each follows the extensions it
    /// requires, then registered in that order.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate extension names, missing or cyclic
    /// requirements, and registration failures.
    pub fn new(
        extensions: Vec<Arc<dyn Extension>>,
        config: TranslatorConfig,
    ) -> Result<Self, TranslatorError> {
        let extensions = requirements::order(extensions)?;
        let mut reader = Reader::new();
        let mut renderer = Renderer::new();

        for ext in &extensions {
            let weak: Weak<dyn Extension> = Arc::downgrade(ext);
            ext.register(
                &mut reader.scoped(Weak::clone(&weak)),
                &mut renderer.scoped(weak),
            )
            .map_err(|source| TranslatorError::Register {
                extension: ext.name().to_owned(),
                source,
            })?;
            tracing::debug!(
                extension = ext.name(),
                active = ext.is_active(),
                "Registered extension"
            );
        }

        Ok(Self {
            extensions,
            reader,
            renderer,
            config,
        })
    }

    /// Create a translator from a loaded `quill.toml`, applying its
    /// `[extensions.<name>]` tables with [`configure`](Self::configure).
    ///
    /// # Errors
    ///
    /// Returns the errors of [`new`](Self::new) and
    /// [`configure`](Self::configure).
    pub fn from_config(
        extensions: Vec<Arc<dyn Extension>>,
        config: &quill_config::Config,
    ) -> Result<Self, TranslatorError> {
        let translator = Self::new(extensions, TranslatorConfig::from_config(config))?;
        translator.configure(config)?;
        Ok(translator)
    }

    /// Apply `[extensions.<name>]` option overrides to the loaded extensions.
    ///
    /// Overrides go through [`ExtensionCore::update_config`], so the runtime
    /// `active` flag of an extension is not changed. Tables for extensions
    /// that are not loaded are skipped with a warning.
    ///
    /// [`ExtensionCore::update_config`]: quill_extension::ExtensionCore::update_config
    ///
    /// # Errors
    ///
    /// Returns [`TranslatorError::Configure`] if an extension rejects its
    /// overrides.
    pub fn configure(&self, config: &quill_config::Config) -> Result<(), TranslatorError> {
        for name in config.extension_names() {
            let Some(ext) = self.extension(name) else {
                tracing::warn!(extension = name, "Ignoring configuration for unknown extension");
                continue;
            };
            ext.core()
                .update_config(config.extension_overrides(name))
                .map_err(|source| TranslatorError::Configure {
                    extension: name.to_owned(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Restore every extension's declared configuration defaults.
    pub fn reset_config(&self) {
        for ext in &self.extensions {
            ext.core().reset_config();
        }
    }

    /// Extensions in registration order.
    #[must_use]
    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    /// Extension by name.
    #[must_use]
    pub fn extension(&self, name: &str) -> Option<&Arc<dyn Extension>> {
        self.extensions.iter().find(|ext| ext.name() == name)
    }

    /// Reader holding the registered token components.
    #[must_use]
    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Renderer holding the registered render components.
    #[must_use]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Translator configuration.
    #[must_use]
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translate `pages`, returning one [`Translation`] per page in input
    /// order.
    ///
    /// # Errors
    ///
    /// Returns the first error of any hook, read, tokenize or render step.
    /// The syntax trees are unbound from the renderer on every path.
    pub fn execute(&mut self, pages: &[Page]) -> Result<Vec<Translation>, TranslatorError> {
        let mut seen = HashSet::with_capacity(pages.len());
        if let Some(page) = pages.iter().find(|page| !seen.insert(page.name())) {
            return Err(TranslatorError::DuplicatePage(page.name().to_owned()));
        }

        tracing::info!(
            pages = pages.len(),
            formats = ?self.config.formats,
            parallel = self.config.parallel,
            "Starting translation"
        );

        self.run_hooks("pre_execute", None, |ext| ext.pre_execute(pages))?;

        let tokenized: Vec<Tokenized> = if self.config.parallel {
            pages
                .par_iter()
                .map(|page| self.tokenize_page(page))
                .collect::<Result<_, _>>()?
        } else {
            pages
                .iter()
                .map(|page| self.tokenize_page(page))
                .collect::<Result<_, _>>()?
        };

        let (metadata, asts): (Vec<Metadata>, Vec<Token>) = tokenized
            .into_iter()
            .map(|tokenized| (tokenized.metadata, tokenized.ast))
            .unzip();
        let trees: Arc<SyntaxTrees> = Arc::new(
            pages
                .iter()
                .map(|page| page.name().to_owned())
                .zip(asts)
                .collect(),
        );

        let source: Arc<dyn SyntaxTreeSource> = Arc::<SyntaxTrees>::clone(&trees);
        self.renderer.set_translator(source);
        let rendered = self.render_pages(pages, &trees);
        self.renderer.clear_translator();
        let outputs = rendered?;

        self.run_hooks("post_execute", None, |ext| ext.post_execute(pages))?;

        let mut trees = Arc::try_unwrap(trees).unwrap_or_else(|shared| SyntaxTrees::clone(&shared));
        let translations = pages
            .iter()
            .zip(metadata)
            .zip(outputs)
            .map(|((page, metadata), outputs)| Translation {
                page: page.clone(),
                metadata,
                ast: trees.take(page.name()).unwrap_or_else(Token::root),
                outputs,
            })
            .collect();

        tracing::info!(pages = pages.len(), "Translation finished");
        Ok(translations)
    }

    fn tokenize_page(&self, page: &Page) -> Result<Tokenized, TranslatorError> {
        let mut metadata = Metadata::new();
        self.run_hooks("pre_read", Some(page), |ext| ext.pre_read(&mut metadata, page))?;

        let path = self.config.source_path(page);
        let content = self.config.read(&path).map_err(|source| TranslatorError::Read {
            page: page.name().to_owned(),
            path,
            source,
        })?;

        self.run_hooks("update_metadata", Some(page), |ext| {
            ext.update_metadata(&mut metadata, &content, page)
        })?;

        let mut ast = Token::root();
        self.run_hooks("pre_tokenize", Some(page), |ext| ext.pre_tokenize(&mut ast, page))?;
        self.reader
            .tokenize(&mut ast, &content, page)
            .map_err(|source| TranslatorError::Tokenize {
                page: page.name().to_owned(),
                source,
            })?;
        self.run_hooks("post_tokenize", Some(page), |ext| ext.post_tokenize(&mut ast, page))?;

        tracing::debug!(page = %page, tokens = ast.iter().count(), "Tokenized page");
        Ok(Tokenized { metadata, ast })
    }

    fn render_pages(
        &self,
        pages: &[Page],
        trees: &SyntaxTrees,
    ) -> Result<Vec<BTreeMap<OutputFormat, Element>>, TranslatorError> {
        let render = |page: &Page| {
            let ast = trees.get(page.name()).ok_or_else(|| TranslatorError::Render {
                page: page.name().to_owned(),
                format: self.config.formats.first().copied().unwrap_or(OutputFormat::Html),
                source: ComponentError::UnknownPage {
                    page: page.name().to_owned(),
                },
            })?;
            self.render_page(page, ast)
        };

        if self.config.parallel {
            pages.par_iter().map(render).collect()
        } else {
            pages.iter().map(render).collect()
        }
    }

    fn render_page(
        &self,
        page: &Page,
        ast: &Token,
    ) -> Result<BTreeMap<OutputFormat, Element>, TranslatorError> {
        let mut outputs = BTreeMap::new();

        for &format in &self.config.formats {
            let mut root = Element::root();
            self.run_hooks("pre_render", Some(page), |ext| ext.pre_render(&mut root, format, page))?;
            self.renderer
                .render(format, ast, page, &mut root)
                .map_err(|source| TranslatorError::Render {
                    page: page.name().to_owned(),
                    format,
                    source,
                })?;
            self.run_hooks("post_render", Some(page), |ext| {
                ext.post_render(&mut root, format, page)
            })?;
            outputs.insert(format, root);
        }

        Ok(outputs)
    }

    /// Call a hook on every active extension, in registration order.
    fn run_hooks<F>(
        &self,
        hook: &'static str,
        page: Option<&Page>,
        mut call: F,
    ) -> Result<(), TranslatorError>
    where
        F: FnMut(&dyn Extension) -> Result<(), ComponentError>,
    {
        for ext in self.extensions.iter().filter(|ext| ext.is_active()) {
            call(ext.as_ref()).map_err(|source| {
                tracing::warn!(extension = ext.name(), hook, error = %source, "Hook failed");
                TranslatorError::Hook {
                    extension: ext.name().to_owned(),
                    hook,
                    page: page.map(|p| p.name().to_owned()),
                    source,
                }
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field(
                "extensions",
                &self.extensions.iter().map(|ext| ext.name()).collect::<Vec<_>>(),
            )
            .field("reader", &self.reader)
            .field("renderer", &self.renderer)
            .field("config", &self.config)
            .finish()
    }
}
