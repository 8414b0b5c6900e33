//! Extension and component contract for the Quill translation pipeline.
//!
//! Every tokenization and rendering rule of the pipeline is supplied by
//! extensions. An [`Extension`] carries configuration, a runtime enable flag
//! and declared requirements, registers components and hooks into the
//! translation lifecycle:
//!
//! - [`TokenComponent`]s turn pattern matches into syntax tree [`Token`]s,
//!   with per-match [`Settings`] resolved from declared defaults and inline
//!   `key=value` text.
//! - [`RenderComponent`]s turn tokens into output [`Element`]s, with one
//!   method per [`OutputFormat`].
//!
//! The [`Reader`] and [`Renderer`] hold the registered components and drive
//! tokenization and rendering of a single document.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use quill_extension::{
//!     ComponentError, Extension, ExtensionCore, LexerInfo, Options, OutputFormat, Page,
//!     Reader, ReaderScope, RenderComponent, RenderContext, Renderer, RendererScope,
//!     Settings, TokenComponent,
//! };
//! use quill_tree::{Element, Token};
//! use regex::Regex;
//!
//! struct Strike;
//!
//! impl TokenComponent for Strike {
//!     fn create_token<'t>(
//!         &self,
//!         parent: &'t mut Token,
//!         _info: &LexerInfo,
//!         _page: &Page,
//!         _settings: &Settings,
//!     ) -> Result<&'t mut Token, ComponentError> {
//!         Ok(parent.append(Token::new("Strike")))
//!     }
//! }
//!
//! struct RenderStrike;
//!
//! impl RenderComponent for RenderStrike {
//!     fn create_html<'e>(
//!         &self,
//!         parent: &'e mut Element,
//!         _token: &Token,
//!         _page: &Page,
//!         _ctx: &RenderContext<'_>,
//!     ) -> Result<Option<&'e mut Element>, ComponentError> {
//!         Ok(Some(parent.append_element(Element::new("del"))))
//!     }
//! }
//!
//! struct StrikeExtension {
//!     core: ExtensionCore,
//! }
//!
//! impl Extension for StrikeExtension {
//!     fn name(&self) -> &str {
//!         "strike"
//!     }
//!
//!     fn core(&self) -> &ExtensionCore {
//!         &self.core
//!     }
//!
//!     fn register(
//!         &self,
//!         reader: &mut ReaderScope<'_>,
//!         renderer: &mut RendererScope<'_>,
//!     ) -> Result<(), ComponentError> {
//!         reader.add("strike", Regex::new(r"~~(?P<inner>.+?)~~").unwrap(), Strike)?;
//!         renderer.add("Strike", RenderStrike)
//!     }
//! }
//!
//! let ext: Arc<dyn Extension> = Arc::new(StrikeExtension {
//!     core: ExtensionCore::with_options(Options::new()),
//! });
//!
//! let mut reader = Reader::new();
//! let mut renderer = Renderer::new();
//! ext.register(
//!     &mut reader.scoped(Arc::downgrade(&ext)),
//!     &mut renderer.scoped(Arc::downgrade(&ext)),
//! )
//! .unwrap();
//!
//! let page = Page::new("index.md");
//! let mut ast = Token::root();
//! reader.tokenize(&mut ast, "a ~~b~~", &page).unwrap();
//!
//! let mut html = Element::root();
//! renderer.render(OutputFormat::Html, &ast, &page, &mut html).unwrap();
//! assert_eq!(html.to_html(), "a <del>b</del>");
//! ```

mod error;
mod extension;
mod options;
mod page;
mod reader;
mod render;
mod renderer;
mod settings;
mod token;

pub use error::{ComponentError, OptionsError, SettingsError};
pub use extension::{ACTIVE, Extension, ExtensionCore};
pub use options::{Config, OptionSpec, Options, Value};
pub use page::{Metadata, Page};
pub use reader::{INNER_GROUP, LexerInfo, Reader, ReaderScope, SETTINGS_GROUP};
pub use render::{
    OutputFormat, RenderComponent, RenderContext, RenderUnit, SyntaxTreeSource, UnknownFormat,
};
pub use renderer::{DISABLED_CLASS, Renderer, RendererScope};
pub use settings::{Resolved, Settings, UnknownKeys, parse_value, resolve};
pub use token::{TokenComponent, TokenUnit, base_settings};

#[doc(no_inline)]
pub use quill_tree::{Element, Token};
