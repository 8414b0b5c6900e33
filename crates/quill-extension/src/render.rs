//! Render components: convert syntax tree tokens into output tree elements.
//!
//! A [`RenderComponent`] has one method per [`OutputFormat`]. The renderer
//! selects the method with [`RenderComponent::render`], a `match` over the
//! closed set of formats, so a component only implements the formats it
//! supports.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use quill_tree::{Element, Token};

use crate::error::ComponentError;
use crate::extension::Extension;
use crate::page::Page;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    /// HTML.
    Html,
    /// LaTeX.
    Latex,
}

impl OutputFormat {
    /// All formats.
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Html, OutputFormat::Latex];

    /// Lowercase format name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Latex => "latex",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised format name.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown output format '{0}', expected one of: html, latex")]
pub struct UnknownFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "latex" | "tex" => Ok(Self::Latex),
            _ => Err(UnknownFormat(s.to_owned())),
        }
    }
}

/// Read-only access to completed syntax trees, keyed by page name.
pub trait SyntaxTreeSource: Send + Sync {
    /// Syntax tree of a page, if the page was tokenized in this run.
    fn syntax_tree(&self, page: &str) -> Option<&Token>;
}

impl SyntaxTreeSource for HashMap<String, Token> {
    fn syntax_tree(&self, page: &str) -> Option<&Token> {
        self.get(page)
    }
}

/// Context passed to render components.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    format: OutputFormat,
    trees: Option<&'a dyn SyntaxTreeSource>,
}

impl<'a> RenderContext<'a> {
    /// Create a context. `trees` is `None` until the syntax tree source is
    /// bound after tokenization.
    #[must_use]
    pub fn new(format: OutputFormat, trees: Option<&'a dyn SyntaxTreeSource>) -> Self {
        Self { format, trees }
    }

    /// Format being rendered.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Syntax tree of another page.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::TranslatorNotSet`] before the syntax tree
    /// source is bound, and [`ComponentError::UnknownPage`] for pages without
    /// a syntax tree.
    pub fn syntax_tree(&self, page: &Page) -> Result<&'a Token, ComponentError> {
        let trees = self.trees.ok_or(ComponentError::TranslatorNotSet)?;
        trees
            .syntax_tree(page.name())
            .ok_or_else(|| ComponentError::UnknownPage {
                page: page.name().to_owned(),
            })
    }
}

impl fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("format", &self.format)
            .field("bound", &self.trees.is_some())
            .finish()
    }
}

/// Component that renders one token kind.
///
/// Each format method appends output for `token` to `parent` and returns the
/// element the token's children are rendered into, or `None` when the
/// children are handled (or dropped) by the component itself.
///
/// # Example
///
/// ```
/// use quill_extension::{ComponentError, Page, RenderComponent, RenderContext};
/// use quill_tree::{Element, Token};
///
/// struct RenderBold;
///
/// impl RenderComponent for RenderBold {
///     fn create_html<'e>(
///         &self,
///         parent: &'e mut Element,
///         _token: &Token,
///         _page: &Page,
///         _ctx: &RenderContext<'_>,
///     ) -> Result<Option<&'e mut Element>, ComponentError> {
///         Ok(Some(parent.append_element(Element::new("strong"))))
///     }
/// }
/// ```
pub trait RenderComponent: Send + Sync {
    /// Component name used in errors and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Render to HTML.
    fn create_html<'e>(
        &self,
        _parent: &'e mut Element,
        _token: &Token,
        _page: &Page,
        _ctx: &RenderContext<'_>,
    ) -> Result<Option<&'e mut Element>, ComponentError> {
        Err(self.unsupported(OutputFormat::Html))
    }

    /// Render to LaTeX.
    fn create_latex<'e>(
        &self,
        _parent: &'e mut Element,
        _token: &Token,
        _page: &Page,
        _ctx: &RenderContext<'_>,
    ) -> Result<Option<&'e mut Element>, ComponentError> {
        Err(self.unsupported(OutputFormat::Latex))
    }

    /// Render to the context's format.
    fn render<'e>(
        &self,
        parent: &'e mut Element,
        token: &Token,
        page: &Page,
        ctx: &RenderContext<'_>,
    ) -> Result<Option<&'e mut Element>, ComponentError> {
        match ctx.format() {
            OutputFormat::Html => self.create_html(parent, token, page, ctx),
            OutputFormat::Latex => self.create_latex(parent, token, page, ctx),
        }
    }

    /// Error for a format this component does not implement.
    fn unsupported(&self, format: OutputFormat) -> ComponentError {
        ComponentError::UnsupportedFormat {
            component: self.name().to_owned(),
            format,
        }
    }
}

/// Registered render component and its owning extension.
pub struct RenderUnit {
    component: Box<dyn RenderComponent>,
    extension: Weak<dyn Extension>,
}

impl RenderUnit {
    /// Wrap a component.
    #[must_use]
    pub fn new<C>(component: C, extension: Weak<dyn Extension>) -> Self
    where
        C: RenderComponent + 'static,
    {
        Self {
            component: Box::new(component),
            extension,
        }
    }

    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.component.name()
    }

    /// Owning extension, if it is still alive.
    #[must_use]
    pub fn extension(&self) -> Option<Arc<dyn Extension>> {
        self.extension.upgrade()
    }

    /// Render `token` with the component's method for the context's format.
    pub fn render<'e>(
        &self,
        parent: &'e mut Element,
        token: &Token,
        page: &Page,
        ctx: &RenderContext<'_>,
    ) -> Result<Option<&'e mut Element>, ComponentError> {
        self.component.render(parent, token, page, ctx)
    }
}

impl fmt::Debug for RenderUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderUnit")
            .field("component", &self.name())
            .finish_non_exhaustive()
    }
}
