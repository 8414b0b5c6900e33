//! Renderer: render component registry and output tree driver.
//!
//! Rendering happens in two phases. Extensions register components through
//! a [`RendererScope`] while the syntax trees do not exist yet; once every
//! document is tokenized the orchestrator binds the completed trees with
//! [`Renderer::set_translator`], after which components may look up other
//! documents through [`RenderContext::syntax_tree`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use quill_tree::{DISABLED, Element, ROOT, STRING, Token};

use crate::error::ComponentError;
use crate::extension::Extension;
use crate::page::Page;
use crate::render::{OutputFormat, RenderComponent, RenderContext, RenderUnit, SyntaxTreeSource};

/// Class of the HTML element wrapping text of disabled tokens.
pub const DISABLED_CLASS: &str = "quill-disabled";

/// Registry of render components, keyed by token name.
#[derive(Default)]
pub struct Renderer {
    components: HashMap<String, RenderUnit>,
    trees: Option<Arc<dyn SyntaxTreeSource>>,
}

impl Renderer {
    /// Create an empty renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration handle whose components belong to `extension`.
    pub fn scoped(&mut self, extension: Weak<dyn Extension>) -> RendererScope<'_> {
        RendererScope {
            renderer: self,
            extension,
        }
    }

    /// Bind the completed syntax trees.
    pub fn set_translator(&mut self, trees: Arc<dyn SyntaxTreeSource>) {
        tracing::debug!("Syntax trees bound to renderer");
        self.trees = Some(trees);
    }

    /// Unbind the syntax trees, e.g. before tokenizing the next run.
    pub fn clear_translator(&mut self) {
        self.trees = None;
    }

    /// Whether syntax trees are bound.
    #[must_use]
    pub fn has_translator(&self) -> bool {
        self.trees.is_some()
    }

    /// Registered unit for a token name.
    #[must_use]
    pub fn unit(&self, token: &str) -> Option<&RenderUnit> {
        self.components.get(token)
    }

    /// Token names with a registered component, sorted.
    #[must_use]
    pub fn token_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Render `ast` into `root`.
    ///
    /// Registered components take precedence; `Root`, `String` and
    /// `DisabledToken` tokens without one are rendered by built-in rules.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::MissingRenderer`] for tokens without a
    /// component, [`ComponentError::ExtensionUnavailable`] if a component's
    /// extension was dropped, and any error raised by a component.
    pub fn render(
        &self,
        format: OutputFormat,
        ast: &Token,
        page: &Page,
        root: &mut Element,
    ) -> Result<(), ComponentError> {
        tracing::debug!(page = %page, %format, "Rendering");
        let ctx = RenderContext::new(format, self.trees.as_deref());
        self.render_token(ast, page, &ctx, root)
    }

    fn render_token(
        &self,
        token: &Token,
        page: &Page,
        ctx: &RenderContext<'_>,
        parent: &mut Element,
    ) -> Result<(), ComponentError> {
        if let Some(unit) = self.components.get(token.name()) {
            if unit.extension().is_none() {
                return Err(ComponentError::ExtensionUnavailable {
                    component: unit.name().to_owned(),
                });
            }
            if let Some(node) = unit.render(parent, token, page, ctx)? {
                self.render_children(token, page, ctx, node)?;
            }
            return Ok(());
        }

        match token.name() {
            ROOT => self.render_children(token, page, ctx, parent),
            STRING => {
                parent.append_text(token.content().unwrap_or_default());
                Ok(())
            }
            DISABLED => {
                let text = token.content().unwrap_or_default();
                match ctx.format() {
                    OutputFormat::Html => parent
                        .append_element(Element::new("span").with_attr("class", DISABLED_CLASS))
                        .append_text(text),
                    OutputFormat::Latex => parent.append_text(text),
                }
                Ok(())
            }
            name => Err(ComponentError::MissingRenderer {
                token: name.to_owned(),
            }),
        }
    }

    fn render_children(
        &self,
        token: &Token,
        page: &Page,
        ctx: &RenderContext<'_>,
        parent: &mut Element,
    ) -> Result<(), ComponentError> {
        for child in token.children() {
            self.render_token(child, page, ctx, parent)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("components", &self.token_names())
            .field("bound", &self.has_translator())
            .finish()
    }
}

/// Registration handle passed to [`Extension::register`].
pub struct RendererScope<'r> {
    renderer: &'r mut Renderer,
    extension: Weak<dyn Extension>,
}

impl RendererScope<'_> {
    /// Register the component rendering tokens named `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::InvalidComponent`] if a component for the
    /// same token name is already registered.
    pub fn add<C>(&mut self, token: impl Into<String>, component: C) -> Result<(), ComponentError>
    where
        C: RenderComponent + 'static,
    {
        let token = token.into();
        let unit = RenderUnit::new(component, Weak::clone(&self.extension));

        if self.renderer.components.contains_key(&token) {
            return Err(ComponentError::InvalidComponent {
                component: unit.name().to_owned(),
                reason: format!("a render component for token '{token}' is already registered"),
            });
        }

        tracing::debug!(token = %token, component = unit.name(), "Registered render component");
        self.renderer.components.insert(token, unit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::extension::ExtensionCore;
    use crate::options::Options;

    struct TestExtension {
        core: ExtensionCore,
    }

    impl Extension for TestExtension {
        fn name(&self) -> &'static str {
            "test"
        }

        fn core(&self) -> &ExtensionCore {
            &self.core
        }
    }

    fn extension() -> Arc<dyn Extension> {
        Arc::new(TestExtension {
            core: ExtensionCore::with_options(Options::new()),
        })
    }

    struct RenderBold;

    impl RenderComponent for RenderBold {
        fn name(&self) -> &'static str {
            "bold"
        }

        fn create_html<'e>(
            &self,
            parent: &'e mut Element,
            _token: &Token,
            _page: &Page,
            _ctx: &RenderContext<'_>,
        ) -> Result<Option<&'e mut Element>, ComponentError> {
            Ok(Some(parent.append_element(Element::new("strong"))))
        }

        fn create_latex<'e>(
            &self,
            parent: &'e mut Element,
            _token: &Token,
            _page: &Page,
            _ctx: &RenderContext<'_>,
        ) -> Result<Option<&'e mut Element>, ComponentError> {
            Ok(Some(parent.append_element(Element::new("textbf"))))
        }
    }

    /// Renders a link whose text is the first heading of another page.
    struct RenderRef;

    impl RenderComponent for RenderRef {
        fn create_html<'e>(
            &self,
            parent: &'e mut Element,
            token: &Token,
            _page: &Page,
            ctx: &RenderContext<'_>,
        ) -> Result<Option<&'e mut Element>, ComponentError> {
            let target = Page::new(token.get("target").unwrap_or_default());
            let title = ctx
                .syntax_tree(&target)?
                .find("Heading")
                .map(Token::text)
                .unwrap_or_default();
            parent
                .append_element(Element::new("a").with_attr("href", target.name()))
                .append_text(title);
            Ok(None)
        }
    }

    fn bold_ast() -> Token {
        let mut ast = Token::root();
        ast.append_text("a ");
        ast.append(Token::new("Bold")).append_text("b");
        ast.append(Token::disabled("[x]"));
        ast
    }

    fn renderer_with(ext: &Arc<dyn Extension>) -> Renderer {
        let mut renderer = Renderer::new();
        let mut scope = renderer.scoped(Arc::downgrade(ext));
        scope.add("Bold", RenderBold).unwrap();
        scope.add("Ref", RenderRef).unwrap();
        renderer
    }

    #[test]
    fn test_render_html() {
        let ext = extension();
        let renderer = renderer_with(&ext);
        let mut root = Element::root();

        renderer
            .render(OutputFormat::Html, &bold_ast(), &Page::new("a.md"), &mut root)
            .unwrap();

        assert_eq!(
            root.to_html(),
            "a <strong>b</strong><span class=\"quill-disabled\">[x]</span>"
        );
    }

    #[test]
    fn test_render_latex() {
        let ext = extension();
        let renderer = renderer_with(&ext);
        let mut root = Element::root();

        renderer
            .render(OutputFormat::Latex, &bold_ast(), &Page::new("a.md"), &mut root)
            .unwrap();

        assert_eq!(root.to_latex(), "a \\textbf{b}[x]");
    }

    #[test]
    fn test_missing_renderer() {
        let renderer = Renderer::new();
        let mut ast = Token::root();
        ast.append(Token::new("Table"));

        let err = renderer
            .render(OutputFormat::Html, &ast, &Page::new("a.md"), &mut Element::root())
            .unwrap_err();
        assert!(matches!(err, ComponentError::MissingRenderer { ref token } if token == "Table"));
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let ext = extension();
        let mut renderer = renderer_with(&ext);
        let err = renderer
            .scoped(Arc::downgrade(&ext))
            .add("Bold", RenderBold)
            .unwrap_err();

        assert!(matches!(err, ComponentError::InvalidComponent { .. }));
        assert_eq!(renderer.token_names(), ["Bold", "Ref"]);
    }

    #[test]
    fn test_syntax_tree_requires_binding() {
        let ext = extension();
        let mut renderer = renderer_with(&ext);
        let mut ast = Token::root();
        ast.append(Token::new("Ref").with_attr("target", "b.md"));
        let page = Page::new("a.md");

        let err = renderer
            .render(OutputFormat::Html, &ast, &page, &mut Element::root())
            .unwrap_err();
        assert!(matches!(err, ComponentError::TranslatorNotSet));

        let mut other = Token::root();
        other.append(Token::new("Heading")).append_text("Setup");
        let trees: HashMap<String, Token> = HashMap::from([("b.md".to_owned(), other)]);
        renderer.set_translator(Arc::new(trees));

        let mut root = Element::root();
        renderer.render(OutputFormat::Html, &ast, &page, &mut root).unwrap();
        assert_eq!(root.to_html(), "<a href=\"b.md\">Setup</a>");

        renderer.clear_translator();
        assert!(!renderer.has_translator());
    }

    #[test]
    fn test_dropped_extension() {
        let ext = extension();
        let renderer = renderer_with(&ext);
        drop(ext);

        let err = renderer
            .render(OutputFormat::Html, &bold_ast(), &Page::new("a.md"), &mut Element::root())
            .unwrap_err();
        assert!(matches!(err, ComponentError::ExtensionUnavailable { .. }));
    }
}
