//! Token components: turn a pattern match into a syntax tree node.
//!
//! A [`TokenComponent`] is written by extension authors. The reader wraps
//! each registered component in a [`TokenUnit`], which owns the validated
//! default settings and a back-reference to the owning extension, and which
//! is invoked once per pattern match in every document.
//!
//! Effective settings are computed per invocation and passed to
//! [`TokenComponent::create_token`] as an argument. Nothing about a call is
//! stored on the unit, so a unit can serve any number of matches, including
//! concurrently from different documents.

use std::fmt;
use std::sync::{Arc, Weak};

use quill_tree::Token;

use crate::error::ComponentError;
use crate::extension::Extension;
use crate::options::Options;
use crate::page::Page;
use crate::reader::LexerInfo;
use crate::settings::{Settings, UnknownKeys, resolve};

/// Settings every token component declares: output `style`, `class` and `id`.
#[must_use]
pub fn base_settings() -> Options {
    Options::new()
        .with("style", "", "The style settings that are passed to the rendered tag.")
        .with("class", "", "The class settings that are passed to the rendered tag.")
        .with("id", "", "The id that is passed to the rendered tag.")
}

/// Component that creates syntax tree tokens from pattern matches.
///
/// # Example
///
/// ```
/// use quill_extension::{ComponentError, LexerInfo, Page, Settings, TokenComponent};
/// use quill_tree::Token;
///
/// struct Keyboard;
///
/// impl TokenComponent for Keyboard {
///     fn create_token<'t>(
///         &self,
///         parent: &'t mut Token,
///         info: &LexerInfo,
///         _page: &Page,
///         settings: &Settings,
///     ) -> Result<&'t mut Token, ComponentError> {
///         let mut token = Token::new("Keyboard").with_attr("keys", info.get("keys").unwrap_or(""));
///         for (key, value) in settings.attributes() {
///             token.set(key, value);
///         }
///         Ok(parent.append(token))
///     }
/// }
/// ```
pub trait TokenComponent: Send + Sync {
    /// Component name used in errors and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Declared settings and their defaults.
    ///
    /// Evaluated once, when the component is wrapped in a [`TokenUnit`].
    fn default_settings(&self) -> Options {
        base_settings()
    }

    /// Whether a `settings` capture in the match is parsed.
    ///
    /// When `false`, any settings capture is ignored and the defaults apply.
    fn parse_settings(&self) -> bool {
        true
    }

    /// Create the token for one match.
    ///
    /// Returns the node that becomes the parent for tokenizing the match's
    /// `inner` capture: usually the newly appended child, or `parent` itself
    /// when nothing nests inside the match.
    fn create_token<'t>(
        &self,
        parent: &'t mut Token,
        info: &LexerInfo,
        page: &Page,
        settings: &Settings,
    ) -> Result<&'t mut Token, ComponentError>;
}

/// Registered token component with validated defaults and its owning
/// extension.
pub struct TokenUnit {
    component: Box<dyn TokenComponent>,
    defaults: Options,
    extension: Weak<dyn Extension>,
}

impl TokenUnit {
    /// Wrap a component.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::InvalidComponent`] if the component's default
    /// settings do not form a table the inline settings format can address:
    /// every name must be non-empty and free of whitespace and `=`.
    pub fn new<C>(component: C, extension: Weak<dyn Extension>) -> Result<Self, ComponentError>
    where
        C: TokenComponent + 'static,
    {
        let defaults = component.default_settings();

        if let Some(name) = defaults
            .names()
            .find(|name| name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '='))
        {
            return Err(ComponentError::InvalidComponent {
                component: component.name().to_owned(),
                reason: format!("default settings must be a table of settings names, got '{name}'"),
            });
        }

        Ok(Self {
            component: Box::new(component),
            defaults,
            extension,
        })
    }

    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.component.name()
    }

    /// Validated default settings.
    #[must_use]
    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Owning extension, if it is still alive.
    #[must_use]
    pub fn extension(&self) -> Option<Arc<dyn Extension>> {
        self.extension.upgrade()
    }

    /// Invoke the component for one match.
    ///
    /// If the owning extension is inactive, a [`quill_tree::DISABLED`] token
    /// preserving the matched text is appended and `parent` is returned; the
    /// component is not called. Otherwise the effective settings are resolved
    /// from the match and passed to [`TokenComponent::create_token`].
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Settings`] for unknown or malformed inline
    /// settings, [`ComponentError::ExtensionUnavailable`] if the owning
    /// extension was dropped, and any error from the component.
    pub fn invoke<'t>(
        &self,
        parent: &'t mut Token,
        info: &LexerInfo,
        page: &Page,
    ) -> Result<&'t mut Token, ComponentError> {
        if !self.extension_active()? {
            return Ok(self.disable(parent, info, page));
        }

        let settings = self.effective_settings(info)?;
        self.component.create_token(parent, info, page, &settings)
    }

    /// Invoke the component with settings supplied by the caller.
    ///
    /// Used when a component is called programmatically rather than through
    /// a pattern match; no inline settings are parsed. The inactive-extension
    /// placeholder behaviour of [`invoke`](Self::invoke) still applies.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ExtensionUnavailable`] if the owning
    /// extension was dropped, and any error from the component.
    pub fn invoke_with_settings<'t>(
        &self,
        parent: &'t mut Token,
        info: &LexerInfo,
        page: &Page,
        settings: &Settings,
    ) -> Result<&'t mut Token, ComponentError> {
        if !self.extension_active()? {
            return Ok(self.disable(parent, info, page));
        }

        self.component.create_token(parent, info, page, settings)
    }

    /// Effective settings for a match: defaults overridden by the match's
    /// `settings` capture, unless the component disables settings parsing.
    /// Text before the first `key=value` pair is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Settings`] for unknown or malformed inline
    /// settings.
    pub fn effective_settings(&self, info: &LexerInfo) -> Result<Settings, ComponentError> {
        match info.settings() {
            Some(raw) if self.component.parse_settings() => {
                let resolved = resolve(&self.defaults, raw, UnknownKeys::Reject).map_err(|source| {
                    ComponentError::Settings {
                        component: self.name().to_owned(),
                        source,
                    }
                })?;
                if !resolved.leftover.is_empty() {
                    tracing::trace!(
                        component = self.name(),
                        leftover = %resolved.leftover,
                        "Ignoring settings text outside key=value pairs"
                    );
                }
                Ok(resolved.settings)
            }
            _ => Ok(Settings::from_defaults(&self.defaults)),
        }
    }

    fn extension_active(&self) -> Result<bool, ComponentError> {
        self.extension
            .upgrade()
            .map(|extension| extension.is_active())
            .ok_or_else(|| ComponentError::ExtensionUnavailable {
                component: self.name().to_owned(),
            })
    }

    fn disable<'t>(&self, parent: &'t mut Token, info: &LexerInfo, page: &Page) -> &'t mut Token {
        tracing::trace!(
            component = self.name(),
            page = %page,
            line = info.line(),
            "Extension inactive, preserving matched text"
        );
        parent.append(Token::disabled(info.text()));
        parent
    }
}

impl fmt::Debug for TokenUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenUnit")
            .field("component", &self.name())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::extension::ExtensionCore;
    use crate::options::Value;

    struct TestExtension {
        core: ExtensionCore,
    }

    impl TestExtension {
        fn new(active: bool) -> Arc<Self> {
            let core = ExtensionCore::with_options(Options::new());
            core.set_active(active);
            Arc::new(Self { core })
        }
    }

    impl Extension for TestExtension {
        fn name(&self) -> &'static str {
            "test"
        }

        fn core(&self) -> &ExtensionCore {
            &self.core
        }
    }

    /// Counts calls and records the settings each call observed.
    #[derive(Default)]
    struct Recorder {
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<Settings>>>,
        parse: bool,
    }

    impl TokenComponent for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn default_settings(&self) -> Options {
            base_settings().with("width", 100, "Width")
        }

        fn parse_settings(&self) -> bool {
            self.parse
        }

        fn create_token<'t>(
            &self,
            parent: &'t mut Token,
            info: &LexerInfo,
            _page: &Page,
            settings: &Settings,
        ) -> Result<&'t mut Token, ComponentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(settings.clone());
            Ok(parent.append(Token::new("X").with_attr("text", info.text())))
        }
    }

    fn recorder(parse: bool) -> (Recorder, Arc<AtomicUsize>, Arc<Mutex<Vec<Settings>>>) {
        let component = Recorder {
            parse,
            ..Default::default()
        };
        let calls = Arc::clone(&component.calls);
        let seen = Arc::clone(&component.seen);
        (component, calls, seen)
    }

    fn unit_for(component: Recorder, extension: &Arc<TestExtension>) -> TokenUnit {
        let weak: Weak<dyn Extension> = Arc::downgrade(extension) as Weak<dyn Extension>;
        TokenUnit::new(component, weak).unwrap()
    }

    #[test]
    fn test_inactive_extension_emits_disabled_token() {
        let extension = TestExtension::new(false);
        let (component, calls, _) = recorder(true);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("check", "[x]").with_group("settings", "id=ignored");
        let returned = unit.invoke(&mut root, &info, &Page::new("a.md")).unwrap();

        assert_eq!(returned.name(), "Root");
        assert_eq!(root.children(), &[Token::disabled("[x]")]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inactive_extension_skips_settings_parsing() {
        let extension = TestExtension::new(false);
        let (component, calls, _) = recorder(true);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("check", "[x]").with_group("settings", "bogus=1");
        unit.invoke(&mut root, &info, &Page::new("a.md")).unwrap();

        assert_eq!(root.children()[0].content(), Some("[x]"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_active_extension_creates_token() {
        let extension = TestExtension::new(true);
        let (component, calls, _) = recorder(true);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("check", "[x]");
        let returned = unit.invoke(&mut root, &info, &Page::new("a.md")).unwrap();

        assert_eq!(returned.name(), "X");
        assert_eq!(root.children()[0].get("text"), Some("[x]"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_toggling_active_between_calls() {
        let extension = TestExtension::new(true);
        let (component, calls, _) = recorder(true);
        let unit = unit_for(component, &extension);
        let page = Page::new("a.md");
        let info = LexerInfo::new("check", "[x]");

        let mut root = Token::root();
        unit.invoke(&mut root, &info, &page).unwrap();
        extension.set_active(false);
        unit.invoke(&mut root, &info, &page).unwrap();

        let names: Vec<&str> = root.children().iter().map(Token::name).collect();
        assert_eq!(names, ["X", "DisabledToken"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inline_settings_override_defaults() {
        let extension = TestExtension::new(true);
        let (component, _, seen) = recorder(true);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("check", "[x]").with_group("settings", "id=first width=5");
        unit.invoke(&mut root, &info, &Page::new("a.md")).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get_str("id"), Some("first"));
        assert_eq!(seen[0].get("width"), Some(&Value::from(5)));
        assert_eq!(seen[0].get_str("style"), Some(""));
    }

    #[test]
    fn test_settings_do_not_leak_between_calls() {
        let extension = TestExtension::new(true);
        let (component, _, seen) = recorder(true);
        let unit = unit_for(component, &extension);
        let page = Page::new("a.md");

        let mut root = Token::root();
        let with = LexerInfo::new("check", "[x]").with_group("settings", "id=first");
        let without = LexerInfo::new("check", "[y]");
        unit.invoke(&mut root, &with, &page).unwrap();
        unit.invoke(&mut root, &without, &page).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].get_str("id"), Some("first"));
        assert_eq!(seen[1], Settings::from_defaults(unit.defaults()));
    }

    #[test]
    fn test_unknown_setting_is_error_and_unit_reusable() {
        let extension = TestExtension::new(true);
        let (component, calls, seen) = recorder(true);
        let unit = unit_for(component, &extension);
        let page = Page::new("a.md");

        let mut root = Token::root();
        let bad = LexerInfo::new("check", "[x]").with_group("settings", "colour=red");
        let err = unit.invoke(&mut root, &bad, &page).unwrap_err();
        assert!(matches!(err, ComponentError::Settings { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(root.children().is_empty());

        let good = LexerInfo::new("check", "[y]");
        unit.invoke(&mut root, &good, &page).unwrap();
        assert_eq!(seen.lock().unwrap()[0], Settings::from_defaults(unit.defaults()));
    }

    #[test]
    fn test_leftover_settings_text_ignored() {
        let extension = TestExtension::new(true);
        let (component, calls, seen) = recorder(true);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("media", "!media").with_group("settings", "caption text id=x");
        unit.invoke(&mut root, &info, &Page::new("a.md")).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap()[0].get_str("id"), Some("x"));
    }

    #[test]
    fn test_parsing_disabled_ignores_settings_capture() {
        let extension = TestExtension::new(true);
        let (component, _, seen) = recorder(false);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("check", "[x]").with_group("settings", "id=x");
        unit.invoke(&mut root, &info, &Page::new("a.md")).unwrap();

        assert_eq!(seen.lock().unwrap()[0].get_str("id"), Some(""));
    }

    #[test]
    fn test_invoke_with_settings_bypasses_parsing() {
        let extension = TestExtension::new(true);
        let (component, _, seen) = recorder(true);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("command", "!x").with_group("settings", "colour=red");
        let settings = Settings::new().with("id", "injected");
        unit.invoke_with_settings(&mut root, &info, &Page::new("a.md"), &settings)
            .unwrap();

        assert_eq!(seen.lock().unwrap()[0], settings);
    }

    #[test]
    fn test_invoke_with_settings_respects_inactive() {
        let extension = TestExtension::new(false);
        let (component, calls, _) = recorder(true);
        let unit = unit_for(component, &extension);

        let mut root = Token::root();
        let info = LexerInfo::new("command", "!x");
        unit.invoke_with_settings(&mut root, &info, &Page::new("a.md"), &Settings::new())
            .unwrap();

        assert_eq!(root.children(), &[Token::disabled("!x")]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_default_settings_rejected_at_construction() {
        struct BadSettings;

        impl TokenComponent for BadSettings {
            fn name(&self) -> &'static str {
                "bad"
            }

            fn default_settings(&self) -> Options {
                Options::new().with("not a key", "", "Whitespace in a settings name")
            }

            fn create_token<'t>(
                &self,
                parent: &'t mut Token,
                _info: &LexerInfo,
                _page: &Page,
                _settings: &Settings,
            ) -> Result<&'t mut Token, ComponentError> {
                Ok(parent)
            }
        }

        let extension = TestExtension::new(true);
        let weak: Weak<dyn Extension> = Arc::downgrade(&extension) as Weak<dyn Extension>;
        let err = TokenUnit::new(BadSettings, weak).unwrap_err();

        assert!(matches!(
            err,
            ComponentError::InvalidComponent { ref component, .. } if component == "bad"
        ));
    }

    #[test]
    fn test_dropped_extension_is_error() {
        let extension = TestExtension::new(true);
        let (component, _, _) = recorder(true);
        let unit = unit_for(component, &extension);
        drop(extension);

        let mut root = Token::root();
        let err = unit
            .invoke(&mut root, &LexerInfo::new("check", "[x]"), &Page::new("a.md"))
            .unwrap_err();
        assert!(matches!(err, ComponentError::ExtensionUnavailable { .. }));
        assert!(unit.extension().is_none());
    }

    #[test]
    fn test_default_name_is_type_name() {
        struct Plain;

        impl TokenComponent for Plain {
            fn create_token<'t>(
                &self,
                parent: &'t mut Token,
                _info: &LexerInfo,
                _page: &Page,
                _settings: &Settings,
            ) -> Result<&'t mut Token, ComponentError> {
                Ok(parent)
            }
        }

        assert!(Plain.name().ends_with("Plain"));
        assert_eq!(Plain.default_settings().names().collect::<Vec<_>>(), ["style", "class", "id"]);
    }
}
