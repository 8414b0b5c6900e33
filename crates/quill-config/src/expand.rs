//! Environment variable expansion for configuration values.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Bare `$VAR` and `$` followed by anything else are left as is.

use std::sync::LazyLock;

use regex::Regex;

use crate::ConfigError;

/// `${NAME}` or `${NAME:-default}`.
static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap());

/// Expand environment variable references in a string.
///
/// `field` is the dotted config path reported in errors.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(value.len());
    let mut last = 0;

    for caps in VAR_RE.captures_iter(value) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        result.push_str(&value[last..whole.start()]);

        match (std::env::var(name.as_str()), caps.get(2)) {
            (Ok(var), _) => result.push_str(&var),
            (Err(_), Some(default)) => result.push_str(default.as_str()),
            (Err(_), None) => {
                return Err(ConfigError::EnvVar {
                    field: field.to_owned(),
                    message: format!("${{{}}} not set", name.as_str()),
                });
            }
        }
        last = whole.end();
    }

    result.push_str(&value[last..]);
    Ok(result)
}

/// Expand every string inside a TOML value, descending into arrays and
/// tables.
pub(crate) fn expand_value(value: &mut toml::Value, field: &str) -> Result<(), ConfigError> {
    match value {
        toml::Value::String(s) => *s = expand_env(s, field)?,
        toml::Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                expand_value(item, &format!("{field}[{index}]"))?;
            }
        }
        toml::Value::Table(table) => {
            for (key, item) in table.iter_mut() {
                expand_value(item, &format!("{field}.{key}"))?;
            }
        }
        toml::Value::Integer(_)
        | toml::Value::Float(_)
        | toml::Value::Boolean(_)
        | toml::Value::Datetime(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_with_default_uses_default() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUILL_UNSET_PREFIX");
        }
        let result = expand_env("${QUILL_UNSET_PREFIX:-Figure}", "extensions.figures.prefix").unwrap();
        assert_eq!(result, "Figure");
    }

    #[test]
    fn test_expand_embedded_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("QUILL_TEST_HOST", "docs.example.com");
        }
        let result = expand_env("https://${QUILL_TEST_HOST}/api", "test.url").unwrap();
        assert_eq!(result, "https://docs.example.com/api");
        unsafe {
            std::env::remove_var("QUILL_TEST_HOST");
        }
    }

    #[test]
    fn test_expand_missing_var_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUILL_MISSING_VAR");
        }
        let err = expand_env("${QUILL_MISSING_VAR}", "extensions.links.base").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("QUILL_MISSING_VAR"));
        assert!(err.to_string().contains("extensions.links.base"));
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        assert_eq!(expand_env("costs $5", "test.field").unwrap(), "costs $5");
    }

    #[test]
    fn test_bare_dollar_kept_next_to_braced_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("QUILL_TEST_BARE", "EXPANDED");
            std::env::remove_var("QUILL_UNSET_MIXED");
        }
        let result = expand_env("$QUILL_TEST_BARE and ${QUILL_UNSET_MIXED:-d}", "test.field").unwrap();
        assert_eq!(result, "$QUILL_TEST_BARE and d");

        let result = expand_env("costs $5 ${QUILL_UNSET_MIXED:-d}", "test.field").unwrap();
        assert_eq!(result, "costs $5 d");

        let result = expand_env("${1} ${QUILL_TEST_BARE}", "test.field").unwrap();
        assert_eq!(result, "${1} EXPANDED");
        unsafe {
            std::env::remove_var("QUILL_TEST_BARE");
        }
    }

    #[test]
    fn test_expand_value_descends() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("QUILL_TEST_LANG", "de");
        }
        let mut value: toml::Value = toml::from_str::<toml::Table>(
            r#"
langs = ["en", "${QUILL_TEST_LANG}"]
nested = { label = "${QUILL_TEST_LANG}-label", depth = 2 }
"#,
        )
        .map(toml::Value::Table)
        .unwrap();

        expand_value(&mut value, "extensions.i18n").unwrap();

        assert_eq!(value["langs"][1].as_str(), Some("de"));
        assert_eq!(value["nested"]["label"].as_str(), Some("de-label"));
        assert_eq!(value["nested"]["depth"].as_integer(), Some(2));
        unsafe {
            std::env::remove_var("QUILL_TEST_LANG");
        }
    }

    #[test]
    fn test_expand_value_reports_array_path() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUILL_MISSING_ITEM");
        }
        let mut value = toml::Value::Array(vec![
            toml::Value::from("ok"),
            toml::Value::from("${QUILL_MISSING_ITEM}"),
        ]);

        let err = expand_value(&mut value, "extensions.x.items").unwrap_err();
        assert!(err.to_string().contains("extensions.x.items[1]"));
    }
}
