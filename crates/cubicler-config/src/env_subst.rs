use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{env\.([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("valid regex"))
}

/// Replace every `{{env.NAME}}` placeholder in `raw` with the value of the
/// process environment variable `NAME`, substituting the empty string when
/// unset (spec §6).
pub fn substitute_env(raw: &str) -> String {
    pattern()
        .replace_all(raw, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn substitutes_known_variable() {
        // SAFETY: test-local env var, not shared mutable process state of concern here.
        unsafe {
            std::env::set_var("CUBICLER_TEST_TOKEN", "secret123");
        }
        let raw = r#"{"token": "{{env.CUBICLER_TEST_TOKEN}}"}"#;
        assert_eq!(substitute_env(raw), r#"{"token": "secret123"}"#);
    }

    #[test]
    fn unset_variable_substitutes_empty_string() {
        unsafe {
            std::env::remove_var("CUBICLER_TEST_UNSET_XYZ");
        }
        let raw = r#"{"v": "{{env.CUBICLER_TEST_UNSET_XYZ}}"}"#;
        assert_eq!(substitute_env(raw), r#"{"v": ""}"#);
    }

    #[test]
    fn leaves_non_placeholder_text_untouched() {
        let raw = "no placeholders here {{not.env}}";
        assert_eq!(substitute_env(raw), raw);
    }
}
