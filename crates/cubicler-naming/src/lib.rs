//! Pure tool-naming functions: hash tokens, snake_case conversion, and the
//! `{token}_{function}` encode/parse pair described in spec §4.2.
//!
//! Nothing here talks to a provider or a config file — the token is the
//! authoritative key for routing an agent-visible tool name back to the
//! server that owns it; parsing a human name at call time is exactly the
//! anti-pattern this module exists to avoid.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Reserved prefix for synthesized internal tools (`cubicler_available_servers`, ...).
pub const INTERNAL_PREFIX: &str = "cubicler_";

/// Length, in hex characters, of a server hash token.
pub const HASH_LEN: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("malformed tool name: {0}")]
    MalformedToolName(String),
}

/// The result of [`parse`]: either an internal tool or a routed external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTool {
    Internal { name: String },
    External { token: String, function: String },
}

/// Derive the stable 6-hex-character opaque token for a server.
///
/// Deterministic in `(identifier, endpoint)`: identical inputs always yield
/// the same token, and distinct inputs yield distinct tokens with
/// overwhelming probability (first 24 bits of a SHA-256 digest).
pub fn hash(identifier: &str, endpoint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.update(b"||");
    hasher.update(endpoint.as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    hex[..HASH_LEN].to_string()
}

/// Convert an arbitrary human identifier to `snake_case`.
///
/// Idempotent: `snake(snake(x)) == snake(x)`.
pub fn snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_is_lower_or_digit = false;
    let mut prev_emitted_underscore = true; // suppress leading underscore

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && prev_is_lower_or_digit {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_is_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            prev_emitted_underscore = false;
        } else if !prev_emitted_underscore {
            out.push('_');
            prev_is_lower_or_digit = false;
            prev_emitted_underscore = true;
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Build the agent-visible name for an external tool: `{token}_{snake(function)}`.
pub fn tool_name(token: &str, function: &str) -> String {
    format!("{token}_{}", snake(function))
}

/// Build the reserved name for an internal tool: `cubicler_{snake(name)}`.
pub fn internal_tool_name(name: &str) -> String {
    format!("{INTERNAL_PREFIX}{}", snake(name))
}

/// Parse an agent-visible tool name back into its routing components.
///
/// External form requires exactly a 6-character token followed by `_` and a
/// non-empty function portion; anything shorter or missing the separator is
/// [`NamingError::MalformedToolName`].
pub fn parse(name: &str) -> Result<ParsedTool, NamingError> {
    if let Some(rest) = name.strip_prefix(INTERNAL_PREFIX) {
        return Ok(ParsedTool::Internal {
            name: rest.to_string(),
        });
    }

    let Some(sep) = name.find('_') else {
        return Err(NamingError::MalformedToolName(name.to_string()));
    };

    let (token, rest) = name.split_at(sep);
    let function = &rest[1..];

    if token.len() != HASH_LEN || function.is_empty() {
        return Err(NamingError::MalformedToolName(name.to_string()));
    }

    Ok(ParsedTool::External {
        token: token.to_string(),
        function: function.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hash_is_deterministic_and_six_hex_chars() {
        let a = hash("wx", "http://wx:9");
        let b = hash("wx", "http://wx:9");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = hash("wx", "http://wx:9");
        let b = hash("wx2", "http://wx:9");
        let c = hash("wx", "http://wx:10");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn snake_is_idempotent() {
        for sample in ["GetCurrentWeather", "get_current", "Get-Current Weather", "already_snake"] {
            let once = snake(sample);
            let twice = snake(&once);
            assert_eq!(once, twice, "not idempotent for {sample}");
        }
    }

    #[test]
    fn snake_converts_camel_and_punctuation() {
        assert_eq!(snake("getCurrentWeather"), "get_current_weather");
        assert_eq!(snake("Get Current-Weather"), "get_current_weather");
        assert_eq!(snake("HTTPServer"), "h_t_t_p_server");
    }

    #[test]
    fn tool_name_round_trips_through_parse() {
        let token = hash("wx", "http://wx:9");
        let name = tool_name(&token, "get_current");
        match parse(&name).unwrap() {
            ParsedTool::External { token: t, function } => {
                assert_eq!(t, token);
                assert_eq!(function, "get_current");
            }
            other => panic!("expected external, got {other:?}"),
        }
    }

    #[test]
    fn internal_tool_parses_as_internal() {
        let name = internal_tool_name("available_servers");
        assert_eq!(name, "cubicler_available_servers");
        assert_eq!(
            parse(&name).unwrap(),
            ParsedTool::Internal {
                name: "available_servers".to_string()
            }
        );
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(matches!(
            parse("noseparatorhere"),
            Err(NamingError::MalformedToolName(_))
        ));
    }

    #[test]
    fn parse_rejects_wrong_token_length() {
        assert!(matches!(
            parse("short_get_current"),
            Err(NamingError::MalformedToolName(_))
        ));
        assert!(matches!(
            parse("toolongtoken_get_current"),
            Err(NamingError::MalformedToolName(_))
        ));
    }

    #[test]
    fn parse_rejects_empty_function() {
        assert!(matches!(
            parse("7f3c1a_"),
            Err(NamingError::MalformedToolName(_))
        ));
    }
}
