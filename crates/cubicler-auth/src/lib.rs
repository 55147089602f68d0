//! JWT bearer verification for the broker's HTTP surface (spec §6).
//!
//! A single [`JwtVerifier`] is configured with a decoding key plus the
//! issuer/audience checks the deployment cares about, and every failure
//! mode maps onto one of the literal error codes the spec names so
//! `cubicler-server` can turn them into a 401 body unchanged.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

/// One of the literal codes spec §6 names for a failed bearer check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingAuthHeader,
    #[error("Authorization header does not use the Bearer scheme")]
    InvalidAuthScheme,
    #[error("Authorization header carries no token")]
    MissingToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("token is malformed or has an invalid signature")]
    TokenInvalid,
    #[error("token issuer does not match the expected issuer")]
    IssuerMismatch,
    #[error("token audience does not match the expected audience")]
    AudienceMismatch,
    #[error("token verification failed")]
    TokenVerificationFailed,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAuthHeader => "MISSING_AUTH_HEADER",
            Self::InvalidAuthScheme => "INVALID_AUTH_SCHEME",
            Self::MissingToken => "MISSING_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::IssuerMismatch => "ISSUER_MISMATCH",
            Self::AudienceMismatch => "AUDIENCE_MISMATCH",
            Self::TokenVerificationFailed => "TOKEN_VERIFICATION_FAILED",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<serde_json::Value>,
}

pub struct JwtVerifier {
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Parses `header_value` as an `Authorization` header and verifies the
    /// bearer token it carries, returning the first matching error code.
    pub fn verify_header(&self, header_value: Option<&str>) -> Result<(), AuthError> {
        let header = header_value.ok_or(AuthError::MissingAuthHeader)?;
        let token = extract_bearer(header)?;
        self.verify_token(token)
    }

    pub fn verify_token(&self, token: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(classify)?;

        if let Some(expected) = &self.audience {
            let matches = match &data.claims.aud {
                Some(serde_json::Value::String(s)) => s == expected,
                Some(serde_json::Value::Array(values)) => {
                    values.iter().any(|v| v.as_str() == Some(expected.as_str()))
                }
                _ => false,
            };
            if !matches {
                return Err(AuthError::AudienceMismatch);
            }
        }

        Ok(())
    }
}

fn extract_bearer(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthScheme);
    }
    match parts.next().map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MissingToken),
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::InvalidToken | ErrorKind::InvalidSignature | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
            AuthError::TokenInvalid
        }
        _ => AuthError::TokenVerificationFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn token_with(claims: serde_json::Value, secret: &[u8]) -> String {
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn missing_header_is_missing_auth_header() {
        let verifier = JwtVerifier::new(b"secret", Algorithm::HS256);
        assert_eq!(verifier.verify_header(None).unwrap_err(), AuthError::MissingAuthHeader);
    }

    #[test]
    fn non_bearer_scheme_is_invalid_scheme() {
        let verifier = JwtVerifier::new(b"secret", Algorithm::HS256);
        assert_eq!(
            verifier.verify_header(Some("Basic abc123")).unwrap_err(),
            AuthError::InvalidAuthScheme
        );
    }

    #[test]
    fn bearer_with_no_token_is_missing_token() {
        let verifier = JwtVerifier::new(b"secret", Algorithm::HS256);
        assert_eq!(verifier.verify_header(Some("Bearer ")).unwrap_err(), AuthError::MissingToken);
    }

    #[test]
    fn valid_token_passes() {
        let secret = b"secret";
        let token = token_with(json!({"sub": "agent-1", "exp": 9999999999u64}), secret);
        let verifier = JwtVerifier::new(secret, Algorithm::HS256);
        assert!(verifier.verify_header(Some(&format!("Bearer {token}"))).is_ok());
    }

    #[test]
    fn wrong_secret_is_token_invalid() {
        let token = token_with(json!({"sub": "agent-1", "exp": 9999999999u64}), b"secret");
        let verifier = JwtVerifier::new(b"other", Algorithm::HS256);
        assert_eq!(verifier.verify_token(&token).unwrap_err(), AuthError::TokenInvalid);
    }

    #[test]
    fn expired_token_is_token_expired() {
        let token = token_with(json!({"sub": "agent-1", "exp": 1u64}), b"secret");
        let verifier = JwtVerifier::new(b"secret", Algorithm::HS256);
        assert_eq!(verifier.verify_token(&token).unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn issuer_mismatch_is_reported() {
        let token = token_with(json!({"sub": "a", "exp": 9999999999u64, "iss": "wrong"}), b"secret");
        let verifier = JwtVerifier::new(b"secret", Algorithm::HS256).with_issuer("expected");
        assert_eq!(verifier.verify_token(&token).unwrap_err(), AuthError::IssuerMismatch);
    }

    #[test]
    fn audience_mismatch_is_reported() {
        let token = token_with(json!({"sub": "a", "exp": 9999999999u64, "aud": "wrong"}), b"secret");
        let verifier = JwtVerifier::new(b"secret", Algorithm::HS256).with_audience("expected");
        assert_eq!(verifier.verify_token(&token).unwrap_err(), AuthError::AudienceMismatch);
    }
}
