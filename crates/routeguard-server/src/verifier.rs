//! Bearer token verification.
//!
//! Tokens are HS256 JWTs signed with the shared secret from
//! `[auth]` config. Verification produces an [`Identity`] carrying the
//! full claims object; the authorization engine reads roles and claims
//! from it without any further schema.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use routeguard_authz::Identity;
use serde_json::Value;

use crate::config::AuthConfig;

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Verifies signature, expiry, and the configured issuer and audience.
    pub fn verify(&self, token: &str) -> Result<Identity, jsonwebtoken::errors::Error> {
        let data = decode::<Value>(token, &self.key, &self.validation)?;
        Ok(Identity::new(data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn sign(secret: &str, claims: &Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
            + 3600
    }

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            secret: secret.into(),
            issuer: None,
            audience: None,
        }
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let verifier = TokenVerifier::new(&config("s3cret"));
        let token = sign("s3cret", &json!({"sub": "u1", "exp": future_exp()}));
        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.subject(), Some("u1"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let verifier = TokenVerifier::new(&config("s3cret"));
        let token = sign("other", &json!({"sub": "u1", "exp": future_exp()}));
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let verifier = TokenVerifier::new(&config("s3cret"));
        let token = sign("s3cret", &json!({"sub": "u1", "exp": 1}));
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_issuer_is_enforced_when_configured() {
        let verifier = TokenVerifier::new(&AuthConfig {
            secret: "s3cret".into(),
            issuer: Some("https://idp.example".into()),
            audience: None,
        });
        let good = sign(
            "s3cret",
            &json!({"sub": "u1", "iss": "https://idp.example", "exp": future_exp()}),
        );
        assert!(verifier.verify(&good).is_ok());

        let bad = sign(
            "s3cret",
            &json!({"sub": "u1", "iss": "https://evil.example", "exp": future_exp()}),
        );
        assert!(verifier.verify(&bad).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let verifier = TokenVerifier::new(&config("s3cret"));
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
