//! Verification of the external identity assertion presented at login.
//!
//! The production implementation verifies Google ID tokens: RS256 signature
//! against Google's published JWKS, issuer pinned to Google, audience pinned
//! to the configured OAuth client id. Every validation failure collapses to
//! [`Error::InvalidCredential`] so login never leaks which check failed.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::AuthConfig;
use crate::errors::{Error, Result};

/// A verified external identity. `subject` is the stable id accounts are
/// keyed by; everything else is display metadata refreshed on login.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// Validates a bearer assertion's signature, issuer, and audience.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, assertion: &str) -> Result<ExternalIdentity>;
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

pub struct GoogleVerifier {
    http: reqwest::Client,
    certs_url: Url,
    client_id: String,
}

impl GoogleVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            certs_url: config.google_certs_url.clone(),
            client_id: config.google_client_id.clone(),
        }
    }

    fn invalid(message: impl Into<String>) -> Error {
        Error::InvalidCredential { message: message.into() }
    }

    async fn fetch_jwks(&self) -> Result<Jwks> {
        let response = self
            .http
            .get(self.certs_url.clone())
            .send()
            .await
            .map_err(|e| Self::invalid(format!("fetch signing keys: {e}")))?;
        if !response.status().is_success() {
            return Err(Self::invalid(format!("signing key endpoint returned {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| Self::invalid(format!("parse signing keys: {e}")))
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, assertion: &str) -> Result<ExternalIdentity> {
        let header = decode_header(assertion).map_err(|e| Self::invalid(format!("malformed assertion: {e}")))?;
        let kid = header.kid.ok_or_else(|| Self::invalid("assertion has no key id"))?;

        let jwks = self.fetch_jwks().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| Self::invalid("assertion signed with unknown key"))?;
        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| Self::invalid(format!("unusable signing key: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);

        let data = decode::<GoogleClaims>(assertion, &key, &validation)
            .map_err(|e| Self::invalid(format!("assertion validation failed: {e}")))?;
        let claims = data.claims;
        debug!(subject = %claims.sub, "verified external identity");

        Ok(ExternalIdentity {
            subject: claims.sub,
            name: claims.name.unwrap_or_else(|| claims.email.clone()),
            email: claims.email,
            picture: claims.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verifier_for(certs_url: &str) -> GoogleVerifier {
        GoogleVerifier::new(&AuthConfig {
            google_client_id: "client-id.apps.googleusercontent.com".to_string(),
            google_certs_url: Url::parse(certs_url).unwrap(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn garbage_assertion_is_invalid_credential() {
        // Fails at header decoding, before any network call.
        let verifier = verifier_for("http://127.0.0.1:1/certs");
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredential { .. }));
    }

    #[tokio::test]
    async fn unknown_signing_key_is_invalid_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kid": "some-other-kid", "n": "AQAB", "e": "AQAB"}]
            })))
            .mount(&server)
            .await;

        // A structurally valid JWT (HS256, kid set) that no JWKS entry matches.
        let header = jsonwebtoken::Header {
            kid: Some("test-kid".to_string()),
            ..Default::default()
        };
        let token = jsonwebtoken::encode(
            &header,
            &json!({"sub": "1", "exp": 4102444800u64}),
            &jsonwebtoken::EncodingKey::from_secret(b"x"),
        )
        .unwrap();

        let verifier = verifier_for(&format!("{}/certs", server.uri()));
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredential { .. }));
    }

    #[tokio::test]
    async fn unreachable_jwks_endpoint_is_invalid_credential() {
        let header = jsonwebtoken::Header {
            kid: Some("test-kid".to_string()),
            ..Default::default()
        };
        let token = jsonwebtoken::encode(
            &header,
            &json!({"sub": "1", "exp": 4102444800u64}),
            &jsonwebtoken::EncodingKey::from_secret(b"x"),
        )
        .unwrap();

        let verifier = verifier_for("http://127.0.0.1:1/certs");
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredential { .. }));
    }
}
