use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    config::{AuthConfig, AuthMode},
    models::IdentityClaims,
    Error, Result,
};

/// Identity verification collaborator
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify a bearer token and return the identity behind it
    async fn authenticate(&self, token: &str) -> Result<IdentityClaims>;
}

/// Claims read from the identity provider's access token
#[derive(Debug, Clone, Deserialize)]
struct TokenClaims {
    sub: Option<String>,
    email: Option<String>,
    given_name: Option<String>,
}

impl TokenClaims {
    fn into_identity(self) -> Result<IdentityClaims> {
        let email = self.email.filter(|e| !e.is_empty());
        let subject = self.sub.filter(|s| !s.is_empty());
        let identity = email
            .clone()
            .or_else(|| subject.clone())
            .ok_or_else(|| Error::Authentication("Token carries no subject or email".to_string()))?;
        Ok(IdentityClaims {
            subject: subject.unwrap_or_else(|| identity.clone()),
            name: self
                .given_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| identity.clone()),
            identity,
        })
    }
}

/// JWT verifier
#[derive(Clone)]
pub struct JwtAuthenticator {
    verifier: Verifier,
}

#[derive(Clone)]
enum Verifier {
    Signed {
        decoding_key: Arc<DecodingKey>,
        validation: Box<Validation>,
    },
    Unverified,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.verifier {
            Verifier::Signed { validation, .. } => format!("{:?}", validation.algorithms),
            Verifier::Unverified => "unverified".to_string(),
        };
        f.debug_struct("JwtAuthenticator").field("mode", &mode).finish()
    }
}

impl JwtAuthenticator {
    fn signed(decoding_key: DecodingKey, algorithm: Algorithm, leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        validation.leeway = leeway_seconds;
        Self {
            verifier: Verifier::Signed {
                decoding_key: Arc::new(decoding_key),
                validation: Box::new(validation),
            },
        }
    }

    /// HS256 with a shared secret
    #[must_use]
    pub fn hs256(secret: &[u8], leeway_seconds: u64) -> Self {
        Self::signed(DecodingKey::from_secret(secret), Algorithm::HS256, leeway_seconds)
    }

    /// RS256 with the provider's PEM-encoded public key
    pub fn rs256(public_key_pem: &[u8], leeway_seconds: u64) -> Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| Error::Internal(format!("Failed to load public key: {e}")))?;
        Ok(Self::signed(decoding_key, Algorithm::RS256, leeway_seconds))
    }

    /// Read the payload without checking signature or expiry. Development only.
    #[must_use]
    pub const fn unverified() -> Self {
        Self {
            verifier: Verifier::Unverified,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        match config.mode {
            AuthMode::Hs256 => {
                if config.secret.trim().is_empty() {
                    return Err(Error::InvalidInput(
                        "auth.secret is required for hs256".to_string(),
                    ));
                }
                Ok(Self::hs256(config.secret.as_bytes(), config.leeway_seconds))
            }
            AuthMode::Rs256 => {
                let path = config.public_key_path.as_deref().ok_or_else(|| {
                    Error::InvalidInput("auth.public_key_path is required for rs256".to_string())
                })?;
                let pem = std::fs::read(path)
                    .map_err(|e| Error::Internal(format!("Failed to read {path}: {e}")))?;
                Self::rs256(&pem, config.leeway_seconds)
            }
            AuthMode::Unverified => {
                tracing::warn!("Token signatures are NOT verified (auth.mode = unverified)");
                Ok(Self::unverified())
            }
        }
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims> {
        let claims = match &self.verifier {
            Verifier::Signed {
                decoding_key,
                validation,
            } => {
                decode::<TokenClaims>(token, decoding_key, validation)
                    .map_err(|e| match e.kind() {
                        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                            Error::Authentication("Token expired".to_string())
                        }
                        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                            Error::Authentication("Invalid token signature".to_string())
                        }
                        _ => Error::Authentication(format!("Token verification failed: {e}")),
                    })?
                    .claims
            }
            Verifier::Unverified => decode_payload(token)?,
        };
        claims.into_identity()
    }
}

fn decode_payload(token: &str) -> Result<TokenClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Authentication("Malformed token".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::Authentication(format!("Malformed token payload: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Authentication(format!("Malformed token claims: {e}")))
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<IdentityClaims> {
        if token.is_empty() {
            return Err(Error::AuthRequired);
        }
        self.verify(token)
    }
}
