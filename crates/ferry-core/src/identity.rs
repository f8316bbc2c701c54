//! Caller identity and bearer token claims.
//!
//! Tokens are verified with `jsonwebtoken`; issuing them is left to the
//! application. A verified token yields an [`Identity`] (`sub` + `name`) and
//! its decoded claims for `#[bind(claims)]` fields.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ferry_config::AuthConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Resolved caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject, the user id.
    pub id: String,
    /// Display name, when the token carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identity {
    /// Creates an identity without a display name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Claims of a verified token.
///
/// Values are kept as decoded so `#[bind(claims)]` fields receive arrays,
/// objects and typed numbers intact. [`Claims::text`] is a scalar string
/// view: strings verbatim, numbers in their JSON spelling, booleans as
/// `true`/`false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    raw: Map<String, Value>,
    text: HashMap<String, String>,
}

impl Claims {
    /// Wraps a decoded claim set. Null claims are dropped.
    #[must_use]
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let raw: Map<String, Value> = map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let text = raw
            .iter()
            .filter_map(|(k, v)| {
                let flat = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => return None,
                };
                Some((k.clone(), flat))
            })
            .collect();
        Self { raw, text }
    }

    /// Returns the decoded value of the claim named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Returns the claim named `key` as a string, if it is a scalar.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.text.get(key).map(String::as_str)
    }

    /// Returns true if there are no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Token verification failures.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Algorithm name not understood.
    #[error("unsupported token algorithm: {0}")]
    Algorithm(String),

    /// Key material could not be loaded.
    #[error("invalid verification key: {0}")]
    Key(#[source] jsonwebtoken::errors::Error),

    /// Signature, expiry or audience check failed.
    #[error("token rejected: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),

    /// The token has no `sub` claim.
    #[error("token has no subject")]
    NoSubject,
}

/// A token that passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// Caller derived from `sub` and `name`.
    pub identity: Identity,
    /// Raw decoded claims.
    pub claims: Map<String, Value>,
}

/// Verifies signed tokens against the configured key.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    algorithm: Algorithm,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Builds a verifier from the `auth` section.
    ///
    /// Returns `Ok(None)` when no key material is configured.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] for an unknown algorithm or unreadable key.
    pub fn from_config(auth: &AuthConfig) -> Result<Option<Self>, TokenError> {
        if !auth.is_configured() {
            return Ok(None);
        }

        let algorithm = Algorithm::from_str(&auth.algorithm)
            .map_err(|_| TokenError::Algorithm(auth.algorithm.clone()))?;

        let key = match (algorithm, &auth.secret, &auth.public_key_pem) {
            (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512, Some(secret), _) => {
                DecodingKey::from_secret(secret.as_bytes())
            }
            (Algorithm::ES256 | Algorithm::ES384, _, Some(pem)) => {
                DecodingKey::from_ec_pem(pem.as_bytes()).map_err(TokenError::Key)?
            }
            (_, _, Some(pem)) => DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(TokenError::Key)?,
            _ => return Err(TokenError::Algorithm(auth.algorithm.clone())),
        };

        Ok(Some(Self { key, algorithm }))
    }

    /// Creates a verifier for an HMAC secret.
    #[must_use]
    pub fn hmac(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    /// Verifies `token`, requiring `audience` when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Rejected`] when signature, expiry or audience
    /// checks fail, and [`TokenError::NoSubject`] without a `sub` claim.
    pub fn verify(&self, token: &str, audience: Option<&str>) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Map<String, Value>>(token, &self.key, &validation)
            .map_err(TokenError::Rejected)?;
        let claims = data.claims;

        let id = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::NoSubject)?
            .to_string();
        let name = claims
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);

        Ok(VerifiedToken {
            identity: Identity { id, name },
            claims,
        })
    }
}
