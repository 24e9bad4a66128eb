use jsonwebtoken::{self, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Principal;

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::One(a) => a == aud,
            Audience::Many(list) => list.iter().any(|a| a == aud),
        }
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Audience::One(value.to_string())
    }
}

impl From<Vec<String>> for Audience {
    fn from(value: Vec<String>) -> Self {
        Audience::Many(value)
    }
}

/// Claims read from identity provider tokens. Issuer and audience are
/// enforced by [`Validation`]; the fields here are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JwtClaims {
    pub fn into_principal(self) -> Principal {
        Principal {
            subject: self.sub,
            email: self.email,
            name: self.name,
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Decode(String),
    #[error("token subject is empty")]
    EmptySubject,
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Builds a validation that pins issuer and audience only when configured.
pub fn validation(
    algorithms: &[Algorithm],
    issuer: Option<&str>,
    audiences: &[&str],
) -> Validation {
    let first = algorithms.first().copied().unwrap_or(Algorithm::HS256);
    let mut v = Validation::new(first);
    v.algorithms = if algorithms.is_empty() {
        vec![first]
    } else {
        algorithms.to_vec()
    };
    if let Some(iss) = issuer {
        v.set_issuer(&[iss]);
    }
    if audiences.is_empty() {
        v.validate_aud = false;
    } else {
        v.set_audience(audiences);
    }
    v
}

pub fn decode_with(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<JwtClaims, JwtError> {
    let claims = jsonwebtoken::decode::<JwtClaims>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Decode(e.to_string()))?;
    if claims.sub.trim().is_empty() {
        return Err(JwtError::EmptySubject);
    }
    Ok(claims)
}

pub fn decode_and_verify(
    token: &str,
    secret: &[u8],
    issuer: Option<&str>,
    audience: Option<&str>,
) -> Result<JwtClaims, JwtError> {
    let key = DecodingKey::from_secret(secret);
    let audiences: Vec<&str> = audience.into_iter().collect();
    let validation = validation(&[Algorithm::HS256], issuer, &audiences);
    decode_with(token, &key, &validation)
}

pub fn encode(claims: &JwtClaims, secret: &[u8]) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| JwtError::Encode(e.to_string()))
}
