//! Bearer-token identity.
//!
//! Clients are anonymous: the first request without credentials is assigned
//! a fresh random identity, returned as a signed token in the
//! `Authorization` response header. Later requests present that token, and
//! its `user_id` claim becomes the owner of every task they touch.

use super::error::ApiError;
use crate::server::telemetry::{increment_auth_failures, increment_tokens_issued};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use core::time::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskvault::OwnerId;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token format")]
    InvalidFormat,

    #[error("{0}")]
    InvalidToken(jsonwebtoken::errors::Error),

    #[error("user_id claim missing or invalid")]
    MissingUserId,

    #[error("{0}")]
    Issue(String),
}

#[derive(Debug, Clone, Serialize)]
struct IssuedClaims<'a> {
    user_id: &'a str,
    iat: u64,
    exp: u64,
}

/// Claims as read back from a client. `user_id` stays untyped so a token
/// with a non-string claim is told apart from a forged one.
#[derive(Debug, Clone, Deserialize)]
struct PresentedClaims {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
}

/// Signs and verifies HS256 identity tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    /// Signs a token for `user_id`, valid for the configured TTL.
    pub fn issue(&self, user_id: &str) -> Result<String, AuthError> {
        let iat = jsonwebtoken::get_current_timestamp();
        let claims = IssuedClaims {
            user_id,
            iat,
            exp: iat.saturating_add(self.ttl.as_secs()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }

    /// Verifies signature and expiry, then extracts the owner identity.
    pub fn verify(&self, token: &str) -> Result<OwnerId, AuthError> {
        let data =
            jsonwebtoken::decode::<PresentedClaims>(token, &self.decoding, &self.validation)
                .map_err(AuthError::InvalidToken)?;
        match data.claims.user_id {
            Some(serde_json::Value::String(user_id)) => Ok(OwnerId::from(user_id)),
            _ => Err(AuthError::MissingUserId),
        }
    }
}

/// The identity a request acts as, attached by [`authenticate`].
#[derive(Debug, Clone)]
pub struct Owner(pub OwnerId);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Owner>()
            .cloned()
            .ok_or(ApiError::MissingIdentity)
    }
}

/// What the `Authorization` header asks for.
#[derive(Debug, PartialEq, Eq)]
enum Credentials<'a> {
    /// No usable credentials; a new identity should be minted.
    Anonymous,
    Bearer(&'a str),
}

fn credentials(headers: &HeaderMap) -> Result<Credentials<'_>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(Credentials::Anonymous);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
    // Browser clients send these literally before they have stored a token.
    if matches!(value, "" | "null" | "undefined") {
        return Ok(Credentials::Anonymous);
    }
    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => {
            Ok(Credentials::Bearer(token))
        }
        _ => Err(AuthError::InvalidFormat),
    }
}

/// Resolves the caller's identity and attaches it as an [`Owner`] extension.
///
/// Anonymous callers get a new UUID identity and the token for it in the
/// response's `Authorization` header.
pub async fn authenticate(
    State(tokens): State<Arc<TokenIssuer>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = credentials(req.headers()).inspect_err(|_| increment_auth_failures())?;

    match credentials {
        Credentials::Bearer(token) => {
            let owner = tokens.verify(token).inspect_err(|_| increment_auth_failures())?;
            req.extensions_mut().insert(Owner(owner));
            Ok(next.run(req).await)
        }
        Credentials::Anonymous => {
            let user_id = Uuid::new_v4().to_string();
            let token = tokens.issue(&user_id)?;
            let header = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| AuthError::Issue(e.to_string()))?;
            increment_tokens_issued();
            tracing::info!(%user_id, "issued token for new identity");

            req.extensions_mut().insert(Owner(OwnerId::from(user_id)));
            let mut response = next.run(req).await;
            response.headers_mut().insert(AUTHORIZATION, header);
            Ok(response)
        }
    }
}
