//! Request-scoped context extracted from HTTP requests.
//!
//! Bearer tokens are verified by the gateway in front of this service. Here
//! the JWT payload is only decoded to learn who is calling.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pridr_id::{AccountId, RequestId};
use serde::Deserialize;

use crate::api::error::ApiError;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub account_id: AccountId,
}

#[derive(Deserialize)]
struct TokenClaims {
    sub: Option<String>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Reads the `sub` claim from a compact JWT without checking its signature.
fn subject_from_token(token: &str) -> Result<AccountId, &'static str> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature)) =
        (segments.next(), segments.next(), segments.next())
    else {
        return Err("token is not a JWT");
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| "token payload is not base64url")?;
    let claims: TokenClaims =
        serde_json::from_slice(&bytes).map_err(|_| "token payload is not a JSON object")?;

    let sub = claims.sub.ok_or("token has no subject")?;
    AccountId::parse(&sub).map_err(|_| "token subject is not a valid account id")
}

fn account_from_authorization_header(
    headers: &HeaderMap,
    request_id: &str,
) -> Result<AccountId, ApiError> {
    let Some(auth_value) = header_string(headers, AUTHORIZATION_HEADER) else {
        return Err(ApiError::unauthorized(
            "missing_authorization",
            "Authorization header is required",
        )
        .with_request_id(request_id));
    };

    let Some(token) = auth_value.trim().strip_prefix("Bearer ") else {
        return Err(ApiError::unauthorized(
            "invalid_authorization",
            "Authorization must be a Bearer token",
        )
        .with_request_id(request_id));
    };

    subject_from_token(token.trim()).map_err(|reason| {
        ApiError::unauthorized("invalid_token", reason).with_request_id(request_id)
    })
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| RequestId::new().to_string());

        let account_id = account_from_authorization_header(&parts.headers, &request_id)?;

        Ok(Self {
            request_id,
            account_id,
        })
    }
}
