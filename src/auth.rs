//! Bearer token extraction.
//!
//! The client's bearer token is forwarded to the provider as its API key.

use axum::http::{header, HeaderMap};

use crate::error::{GatewayError, Result};

/// Token from `Authorization: Bearer <token>`. The scheme is case-insensitive.
///
/// # Errors
/// `GatewayError::Authentication` when the header is missing, malformed or empty.
pub fn bearer_token(headers: &HeaderMap) -> Result<String> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| GatewayError::authentication("Missing Authorization header"))?
        .to_str()
        .map_err(|_| GatewayError::authentication("Authorization header is not valid ASCII"))?;

    let (scheme, token) = value.split_once(char::is_whitespace).ok_or_else(|| {
        GatewayError::authentication(
            "Invalid Authorization header format. Expected: Bearer {token}",
        )
    })?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(GatewayError::authentication(
            "Invalid Authorization header format. Expected: Bearer {token}",
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(GatewayError::authentication("Invalid API key"));
    }

    Ok(token.to_string())
}

/// Pick the provider API key: the bearer token, or `fallback` when bearer auth is optional.
///
/// # Errors
/// `GatewayError::Authentication` when no usable key is available.
pub fn resolve_api_key(
    headers: &HeaderMap,
    require_bearer: bool,
    fallback: Option<String>,
) -> Result<String> {
    match bearer_token(headers) {
        Ok(token) => Ok(token),
        Err(err) if require_bearer => Err(err),
        Err(_) => fallback
            .ok_or_else(|| GatewayError::authentication("Missing Volcano Engine API key")),
    }
}
