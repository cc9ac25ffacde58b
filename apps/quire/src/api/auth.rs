//! # Authentication Module
//!
//! Two credentials reach the API, both as `Authorization: Bearer <value>`:
//!
//! - **Access tokens** issued by institution login identify the acting user
//!   ([`Viewer`]). No header means an anonymous viewer; an unknown token is
//!   rejected.
//! - **The admin key** (`[security] admin_key` / `QUIRE_ADMIN_KEY`) guards
//!   the `/v2/admin` seeding endpoints. When it is unset those endpoints
//!   are open.

use super::AppState;
use super::types::ApiError;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use quire_core::User;
use std::sync::Arc;
use subtle::ConstantTimeEq;

// =============================================================================
// BEARER TOKENS
// =============================================================================

/// Extract the bearer credential from the headers.
///
/// Both "Bearer <value>" and a raw "<value>" are accepted.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

/// The user behind the request's access token, if any.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    /// The signed-in user, or 401.
    pub fn require(self) -> Result<User, ApiError> {
        self.0.ok_or_else(ApiError::unauthorized)
    }

    pub fn id(&self) -> Option<&quire_core::UserId> {
        self.0.as_ref().map(|u| &u.id)
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Self(None));
        };
        let platform = state.platform.read().await;
        match platform.user_for_token(token) {
            Ok(user) => Ok(Self(Some(user))),
            Err(e) => {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_access_token",
                    "Authentication failed: {}",
                    e
                );
                Err(e.into())
            }
        }
    }
}

// =============================================================================
// ADMIN KEY
// =============================================================================

/// Compare two keys in constant time.
///
/// Both keys are padded to the same length so the comparison always runs
/// over the same number of bytes.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// Admin key middleware for the `/v2/admin` routes.
pub async fn admin_key_middleware(
    State(expected): State<Arc<str>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    match bearer_token(request.headers()) {
        Some(provided) if keys_match(provided, &expected) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_admin_key",
                "Authentication failed: invalid admin key"
            );
            Err(ApiError::unauthorized())
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header on admin endpoint"
            );
            Err(ApiError::unauthorized())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
