//! Request-header extractors for audit attribution and the admin override.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::error::ReservationError;
use crate::persistence::ReservationStore;

/// Header carrying the acting user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the administrative override token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Audit user of the request, from `x-user-id` or the configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub i64);

impl<S: ReservationStore> FromRequestParts<AppState<S>> for Actor {
    type Rejection = ReservationError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Self(state.config.default_actor_id));
        };
        value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .map(Self)
            .ok_or_else(|| {
                ReservationError::InvalidRequest(format!("{USER_ID_HEADER} must be an integer"))
            })
    }
}

/// Raw `x-admin-token` header, if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for AdminToken {
    type Rejection = ReservationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get(ADMIN_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        ))
    }
}
