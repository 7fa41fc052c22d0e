//! Identity resolution for REST requests
//!
//! Authentication happens upstream (session proxy); this middleware only
//! reads the pre-resolved identity headers into a typed extractor. The core
//! never validates credentials itself.
//!
//! Headers set by the upstream proxy:
//! - `x-user-id`: resolved user id of an authenticated session
//! - `x-moderator-role`: `true` when the session holds a moderator role
//!   for the requested resource

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Identity resolved by the upstream session layer
#[derive(Debug, Clone, Default)]
pub struct ResolvedIdentity {
    /// Authenticated user id, if any
    pub user_id: Option<String>,
    /// Whether the session carries a moderator role
    pub moderator: bool,
}

impl ResolvedIdentity {
    /// Whether the request is authenticated
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ResolvedIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let moderator = parts
            .headers
            .get("x-moderator-role")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(Self { user_id, moderator })
    }
}
