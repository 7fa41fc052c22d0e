//! Web API module for StreamScene
//!
//! Provides the REST endpoints the realtime channel does not cover:
//! - Comment listing, creation, editing and moderation
//! - Reaction management
//! - Health check

pub mod comments;
pub mod error;
pub mod health;

use axum::Router;
use std::sync::Arc;
use streamscene_realtime::{RealtimeService, ShareAccess};

pub use comments::comments_routes;
pub use error::ApiError;
pub use health::health_routes;

/// Shared state for the REST handlers
#[derive(Clone)]
pub struct ApiContext {
    /// The realtime service; the REST surface shares its stores
    pub service: Arc<RealtimeService>,
    /// Share-token resolver for link-shared comment access
    pub shares: Arc<dyn ShareAccess>,
}

impl ApiContext {
    /// Create a new API context
    #[must_use]
    pub fn new(service: Arc<RealtimeService>, shares: Arc<dyn ShareAccess>) -> Self {
        Self { service, shares }
    }
}

/// Create the API router with all endpoints
pub fn api_router(context: ApiContext) -> Router {
    Router::new()
        .merge(comments_routes(context))
        .merge(health_routes())
}
