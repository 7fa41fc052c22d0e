//! Comment API endpoints
//!
//! GET    /api/v1/comments                          - List comments for a file
//! POST   /api/v1/comments                          - Create a comment
//! PUT    /api/v1/comments/:id                      - Edit or moderate a comment
//! DELETE /api/v1/comments/:id                      - Delete a comment
//! POST   /api/v1/comments/:id/reactions            - Add a reaction
//! DELETE /api/v1/comments/:id/reactions/:reaction_id - Remove a reaction

mod handlers;
mod types;


use axum::{
    routing::{delete, get, post},
    Router,
};

use super::ApiContext;
pub use types::{
    AddReactionRequest, CommentDto, CommentListResponse, CreateCommentRequest,
    DeleteCommentResponse, ListCommentsQuery, ReactionDto, UpdateCommentRequest,
};

/// Comment routes
pub fn comments_routes(context: ApiContext) -> Router {
    Router::new()
        .route(
            "/api/v1/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/api/v1/comments/:id",
            axum::routing::put(handlers::update_comment).delete(handlers::delete_comment),
        )
        .route(
            "/api/v1/comments/:id/reactions",
            post(handlers::add_reaction),
        )
        .route(
            "/api/v1/comments/:id/reactions/:reaction_id",
            delete(handlers::remove_reaction),
        )
        .with_state(context)
}
