//! Request/response types for the comment API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streamscene_realtime::{CommentPage, CommentReaction, CommentView};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for the comment listing
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListCommentsQuery {
    /// File whose comments to list
    pub file_id: i64,
    /// Sort order: `newest` (default), `oldest` or `timestamp`
    pub sort_by: Option<String>,
    /// 1-based page number (default 1)
    pub page: Option<u32>,
    /// Page size (default 20, max 100)
    pub limit: Option<u32>,
    /// Share token for link-shared access
    pub share_token: Option<String>,
}

/// Request body for creating a comment
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    /// Target file
    pub file_id: i64,
    /// Comment body, 1-2000 characters
    pub content: String,
    /// Optional media anchor in seconds
    pub timestamp_seconds: Option<f64>,
    /// Optional parent comment for threading
    pub parent_comment_id: Option<i64>,
    /// Guest display name (required when unauthenticated)
    pub guest_name: Option<String>,
    /// Guest identifier kept across requests
    pub guest_identifier: Option<String>,
}

/// Request body for editing or moderating a comment
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateCommentRequest {
    /// New content (author or moderator)
    pub content: Option<String>,
    /// Guest identifier proving authorship for guest comments
    pub guest_identifier: Option<String>,
    /// Hide or unhide the comment (moderator only)
    pub moderation_hidden: Option<bool>,
    /// Reason recorded with the moderation action
    pub moderated_reason: Option<String>,
}

/// Query parameters for deleting a comment
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DeleteCommentQuery {
    /// Guest identifier proving authorship for guest comments
    pub guest_identifier: Option<String>,
}

/// Request body for adding a reaction
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddReactionRequest {
    /// Emoji string
    pub emoji: String,
    /// Guest display name (required when unauthenticated)
    pub guest_name: Option<String>,
    /// Guest identifier kept across requests
    pub guest_identifier: Option<String>,
}

/// Query parameters for removing a reaction
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct RemoveReactionQuery {
    /// Guest identifier proving ownership for guest reactions
    pub guest_identifier: Option<String>,
}

/// A reaction in API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReactionDto {
    /// Reaction id
    pub id: i64,
    /// Comment the reaction is on
    pub comment_id: i64,
    /// Reacting user id, if authenticated
    pub user_id: Option<String>,
    /// Guest display name, if a guest
    pub guest_name: Option<String>,
    /// Guest identifier, if a guest
    pub guest_identifier: Option<String>,
    /// Emoji string
    pub emoji: String,
    /// When the reaction was placed
    pub created_at: DateTime<Utc>,
}

impl From<CommentReaction> for ReactionDto {
    fn from(reaction: CommentReaction) -> Self {
        Self {
            id: reaction.id,
            comment_id: reaction.comment_id,
            user_id: reaction.user_id,
            guest_name: reaction.guest_name,
            guest_identifier: reaction.guest_identifier,
            emoji: reaction.emoji,
            created_at: reaction.created_at,
        }
    }
}

/// A hydrated comment in API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentDto {
    /// Comment id
    pub id: i64,
    /// File the comment belongs to
    pub file_id: i64,
    /// Author display name
    pub author_name: String,
    /// Author user id, if authenticated
    pub user_id: Option<String>,
    /// Guest display name, if a guest
    pub guest_name: Option<String>,
    /// Guest identifier, if a guest
    pub guest_identifier: Option<String>,
    /// Comment body (the tombstone for soft-deleted comments)
    pub content: String,
    /// Media anchor in seconds
    pub timestamp_seconds: Option<f64>,
    /// Parent comment, if a reply
    pub parent_comment_id: Option<i64>,
    /// Soft-deleted flag
    pub is_deleted: bool,
    /// Edited by the author after creation
    pub is_edited: bool,
    /// A moderation action was applied
    pub is_moderated: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Direct replies (one level)
    pub replies: Vec<CommentDto>,
    /// Reactions on this comment
    pub reactions: Vec<ReactionDto>,
}

impl From<CommentView> for CommentDto {
    fn from(view: CommentView) -> Self {
        Self {
            id: view.comment.id,
            file_id: view.comment.file_id,
            author_name: view.author_name,
            user_id: view.comment.user_id,
            guest_name: view.comment.guest_name,
            guest_identifier: view.comment.guest_identifier,
            content: view.comment.content,
            timestamp_seconds: view.comment.timestamp_seconds,
            parent_comment_id: view.comment.parent_comment_id,
            is_deleted: view.comment.is_deleted,
            is_edited: view.comment.is_edited,
            is_moderated: view.comment.is_moderated,
            created_at: view.comment.created_at,
            replies: view.replies.into_iter().map(CommentDto::from).collect(),
            reactions: view.reactions.into_iter().map(ReactionDto::from).collect(),
        }
    }
}

/// Paginated comment listing response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentListResponse {
    /// Hydrated top-level comments in the requested order
    pub comments: Vec<CommentDto>,
    /// Total top-level comments on the file
    pub total: i64,
    /// Requested page
    pub page: u32,
    /// Requested page size
    pub limit: u32,
}

impl From<CommentPage> for CommentListResponse {
    fn from(page: CommentPage) -> Self {
        Self {
            comments: page.comments.into_iter().map(CommentDto::from).collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
        }
    }
}

/// Response for a comment deletion
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteCommentResponse {
    /// Always true on success
    pub deleted: bool,
    /// Whether the row was kept as a tombstone (it had replies)
    pub soft: bool,
}
