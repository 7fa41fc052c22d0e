//! Comment API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use streamscene_realtime::{
    CommentSort, CommentView, DeleteOutcome, Error, Identity, NewComment,
};

use super::super::{ApiContext, ApiError};
use super::types::{
    AddReactionRequest, CommentDto, CommentListResponse, CreateCommentRequest,
    DeleteCommentQuery, DeleteCommentResponse, ListCommentsQuery, ReactionDto,
    RemoveReactionQuery, UpdateCommentRequest,
};
use crate::middleware::ResolvedIdentity;

/// Build the acting identity from the resolved session plus guest fields
/// carried by the request itself.
fn acting_identity(
    resolved: &ResolvedIdentity,
    guest_name: Option<&str>,
    guest_identifier: Option<&str>,
) -> Identity {
    match &resolved.user_id {
        Some(user_id) => Identity::User {
            user_id: user_id.clone(),
        },
        None => match guest_name {
            Some(name) if !name.trim().is_empty() => {
                Identity::guest(name, guest_identifier.map(str::to_string))
            }
            _ => Identity::Anonymous,
        },
    }
}

/// List top-level comments for a file, hydrated with replies and reactions
#[utoipa::path(
    get,
    path = "/api/v1/comments",
    tag = "comments",
    params(ListCommentsQuery),
    responses(
        (status = 200, description = "Paginated comments", body = CommentListResponse),
        (status = 403, description = "Share token invalid or for another file"),
        (status = 404, description = "Share token unknown")
    )
)]
pub async fn list_comments(
    State(context): State<ApiContext>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<Json<CommentListResponse>, ApiError> {
    if let Some(token) = &query.share_token {
        let record = context
            .shares
            .find_by_token(token)
            .await?
            .ok_or_else(|| Error::not_found("share token"))?;
        if !context.shares.can_access(&record) {
            return Err(Error::authorization("share token is no longer valid").into());
        }
        if record.file_id != query.file_id {
            return Err(Error::authorization("share token does not match file").into());
        }
    }

    let sort = CommentSort::parse(query.sort_by.as_deref().unwrap_or("newest"));
    let page = context
        .service
        .comments()
        .list_page(
            query.file_id,
            sort,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(20),
        )
        .await?;

    Ok(Json(page.into()))
}

/// Create a comment
#[utoipa::path(
    post,
    path = "/api/v1/comments",
    tag = "comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Created comment", body = CommentDto),
        (status = 400, description = "Invalid content or missing guest name"),
        (status = 404, description = "Parent comment not found")
    )
)]
pub async fn create_comment(
    identity: ResolvedIdentity,
    State(context): State<ApiContext>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentDto>), ApiError> {
    let new = NewComment {
        file_id: request.file_id,
        user_id: identity.user_id.clone(),
        guest_name: if identity.is_authenticated() {
            None
        } else {
            request.guest_name
        },
        guest_identifier: if identity.is_authenticated() {
            None
        } else {
            request.guest_identifier
        },
        content: request.content,
        timestamp_seconds: request.timestamp_seconds,
        parent_comment_id: request.parent_comment_id,
    };

    let comment = context.service.comments().create(&new).await?;
    info!(comment_id = comment.id, file_id = comment.file_id, "comment created");
    Ok((
        StatusCode::CREATED,
        Json(CommentView::bare(comment).into()),
    ))
}

/// Edit a comment's content (author) or its moderation flags (moderator)
#[utoipa::path(
    put,
    path = "/api/v1/comments/{id}",
    tag = "comments",
    params(("id" = i64, Path, description = "Comment id")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated comment", body = CommentDto),
        (status = 403, description = "Not the author or a moderator"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn update_comment(
    identity: ResolvedIdentity,
    State(context): State<ApiContext>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<CommentDto>, ApiError> {
    let comments = context.service.comments();
    let comment = comments
        .find(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("comment {}", id)))?;

    if let Some(hidden) = request.moderation_hidden {
        if !identity.moderator {
            return Err(Error::authorization("moderation requires a moderator role").into());
        }
        comments
            .moderate(id, hidden, request.moderated_reason.as_deref())
            .await?;
    }

    if let Some(content) = &request.content {
        let is_author = comment.is_authored_by(
            identity.user_id.as_deref(),
            request.guest_identifier.as_deref(),
        );
        if !is_author && !identity.moderator {
            return Err(Error::authorization("only the author may edit a comment").into());
        }
        comments.update_content(id, content).await?;
    }

    let updated = comments
        .find(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("comment {}", id)))?;
    let view = comments.hydrate(updated).await?;
    Ok(Json(view.into()))
}

/// Delete a comment: soft when it has replies, hard otherwise
#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    tag = "comments",
    params(
        ("id" = i64, Path, description = "Comment id"),
        DeleteCommentQuery
    ),
    responses(
        (status = 200, description = "Deletion outcome", body = DeleteCommentResponse),
        (status = 403, description = "Not the author or a moderator"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(
    identity: ResolvedIdentity,
    State(context): State<ApiContext>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteCommentQuery>,
) -> Result<Json<DeleteCommentResponse>, ApiError> {
    let comments = context.service.comments();
    let comment = comments
        .find(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("comment {}", id)))?;

    let is_author = comment.is_authored_by(
        identity.user_id.as_deref(),
        query.guest_identifier.as_deref(),
    );
    if !is_author && !identity.moderator {
        return Err(Error::authorization("only the author may delete a comment").into());
    }

    let outcome = comments.delete(id).await?;
    info!(comment_id = id, soft = outcome == DeleteOutcome::Soft, "comment deleted");
    Ok(Json(DeleteCommentResponse {
        deleted: true,
        soft: outcome == DeleteOutcome::Soft,
    }))
}

/// Add a reaction to a comment
#[utoipa::path(
    post,
    path = "/api/v1/comments/{id}/reactions",
    tag = "comments",
    params(("id" = i64, Path, description = "Comment id")),
    request_body = AddReactionRequest,
    responses(
        (status = 201, description = "Created reaction", body = ReactionDto),
        (status = 400, description = "Duplicate reaction or missing identity"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn add_reaction(
    identity: ResolvedIdentity,
    State(context): State<ApiContext>,
    Path(id): Path<i64>,
    Json(request): Json<AddReactionRequest>,
) -> Result<(StatusCode, Json<ReactionDto>), ApiError> {
    let acting = acting_identity(
        &identity,
        request.guest_name.as_deref(),
        request.guest_identifier.as_deref(),
    );
    let reaction = context
        .service
        .comments()
        .add_reaction(id, &acting, &request.emoji)
        .await?;
    Ok((StatusCode::CREATED, Json(reaction.into())))
}

/// Remove a reaction; only the identity that placed it may remove it
#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}/reactions/{reaction_id}",
    tag = "comments",
    params(
        ("id" = i64, Path, description = "Comment id"),
        ("reaction_id" = i64, Path, description = "Reaction id"),
        RemoveReactionQuery
    ),
    responses(
        (status = 204, description = "Reaction removed"),
        (status = 403, description = "Reaction belongs to another identity"),
        (status = 404, description = "Reaction not found")
    )
)]
pub async fn remove_reaction(
    identity: ResolvedIdentity,
    State(context): State<ApiContext>,
    Path((_id, reaction_id)): Path<(i64, i64)>,
    Query(query): Query<RemoveReactionQuery>,
) -> Result<StatusCode, ApiError> {
    // Guests prove ownership via the identifier issued at reaction time.
    let acting = match &identity.user_id {
        Some(user_id) => Identity::User {
            user_id: user_id.clone(),
        },
        None => match &query.guest_identifier {
            Some(gid) => Identity::Guest {
                guest_name: String::new(),
                guest_identifier: gid.clone(),
            },
            None => Identity::Anonymous,
        },
    };

    context
        .service
        .comments()
        .remove_reaction(reaction_id, &acting)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
