//! Comment and reaction data model
//!
//! Comments attach to a file, optionally anchored to a moment in the media
//! (`timestamp_seconds`) and optionally replying to another comment on the
//! same file. Threading is one level deep in the delivered view: a reply's
//! own replies are never expanded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Content stored in place of a soft-deleted comment
pub const TOMBSTONE: &str = "[deleted]";

/// Maximum comment content length in characters
pub const MAX_CONTENT_LEN: usize = 2000;

/// A persisted comment row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Auto-incrementing id
    pub id: i64,

    /// File this comment belongs to
    pub file_id: i64,

    /// Author user id; `None` marks a guest author
    pub user_id: Option<String>,

    /// Guest display name, required when `user_id` is absent
    pub guest_name: Option<String>,

    /// Generated guest identifier, required when `user_id` is absent
    pub guest_identifier: Option<String>,

    /// Comment body, 1-2000 characters (or the tombstone after soft delete)
    pub content: String,

    /// Position in the media this comment refers to, in seconds
    pub timestamp_seconds: Option<f64>,

    /// Parent comment for one-level threading
    pub parent_comment_id: Option<i64>,

    /// Soft-delete flag; content has been replaced by the tombstone
    pub is_deleted: bool,

    /// Hidden by the file owner
    pub is_moderation_hidden: bool,

    /// Content was edited by the author after creation
    pub is_edited: bool,

    /// A moderation action was applied
    pub is_moderated: bool,

    /// Reason recorded by the moderator, if any
    pub moderated_reason: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Name shown for the author in hydrated views
    #[must_use]
    pub fn author_name(&self) -> String {
        if let Some(uid) = &self.user_id {
            uid.clone()
        } else {
            self.guest_name
                .clone()
                .unwrap_or_else(|| "anonymous".to_string())
        }
    }

    /// Whether the given identity authored this comment
    #[must_use]
    pub fn is_authored_by(&self, user_id: Option<&str>, guest_identifier: Option<&str>) -> bool {
        match (&self.user_id, user_id) {
            (Some(own), Some(req)) => own == req,
            (None, _) => match (&self.guest_identifier, guest_identifier) {
                (Some(own), Some(req)) => own == req,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Input for creating a comment, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    /// Target file
    pub file_id: i64,
    /// Author user id, if authenticated
    pub user_id: Option<String>,
    /// Guest display name (required without `user_id`)
    pub guest_name: Option<String>,
    /// Guest identifier (generated when absent for guests)
    pub guest_identifier: Option<String>,
    /// Comment body
    pub content: String,
    /// Optional media anchor in seconds
    pub timestamp_seconds: Option<f64>,
    /// Optional parent for threading
    pub parent_comment_id: Option<i64>,
}

impl NewComment {
    /// Validate field constraints. Parent/file consistency is checked by the
    /// store, which can see the parent row.
    pub fn validate(&self) -> Result<()> {
        let trimmed = self.content.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("comment content must not be empty"));
        }
        if trimmed.chars().count() > MAX_CONTENT_LEN {
            return Err(Error::validation(format!(
                "comment content must be at most {} characters",
                MAX_CONTENT_LEN
            )));
        }
        if self.user_id.is_none() {
            match &self.guest_name {
                Some(name) if !name.trim().is_empty() => {}
                _ => {
                    return Err(Error::validation(
                        "guest comments require a non-empty guest_name",
                    ))
                }
            }
        }
        if let Some(ts) = self.timestamp_seconds {
            if !ts.is_finite() || ts < 0.0 {
                return Err(Error::validation(
                    "timestamp_seconds must be non-negative",
                ));
            }
        }
        Ok(())
    }
}

/// A persisted reaction row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentReaction {
    /// Auto-incrementing id
    pub id: i64,

    /// Comment this reaction belongs to
    pub comment_id: i64,

    /// Reacting user id; `None` marks a guest
    pub user_id: Option<String>,

    /// Guest identifier, required when `user_id` is absent
    pub guest_identifier: Option<String>,

    /// Guest display name
    pub guest_name: Option<String>,

    /// Emoji string
    pub emoji: String,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Sort orders for the comment listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSort {
    /// Most recent first
    #[default]
    Newest,
    /// Oldest first
    Oldest,
    /// By media anchor, unanchored comments last
    Timestamp,
}

impl CommentSort {
    /// Parse from a query-string value; unknown values fall back to newest
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "oldest" => Self::Oldest,
            "timestamp" => Self::Timestamp,
            _ => Self::Newest,
        }
    }
}

/// A comment hydrated for delivery: author display info, direct replies
/// (one level) and reactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    /// The comment itself
    #[serde(flatten)]
    pub comment: Comment,

    /// Author display name
    pub author_name: String,

    /// Direct replies, hydrated without their own replies
    #[serde(default)]
    pub replies: Vec<CommentView>,

    /// Reactions on this comment
    #[serde(default)]
    pub reactions: Vec<CommentReaction>,
}

impl CommentView {
    /// Hydrate a bare comment with no replies or reactions
    #[must_use]
    pub fn bare(comment: Comment) -> Self {
        Self {
            author_name: comment.author_name(),
            comment,
            replies: Vec::new(),
            reactions: Vec::new(),
        }
    }
}
