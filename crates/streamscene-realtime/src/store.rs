//! Durable stores
//!
//! SQLite-backed persistence for canvases, comments and reactions, plus the
//! share-token lookup used by link-shared comment access. Stores are
//! constructed over an explicit pool and initialize their own schema; tests
//! run them against `sqlite::memory:`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::canvas::{Canvas, CollaboratorRole, EditorRef};
use crate::comment::{
    Comment, CommentReaction, CommentSort, CommentView, NewComment, TOMBSTONE,
};
use crate::error::{Error, Result};
use crate::identity::Identity;

/// Outcome of a comment delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Row kept, content replaced by the tombstone (it had replies)
    Soft,
    /// Row removed along with its reactions
    Hard,
}

/// A registered collaborator on a canvas
#[derive(Debug, Clone)]
pub struct CanvasCollaborator {
    /// Canvas the grant applies to
    pub canvas_id: String,
    /// Grantee user id
    pub user_id: String,
    /// Granted role
    pub role: CollaboratorRole,
}

/// SQLite-backed canvas store
pub struct CanvasStore {
    pool: SqlitePool,
}

impl CanvasStore {
    /// Create a new canvas store over the given pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS canvases (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                background_color TEXT NOT NULL,
                is_public INTEGER NOT NULL DEFAULT 1,
                allow_anonymous_edit INTEGER NOT NULL DEFAULT 1,
                canvas_data TEXT NOT NULL DEFAULT '{}',
                version INTEGER NOT NULL DEFAULT 1,
                share_token TEXT UNIQUE,
                max_collaborators INTEGER NOT NULL DEFAULT 10,
                last_activity TEXT NOT NULL,
                last_edited_by TEXT,
                last_edited_by_guest TEXT
            );

            CREATE TABLE IF NOT EXISTS canvas_collaborators (
                canvas_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'editor',
                PRIMARY KEY (canvas_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_canvases_user_id ON canvases(user_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a canvas by id
    pub async fn find(&self, id: &str) -> Result<Option<Canvas>> {
        let row = sqlx::query("SELECT * FROM canvases WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_canvas(&row)).transpose()
    }

    /// Insert a canvas after validating its constrained fields
    pub async fn create(&self, canvas: &Canvas) -> Result<()> {
        canvas.validate()?;

        sqlx::query(
            r#"
            INSERT INTO canvases
            (id, user_id, name, description, width, height, background_color,
             is_public, allow_anonymous_edit, canvas_data, version, share_token,
             max_collaborators, last_activity, last_edited_by, last_edited_by_guest)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&canvas.id)
        .bind(&canvas.user_id)
        .bind(&canvas.name)
        .bind(&canvas.description)
        .bind(canvas.width as i64)
        .bind(canvas.height as i64)
        .bind(&canvas.background_color)
        .bind(canvas.is_public as i64)
        .bind(canvas.allow_anonymous_edit as i64)
        .bind(&canvas.canvas_data)
        .bind(canvas.version)
        .bind(&canvas.share_token)
        .bind(canvas.max_collaborators as i64)
        .bind(canvas.last_activity.to_rfc3339())
        .bind(&canvas.last_edited_by)
        .bind(&canvas.last_edited_by_guest)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a canvas, creating it with the default blank state when absent
    pub async fn get_or_create(&self, id: &str) -> Result<Canvas> {
        if let Some(canvas) = self.find(id).await? {
            return Ok(canvas);
        }
        let canvas = Canvas::default_for(id);
        self.create(&canvas).await?;
        Ok(canvas)
    }

    /// Overwrite the stored blob with the latest full state.
    ///
    /// Bumps `version` by one, stamps `last_activity` and records the editor
    /// (user id or guest identifier, never both). Returns the new version.
    pub async fn save_snapshot(
        &self,
        id: &str,
        canvas_data: &str,
        editor: Option<&EditorRef>,
    ) -> Result<i64> {
        let (edited_by, edited_by_guest) = match editor {
            Some(EditorRef::User(uid)) => (Some(uid.clone()), None),
            Some(EditorRef::Guest(gid)) => (None, Some(gid.clone())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE canvases
            SET canvas_data = ?,
                version = version + 1,
                last_activity = ?,
                last_edited_by = ?,
                last_edited_by_guest = ?
            WHERE id = ?
            "#,
        )
        .bind(canvas_data)
        .bind(Utc::now().to_rfc3339())
        .bind(&edited_by)
        .bind(&edited_by_guest)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("canvas {}", id)));
        }

        let row = sqlx::query("SELECT version FROM canvases WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("version"))
    }

    /// Set or clear the share token of a canvas
    pub async fn set_share_token(&self, id: &str, token: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE canvases SET share_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("canvas {}", id)));
        }
        Ok(())
    }

    /// Grant a user access to a canvas
    pub async fn add_collaborator(
        &self,
        canvas_id: &str,
        user_id: &str,
        role: CollaboratorRole,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO canvas_collaborators (canvas_id, user_id, role) VALUES (?, ?, ?)",
        )
        .bind(canvas_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether a user is a registered collaborator on a canvas
    pub async fn is_collaborator(&self, canvas_id: &str, user_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM canvas_collaborators WHERE canvas_id = ? AND user_id = ?",
        )
        .bind(canvas_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// List collaborators on a canvas
    pub async fn list_collaborators(&self, canvas_id: &str) -> Result<Vec<CanvasCollaborator>> {
        let rows = sqlx::query(
            "SELECT canvas_id, user_id, role FROM canvas_collaborators WHERE canvas_id = ?",
        )
        .bind(canvas_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let role: String = row.get("role");
                CanvasCollaborator {
                    canvas_id: row.get("canvas_id"),
                    user_id: row.get("user_id"),
                    role: if role == "viewer" {
                        CollaboratorRole::Viewer
                    } else {
                        CollaboratorRole::Editor
                    },
                }
            })
            .collect())
    }
}

fn row_to_canvas(row: &sqlx::sqlite::SqliteRow) -> Result<Canvas> {
    let last_activity: String = row.get("last_activity");
    Ok(Canvas {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        width: row.get::<i64, _>("width") as u32,
        height: row.get::<i64, _>("height") as u32,
        background_color: row.get("background_color"),
        is_public: row.get::<i64, _>("is_public") != 0,
        allow_anonymous_edit: row.get::<i64, _>("allow_anonymous_edit") != 0,
        canvas_data: row.get("canvas_data"),
        version: row.get("version"),
        share_token: row.get("share_token"),
        max_collaborators: row.get::<i64, _>("max_collaborators") as u32,
        last_activity: parse_timestamp(&last_activity),
        last_edited_by: row.get("last_edited_by"),
        last_edited_by_guest: row.get("last_edited_by_guest"),
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// A page of hydrated top-level comments
#[derive(Debug, Clone)]
pub struct CommentPage {
    /// Hydrated comments in the requested order
    pub comments: Vec<CommentView>,
    /// Total number of top-level comments on the file
    pub total: i64,
    /// Requested page (1-based)
    pub page: u32,
    /// Requested page size
    pub limit: u32,
}

/// SQLite-backed comment and reaction store
pub struct CommentStore {
    pool: SqlitePool,
}

impl CommentStore {
    /// Create a new comment store over the given pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                user_id TEXT,
                guest_name TEXT,
                guest_identifier TEXT,
                content TEXT NOT NULL,
                timestamp_seconds REAL,
                parent_comment_id INTEGER,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                is_moderation_hidden INTEGER NOT NULL DEFAULT 0,
                is_edited INTEGER NOT NULL DEFAULT 0,
                is_moderated INTEGER NOT NULL DEFAULT 0,
                moderated_reason TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comment_reactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                comment_id INTEGER NOT NULL,
                user_id TEXT,
                guest_identifier TEXT,
                guest_name TEXT,
                emoji TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_comments_file_id ON comments(file_id);
            CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_reactions_user
                ON comment_reactions(comment_id, user_id) WHERE user_id IS NOT NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_reactions_guest
                ON comment_reactions(comment_id, guest_identifier) WHERE guest_identifier IS NOT NULL;
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a comment after validating it.
    ///
    /// A reply's parent must exist and live on the same file; guests without
    /// an identifier get a generated one.
    pub async fn create(&self, new: &NewComment) -> Result<Comment> {
        new.validate()?;

        if let Some(parent_id) = new.parent_comment_id {
            let parent = self
                .find(parent_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("parent comment {}", parent_id)))?;
            if parent.file_id != new.file_id {
                return Err(Error::validation(
                    "parent comment belongs to a different file",
                ));
            }
        }

        let guest_identifier = if new.user_id.is_none() {
            Some(
                new.guest_identifier
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            )
        } else {
            None
        };
        let guest_name = if new.user_id.is_none() {
            new.guest_name.clone()
        } else {
            None
        };
        let content = new.content.trim().to_string();
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO comments
            (file_id, user_id, guest_name, guest_identifier, content,
             timestamp_seconds, parent_comment_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.file_id)
        .bind(&new.user_id)
        .bind(&guest_name)
        .bind(&guest_identifier)
        .bind(&content)
        .bind(new.timestamp_seconds)
        .bind(new.parent_comment_id)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            file_id: new.file_id,
            user_id: new.user_id.clone(),
            guest_name,
            guest_identifier,
            content,
            timestamp_seconds: new.timestamp_seconds,
            parent_comment_id: new.parent_comment_id,
            is_deleted: false,
            is_moderation_hidden: false,
            is_edited: false,
            is_moderated: false,
            moderated_reason: None,
            created_at,
        })
    }

    /// Look up a comment by id
    pub async fn find(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row_to_comment(&row)))
    }

    /// Replace a comment's content and mark it edited
    pub async fn update_content(&self, id: i64, content: &str) -> Result<Comment> {
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.chars().count() > crate::comment::MAX_CONTENT_LEN {
            return Err(Error::validation(
                "comment content must be between 1 and 2000 characters",
            ));
        }

        let result =
            sqlx::query("UPDATE comments SET content = ?, is_edited = 1 WHERE id = ? AND is_deleted = 0")
                .bind(trimmed)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("comment {}", id)));
        }

        self.find(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("comment {}", id)))
    }

    /// Apply a moderation action to a comment
    pub async fn moderate(&self, id: i64, hidden: bool, reason: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE comments SET is_moderation_hidden = ?, is_moderated = 1, moderated_reason = ? WHERE id = ?",
        )
        .bind(hidden as i64)
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("comment {}", id)));
        }
        Ok(())
    }

    /// Number of replies under a comment
    pub async fn reply_count(&self, id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM comments WHERE parent_comment_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Delete a comment: soft (tombstone) when it has replies, hard
    /// otherwise. Hard deletion removes the reactions as well.
    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        if self.find(id).await?.is_none() {
            return Err(Error::not_found(format!("comment {}", id)));
        }

        if self.reply_count(id).await? > 0 {
            sqlx::query("UPDATE comments SET is_deleted = 1, content = ? WHERE id = ?")
                .bind(TOMBSTONE)
                .bind(id)
                .execute(&self.pool)
                .await?;
            return Ok(DeleteOutcome::Soft);
        }

        sqlx::query("DELETE FROM comment_reactions WHERE comment_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteOutcome::Hard)
    }

    /// Add a reaction for the given identity.
    ///
    /// Each identity may hold at most one reaction per comment; a second
    /// attempt is rejected as a validation error.
    pub async fn add_reaction(
        &self,
        comment_id: i64,
        identity: &Identity,
        emoji: &str,
    ) -> Result<CommentReaction> {
        if emoji.trim().is_empty() {
            return Err(Error::validation("emoji must not be empty"));
        }
        if self.find(comment_id).await?.is_none() {
            return Err(Error::not_found(format!("comment {}", comment_id)));
        }

        let (user_id, guest_identifier, guest_name) = match identity {
            Identity::User { user_id } => (Some(user_id.clone()), None, None),
            Identity::Guest {
                guest_name,
                guest_identifier,
            } => (
                None,
                Some(guest_identifier.clone()),
                Some(guest_name.clone()),
            ),
            Identity::Anonymous => {
                return Err(Error::validation("reactions require an identity"));
            }
        };

        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO comment_reactions
            (comment_id, user_id, guest_identifier, guest_name, emoji, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment_id)
        .bind(&user_id)
        .bind(&guest_identifier)
        .bind(&guest_name)
        .bind(emoji)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(Error::validation("identity already reacted to this comment"));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(CommentReaction {
            id: result.last_insert_rowid(),
            comment_id,
            user_id,
            guest_identifier,
            guest_name,
            emoji: emoji.to_string(),
            created_at,
        })
    }

    /// Remove a reaction by id; only the identity that placed it may remove
    /// it. Returns the removed reaction.
    pub async fn remove_reaction(
        &self,
        reaction_id: i64,
        identity: &Identity,
    ) -> Result<CommentReaction> {
        let row = sqlx::query("SELECT * FROM comment_reactions WHERE id = ?")
            .bind(reaction_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("reaction {}", reaction_id)))?;

        let reaction = row_to_reaction(&row);
        let owns = match identity {
            Identity::User { user_id } => reaction.user_id.as_deref() == Some(user_id),
            Identity::Guest {
                guest_identifier, ..
            } => reaction.guest_identifier.as_deref() == Some(guest_identifier),
            Identity::Anonymous => false,
        };
        if !owns {
            return Err(Error::authorization("reaction belongs to another identity"));
        }

        sqlx::query("DELETE FROM comment_reactions WHERE id = ?")
            .bind(reaction_id)
            .execute(&self.pool)
            .await?;
        Ok(reaction)
    }

    /// Remove the reaction a given identity holds on a comment, if any
    pub async fn remove_reaction_by_identity(
        &self,
        comment_id: i64,
        identity: &Identity,
    ) -> Result<Option<CommentReaction>> {
        let row = match identity {
            Identity::User { user_id } => {
                sqlx::query("SELECT * FROM comment_reactions WHERE comment_id = ? AND user_id = ?")
                    .bind(comment_id)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Identity::Guest {
                guest_identifier, ..
            } => {
                sqlx::query(
                    "SELECT * FROM comment_reactions WHERE comment_id = ? AND guest_identifier = ?",
                )
                .bind(comment_id)
                .bind(guest_identifier)
                .fetch_optional(&self.pool)
                .await?
            }
            Identity::Anonymous => None,
        };

        let Some(row) = row else {
            return Ok(None);
        };
        let reaction = row_to_reaction(&row);
        sqlx::query("DELETE FROM comment_reactions WHERE id = ?")
            .bind(reaction.id)
            .execute(&self.pool)
            .await?;
        Ok(Some(reaction))
    }

    /// Reactions on a comment
    pub async fn reactions_for(&self, comment_id: i64) -> Result<Vec<CommentReaction>> {
        let rows = sqlx::query(
            "SELECT * FROM comment_reactions WHERE comment_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(comment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_reaction).collect())
    }

    /// Hydrate a single comment with author info, replies and reactions
    pub async fn hydrate(&self, comment: Comment) -> Result<CommentView> {
        let replies = self.visible_replies(comment.id).await?;
        let reactions = self.reactions_for(comment.id).await?;
        let mut view = CommentView::bare(comment);
        view.replies = replies;
        view.reactions = reactions;
        Ok(view)
    }

    async fn visible_replies(&self, parent_id: i64) -> Result<Vec<CommentView>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM comments
            WHERE parent_comment_id = ? AND is_deleted = 0 AND is_moderation_hidden = 0
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        let mut replies = Vec::with_capacity(rows.len());
        for row in &rows {
            let comment = row_to_comment(row);
            let reactions = self.reactions_for(comment.id).await?;
            let mut view = CommentView::bare(comment);
            // Replies are one level deep: their own replies are not expanded.
            view.reactions = reactions;
            replies.push(view);
        }
        Ok(replies)
    }

    /// Page of top-level comments for a file, hydrated with one level of
    /// replies and reaction lists.
    ///
    /// Soft-deleted comments are excluded unless they still have visible
    /// replies, in which case the tombstone row is kept so the thread stays
    /// navigable. Moderation-hidden comments are never returned.
    pub async fn list_page(
        &self,
        file_id: i64,
        sort: CommentSort,
        page: u32,
        limit: u32,
    ) -> Result<CommentPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) as i64 * limit as i64;

        let order = match sort {
            CommentSort::Newest => "created_at DESC, id DESC",
            CommentSort::Oldest => "created_at ASC, id ASC",
            CommentSort::Timestamp => "timestamp_seconds IS NULL, timestamp_seconds ASC, id ASC",
        };

        let query = format!(
            r#"
            SELECT * FROM comments
            WHERE file_id = ? AND parent_comment_id IS NULL AND is_moderation_hidden = 0
            ORDER BY {}
            LIMIT ? OFFSET ?
            "#,
            order
        );
        let rows = sqlx::query(&query)
            .bind(file_id)
            .bind(limit as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in &rows {
            let comment = row_to_comment(row);
            let deleted = comment.is_deleted;
            let view = self.hydrate(comment).await?;
            if deleted && view.replies.is_empty() {
                continue;
            }
            comments.push(view);
        }

        let total_row = sqlx::query(
            "SELECT COUNT(*) AS n FROM comments WHERE file_id = ? AND parent_comment_id IS NULL AND is_moderation_hidden = 0",
        )
        .bind(file_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CommentPage {
            comments,
            total: total_row.get("n"),
            page,
            limit,
        })
    }
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Comment {
    let created_at: String = row.get("created_at");
    Comment {
        id: row.get("id"),
        file_id: row.get("file_id"),
        user_id: row.get("user_id"),
        guest_name: row.get("guest_name"),
        guest_identifier: row.get("guest_identifier"),
        content: row.get("content"),
        timestamp_seconds: row.get("timestamp_seconds"),
        parent_comment_id: row.get("parent_comment_id"),
        is_deleted: row.get::<i64, _>("is_deleted") != 0,
        is_moderation_hidden: row.get::<i64, _>("is_moderation_hidden") != 0,
        is_edited: row.get::<i64, _>("is_edited") != 0,
        is_moderated: row.get::<i64, _>("is_moderated") != 0,
        moderated_reason: row.get("moderated_reason"),
        created_at: parse_timestamp(&created_at),
    }
}

fn row_to_reaction(row: &sqlx::sqlite::SqliteRow) -> CommentReaction {
    let created_at: String = row.get("created_at");
    CommentReaction {
        id: row.get("id"),
        comment_id: row.get("comment_id"),
        user_id: row.get("user_id"),
        guest_identifier: row.get("guest_identifier"),
        guest_name: row.get("guest_name"),
        emoji: row.get("emoji"),
        created_at: parse_timestamp(&created_at),
    }
}

/// A link-share grant for a file
#[derive(Debug, Clone)]
pub struct ShareRecord {
    /// Row id
    pub id: i64,
    /// File the grant applies to
    pub file_id: i64,
    /// Opaque token carried in share links
    pub token: String,
    /// Expiry; `None` means no expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the grant was revoked
    pub revoked: bool,
}

/// Share-token lookup used by the REST comment listing for link-shared
/// access. The realtime core only consumes this interface.
#[async_trait]
pub trait ShareAccess: Send + Sync {
    /// Resolve a token to its share record, if any
    async fn find_by_token(&self, token: &str) -> Result<Option<ShareRecord>>;

    /// Whether a resolved record currently grants access
    fn can_access(&self, record: &ShareRecord) -> bool {
        !record.revoked
            && record
                .expires_at
                .map_or(true, |expires| expires > Utc::now())
    }
}

/// SQLite-backed share store
pub struct ShareStore {
    pool: SqlitePool,
}

impl ShareStore {
    /// Create a new share store over the given pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_shares (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                token TEXT NOT NULL UNIQUE,
                expires_at TEXT,
                revoked INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create a share for a file, returning the generated token
    pub async fn create_share(
        &self,
        file_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShareRecord> {
        let token = Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO file_shares (file_id, token, expires_at) VALUES (?, ?, ?)",
        )
        .bind(file_id)
        .bind(&token)
        .bind(expires_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(ShareRecord {
            id: result.last_insert_rowid(),
            file_id,
            token,
            expires_at,
            revoked: false,
        })
    }

    /// Revoke a share by token
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE file_shares SET revoked = 1 WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ShareAccess for ShareStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<ShareRecord>> {
        let row = sqlx::query("SELECT * FROM file_shares WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let expires_at: Option<String> = row.get("expires_at");
            ShareRecord {
                id: row.get("id"),
                file_id: row.get("file_id"),
                token: row.get("token"),
                expires_at: expires_at.as_deref().map(parse_timestamp),
                revoked: row.get::<i64, _>("revoked") != 0,
            }
        }))
    }
}
