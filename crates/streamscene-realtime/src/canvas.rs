//! Canvas data model
//!
//! A canvas is a shared drawable surface identified by a human-chosen slug.
//! Its drawable state is an opaque JSON blob (`canvas_data`) that is always
//! overwritten whole; the server never interprets or merges it. The
//! `version` counter only ever increases and is advisory - it is never
//! checked for conflicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum canvas dimension in pixels
pub const MIN_DIMENSION: u32 = 100;
/// Maximum canvas dimension in pixels
pub const MAX_DIMENSION: u32 = 4000;
/// Maximum collaborators on a single canvas
pub const MAX_COLLABORATORS_LIMIT: u32 = 100;

/// Who made the latest persisted edit. At most one of the two variants is
/// recorded per edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorRef {
    /// Authenticated user id
    User(String),
    /// Guest identifier
    Guest(String),
}

/// A canvas record as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canvas {
    /// Human-chosen identifier (room slug); immutable once created
    pub id: String,

    /// Owning user id; `"anonymous"` for auto-created canvases
    pub user_id: String,

    /// Display name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Pixel width, within [100, 4000]
    pub width: u32,

    /// Pixel height, within [100, 4000]
    pub height: u32,

    /// Background color as `#rrggbb`
    pub background_color: String,

    /// Whether anyone can join
    pub is_public: bool,

    /// Whether unauthenticated participants may edit
    pub allow_anonymous_edit: bool,

    /// Opaque serialized drawable state
    pub canvas_data: String,

    /// Monotonically increasing snapshot counter
    pub version: i64,

    /// Opaque secret enabling link-based access
    pub share_token: Option<String>,

    /// Maximum concurrent collaborators, within [1, 100]
    pub max_collaborators: u32,

    /// Last persisted activity
    pub last_activity: DateTime<Utc>,

    /// User id of the last editor, if a user
    pub last_edited_by: Option<String>,

    /// Guest identifier of the last editor, if a guest
    pub last_edited_by_guest: Option<String>,
}

impl Canvas {
    /// Default blank canvas created on first join of an unknown id:
    /// 800x600, white background, public, anonymous edit allowed, version 1.
    #[must_use]
    pub fn default_for(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            user_id: "anonymous".to_string(),
            description: None,
            width: 800,
            height: 600,
            background_color: "#ffffff".to_string(),
            is_public: true,
            allow_anonymous_edit: true,
            canvas_data: "{}".to_string(),
            version: 1,
            share_token: None,
            max_collaborators: 10,
            last_activity: Utc::now(),
            last_edited_by: None,
            last_edited_by_guest: None,
        }
    }

    /// Validate the constrained fields of this canvas
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("canvas id must not be empty"));
        }
        validate_dimension("width", self.width)?;
        validate_dimension("height", self.height)?;
        validate_color(&self.background_color)?;
        if self.max_collaborators < 1 || self.max_collaborators > MAX_COLLABORATORS_LIMIT {
            return Err(Error::validation(format!(
                "max_collaborators must be between 1 and {}",
                MAX_COLLABORATORS_LIMIT
            )));
        }
        Ok(())
    }

    /// Whether the given identity may join this canvas.
    ///
    /// Open to everyone when public or anonymous editing is allowed;
    /// otherwise restricted to the owner and registered collaborators.
    #[must_use]
    pub fn can_join(&self, user_id: Option<&str>, is_collaborator: bool) -> bool {
        if self.is_public || self.allow_anonymous_edit {
            return true;
        }
        match user_id {
            Some(uid) => uid == self.user_id || is_collaborator,
            None => false,
        }
    }
}

fn validate_dimension(field: &str, value: u32) -> Result<()> {
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
        return Err(Error::validation(format!(
            "{} must be between {} and {} pixels",
            field, MIN_DIMENSION, MAX_DIMENSION
        )));
    }
    Ok(())
}

/// Validate a `#rrggbb` color string
pub fn validate_color(color: &str) -> Result<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(Error::validation(format!(
            "background_color must be a 6-hex-digit color, got {:?}",
            color
        )));
    }
    Ok(())
}

/// Role of a collaborator on a canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    /// May view and edit
    Editor,
    /// May only view
    Viewer,
}

impl CollaboratorRole {
    /// Stable string form used in storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }
}
