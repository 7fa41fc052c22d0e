//! Participant identity and per-connection context
//!
//! Every WebSocket connection carries a [`ConnectionContext`]: the resolved
//! identity (authenticated user, named guest, or anonymous) plus the rooms
//! the connection currently belongs to. The context is a typed structure set
//! at identification time and updated on join/leave, never free-form
//! metadata attached to the socket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is on the other end of a connection.
///
/// Authentication happens upstream; the realtime core only consumes a
/// pre-resolved identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// Connection has not identified itself yet
    Anonymous,

    /// Authenticated user
    User {
        /// Resolved user id
        user_id: String,
    },

    /// Unauthenticated participant with a display name and a generated
    /// identifier that distinguishes it from other guests
    Guest {
        /// User-supplied display name
        guest_name: String,
        /// Generated opaque identifier
        guest_identifier: String,
    },
}

impl Identity {
    /// Build a guest identity, generating an identifier when none is supplied
    #[must_use]
    pub fn guest(guest_name: impl Into<String>, guest_identifier: Option<String>) -> Self {
        Self::Guest {
            guest_name: guest_name.into(),
            guest_identifier: guest_identifier.unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }

    /// Authenticated user id, if any
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id } => Some(user_id),
            _ => None,
        }
    }

    /// Guest identifier, if this is a guest
    #[must_use]
    pub fn guest_identifier(&self) -> Option<&str> {
        match self {
            Self::Guest {
                guest_identifier, ..
            } => Some(guest_identifier),
            _ => None,
        }
    }

    /// Name shown to other room members
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::User { user_id } => user_id.clone(),
            Self::Guest { guest_name, .. } => guest_name.clone(),
        }
    }
}

/// Per-connection state tracked by the room registry.
///
/// A connection holds at most one canvas room and one file room at a time;
/// joining a new room of either kind implicitly leaves the previous one.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Resolved identity; starts anonymous
    pub identity: Identity,
    /// Canvas room this connection is in, if any
    pub canvas_room: Option<String>,
    /// File room this connection is in, if any
    pub file_room: Option<i64>,
}

impl ConnectionContext {
    /// Fresh context for a newly accepted connection
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: Identity::Anonymous,
            canvas_room: None,
            file_room: None,
        }
    }
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new()
    }
}
