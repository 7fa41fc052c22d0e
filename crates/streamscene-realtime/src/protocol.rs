//! WebSocket protocol messages
//!
//! Client/server event types for the realtime channel. Event names follow
//! the wire surface (`user-identify`, `join-canvas`, `canvas-update`, ...)
//! via the kebab-case tag.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::Canvas;
use crate::comment::{CommentReaction, CommentView};
use crate::identity::Identity;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Attach identity metadata to this connection
    UserIdentify {
        /// Authenticated user id, if resolved upstream
        user_id: Option<String>,
        /// Guest display name
        guest_name: Option<String>,
        /// Existing guest identifier to keep across reconnects
        guest_identifier: Option<String>,
    },

    /// Join a canvas collaboration room
    JoinCanvas {
        /// Canvas id (room slug)
        canvas_id: String,
    },

    /// Leave the current canvas room
    LeaveCanvas,

    /// Broadcast a canvas edit to the rest of the room
    CanvasUpdate {
        /// Full serialized drawable state
        canvas_data: String,
        /// Operation kind (`draw`, `clear`, `undo`, ...)
        operation: String,
        /// Client-side timestamp in milliseconds, relayed verbatim
        timestamp: Option<i64>,
    },

    /// Relay a cursor position to the rest of the canvas room
    CursorMove {
        /// Cursor x position
        x: f64,
        /// Cursor y position
        y: f64,
        /// Canvas the cursor is on
        canvas_id: Option<String>,
    },

    /// Join a file comment/media room
    JoinFile {
        /// File id
        file_id: i64,
    },

    /// Leave the current file room
    LeaveFile,

    /// Post a comment to the file room
    NewComment {
        /// Target file
        file_id: i64,
        /// Comment body
        content: String,
        /// Optional media anchor in seconds
        timestamp_seconds: Option<f64>,
        /// Optional parent for threading
        parent_comment_id: Option<i64>,
        /// Guest display name when unauthenticated and not yet identified
        guest_name: Option<String>,
    },

    /// Add or remove a reaction on a comment
    CommentReaction {
        /// Target comment
        comment_id: i64,
        /// Emoji string
        emoji: String,
        /// Add or remove
        action: ReactionAction,
    },

    /// Relay a media playback position to the rest of the file room
    MediaSync {
        /// Target file
        file_id: i64,
        /// Playback position in seconds
        current_time: f64,
        /// Whether playback is running
        is_playing: bool,
        /// Action kind (`play`, `pause`, `seek`, ...)
        action: String,
    },

    /// Ping to keep the connection alive
    Ping,
}

/// Reaction action carried by `comment-reaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    /// Place a reaction
    Add,
    /// Remove the identity's reaction
    Remove,
}

/// Sender identity attached to relayed events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderInfo {
    /// Originating connection
    pub connection_id: Uuid,
    /// Display name of the sender
    pub display_name: String,
    /// User id when authenticated
    pub user_id: Option<String>,
    /// Guest identifier when a guest
    pub guest_identifier: Option<String>,
}

impl SenderInfo {
    /// Build sender info from a connection's identity
    #[must_use]
    pub fn from_identity(connection_id: Uuid, identity: &Identity) -> Self {
        Self {
            connection_id,
            display_name: identity.display_name(),
            user_id: identity.user_id().map(str::to_string),
            guest_identifier: identity.guest_identifier().map(str::to_string),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Persisted canvas state sent to a joining connection
    CanvasState {
        /// The canvas, including `canvas_data` and `version`
        canvas: Canvas,
    },

    /// A participant joined the room
    CollaboratorJoined {
        /// The new participant
        sender: SenderInfo,
        /// Members now in the room
        member_count: usize,
    },

    /// A participant left the room
    CollaboratorLeft {
        /// The departing participant
        sender: SenderInfo,
        /// Members remaining in the room
        member_count: usize,
    },

    /// A canvas edit relayed from another participant
    CanvasUpdate {
        /// Full serialized drawable state, verbatim from the sender
        canvas_data: String,
        /// Operation kind
        operation: String,
        /// Client-side timestamp, verbatim from the sender
        timestamp: Option<i64>,
        /// Who sent the edit
        sender: SenderInfo,
    },

    /// A cursor position relayed from another participant
    CursorMove {
        /// Cursor x position
        x: f64,
        /// Cursor y position
        y: f64,
        /// Who moved the cursor
        sender: SenderInfo,
    },

    /// A comment was created in the file room
    CommentAdded {
        /// The hydrated comment
        comment: CommentView,
    },

    /// A reaction was placed
    ReactionAdded {
        /// The persisted reaction
        reaction: CommentReaction,
    },

    /// A reaction was removed
    ReactionRemoved {
        /// Comment the reaction was on
        comment_id: i64,
        /// Removed reaction id
        reaction_id: i64,
    },

    /// A media playback update relayed from another participant
    MediaSync {
        /// Target file
        file_id: i64,
        /// Playback position in seconds
        current_time: f64,
        /// Whether playback is running
        is_playing: bool,
        /// Action kind
        action: String,
        /// Who sent the update
        sender: SenderInfo,
    },

    /// Error delivered to the originating connection only
    Error {
        /// Error code
        code: String,
        /// Error message
        message: String,
    },

    /// Pong response to ping
    Pong,
}

impl ServerMessage {
    /// Create an error message
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg = ClientMessage::JoinCanvas {
            canvas_id: "room-1".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join-canvas\""));

        let msg = ClientMessage::UserIdentify {
            user_id: Some("u1".to_string()),
            guest_name: None,
            guest_identifier: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"user-identify\""));
    }

    #[test]
    fn test_canvas_update_round_trip() {
        let json = r#"{"type":"canvas-update","canvas_data":"{\"strokes\":[]}","operation":"draw","timestamp":1700000000000}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::CanvasUpdate {
                canvas_data,
                operation,
                timestamp,
            } => {
                assert_eq!(operation, "draw");
                assert_eq!(timestamp, Some(1_700_000_000_000));
                assert!(canvas_data.contains("strokes"));
            }
            other => unreachable!("expected canvas-update, got {:?}", other),
        }
    }

    #[test]
    fn test_server_message_tags() {
        let msg = ServerMessage::error("validation_error", "empty content");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"code\":\"validation_error\""));

        let msg = ServerMessage::ReactionRemoved {
            comment_id: 1,
            reaction_id: 2,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"reaction-removed\""));
    }

    #[test]
    fn test_reaction_action_parse() {
        let json = r#"{"type":"comment-reaction","comment_id":3,"emoji":"👍","action":"add"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::CommentReaction { action, .. } => {
                assert_eq!(action, ReactionAction::Add);
            }
            other => unreachable!("expected comment-reaction, got {:?}", other),
        }
    }

    #[test]
    fn test_sender_info_from_identity() {
        let conn = Uuid::new_v4();
        let sender = SenderInfo::from_identity(conn, &Identity::guest("Ada", Some("g-1".into())));
        assert_eq!(sender.connection_id, conn);
        assert_eq!(sender.display_name, "Ada");
        assert!(sender.user_id.is_none());
        assert_eq!(sender.guest_identifier.as_deref(), Some("g-1"));
    }
}
