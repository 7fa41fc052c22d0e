//! StreamScene Realtime - Canvas collaboration and comment threads
//!
//! This crate provides the realtime subsystem for StreamScene:
//! - Canvas: canvas record, validation and join authorization
//! - Comment: comment/reaction records, threading and validation
//! - Registry: room membership and per-connection contexts
//! - Service: event relay and best-effort snapshot persistence
//! - Protocol: WebSocket client/server message types
//! - WebSocket: axum handler for the realtime endpoint
//! - Store: SQLite persistence for canvases, comments and shares
//! - Snapshot: debounce policy for draw-event persistence
//! - Error: error taxonomy for realtime and REST surfaces
//!
//! ## Consistency model
//!
//! Rooms relay raw full-state operations; the server never merges them.
//! Broadcast order per receiver matches server receipt order, but there is
//! no convergence guarantee between concurrent editors. The durable canvas
//! snapshot is written behind a debounce and may lag the live state; a
//! client joining mid-session receives the last persisted snapshot and
//! catches up from live broadcasts. This is a deliberate last-snapshot-wins
//! design, not an oversight.
//!
//! ## Usage
//!
//! ```ignore
//! use streamscene_realtime::{
//!     CanvasStore, CommentStore, RealtimeService, RealtimeState,
//!     realtime_ws_handler,
//! };
//! use axum::{routing::get, Router};
//! use std::sync::Arc;
//!
//! let canvases = CanvasStore::new(pool.clone());
//! let comments = CommentStore::new(pool);
//! let service = Arc::new(RealtimeService::new(canvases, comments));
//! let state = Arc::new(RealtimeState::new(service));
//!
//! let app: Router<()> = Router::new()
//!     .route("/api/v1/realtime/ws", get(realtime_ws_handler))
//!     .with_state(state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod canvas;
pub mod comment;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod websocket;

// Re-export main types
pub use canvas::{Canvas, CollaboratorRole, EditorRef};
pub use comment::{
    Comment, CommentReaction, CommentSort, CommentView, NewComment, TOMBSTONE,
};
pub use error::{Error, Result};
pub use identity::{ConnectionContext, Identity};
pub use protocol::{ClientMessage, ReactionAction, SenderInfo, ServerMessage};
pub use registry::{RoomKey, RoomRegistry};
pub use service::{RealtimeService, RoomBroadcast, SharedService};
pub use snapshot::SnapshotPolicy;
pub use store::{
    CanvasCollaborator, CanvasStore, CommentPage, CommentStore, DeleteOutcome, ShareAccess,
    ShareRecord, ShareStore,
};
pub use websocket::{realtime_ws_handler, RealtimeState};
