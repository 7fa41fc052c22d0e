//! Realtime broadcast service
//!
//! Relays canvas updates, cursor positions, comments, reactions and media
//! sync events between room members, and keeps the durable record eventually
//! consistent. Broadcasts happen first and never wait for persistence; a
//! failed snapshot write is logged and accepted.
//!
//! Delivery scoping: a [`RoomBroadcast`] names the target room and an
//! optional origin connection. When the origin is set the event is
//! "others-only" (canvas updates, cursors, presence); when it is `None` the
//! whole room receives it, sender included (comments and reactions).

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::canvas::EditorRef;
use crate::comment::NewComment;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::protocol::{ReactionAction, SenderInfo, ServerMessage};
use crate::registry::{RoomKey, RoomRegistry};
use crate::snapshot::SnapshotPolicy;
use crate::store::{CanvasStore, CommentStore};

/// Default capacity of the broadcast channel
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// An event scoped to a room
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    /// Target room
    pub room: RoomKey,
    /// Originating connection, excluded from delivery when set
    pub origin: Option<Uuid>,
    /// Server message to deliver
    pub message: ServerMessage,
}

/// The realtime broadcast service
pub struct RealtimeService {
    /// Room membership and connection contexts
    pub registry: RoomRegistry,
    canvases: CanvasStore,
    comments: CommentStore,
    snapshots: SnapshotPolicy,
    broadcast_tx: broadcast::Sender<RoomBroadcast>,
}

impl RealtimeService {
    /// Create a service over the given stores with the default snapshot
    /// policy and broadcast capacity
    #[must_use]
    pub fn new(canvases: CanvasStore, comments: CommentStore) -> Self {
        let (broadcast_tx, _) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            registry: RoomRegistry::new(),
            canvases,
            comments,
            snapshots: SnapshotPolicy::new(),
            broadcast_tx,
        }
    }

    /// Replace the snapshot policy
    #[must_use]
    pub fn with_snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshots = policy;
        self
    }

    /// Subscribe to room broadcasts
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RoomBroadcast> {
        self.broadcast_tx.subscribe()
    }

    fn broadcast(&self, room: RoomKey, origin: Option<Uuid>, message: ServerMessage) {
        // Fire and forget; send only fails when nobody is subscribed.
        let _ = self.broadcast_tx.send(RoomBroadcast {
            room,
            origin,
            message,
        });
    }

    async fn sender_info(&self, connection_id: Uuid) -> SenderInfo {
        let identity = self
            .registry
            .context(connection_id)
            .await
            .map(|ctx| ctx.identity)
            .unwrap_or(Identity::Anonymous);
        SenderInfo::from_identity(connection_id, &identity)
    }

    /// Register a newly accepted connection
    pub async fn connect(&self, connection_id: Uuid) {
        self.registry.register(connection_id).await;
        debug!(connection_id = %connection_id, "connection registered");
    }

    /// Attach identity metadata to a connection (`user-identify`).
    ///
    /// Idempotent; no validation beyond shape. A guest without an identifier
    /// gets a generated one.
    pub async fn identify(
        &self,
        connection_id: Uuid,
        user_id: Option<String>,
        guest_name: Option<String>,
        guest_identifier: Option<String>,
    ) -> Result<()> {
        let identity = match (user_id, guest_name) {
            (Some(user_id), _) => Identity::User { user_id },
            (None, Some(guest_name)) => Identity::guest(guest_name, guest_identifier),
            (None, None) => Identity::Anonymous,
        };
        self.registry.identify(connection_id, identity).await;
        Ok(())
    }

    /// Join a canvas room (`join-canvas`).
    ///
    /// Auto-creates an unknown canvas with the default blank state. On
    /// success the joiner receives the persisted state (`canvas-state`) and
    /// existing members are notified; on authorization failure only the
    /// joiner hears about it.
    pub async fn join_canvas(
        &self,
        connection_id: Uuid,
        canvas_id: &str,
    ) -> Result<Vec<ServerMessage>> {
        let ctx = self
            .registry
            .context(connection_id)
            .await
            .unwrap_or_default();

        let canvas = self.canvases.get_or_create(canvas_id).await?;

        let user_id = ctx.identity.user_id().map(str::to_string);
        let is_collaborator = match &user_id {
            Some(uid) => self.canvases.is_collaborator(canvas_id, uid).await?,
            None => false,
        };
        if !canvas.can_join(user_id.as_deref(), is_collaborator) {
            return Err(Error::authorization(format!(
                "canvas {} is private",
                canvas_id
            )));
        }

        let room = RoomKey::Canvas(canvas_id.to_string());
        let sender = SenderInfo::from_identity(connection_id, &ctx.identity);

        if let Some(previous) = self.registry.join(connection_id, room.clone()).await {
            let member_count = self.registry.member_count(&previous).await;
            self.broadcast(
                previous,
                Some(connection_id),
                ServerMessage::CollaboratorLeft {
                    sender: sender.clone(),
                    member_count,
                },
            );
        }

        let member_count = self.registry.member_count(&room).await;
        self.broadcast(
            room,
            Some(connection_id),
            ServerMessage::CollaboratorJoined {
                sender,
                member_count,
            },
        );

        Ok(vec![ServerMessage::CanvasState { canvas }])
    }

    /// Leave the current canvas room (`leave-canvas`)
    pub async fn leave_canvas(&self, connection_id: Uuid) -> Result<Vec<ServerMessage>> {
        let Some(ctx) = self.registry.context(connection_id).await else {
            return Ok(Vec::new());
        };
        let Some(canvas_id) = ctx.canvas_room.clone() else {
            return Ok(Vec::new());
        };

        let room = RoomKey::Canvas(canvas_id);
        self.registry.leave(connection_id, &room).await;
        let member_count = self.registry.member_count(&room).await;
        self.broadcast(
            room,
            Some(connection_id),
            ServerMessage::CollaboratorLeft {
                sender: SenderInfo::from_identity(connection_id, &ctx.identity),
                member_count,
            },
        );
        Ok(Vec::new())
    }

    /// Relay a canvas edit to the rest of the room (`canvas-update`).
    ///
    /// Requires canvas-room membership. The broadcast goes out immediately;
    /// persistence is best-effort behind the snapshot policy, and a failed
    /// write is logged without surfacing to the sender.
    pub async fn canvas_update(
        &self,
        connection_id: Uuid,
        canvas_data: String,
        operation: String,
        timestamp: Option<i64>,
    ) -> Result<Vec<ServerMessage>> {
        let ctx = self
            .registry
            .context(connection_id)
            .await
            .unwrap_or_default();
        let Some(canvas_id) = ctx.canvas_room.clone() else {
            return Err(Error::NotInRoom(
                "canvas-update requires joining a canvas first".to_string(),
            ));
        };

        let room = RoomKey::Canvas(canvas_id.clone());
        self.broadcast(
            room,
            Some(connection_id),
            ServerMessage::CanvasUpdate {
                canvas_data: canvas_data.clone(),
                operation: operation.clone(),
                timestamp,
                sender: SenderInfo::from_identity(connection_id, &ctx.identity),
            },
        );

        if self.snapshots.should_persist(&canvas_id, &operation).await {
            let editor = match &ctx.identity {
                Identity::User { user_id } => Some(EditorRef::User(user_id.clone())),
                Identity::Guest {
                    guest_identifier, ..
                } => Some(EditorRef::Guest(guest_identifier.clone())),
                Identity::Anonymous => None,
            };
            match self
                .canvases
                .save_snapshot(&canvas_id, &canvas_data, editor.as_ref())
                .await
            {
                Ok(version) => {
                    debug!(canvas_id = %canvas_id, version, "snapshot persisted");
                }
                Err(e) => {
                    // The broadcast already happened; the durable record
                    // stays behind until the next successful write.
                    warn!(canvas_id = %canvas_id, error = %e, "snapshot write failed");
                }
            }
        }

        Ok(Vec::new())
    }

    /// Relay a cursor position (`cursor-move`); never persisted
    pub async fn cursor_move(
        &self,
        connection_id: Uuid,
        x: f64,
        y: f64,
        canvas_id: Option<String>,
    ) -> Result<Vec<ServerMessage>> {
        let ctx = self
            .registry
            .context(connection_id)
            .await
            .unwrap_or_default();
        let Some(canvas_id) = ctx.canvas_room.clone().or(canvas_id) else {
            return Ok(Vec::new());
        };

        self.broadcast(
            RoomKey::Canvas(canvas_id),
            Some(connection_id),
            ServerMessage::CursorMove {
                x,
                y,
                sender: SenderInfo::from_identity(connection_id, &ctx.identity),
            },
        );
        Ok(Vec::new())
    }

    /// Join a file comment/media room (`join-file`); no authorization check
    pub async fn join_file(&self, connection_id: Uuid, file_id: i64) -> Result<Vec<ServerMessage>> {
        let sender = self.sender_info(connection_id).await;
        let room = RoomKey::File(file_id);

        if let Some(previous) = self.registry.join(connection_id, room.clone()).await {
            let member_count = self.registry.member_count(&previous).await;
            self.broadcast(
                previous,
                Some(connection_id),
                ServerMessage::CollaboratorLeft {
                    sender: sender.clone(),
                    member_count,
                },
            );
        }

        let member_count = self.registry.member_count(&room).await;
        self.broadcast(
            room,
            Some(connection_id),
            ServerMessage::CollaboratorJoined {
                sender,
                member_count,
            },
        );
        Ok(Vec::new())
    }

    /// Leave the current file room (`leave-file`)
    pub async fn leave_file(&self, connection_id: Uuid) -> Result<Vec<ServerMessage>> {
        let Some(ctx) = self.registry.context(connection_id).await else {
            return Ok(Vec::new());
        };
        let Some(file_id) = ctx.file_room else {
            return Ok(Vec::new());
        };

        let room = RoomKey::File(file_id);
        self.registry.leave(connection_id, &room).await;
        let member_count = self.registry.member_count(&room).await;
        self.broadcast(
            room,
            Some(connection_id),
            ServerMessage::CollaboratorLeft {
                sender: SenderInfo::from_identity(connection_id, &ctx.identity),
                member_count,
            },
        );
        Ok(Vec::new())
    }

    /// Create a comment and announce it to the whole file room, sender
    /// included (`new-comment`). Persistence is synchronous: the broadcast
    /// only happens after the row exists.
    pub async fn new_comment(
        &self,
        connection_id: Uuid,
        file_id: i64,
        content: String,
        timestamp_seconds: Option<f64>,
        parent_comment_id: Option<i64>,
        guest_name: Option<String>,
    ) -> Result<Vec<ServerMessage>> {
        let ctx = self
            .registry
            .context(connection_id)
            .await
            .unwrap_or_default();

        let new = match &ctx.identity {
            Identity::User { user_id } => NewComment {
                file_id,
                user_id: Some(user_id.clone()),
                content,
                timestamp_seconds,
                parent_comment_id,
                ..Default::default()
            },
            Identity::Guest {
                guest_name,
                guest_identifier,
            } => NewComment {
                file_id,
                guest_name: Some(guest_name.clone()),
                guest_identifier: Some(guest_identifier.clone()),
                content,
                timestamp_seconds,
                parent_comment_id,
                ..Default::default()
            },
            Identity::Anonymous => NewComment {
                file_id,
                guest_name,
                content,
                timestamp_seconds,
                parent_comment_id,
                ..Default::default()
            },
        };

        let comment = self.comments.create(&new).await?;
        let view = self.comments.hydrate(comment).await?;

        // Full-room broadcast: the author sees its own comment come back.
        self.broadcast(
            RoomKey::File(file_id),
            None,
            ServerMessage::CommentAdded { comment: view },
        );
        Ok(Vec::new())
    }

    /// Add or remove a reaction (`comment-reaction`).
    ///
    /// The durable write is performed first; the room is only notified when
    /// it succeeded.
    pub async fn comment_reaction(
        &self,
        connection_id: Uuid,
        comment_id: i64,
        emoji: String,
        action: ReactionAction,
    ) -> Result<Vec<ServerMessage>> {
        let ctx = self
            .registry
            .context(connection_id)
            .await
            .unwrap_or_default();

        let comment = self
            .comments
            .find(comment_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("comment {}", comment_id)))?;
        let room = RoomKey::File(comment.file_id);

        match action {
            ReactionAction::Add => {
                let reaction = self
                    .comments
                    .add_reaction(comment_id, &ctx.identity, &emoji)
                    .await?;
                self.broadcast(room, None, ServerMessage::ReactionAdded { reaction });
            }
            ReactionAction::Remove => {
                let removed = self
                    .comments
                    .remove_reaction_by_identity(comment_id, &ctx.identity)
                    .await?
                    .ok_or_else(|| {
                        Error::not_found(format!("no reaction on comment {}", comment_id))
                    })?;
                self.broadcast(
                    room,
                    None,
                    ServerMessage::ReactionRemoved {
                        comment_id,
                        reaction_id: removed.id,
                    },
                );
            }
        }
        Ok(Vec::new())
    }

    /// Relay a media playback update to the rest of the file room
    /// (`media-sync`); no ordering or clock-sync guarantees
    pub async fn media_sync(
        &self,
        connection_id: Uuid,
        file_id: i64,
        current_time: f64,
        is_playing: bool,
        action: String,
    ) -> Result<Vec<ServerMessage>> {
        let sender = self.sender_info(connection_id).await;
        self.broadcast(
            RoomKey::File(file_id),
            Some(connection_id),
            ServerMessage::MediaSync {
                file_id,
                current_time,
                is_playing,
                action,
                sender,
            },
        );
        Ok(Vec::new())
    }

    /// Drop a connection, announcing its departure to any room it was in
    pub async fn disconnect(&self, connection_id: Uuid) {
        let sender = self.sender_info(connection_id).await;
        let rooms = self.registry.remove(connection_id).await;
        for room in rooms {
            let member_count = self.registry.member_count(&room).await;
            self.broadcast(
                room,
                Some(connection_id),
                ServerMessage::CollaboratorLeft {
                    sender: sender.clone(),
                    member_count,
                },
            );
        }
        debug!(connection_id = %connection_id, "connection removed");
    }

    /// Access the comment store (shared with the REST surface)
    #[must_use]
    pub fn comments(&self) -> &CommentStore {
        &self.comments
    }

    /// Access the canvas store
    #[must_use]
    pub fn canvases(&self) -> &CanvasStore {
        &self.canvases
    }
}

/// Shared handle used by the WebSocket and REST layers
pub type SharedService = Arc<RealtimeService>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, CollaboratorRole};
    use crate::snapshot::SnapshotPolicy;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    async fn service() -> RealtimeService {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let canvases = CanvasStore::new(pool.clone());
        canvases.init().await.unwrap();
        let comments = CommentStore::new(pool);
        comments.init().await.unwrap();
        RealtimeService::new(canvases, comments)
            .with_snapshot_policy(SnapshotPolicy::with_min_interval(Duration::from_secs(600)))
    }

    fn drain(rx: &mut broadcast::Receiver<RoomBroadcast>) -> Vec<RoomBroadcast> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn joined_guest(service: &RealtimeService, name: &str, canvas: &str) -> Uuid {
        let conn = Uuid::new_v4();
        service.connect(conn).await;
        service
            .identify(conn, None, Some(name.to_string()), None)
            .await
            .unwrap();
        service.join_canvas(conn, canvas).await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_join_auto_creates_with_defaults() {
        let service = service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;

        let replies = service.join_canvas(conn, "fresh-room").await.unwrap();
        assert_eq!(replies.len(), 1);
        match &replies[0] {
            ServerMessage::CanvasState { canvas } => {
                assert_eq!(canvas.id, "fresh-room");
                assert_eq!(canvas.width, 800);
                assert_eq!(canvas.height, 600);
                assert_eq!(canvas.background_color, "#ffffff");
                assert!(canvas.is_public);
                assert!(canvas.allow_anonymous_edit);
                assert_eq!(canvas.version, 1);
            }
            other => unreachable!("expected canvas-state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_private_canvas_join_denied() {
        let service = service().await;
        let mut canvas = Canvas::default_for("private-room");
        canvas.is_public = false;
        canvas.allow_anonymous_edit = false;
        canvas.user_id = "owner".to_string();
        service.canvases().create(&canvas).await.unwrap();

        let stranger = Uuid::new_v4();
        service.connect(stranger).await;
        service
            .identify(stranger, Some("stranger".to_string()), None, None)
            .await
            .unwrap();
        let err = service.join_canvas(stranger, "private-room").await.unwrap_err();
        assert_eq!(err.code(), "authorization_error");
        assert!(!service
            .registry
            .is_member(stranger, &RoomKey::Canvas("private-room".to_string()))
            .await);

        // Owner and collaborator get in
        let owner = Uuid::new_v4();
        service.connect(owner).await;
        service
            .identify(owner, Some("owner".to_string()), None, None)
            .await
            .unwrap();
        assert!(service.join_canvas(owner, "private-room").await.is_ok());

        service
            .canvases()
            .add_collaborator("private-room", "friend", CollaboratorRole::Editor)
            .await
            .unwrap();
        let friend = Uuid::new_v4();
        service.connect(friend).await;
        service
            .identify(friend, Some("friend".to_string()), None, None)
            .await
            .unwrap();
        assert!(service.join_canvas(friend, "private-room").await.is_ok());
    }

    #[tokio::test]
    async fn test_canvas_update_is_others_only() {
        let service = service().await;
        let a = joined_guest(&service, "Ada", "room-1").await;
        let _b = joined_guest(&service, "Bob", "room-1").await;

        let mut rx = service.subscribe();
        service
            .canvas_update(a, "{\"strokes\":[1]}".to_string(), "draw".to_string(), None)
            .await
            .unwrap();

        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 1);
        let update = &broadcasts[0];
        assert_eq!(update.room, RoomKey::Canvas("room-1".to_string()));
        // Origin set: the sender does not receive its own event back.
        assert_eq!(update.origin, Some(a));
        match &update.message {
            ServerMessage::CanvasUpdate { sender, operation, .. } => {
                assert_eq!(sender.display_name, "Ada");
                assert_eq!(operation, "draw");
            }
            other => unreachable!("expected canvas-update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_canvas_update_requires_room() {
        let service = service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;

        let err = service
            .canvas_update(conn, "{}".to_string(), "draw".to_string(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_in_room");
    }

    #[tokio::test]
    async fn test_draw_persistence_is_debounced() {
        let service = service().await;
        let conn = joined_guest(&service, "Ada", "room-1").await;

        for i in 0..5 {
            service
                .canvas_update(
                    conn,
                    format!("{{\"stroke\":{}}}", i),
                    "draw".to_string(),
                    None,
                )
                .await
                .unwrap();
        }

        // Only the first draw within the interval reaches the store
        let canvas = service.canvases().find("room-1").await.unwrap().unwrap();
        assert_eq!(canvas.version, 2);
        assert_eq!(canvas.canvas_data, "{\"stroke\":0}");

        // A clear persists regardless of the debounce
        service
            .canvas_update(conn, "{}".to_string(), "clear".to_string(), None)
            .await
            .unwrap();
        let canvas = service.canvases().find("room-1").await.unwrap().unwrap();
        assert_eq!(canvas.version, 3);
        assert_eq!(canvas.canvas_data, "{}");
    }

    #[tokio::test]
    async fn test_snapshot_records_guest_editor() {
        let service = service().await;
        let conn = joined_guest(&service, "Ada", "room-1").await;
        service
            .canvas_update(conn, "{}".to_string(), "clear".to_string(), None)
            .await
            .unwrap();

        let canvas = service.canvases().find("room-1").await.unwrap().unwrap();
        assert!(canvas.last_edited_by.is_none());
        assert!(canvas.last_edited_by_guest.is_some());
    }

    #[tokio::test]
    async fn test_new_comment_is_full_room() {
        let service = service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;
        service
            .identify(conn, None, Some("Ada".to_string()), None)
            .await
            .unwrap();
        service.join_file(conn, 7).await.unwrap();

        let mut rx = service.subscribe();
        service
            .new_comment(conn, 7, "nice edit".to_string(), Some(42.5), None, None)
            .await
            .unwrap();

        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 1);
        let added = &broadcasts[0];
        assert_eq!(added.room, RoomKey::File(7));
        // No origin: the sender's own connection receives comment-added too.
        assert_eq!(added.origin, None);
        match &added.message {
            ServerMessage::CommentAdded { comment } => {
                assert_eq!(comment.author_name, "Ada");
                assert_eq!(comment.comment.timestamp_seconds, Some(42.5));
            }
            other => unreachable!("expected comment-added, got {:?}", other),
        }

        // The row is durable before the broadcast
        let page = service
            .comments()
            .list_page(7, crate::comment::CommentSort::Newest, 1, 20)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_anonymous_comment_requires_guest_name() {
        let service = service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;

        let err = service
            .new_comment(conn, 7, "hello".to_string(), None, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        // Supplying a guest name on the event itself is enough
        assert!(service
            .new_comment(conn, 7, "hello".to_string(), None, None, Some("Ada".to_string()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_reaction_broadcast_gated_on_write() {
        let service = service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;
        service
            .identify(conn, None, Some("Ada".to_string()), Some("g-ada".to_string()))
            .await
            .unwrap();
        service.join_file(conn, 7).await.unwrap();
        service
            .new_comment(conn, 7, "hello".to_string(), None, None, None)
            .await
            .unwrap();
        let comment_id = service
            .comments()
            .list_page(7, crate::comment::CommentSort::Newest, 1, 1)
            .await
            .unwrap()
            .comments[0]
            .comment
            .id;

        let mut rx = service.subscribe();

        // Removing a reaction that was never placed fails and broadcasts nothing
        let err = service
            .comment_reaction(conn, comment_id, "👍".to_string(), ReactionAction::Remove)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(drain(&mut rx).is_empty());

        service
            .comment_reaction(conn, comment_id, "👍".to_string(), ReactionAction::Add)
            .await
            .unwrap();
        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 1);
        assert!(matches!(
            broadcasts[0].message,
            ServerMessage::ReactionAdded { .. }
        ));

        // Duplicate add fails the write, so nothing is announced
        let err = service
            .comment_reaction(conn, comment_id, "👍".to_string(), ReactionAction::Add)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(drain(&mut rx).is_empty());

        service
            .comment_reaction(conn, comment_id, "👍".to_string(), ReactionAction::Remove)
            .await
            .unwrap();
        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 1);
        assert!(matches!(
            broadcasts[0].message,
            ServerMessage::ReactionRemoved { .. }
        ));
    }

    #[tokio::test]
    async fn test_media_sync_relays_to_others() {
        let service = service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;
        service.join_file(conn, 7).await.unwrap();

        let mut rx = service.subscribe();
        service
            .media_sync(conn, 7, 12.0, true, "play".to_string())
            .await
            .unwrap();

        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].origin, Some(conn));
        assert!(matches!(
            broadcasts[0].message,
            ServerMessage::MediaSync { .. }
        ));
    }

    #[tokio::test]
    async fn test_join_notifies_existing_members() {
        let service = service().await;
        let _a = joined_guest(&service, "Ada", "room-1").await;

        let mut rx = service.subscribe();
        let b = joined_guest(&service, "Bob", "room-1").await;

        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].origin, Some(b));
        match &broadcasts[0].message {
            ServerMessage::CollaboratorJoined { sender, member_count } => {
                assert_eq!(sender.display_name, "Bob");
                assert_eq!(*member_count, 2);
            }
            other => unreachable!("expected collaborator-joined, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_switching_canvas_rooms_announces_departure() {
        let service = service().await;
        let conn = joined_guest(&service, "Ada", "room-1").await;

        let mut rx = service.subscribe();
        service.join_canvas(conn, "room-2").await.unwrap();

        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 2);
        assert_eq!(broadcasts[0].room, RoomKey::Canvas("room-1".to_string()));
        assert!(matches!(
            broadcasts[0].message,
            ServerMessage::CollaboratorLeft { .. }
        ));
        assert_eq!(broadcasts[1].room, RoomKey::Canvas("room-2".to_string()));
        assert!(matches!(
            broadcasts[1].message,
            ServerMessage::CollaboratorJoined { .. }
        ));
    }

    #[tokio::test]
    async fn test_disconnect_announces_departures() {
        let service = service().await;
        let conn = joined_guest(&service, "Ada", "room-1").await;
        service.join_file(conn, 7).await.unwrap();

        let mut rx = service.subscribe();
        service.disconnect(conn).await;

        let broadcasts = drain(&mut rx);
        assert_eq!(broadcasts.len(), 2);
        for b in &broadcasts {
            assert!(matches!(b.message, ServerMessage::CollaboratorLeft { .. }));
        }
        assert_eq!(service.registry.connection_count().await, 0);
    }
}
