//! Integration tests for StreamScene
//!
//! These tests drive the realtime subsystem end to end through the wire
//! protocol: raw JSON events go through the dispatcher, broadcasts are
//! checked against the delivery rules, and the durable record is read back
//! the way the REST surface reads it.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use streamscene_realtime::{
    websocket::{dispatch, should_deliver},
    CanvasStore, ClientMessage, CommentSort, CommentStore, RealtimeService, RoomKey, ServerMessage,
    SnapshotPolicy,
};

async fn shared_service() -> Arc<RealtimeService> {
    let pool = SqlitePoolOptions::new()
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let canvases = CanvasStore::new(pool.clone());
    canvases.init().await.unwrap();
    let comments = CommentStore::new(pool);
    comments.init().await.unwrap();
    Arc::new(
        RealtimeService::new(canvases, comments)
            .with_snapshot_policy(SnapshotPolicy::with_min_interval(Duration::from_secs(600))),
    )
}

/// Parse a raw wire event and dispatch it for a connection
async fn send(
    service: &Arc<RealtimeService>,
    conn: Uuid,
    raw: &str,
) -> streamscene_realtime::Result<Vec<ServerMessage>> {
    let msg: ClientMessage = serde_json::from_str(raw).unwrap();
    dispatch(msg, conn, service).await
}

// ============================================================================
// Canvas collaboration session
// ============================================================================

#[tokio::test]
async fn test_collaboration_session_over_wire_protocol() {
    let service = shared_service().await;

    let ada = Uuid::new_v4();
    let bob = Uuid::new_v4();
    service.connect(ada).await;
    service.connect(bob).await;

    send(
        &service,
        ada,
        r#"{"type":"user-identify","user_id":null,"guest_name":"Ada","guest_identifier":null}"#,
    )
    .await
    .unwrap();
    send(
        &service,
        bob,
        r#"{"type":"user-identify","user_id":"bob","guest_name":null,"guest_identifier":null}"#,
    )
    .await
    .unwrap();

    // Ada joins and receives the freshly created canvas state
    let replies = send(&service, ada, r#"{"type":"join-canvas","canvas_id":"room-1"}"#)
        .await
        .unwrap();
    match &replies[0] {
        ServerMessage::CanvasState { canvas } => {
            assert_eq!(canvas.id, "room-1");
            assert_eq!(canvas.version, 1);
        }
        other => unreachable!("expected canvas-state, got {:?}", other),
    }

    let mut rx = service.subscribe();
    send(&service, bob, r#"{"type":"join-canvas","canvas_id":"room-1"}"#)
        .await
        .unwrap();

    // Ada hears about Bob; Bob does not hear about himself
    let joined = rx.try_recv().unwrap();
    assert!(should_deliver(&joined, ada, &service).await);
    assert!(!should_deliver(&joined, bob, &service).await);
    match &joined.message {
        ServerMessage::CollaboratorJoined { sender, member_count } => {
            assert_eq!(sender.display_name, "bob");
            assert_eq!(*member_count, 2);
        }
        other => unreachable!("expected collaborator-joined, got {:?}", other),
    }

    // Ada draws; the event relays to Bob and the snapshot is persisted
    send(
        &service,
        ada,
        r#"{"type":"canvas-update","canvas_data":"{\"strokes\":[1]}","operation":"draw","timestamp":1700000000000}"#,
    )
    .await
    .unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.room, RoomKey::Canvas("room-1".to_string()));
    assert!(!should_deliver(&update, ada, &service).await);
    assert!(should_deliver(&update, bob, &service).await);

    let canvas = service.canvases().find("room-1").await.unwrap().unwrap();
    assert_eq!(canvas.version, 2);
    assert_eq!(canvas.canvas_data, "{\"strokes\":[1]}");
    assert!(canvas.last_edited_by_guest.is_some());

    // A late joiner receives the persisted state, not a blank canvas
    let carol = Uuid::new_v4();
    service.connect(carol).await;
    let replies = send(&service, carol, r#"{"type":"join-canvas","canvas_id":"room-1"}"#)
        .await
        .unwrap();
    match &replies[0] {
        ServerMessage::CanvasState { canvas } => {
            assert_eq!(canvas.canvas_data, "{\"strokes\":[1]}");
            assert_eq!(canvas.version, 2);
        }
        other => unreachable!("expected canvas-state, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_without_room_is_rejected_to_sender_only() {
    let service = shared_service().await;
    let conn = Uuid::new_v4();
    service.connect(conn).await;

    let mut rx = service.subscribe();
    let err = send(
        &service,
        conn,
        r#"{"type":"canvas-update","canvas_data":"{}","operation":"draw","timestamp":null}"#,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "not_in_room");
    assert!(rx.try_recv().is_err());
}

// ============================================================================
// Comment threads over the file room
// ============================================================================

#[tokio::test]
async fn test_comment_thread_between_guest_and_user() {
    let service = shared_service().await;

    let ada = Uuid::new_v4();
    let bob = Uuid::new_v4();
    service.connect(ada).await;
    service.connect(bob).await;
    send(
        &service,
        ada,
        r#"{"type":"user-identify","user_id":null,"guest_name":"Ada","guest_identifier":null}"#,
    )
    .await
    .unwrap();
    send(
        &service,
        bob,
        r#"{"type":"user-identify","user_id":"bob","guest_name":null,"guest_identifier":null}"#,
    )
    .await
    .unwrap();
    send(&service, ada, r#"{"type":"join-file","file_id":7}"#)
        .await
        .unwrap();
    send(&service, bob, r#"{"type":"join-file","file_id":7}"#)
        .await
        .unwrap();

    let mut rx = service.subscribe();
    send(
        &service,
        ada,
        r#"{"type":"new-comment","file_id":7,"content":"look at 42.5","timestamp_seconds":42.5,"parent_comment_id":null,"guest_name":null}"#,
    )
    .await
    .unwrap();

    // comment-added is full-room: Ada receives her own comment back
    let added = rx.try_recv().unwrap();
    assert_eq!(added.origin, None);
    assert!(should_deliver(&added, ada, &service).await);
    assert!(should_deliver(&added, bob, &service).await);
    let parent_id = match &added.message {
        ServerMessage::CommentAdded { comment } => {
            assert_eq!(comment.author_name, "Ada");
            comment.comment.id
        }
        other => unreachable!("expected comment-added, got {:?}", other),
    };

    // Bob replies and reacts
    send(
        &service,
        bob,
        &format!(
            r#"{{"type":"new-comment","file_id":7,"content":"nice","timestamp_seconds":null,"parent_comment_id":{},"guest_name":null}}"#,
            parent_id
        ),
    )
    .await
    .unwrap();
    send(
        &service,
        bob,
        &format!(
            r#"{{"type":"comment-reaction","comment_id":{},"emoji":"👍","action":"add"}}"#,
            parent_id
        ),
    )
    .await
    .unwrap();

    // The listing the REST surface serves shows the hydrated thread
    let page = service
        .comments()
        .list_page(7, CommentSort::Timestamp, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let top = &page.comments[0];
    assert_eq!(top.comment.timestamp_seconds, Some(42.5));
    assert_eq!(top.replies.len(), 1);
    assert_eq!(top.replies[0].comment.user_id.as_deref(), Some("bob"));
    assert_eq!(top.reactions.len(), 1);
    assert_eq!(top.reactions[0].emoji, "👍");
}

// ============================================================================
// Room isolation and lifecycle
// ============================================================================

#[tokio::test]
async fn test_rooms_do_not_leak_between_canvases() {
    let service = shared_service().await;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    service.connect(a).await;
    service.connect(b).await;
    send(&service, a, r#"{"type":"join-canvas","canvas_id":"room-1"}"#)
        .await
        .unwrap();
    send(&service, b, r#"{"type":"join-canvas","canvas_id":"room-2"}"#)
        .await
        .unwrap();

    let mut rx = service.subscribe();
    send(
        &service,
        a,
        r#"{"type":"canvas-update","canvas_data":"{}","operation":"clear","timestamp":null}"#,
    )
    .await
    .unwrap();

    let update = rx.try_recv().unwrap();
    assert!(!should_deliver(&update, b, &service).await);
}

#[tokio::test]
async fn test_canvas_and_file_rooms_are_independent() {
    let service = shared_service().await;
    let conn = Uuid::new_v4();
    service.connect(conn).await;

    send(&service, conn, r#"{"type":"join-canvas","canvas_id":"room-1"}"#)
        .await
        .unwrap();
    send(&service, conn, r#"{"type":"join-file","file_id":7}"#)
        .await
        .unwrap();

    // Joining a file room does not evict the canvas room
    assert!(
        service
            .registry
            .is_member(conn, &RoomKey::Canvas("room-1".to_string()))
            .await
    );
    assert!(service.registry.is_member(conn, &RoomKey::File(7)).await);

    // A second canvas does evict the first
    send(&service, conn, r#"{"type":"join-canvas","canvas_id":"room-2"}"#)
        .await
        .unwrap();
    assert!(
        !service
            .registry
            .is_member(conn, &RoomKey::Canvas("room-1".to_string()))
            .await
    );
    assert!(service.registry.is_member(conn, &RoomKey::File(7)).await);
}

#[tokio::test]
async fn test_disconnect_cleans_up_everything() {
    let service = shared_service().await;
    let stayer = Uuid::new_v4();
    let leaver = Uuid::new_v4();
    service.connect(stayer).await;
    service.connect(leaver).await;
    send(&service, stayer, r#"{"type":"join-canvas","canvas_id":"room-1"}"#)
        .await
        .unwrap();
    send(&service, leaver, r#"{"type":"join-canvas","canvas_id":"room-1"}"#)
        .await
        .unwrap();
    send(&service, leaver, r#"{"type":"join-file","file_id":7}"#)
        .await
        .unwrap();

    let mut rx = service.subscribe();
    service.disconnect(leaver).await;

    // One departure per room the connection was in
    let mut rooms = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        assert!(matches!(msg.message, ServerMessage::CollaboratorLeft { .. }));
        rooms.push(msg.room);
    }
    assert_eq!(rooms.len(), 2);
    assert!(rooms.contains(&RoomKey::Canvas("room-1".to_string())));
    assert!(rooms.contains(&RoomKey::File(7)));

    assert!(
        !service
            .registry
            .is_member(leaver, &RoomKey::Canvas("room-1".to_string()))
            .await
    );
    assert_eq!(service.registry.connection_count().await, 1);
}

// ============================================================================
// Wire protocol shape
// ============================================================================

#[tokio::test]
async fn test_ping_pong() {
    let service = shared_service().await;
    let conn = Uuid::new_v4();
    service.connect(conn).await;

    let replies = send(&service, conn, r#"{"type":"ping"}"#).await.unwrap();
    assert!(matches!(replies[0], ServerMessage::Pong));
    assert_eq!(
        serde_json::to_string(&replies[0]).unwrap(),
        r#"{"type":"pong"}"#
    );
}

#[test]
fn test_unknown_event_is_rejected() {
    let parsed = serde_json::from_str::<ClientMessage>(r#"{"type":"shapeshift"}"#);
    assert!(parsed.is_err());
}
