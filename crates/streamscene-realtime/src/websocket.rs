//! WebSocket handler
//!
//! Accepts connections on the realtime endpoint, feeds client events into
//! the [`RealtimeService`](crate::service::RealtimeService) and forwards
//! room broadcasts back out. Handler errors are sent to the originating
//! connection only; the socket and the process stay up.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::service::{RealtimeService, RoomBroadcast};

/// Shared state for the WebSocket handler
pub struct RealtimeState {
    /// The broadcast service
    pub service: Arc<RealtimeService>,
}

impl RealtimeState {
    /// Create handler state over a service
    #[must_use]
    pub fn new(service: Arc<RealtimeService>) -> Self {
        Self { service }
    }
}

/// WebSocket upgrade handler
pub async fn realtime_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RealtimeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Whether a room broadcast should be delivered to a connection: never back
/// to its origin, and only to current members of the target room.
pub async fn should_deliver(
    broadcast: &RoomBroadcast,
    connection_id: Uuid,
    service: &RealtimeService,
) -> bool {
    if broadcast.origin == Some(connection_id) {
        return false;
    }
    service.registry.is_member(connection_id, &broadcast.room).await
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<RealtimeState>) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "realtime connection established");

    state.service.connect(connection_id).await;

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(tokio::sync::Mutex::new(sender));

    // Forward room broadcasts to this connection
    let mut broadcast_rx = state.service.subscribe();
    let service_for_broadcast = state.service.clone();
    let sender_for_broadcast = sender.clone();
    let broadcast_handle = tokio::spawn(async move {
        while let Ok(msg) = broadcast_rx.recv().await {
            if should_deliver(&msg, connection_id, &service_for_broadcast).await {
                if let Ok(json) = serde_json::to_string(&msg.message) {
                    let mut sender = sender_for_broadcast.lock().await;
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Main message loop
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!(connection_id = %connection_id, "received event");
                if let Err(e) =
                    handle_client_message(&text, connection_id, &state.service, &sender).await
                {
                    warn!(connection_id = %connection_id, error = %e, "event failed");
                    let mut sender = sender.lock().await;
                    let _ =
                        send_message(&mut sender, &ServerMessage::error(e.code(), e.to_string()))
                            .await;
                }
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "connection closed by client");
                break;
            }
            Ok(Message::Ping(data)) => {
                let mut sender = sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "websocket error");
                break;
            }
            _ => {}
        }
    }

    broadcast_handle.abort();
    state.service.disconnect(connection_id).await;
    info!(connection_id = %connection_id, "realtime connection closed");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<()> {
    let json = serde_json::to_string(message)?;
    sender.send(Message::Text(json)).await?;
    Ok(())
}

async fn handle_client_message(
    text: &str,
    connection_id: Uuid,
    service: &Arc<RealtimeService>,
    sender: &Arc<tokio::sync::Mutex<SplitSink<WebSocket, Message>>>,
) -> Result<()> {
    let msg: ClientMessage = serde_json::from_str(text)
        .map_err(|e| crate::error::Error::invalid_message(e.to_string()))?;

    let replies = dispatch(msg, connection_id, service).await?;

    if !replies.is_empty() {
        let mut sender = sender.lock().await;
        for reply in &replies {
            send_message(&mut sender, reply).await?;
        }
    }
    Ok(())
}

/// Route a client event to the service. Split out from the socket plumbing
/// so the mapping is testable without a transport.
pub async fn dispatch(
    msg: ClientMessage,
    connection_id: Uuid,
    service: &Arc<RealtimeService>,
) -> Result<Vec<ServerMessage>> {
    match msg {
        ClientMessage::UserIdentify {
            user_id,
            guest_name,
            guest_identifier,
        } => {
            service
                .identify(connection_id, user_id, guest_name, guest_identifier)
                .await?;
            Ok(Vec::new())
        }
        ClientMessage::JoinCanvas { canvas_id } => {
            service.join_canvas(connection_id, &canvas_id).await
        }
        ClientMessage::LeaveCanvas => service.leave_canvas(connection_id).await,
        ClientMessage::CanvasUpdate {
            canvas_data,
            operation,
            timestamp,
        } => {
            service
                .canvas_update(connection_id, canvas_data, operation, timestamp)
                .await
        }
        ClientMessage::CursorMove { x, y, canvas_id } => {
            service.cursor_move(connection_id, x, y, canvas_id).await
        }
        ClientMessage::JoinFile { file_id } => service.join_file(connection_id, file_id).await,
        ClientMessage::LeaveFile => service.leave_file(connection_id).await,
        ClientMessage::NewComment {
            file_id,
            content,
            timestamp_seconds,
            parent_comment_id,
            guest_name,
        } => {
            service
                .new_comment(
                    connection_id,
                    file_id,
                    content,
                    timestamp_seconds,
                    parent_comment_id,
                    guest_name,
                )
                .await
        }
        ClientMessage::CommentReaction {
            comment_id,
            emoji,
            action,
        } => {
            service
                .comment_reaction(connection_id, comment_id, emoji, action)
                .await
        }
        ClientMessage::MediaSync {
            file_id,
            current_time,
            is_playing,
            action,
        } => {
            service
                .media_sync(connection_id, file_id, current_time, is_playing, action)
                .await
        }
        ClientMessage::Ping => Ok(vec![ServerMessage::Pong]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RoomKey;
    use crate::store::{CanvasStore, CommentStore};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn shared_service() -> Arc<RealtimeService> {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let canvases = CanvasStore::new(pool.clone());
        canvases.init().await.unwrap();
        let comments = CommentStore::new(pool);
        comments.init().await.unwrap();
        Arc::new(RealtimeService::new(canvases, comments))
    }

    #[tokio::test]
    async fn test_dispatch_ping() {
        let service = shared_service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;

        let replies = dispatch(ClientMessage::Ping, conn, &service).await.unwrap();
        assert!(matches!(replies[0], ServerMessage::Pong));
    }

    #[tokio::test]
    async fn test_dispatch_join_returns_state() {
        let service = shared_service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;

        let replies = dispatch(
            ClientMessage::JoinCanvas {
                canvas_id: "room-1".to_string(),
            },
            conn,
            &service,
        )
        .await
        .unwrap();
        assert!(matches!(replies[0], ServerMessage::CanvasState { .. }));
    }

    #[tokio::test]
    async fn test_should_deliver_excludes_origin_and_non_members() {
        let service = shared_service().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        for conn in [a, b, outsider] {
            service.connect(conn).await;
        }
        service.join_canvas(a, "room-1").await.unwrap();
        service.join_canvas(b, "room-1").await.unwrap();

        let broadcast = RoomBroadcast {
            room: RoomKey::Canvas("room-1".to_string()),
            origin: Some(a),
            message: ServerMessage::Pong,
        };

        assert!(!should_deliver(&broadcast, a, &service).await);
        assert!(should_deliver(&broadcast, b, &service).await);
        assert!(!should_deliver(&broadcast, outsider, &service).await);
    }

    #[tokio::test]
    async fn test_should_deliver_full_room_includes_origin() {
        let service = shared_service().await;
        let a = Uuid::new_v4();
        service.connect(a).await;
        service.join_file(a, 7).await.unwrap();

        let broadcast = RoomBroadcast {
            room: RoomKey::File(7),
            origin: None,
            message: ServerMessage::Pong,
        };
        assert!(should_deliver(&broadcast, a, &service).await);
    }

    #[tokio::test]
    async fn test_dispatch_invalid_event_name() {
        let service = shared_service().await;
        let conn = Uuid::new_v4();
        service.connect(conn).await;

        let err: crate::error::Error =
            serde_json::from_str::<ClientMessage>(r#"{"type":"bogus-event"}"#)
                .map_err(|e| crate::error::Error::invalid_message(e.to_string()))
                .unwrap_err();
        assert_eq!(err.code(), "invalid_message");
    }
}
