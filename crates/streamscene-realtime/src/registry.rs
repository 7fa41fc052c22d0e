//! Room registry
//!
//! Tracks which connections belong to which broadcast room and the
//! [`ConnectionContext`] attached to each connection. Rooms are keyed by
//! resource: `canvas:<id>` for collaborative canvases, `file:<id>` for
//! comment/media rooms.
//!
//! All membership mutation happens through this registry; the broadcast
//! service consults it to scope deliveries.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::identity::{ConnectionContext, Identity};

/// Key of a broadcast room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// Canvas collaboration room
    Canvas(String),
    /// File comment/media room
    File(i64),
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canvas(id) => write!(f, "canvas:{}", id),
            Self::File(id) => write!(f, "file:{}", id),
        }
    }
}

/// In-memory registry of connections, their contexts and room memberships
pub struct RoomRegistry {
    /// Context per connection
    contexts: Arc<RwLock<HashMap<Uuid, ConnectionContext>>>,

    /// Member connections per room
    rooms: Arc<RwLock<HashMap<RoomKey, HashSet<Uuid>>>>,
}

impl RoomRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a newly accepted connection with an anonymous context
    pub async fn register(&self, connection_id: Uuid) {
        let mut contexts = self.contexts.write().await;
        contexts.insert(connection_id, ConnectionContext::new());
    }

    /// Attach identity metadata to a connection. Idempotent; re-identifying
    /// replaces the previous identity.
    pub async fn identify(&self, connection_id: Uuid, identity: Identity) {
        let mut contexts = self.contexts.write().await;
        if let Some(ctx) = contexts.get_mut(&connection_id) {
            ctx.identity = identity;
        }
    }

    /// Get a snapshot of a connection's context
    pub async fn context(&self, connection_id: Uuid) -> Option<ConnectionContext> {
        let contexts = self.contexts.read().await;
        contexts.get(&connection_id).cloned()
    }

    /// Add a connection to a room, recording the membership on its context.
    ///
    /// Returns the previous room of the same kind, if the connection held
    /// one; the caller is responsible for announcing that departure.
    pub async fn join(&self, connection_id: Uuid, room: RoomKey) -> Option<RoomKey> {
        let previous = {
            let mut contexts = self.contexts.write().await;
            let ctx = contexts.entry(connection_id).or_default();
            match &room {
                RoomKey::Canvas(id) => ctx
                    .canvas_room
                    .replace(id.clone())
                    .filter(|prev| prev != id)
                    .map(RoomKey::Canvas),
                RoomKey::File(id) => ctx
                    .file_room
                    .replace(*id)
                    .filter(|prev| prev != id)
                    .map(RoomKey::File),
            }
        };

        let mut rooms = self.rooms.write().await;
        if let Some(prev) = &previous {
            if let Some(members) = rooms.get_mut(prev) {
                members.remove(&connection_id);
                if members.is_empty() {
                    rooms.remove(prev);
                }
            }
        }
        rooms.entry(room).or_default().insert(connection_id);

        previous
    }

    /// Remove a connection from a room and clear the association on its
    /// context. Returns `true` when the connection was a member.
    pub async fn leave(&self, connection_id: Uuid, room: &RoomKey) -> bool {
        {
            let mut contexts = self.contexts.write().await;
            if let Some(ctx) = contexts.get_mut(&connection_id) {
                match room {
                    RoomKey::Canvas(id) => {
                        if ctx.canvas_room.as_deref() == Some(id.as_str()) {
                            ctx.canvas_room = None;
                        }
                    }
                    RoomKey::File(id) => {
                        if ctx.file_room == Some(*id) {
                            ctx.file_room = None;
                        }
                    }
                }
            }
        }

        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            rooms.remove(room);
        }
        removed
    }

    /// Member connections of a room
    pub async fn members(&self, room: &RoomKey) -> Vec<Uuid> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of members in a room
    pub async fn member_count(&self, room: &RoomKey) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room).map_or(0, HashSet::len)
    }

    /// Whether a connection is a member of a room
    pub async fn is_member(&self, connection_id: Uuid, room: &RoomKey) -> bool {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .is_some_and(|members| members.contains(&connection_id))
    }

    /// Drop a connection entirely, returning the rooms it was in so the
    /// caller can broadcast departures.
    pub async fn remove(&self, connection_id: Uuid) -> Vec<RoomKey> {
        let ctx = {
            let mut contexts = self.contexts.write().await;
            contexts.remove(&connection_id)
        };

        let mut left = Vec::new();
        if let Some(ctx) = ctx {
            let mut rooms = self.rooms.write().await;
            let keys: Vec<RoomKey> = ctx
                .canvas_room
                .into_iter()
                .map(RoomKey::Canvas)
                .chain(ctx.file_room.into_iter().map(RoomKey::File))
                .collect();
            for key in keys {
                if let Some(members) = rooms.get_mut(&key) {
                    if members.remove(&connection_id) {
                        left.push(key.clone());
                    }
                    if members.is_empty() {
                        rooms.remove(&key);
                    }
                }
            }
        }
        left
    }

    /// Number of tracked connections
    pub async fn connection_count(&self) -> usize {
        let contexts = self.contexts.read().await;
        contexts.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_key_display() {
        assert_eq!(RoomKey::Canvas("room-1".to_string()).to_string(), "canvas:room-1");
        assert_eq!(RoomKey::File(7).to_string(), "file:7");
    }

    #[tokio::test]
    async fn test_register_and_identify() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.register(conn).await;

        assert_eq!(registry.context(conn).await.unwrap().identity, Identity::Anonymous);

        registry
            .identify(conn, Identity::User { user_id: "u1".to_string() })
            .await;
        assert_eq!(
            registry.context(conn).await.unwrap().identity.user_id(),
            Some("u1")
        );
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.register(conn).await;

        let room = RoomKey::Canvas("room-1".to_string());
        assert!(registry.join(conn, room.clone()).await.is_none());
        assert!(registry.is_member(conn, &room).await);
        assert_eq!(registry.member_count(&room).await, 1);
        assert_eq!(
            registry.context(conn).await.unwrap().canvas_room.as_deref(),
            Some("room-1")
        );

        assert!(registry.leave(conn, &room).await);
        assert!(!registry.is_member(conn, &room).await);
        assert!(registry.context(conn).await.unwrap().canvas_room.is_none());
        // Leaving again is a no-op
        assert!(!registry.leave(conn, &room).await);
    }

    #[tokio::test]
    async fn test_joining_second_canvas_room_evicts_first() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.register(conn).await;

        let first = RoomKey::Canvas("room-1".to_string());
        let second = RoomKey::Canvas("room-2".to_string());
        registry.join(conn, first.clone()).await;

        let previous = registry.join(conn, second.clone()).await;
        assert_eq!(previous, Some(first.clone()));
        assert!(!registry.is_member(conn, &first).await);
        assert!(registry.is_member(conn, &second).await);
    }

    #[tokio::test]
    async fn test_canvas_and_file_rooms_are_independent() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.register(conn).await;

        registry.join(conn, RoomKey::Canvas("room-1".to_string())).await;
        let previous = registry.join(conn, RoomKey::File(7)).await;
        assert!(previous.is_none());

        let ctx = registry.context(conn).await.unwrap();
        assert_eq!(ctx.canvas_room.as_deref(), Some("room-1"));
        assert_eq!(ctx.file_room, Some(7));
    }

    #[tokio::test]
    async fn test_rejoining_same_room_reports_no_previous() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.register(conn).await;

        let room = RoomKey::Canvas("room-1".to_string());
        registry.join(conn, room.clone()).await;
        assert!(registry.join(conn, room.clone()).await.is_none());
        assert_eq!(registry.member_count(&room).await, 1);
    }

    #[tokio::test]
    async fn test_remove_returns_held_rooms() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.register(conn).await;

        registry.join(conn, RoomKey::Canvas("room-1".to_string())).await;
        registry.join(conn, RoomKey::File(7)).await;

        let left = registry.remove(conn).await;
        assert_eq!(left.len(), 2);
        assert!(left.contains(&RoomKey::Canvas("room-1".to_string())));
        assert!(left.contains(&RoomKey::File(7)));
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_members_lists_all_connections() {
        let registry = RoomRegistry::new();
        let room = RoomKey::File(7);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register(a).await;
        registry.register(b).await;
        registry.join(a, room.clone()).await;
        registry.join(b, room.clone()).await;

        let members = registry.members(&room).await;
        assert_eq!(members.len(), 2);
        assert!(members.contains(&a));
        assert!(members.contains(&b));
    }
}
