//! Connection registry: which connection serves which room and seat.
//!
//! The registry is an explicitly owned, lock-guarded object shared by
//! handle; it is best-effort derived state and is reconstructable from
//! scratch on restart (every room simply counts as disconnected).
//!
//! Connections are represented by an internal id plus an unbounded channel
//! sender feeding the connection's writer task. Channel sends never block,
//! so the registry lock is never held across an await; a failed send means
//! the writer task is gone and is treated as an implicit disconnect.

use crate::protocol::ServerMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one live client connection.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    id: u64,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ClientConnection {
    /// Wraps a writer-task sender into a connection handle with a fresh id.
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }

    /// The connection's internal id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queues a message for delivery. Returns false when the connection's
    /// writer task has gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

struct Binding {
    connection: ClientConnection,
    participant_token: String,
}

#[derive(Default)]
struct RegistryInner {
    /// Room id to the bindings currently in that room.
    rooms: HashMap<String, Vec<Binding>>,
    /// Reverse index: connection id to (room id, participant token).
    index: HashMap<u64, (String, String)>,
}

/// Registry of live connection bindings, shared across tasks.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        info!("Creating connection registry");
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
        }
    }

    /// Binds a connection into a room under a participant token.
    ///
    /// Any prior binding of the same connection is released first (a
    /// connection serves at most one room). If the token already has a
    /// different live connection bound in this room, the stale binding is
    /// silently superseded; the stale connection is left to its own
    /// lifecycle rather than being force-closed here.
    #[instrument(skip(self, connection), fields(connection_id = connection.id()))]
    pub fn connect(&self, connection: ClientConnection, room_id: &str, participant_token: &str) {
        let mut inner = self.inner.lock().unwrap();

        if let Some((old_room, _)) = inner.index.remove(&connection.id()) {
            debug!(old_room = %old_room, "Releasing prior binding for connection");
            remove_binding(&mut inner.rooms, &old_room, connection.id());
        }

        let room = inner.rooms.entry(room_id.to_string()).or_default();
        if let Some(stale) = room
            .iter()
            .position(|b| b.participant_token == participant_token)
        {
            let old = room.swap_remove(stale);
            warn!(
                room_id,
                participant_token,
                stale_connection_id = old.connection.id(),
                "Superseding stale connection for participant"
            );
            inner.index.remove(&old.connection.id());
        }

        let room = inner.rooms.entry(room_id.to_string()).or_default();
        room.push(Binding {
            connection: connection.clone(),
            participant_token: participant_token.to_string(),
        });
        inner.index.insert(
            connection.id(),
            (room_id.to_string(), participant_token.to_string()),
        );

        info!(
            room_id,
            participant_token,
            room_size = inner.rooms.get(room_id).map_or(0, Vec::len),
            "Connection bound to room"
        );
    }

    /// Unbinds a connection, looking its room and token up from the
    /// reverse index. Returns the released `(room id, participant token)`
    /// pair, or `None` if the connection was not bound (making repeated
    /// disconnects a no-op). The room entry is dropped once empty.
    #[instrument(skip(self))]
    pub fn disconnect(&self, connection_id: u64) -> Option<(String, String)> {
        let mut inner = self.inner.lock().unwrap();
        let (room_id, token) = inner.index.remove(&connection_id)?;
        remove_binding(&mut inner.rooms, &room_id, connection_id);
        info!(
            room_id = %room_id,
            participant_token = %token,
            "Connection unbound from room"
        );
        Some((room_id, token))
    }

    /// Sends a message to one connection. A delivery failure is treated as
    /// an implicit disconnect: the connection is unbound and `false` is
    /// returned.
    #[instrument(skip(self, connection, message), fields(connection_id = connection.id()))]
    pub fn send(&self, connection: &ClientConnection, message: ServerMessage) -> bool {
        if connection.send(message) {
            return true;
        }
        warn!(
            connection_id = connection.id(),
            "Send failed, treating as disconnect"
        );
        self.disconnect(connection.id());
        false
    }

    /// Delivers a message to every connection in a room, optionally
    /// excluding one participant token.
    ///
    /// A failure for one recipient never blocks the others: failed
    /// connections are logged and individually unbound, and the call never
    /// returns an error.
    #[instrument(skip(self, message))]
    pub fn broadcast(
        &self,
        room_id: &str,
        message: &ServerMessage,
        exclude_participant_token: Option<&str>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let Some(room) = inner.rooms.get(room_id) else {
            debug!(room_id, "Broadcast to unknown or empty room");
            return;
        };

        let mut failed = Vec::new();
        for binding in room {
            if exclude_participant_token == Some(binding.participant_token.as_str()) {
                continue;
            }
            if !binding.connection.send(message.clone()) {
                warn!(
                    room_id,
                    participant_token = %binding.participant_token,
                    connection_id = binding.connection.id(),
                    "Broadcast delivery failed, unbinding recipient"
                );
                failed.push(binding.connection.id());
            }
        }

        for connection_id in failed {
            inner.index.remove(&connection_id);
            remove_binding(&mut inner.rooms, room_id, connection_id);
        }
    }

    /// Looks up the live connection bound for a participant in a room.
    #[instrument(skip(self))]
    pub fn lookup(&self, room_id: &str, participant_token: &str) -> Option<ClientConnection> {
        let inner = self.inner.lock().unwrap();
        inner
            .rooms
            .get(room_id)?
            .iter()
            .find(|b| b.participant_token == participant_token)
            .map(|b| b.connection.clone())
    }

    /// Number of connections currently bound in a room.
    pub fn room_size(&self, room_id: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.rooms.get(room_id).map_or(0, Vec::len)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_binding(rooms: &mut HashMap<String, Vec<Binding>>, room_id: &str, connection_id: u64) {
    if let Some(room) = rooms.get_mut(room_id) {
        room.retain(|b| b.connection.id() != connection_id);
        if room.is_empty() {
            rooms.remove(room_id);
            debug!(room_id, "Room removed, last participant unbound");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn test_connection() -> (ClientConnection, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientConnection::new(tx), rx)
    }

    #[test]
    fn test_connect_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = test_connection();
        registry.connect(conn.clone(), "room1", "alice");

        let found = registry.lookup("room1", "alice").expect("binding missing");
        assert_eq!(found.id(), conn.id());
        assert!(registry.lookup("room1", "bob").is_none());
        assert_eq!(registry.room_size("room1"), 1);
    }

    #[test]
    fn test_rebinding_releases_prior_room() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = test_connection();
        registry.connect(conn.clone(), "room1", "alice");
        registry.connect(conn.clone(), "room2", "alice");

        assert!(registry.lookup("room1", "alice").is_none());
        assert!(registry.lookup("room2", "alice").is_some());
        assert_eq!(registry.room_size("room1"), 0);
    }

    #[test]
    fn test_token_reconnect_supersedes_stale_connection() {
        let registry = ConnectionRegistry::new();
        let (old, _old_rx) = test_connection();
        let (new, _new_rx) = test_connection();
        registry.connect(old.clone(), "room1", "alice");
        registry.connect(new.clone(), "room1", "alice");

        let bound = registry.lookup("room1", "alice").expect("binding missing");
        assert_eq!(bound.id(), new.id());
        assert_eq!(registry.room_size("room1"), 1);
        // The superseded connection is fully forgotten.
        assert!(registry.disconnect(old.id()).is_none());
    }

    #[test]
    fn test_disconnect_is_idempotent_and_removes_empty_room() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = test_connection();
        registry.connect(conn.clone(), "room1", "alice");

        assert_eq!(
            registry.disconnect(conn.id()),
            Some(("room1".to_string(), "alice".to_string()))
        );
        assert_eq!(registry.disconnect(conn.id()), None);
        assert_eq!(registry.room_size("room1"), 0);
    }

    #[test]
    fn test_broadcast_excludes_token_and_survives_dead_recipient() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = test_connection();
        let (bob, bob_rx) = test_connection();
        let (carol, mut carol_rx) = test_connection();
        registry.connect(alice, "room1", "alice");
        registry.connect(bob, "room1", "bob");
        registry.connect(carol, "room1", "carol");

        // Bob's writer task is gone.
        drop(bob_rx);

        registry.broadcast("room1", &ServerMessage::error("hello"), Some("alice"));

        assert!(alice_rx.try_recv().is_err(), "excluded token got a message");
        assert_eq!(carol_rx.try_recv().ok(), Some(ServerMessage::error("hello")));
        // Bob's failed delivery unbound him.
        assert_eq!(registry.room_size("room1"), 2);
        assert!(registry.lookup("room1", "bob").is_none());
    }

    #[test]
    fn test_send_failure_is_implicit_disconnect() {
        let registry = ConnectionRegistry::new();
        let (conn, rx) = test_connection();
        registry.connect(conn.clone(), "room1", "alice");
        drop(rx);

        assert!(!registry.send(&conn, ServerMessage::error("gone")));
        assert!(registry.lookup("room1", "alice").is_none());
    }
}
