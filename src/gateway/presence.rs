//! Who is connected, through which connection, and in which room

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Sending half of a connection's outbound queue
pub type Outbound = mpsc::Sender<ServerMsg>;

/// Per-user session state
#[derive(Debug, Clone)]
pub struct Presence {
    pub user_id: Uuid,
    pub display_name: String,
    /// Current connection; `None` while the user is away
    pub connection_id: Option<Uuid>,
    /// Most recent connection, kept after a drop to tell stale timers apart
    pub last_connection: Option<Uuid>,
    pub outbound: Option<Outbound>,
    pub current_room: Option<Uuid>,
}

impl Presence {
    /// A user known to the server but not connected (challenge target)
    pub fn offline(user_id: Uuid, display_name: String) -> Self {
        Self {
            user_id,
            display_name,
            connection_id: None,
            last_connection: None,
            outbound: None,
            current_room: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.connection_id.is_some()
    }

    /// Queue a message without waiting. A full or closed queue drops it.
    pub fn send(&self, msg: ServerMsg) -> bool {
        let Some(outbound) = &self.outbound else {
            return false;
        };
        match outbound.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(user_id = %self.user_id, "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Presence entries keyed by user id
#[derive(Default)]
pub struct PresenceTable {
    entries: DashMap<Uuid, Presence>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a user to a new connection. An existing entry keeps its room.
    /// Returns the room the user was already in, if any.
    pub fn attach(
        &self,
        user_id: Uuid,
        display_name: String,
        connection_id: Uuid,
        outbound: Outbound,
    ) -> Option<Uuid> {
        let mut entry = self
            .entries
            .entry(user_id)
            .or_insert_with(|| Presence::offline(user_id, display_name.clone()));
        entry.display_name = display_name;
        entry.connection_id = Some(connection_id);
        entry.last_connection = Some(connection_id);
        entry.outbound = Some(outbound);
        entry.current_room
    }

    /// Mark the user as away, keeping the entry and its room
    pub fn detach(&self, user_id: Uuid) {
        if let Some(mut entry) = self.entries.get_mut(&user_id) {
            entry.connection_id = None;
            entry.outbound = None;
        }
    }

    /// Create an offline entry if the user has none
    pub fn ensure(&self, user_id: Uuid, display_name: String) {
        self.entries
            .entry(user_id)
            .or_insert_with(|| Presence::offline(user_id, display_name));
    }

    pub fn get(&self, user_id: Uuid) -> Option<Presence> {
        self.entries.get(&user_id).map(|p| p.value().clone())
    }

    pub fn remove(&self, user_id: Uuid) -> Option<Presence> {
        self.entries.remove(&user_id).map(|(_, p)| p)
    }

    pub fn room_of(&self, user_id: Uuid) -> Option<Uuid> {
        self.entries.get(&user_id).and_then(|p| p.current_room)
    }

    pub fn set_room(&self, user_id: Uuid, room_id: Option<Uuid>) {
        if let Some(mut entry) = self.entries.get_mut(&user_id) {
            entry.current_room = room_id;
        }
    }

    /// Clear the room pointer if it still points at `room_id`. Entries of
    /// users who are not connected are dropped entirely.
    pub fn leave_room(&self, user_id: Uuid, room_id: Uuid) {
        let offline = match self.entries.get_mut(&user_id) {
            Some(mut entry) if entry.current_room == Some(room_id) => {
                entry.current_room = None;
                !entry.is_live()
            }
            _ => false,
        };
        if offline {
            self.entries.remove(&user_id);
        }
    }

    pub fn is_live(&self, user_id: Uuid) -> bool {
        self.entries.get(&user_id).is_some_and(|p| p.is_live())
    }

    /// Fire-and-forget delivery to whatever connection the user has now
    pub fn send_to(&self, user_id: Uuid, msg: ServerMsg) -> bool {
        self.entries
            .get(&user_id)
            .is_some_and(|p| p.send(msg))
    }

    /// Connected users
    pub fn online(&self) -> usize {
        self.entries.iter().filter(|p| p.is_live()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reattach_keeps_room() {
        let table = PresenceTable::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(4);

        assert_eq!(table.attach(user, "ana".into(), Uuid::new_v4(), tx.clone()), None);
        table.set_room(user, Some(room));
        table.detach(user);
        assert!(!table.is_live(user));

        let second = Uuid::new_v4();
        assert_eq!(table.attach(user, "ana".into(), second, tx), Some(room));
        let presence = table.get(user).unwrap();
        assert_eq!(presence.connection_id, Some(second));
        assert_eq!(table.online(), 1);
    }

    #[test]
    fn leave_room_drops_offline_entries() {
        let table = PresenceTable::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        table.ensure(user, "bo".into());
        table.set_room(user, Some(room));

        // a different room leaves the pointer alone
        table.leave_room(user, Uuid::new_v4());
        assert_eq!(table.room_of(user), Some(room));

        table.leave_room(user, room);
        assert!(table.get(user).is_none());
    }

    #[test]
    fn send_to_full_queue_is_dropped() {
        let table = PresenceTable::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        table.attach(user, "ana".into(), Uuid::new_v4(), tx);

        assert!(table.send_to(user, ServerMsg::Waiting));
        assert!(!table.send_to(user, ServerMsg::Waiting));
        assert_eq!(rx.try_recv().unwrap(), ServerMsg::Waiting);
        assert!(rx.try_recv().is_err());
    }
}
