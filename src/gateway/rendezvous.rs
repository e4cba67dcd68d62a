//! Single-slot rendezvous for random pairing

use std::time::{Duration, Instant};
use uuid::Uuid;

/// Player parked in the slot
#[derive(Debug, Clone)]
pub struct WaitingPlayer {
    pub user_id: Uuid,
    pub display_name: String,
    pub connection_id: Uuid,
    pub queued_at: Instant,
}

impl WaitingPlayer {
    pub fn new(user_id: Uuid, display_name: String, connection_id: Uuid) -> Self {
        Self {
            user_id,
            display_name,
            connection_id,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Result of offering a player to the slot
#[derive(Debug)]
pub enum Offer {
    /// Slot was empty; the player now waits
    Parked,
    /// The same user is already waiting; the slot is kept
    AlreadyWaiting,
    /// Paired with the player who was waiting (now out of the slot)
    Paired(WaitingPlayer),
}

/// At most one waiting player
#[derive(Debug, Default)]
pub struct WaitingSlot {
    slot: Option<WaitingPlayer>,
}

impl WaitingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, player: WaitingPlayer) -> Offer {
        match self.slot.take() {
            None => {
                self.slot = Some(player);
                Offer::Parked
            }
            Some(waiting) if waiting.user_id == player.user_id => {
                // Same user again (possibly from a new connection)
                self.slot = Some(WaitingPlayer {
                    queued_at: waiting.queued_at,
                    ..player
                });
                Offer::AlreadyWaiting
            }
            Some(waiting) => Offer::Paired(waiting),
        }
    }

    /// Remove a user from the slot
    pub fn withdraw(&mut self, user_id: Uuid) -> Option<WaitingPlayer> {
        if self.contains(user_id) {
            self.slot.take()
        } else {
            None
        }
    }

    /// Remove whoever waits through `connection_id`
    pub fn withdraw_connection(&mut self, connection_id: Uuid) -> Option<WaitingPlayer> {
        if self
            .slot
            .as_ref()
            .is_some_and(|p| p.connection_id == connection_id)
        {
            self.slot.take()
        } else {
            None
        }
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.slot.as_ref().is_some_and(|p| p.user_id == user_id)
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> WaitingPlayer {
        WaitingPlayer::new(Uuid::new_v4(), "p".into(), Uuid::new_v4())
    }

    #[test]
    fn pairs_second_arrival() {
        let mut slot = WaitingSlot::new();
        let first = player();
        assert!(matches!(slot.offer(first.clone()), Offer::Parked));

        match slot.offer(player()) {
            Offer::Paired(waiting) => assert_eq!(waiting.user_id, first.user_id),
            other => panic!("expected pairing, got {other:?}"),
        }
        assert!(!slot.is_occupied());
    }

    #[test]
    fn same_user_keeps_slot() {
        let mut slot = WaitingSlot::new();
        let first = player();
        slot.offer(first.clone());

        let again = WaitingPlayer::new(first.user_id, "p".into(), Uuid::new_v4());
        assert!(matches!(slot.offer(again.clone()), Offer::AlreadyWaiting));
        assert!(slot.contains(first.user_id));

        // the old connection no longer owns the slot
        assert!(slot.withdraw_connection(first.connection_id).is_none());
        assert!(slot.withdraw_connection(again.connection_id).is_some());
    }

    #[test]
    fn withdraw_only_matching_user() {
        let mut slot = WaitingSlot::new();
        let first = player();
        slot.offer(first.clone());
        assert!(slot.withdraw(Uuid::new_v4()).is_none());
        assert!(slot.withdraw(first.user_id).is_some());
        assert!(!slot.is_occupied());
    }
}
