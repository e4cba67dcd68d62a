//! Registry of live matches; the only mutation path into the simulation

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::input::{Control, InputKind};
use super::r#match::{Match, MatchError, MatchId, MatchSpec};
use super::snapshot::{MatchSnapshot, MatchSummary};
use super::MatchPhase;

/// Shared handle to a match. All mutation goes through the lock.
pub type MatchHandle = Arc<Mutex<Match>>;

/// Monotonic match id source owned by one registry
#[derive(Debug)]
pub struct MatchIdGenerator {
    next: AtomicU64,
}

impl MatchIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> MatchId {
        MatchId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MatchIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw input event as it arrives from a client
#[derive(Debug, Clone)]
pub struct InputCommand {
    pub match_id: MatchId,
    pub player_id: Uuid,
    pub key: String,
    /// "pressed" or "released"
    pub event: String,
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<MatchId, MatchHandle>,
    ids: MatchIdGenerator,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::with_generator(MatchIdGenerator::new())
    }

    pub fn with_generator(ids: MatchIdGenerator) -> Self {
        Self {
            matches: DashMap::new(),
            ids,
        }
    }

    /// Allocate and store a new match
    pub fn create(&self, spec: &MatchSpec) -> Result<MatchId, MatchError> {
        let id = self.ids.next_id();
        let game = Match::new(id, spec)?;
        self.matches.insert(id, Arc::new(Mutex::new(game)));

        info!(
            match_id = %id,
            left = %spec.left,
            right = %spec.right,
            max_score = spec.max_score,
            "Created match"
        );
        Ok(id)
    }

    pub fn find(&self, id: MatchId) -> Option<MatchHandle> {
        self.matches.get(&id).map(|m| m.value().clone())
    }

    /// Run `f` under the match lock. The map guard is released first.
    pub fn with_match<R>(&self, id: MatchId, f: impl FnOnce(&mut Match) -> R) -> Option<R> {
        let handle = self.find(id)?;
        let mut game = handle.lock();
        Some(f(&mut game))
    }

    pub fn snapshot(&self, id: MatchId) -> Option<MatchSnapshot> {
        self.with_match(id, |game| game.snapshot())
    }

    /// Evict a match. A match that has not reached its terminal state is
    /// finished first so its result is never dropped silently.
    pub fn remove(&self, id: MatchId) -> Option<MatchSummary> {
        let (_, handle) = self.matches.remove(&id)?;
        let mut game = handle.lock();

        if game.phase() != MatchPhase::Finished {
            debug!(match_id = %id, phase = ?game.phase(), "Finishing match on removal");
            game.finish();
        }

        info!(match_id = %id, "Match removed from registry");
        Some(game.summary())
    }

    /// Validate a raw input event and forward it to the match
    pub fn dispatch(&self, cmd: &InputCommand) -> Result<(), DispatchError> {
        let control =
            Control::from_key(&cmd.key).ok_or_else(|| DispatchError::UnknownKey(cmd.key.clone()))?;
        let kind = InputKind::parse(&cmd.event)
            .ok_or_else(|| DispatchError::UnknownEvent(cmd.event.clone()))?;

        self.with_match(cmd.match_id, |game| game.handle_input(cmd.player_id, control, kind))
            .ok_or(DispatchError::UnknownMatch(cmd.match_id))??;
        Ok(())
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasons an input event is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown match: {0}")]
    UnknownMatch(MatchId),

    #[error("Unknown key: {0:?}")]
    UnknownKey(String),

    #[error("Unknown key event: {0:?}")]
    UnknownEvent(String),

    #[error(transparent)]
    Match(#[from] MatchError),
}
