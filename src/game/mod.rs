//! Game simulation modules

pub mod ball;
pub mod bot;
pub mod court;
pub mod input;
pub mod r#match;
pub mod paddle;
pub mod registry;
pub mod snapshot;
pub mod vector;

pub use r#match::{Match, MatchError, MatchId, MatchSpec};
pub use registry::{DispatchError, InputCommand, MatchHandle, MatchRegistry};
pub use snapshot::{MatchSnapshot, MatchSummary};

use serde::{Deserialize, Serialize};

/// Side of the court a paddle defends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Left,
    Right,
}

impl Team {
    pub fn opponent(self) -> Self {
        match self {
            Team::Left => Team::Right,
            Team::Right => Team::Left,
        }
    }
}

/// Match lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Created, waiting for both sides to be ready
    Waiting,
    /// Temporarily halted (e.g. a participant dropped)
    Paused,
    /// Simulation running
    Active,
    /// Terminal
    Finished,
}

/// Who holds the ball, or where it is heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServePhase {
    ServeLeft,
    ServeRight,
    RallyTowardLeft,
    RallyTowardRight,
}

impl ServePhase {
    pub fn serve_of(team: Team) -> Self {
        match team {
            Team::Left => ServePhase::ServeLeft,
            Team::Right => ServePhase::ServeRight,
        }
    }

    pub fn rally_toward(team: Team) -> Self {
        match team {
            Team::Left => ServePhase::RallyTowardLeft,
            Team::Right => ServePhase::RallyTowardRight,
        }
    }

    /// Team holding the ball, if the ball is attached to a paddle
    pub fn server(self) -> Option<Team> {
        match self {
            ServePhase::ServeLeft => Some(Team::Left),
            ServePhase::ServeRight => Some(Team::Right),
            _ => None,
        }
    }

    /// Swap the rally target after a paddle hit. Serve phases are unchanged.
    pub fn flipped(self) -> Self {
        match self {
            ServePhase::RallyTowardLeft => ServePhase::RallyTowardRight,
            ServePhase::RallyTowardRight => ServePhase::RallyTowardLeft,
            serve => serve,
        }
    }
}
