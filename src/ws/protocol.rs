//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{MatchPhase, MatchSnapshot, MatchSummary, Team};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Enter the random-opponent rendezvous
    Matchmaking,

    /// Ready for the current room's match to start
    Ready,

    /// A key went down
    KeyDown { room_id: Uuid, key: String },

    /// A key came up
    KeyUp { room_id: Uuid, key: String },

    /// Challenge a specific user
    PlayFriend { opponent_id: Uuid },

    /// Ask whether a game can be resumed
    CheckGame,

    /// Play against the server-side bot
    PlayBot,

    /// Withdraw from the rendezvous
    LeaveQueue,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        display_name: String,
        server_time: u64,
    },

    /// Parked in the rendezvous slot
    Waiting,

    /// Paired; a room exists for both participants
    GameFound {
        opponent_id: Uuid,
        opponent_name: String,
        your_name: String,
        side: Team,
        room_id: Uuid,
    },

    /// Ready recorded, the other side is not ready yet
    WaitingOpponent { room_id: Uuid },

    /// Periodic snapshot of the running match
    GameState(MatchSnapshot),

    /// The match reached its terminal state
    GameOver(MatchSummary),

    /// The opponent's connection dropped
    OpponentLeft {
        user_id: Uuid,
        /// Seconds before the absence becomes a forfeit
        grace_secs: u64,
    },

    /// The opponent reconnected
    OpponentReturned { user_id: Uuid },

    /// Answer to `checkGame`
    GameStatus(GameStatus),

    /// A request was refused
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo of client timestamp
        t: u64,
        /// Server timestamp
        server_time: u64,
    },
}

/// Where a user stands, for resuming after a reload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub in_game: bool,
    pub room_id: Option<Uuid>,
    pub side: Option<Team>,
    pub opponent_id: Option<Uuid>,
    pub opponent_name: Option<String>,
    pub phase: Option<MatchPhase>,
    pub snapshot: Option<MatchSnapshot>,
}

impl GameStatus {
    /// Not in any room
    pub fn idle() -> Self {
        Self {
            in_game: false,
            room_id: None,
            side: None,
            opponent_id: None,
            opponent_name: None,
            phase: None,
            snapshot: None,
        }
    }
}
