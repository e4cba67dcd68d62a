//! Read-only projections of a match for the wire

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MatchId, MatchPhase, ServePhase, Team};

/// Live frame streamed to both participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub tick: u64,
    pub phase: MatchPhase,
    pub serve_phase: ServePhase,
    pub ball: BallView,
    pub left: PaddleView,
    pub right: PaddleView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallView {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub direction_x: f64,
    pub direction_y: f64,
    /// Heading in degrees
    pub direction_angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleView {
    pub user_id: Uuid,
    pub score: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Facing angle in degrees
    pub angle: f64,
    pub charge: u32,
}

/// Final (or current) result of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    pub left: SideResult,
    pub right: SideResult,
    /// Only set once the match is finished
    pub winner: Option<Uuid>,
    pub forfeited_by: Option<Team>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideResult {
    pub user_id: Uuid,
    pub score: u32,
}

impl MatchSummary {
    /// Match length in whole seconds, if it both started and ended
    pub fn duration_secs(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}
