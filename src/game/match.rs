//! Match aggregate: court, paddles, ball, scoring and the phase machines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::ball::Ball;
use super::court::Court;
use super::input::{Control, InputKind};
use super::paddle::Paddle;
use super::snapshot::{BallView, MatchSnapshot, MatchSummary, PaddleView, SideResult};
use super::{MatchPhase, ServePhase, Team};

/// Default court height scale
pub const DEFAULT_COURT_SCALE: f64 = 0.5;
/// Default points needed to win
pub const DEFAULT_MAX_SCORE: u32 = 7;

/// Match identifier, handed out once by the registry's generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for a new match
#[derive(Debug, Clone)]
pub struct MatchSpec {
    pub left: Uuid,
    pub right: Uuid,
    pub court_scale: f64,
    pub max_score: u32,
    /// Seat driven by the server-side bot, if any
    pub bot: Option<Team>,
}

impl MatchSpec {
    pub fn new(left: Uuid, right: Uuid) -> Self {
        Self {
            left,
            right,
            court_scale: DEFAULT_COURT_SCALE,
            max_score: DEFAULT_MAX_SCORE,
            bot: None,
        }
    }
}

/// The authoritative state of one 1v1 match
#[derive(Debug, Clone)]
pub struct Match {
    id: MatchId,
    court: Court,
    ball: Ball,
    left: Paddle,
    right: Paddle,
    seats: HashMap<Uuid, Team>,
    score_left: u32,
    score_right: u32,
    max_score: u32,
    phase: MatchPhase,
    serve_phase: ServePhase,
    tick: u64,
    forfeited_by: Option<Team>,
    /// Ended before it was ever played; nobody wins
    abandoned: bool,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn new(id: MatchId, spec: &MatchSpec) -> Result<Self, MatchError> {
        if spec.left == spec.right {
            return Err(MatchError::SamePlayer(spec.left));
        }

        let court = Court::new(spec.court_scale);
        let left = Paddle::new(spec.left, Team::Left, &court, spec.bot == Some(Team::Left));
        let right = Paddle::new(spec.right, Team::Right, &court, spec.bot == Some(Team::Right));
        let ball = Ball::new(&court, &left);
        let seats = HashMap::from([(spec.left, Team::Left), (spec.right, Team::Right)]);

        Ok(Self {
            id,
            court,
            ball,
            left,
            right,
            seats,
            score_left: 0,
            score_right: 0,
            max_score: spec.max_score.max(1),
            phase: MatchPhase::Waiting,
            serve_phase: ServePhase::ServeLeft,
            tick: 0,
            forfeited_by: None,
            abandoned: false,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        })
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn serve_phase(&self) -> ServePhase {
        self.serve_phase
    }

    pub fn court(&self) -> &Court {
        &self.court
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn paddle(&self, team: Team) -> &Paddle {
        match team {
            Team::Left => &self.left,
            Team::Right => &self.right,
        }
    }

    fn paddle_mut(&mut self, team: Team) -> &mut Paddle {
        match team {
            Team::Left => &mut self.left,
            Team::Right => &mut self.right,
        }
    }

    pub fn score(&self, team: Team) -> u32 {
        match team {
            Team::Left => self.score_left,
            Team::Right => self.score_right,
        }
    }

    /// Seat of a participant, if they play in this match
    pub fn team_of(&self, user_id: Uuid) -> Option<Team> {
        self.seats.get(&user_id).copied()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Waiting -> Active. Returns false if the match was not waiting.
    pub fn start(&mut self) -> bool {
        if self.phase != MatchPhase::Waiting {
            return false;
        }
        self.phase = MatchPhase::Active;
        self.started_at = Some(Utc::now());
        true
    }

    /// Active -> Paused. Scores are untouched.
    pub fn pause(&mut self) -> bool {
        if self.phase != MatchPhase::Active {
            return false;
        }
        self.phase = MatchPhase::Paused;
        true
    }

    /// Paused -> Active
    pub fn resume(&mut self) -> bool {
        if self.phase != MatchPhase::Paused {
            return false;
        }
        self.phase = MatchPhase::Active;
        true
    }

    /// Force the terminal phase. Calling it again changes nothing.
    pub fn finish(&mut self) {
        if self.phase == MatchPhase::Finished {
            return;
        }
        self.phase = MatchPhase::Finished;
        self.ended_at = Some(Utc::now());
    }

    /// End the match with `team` conceding
    pub fn forfeit(&mut self, team: Team) {
        if self.phase == MatchPhase::Finished {
            return;
        }
        self.forfeited_by = Some(team);
        self.finish();
    }

    /// End a match that never started without a result
    pub fn abandon(&mut self) {
        if self.phase != MatchPhase::Waiting {
            return;
        }
        self.abandoned = true;
        self.finish();
    }

    /// One fixed simulation step
    pub fn tick(&mut self) {
        if self.phase != MatchPhase::Active {
            return;
        }
        self.tick += 1;

        self.left.update(self.phase, &self.court, &mut self.serve_phase);
        self.right.update(self.phase, &self.court, &mut self.serve_phase);
        self.ball.update(
            self.phase,
            &self.court,
            &mut self.left,
            &mut self.right,
            &mut self.serve_phase,
        );

        if self.court.is_left_scored(&self.ball) {
            self.award_point(Team::Left);
        } else if self.court.is_right_scored(&self.ball) {
            self.award_point(Team::Right);
        }
    }

    fn award_point(&mut self, team: Team) {
        let score = match team {
            Team::Left => &mut self.score_left,
            Team::Right => &mut self.score_right,
        };
        *score += 1;

        if *score >= self.max_score {
            self.finish();
        } else {
            // The side that conceded serves next
            self.serve_phase = ServePhase::serve_of(team.opponent());
        }

        self.ball.reset();
        self.left.reset();
        self.right.reset();
    }

    /// Route a control change to the player's paddle
    pub fn handle_input(
        &mut self,
        player_id: Uuid,
        control: Control,
        kind: InputKind,
    ) -> Result<(), MatchError> {
        let team = self
            .team_of(player_id)
            .ok_or(MatchError::UnknownPlayer(player_id))?;
        self.paddle_mut(team).controls.apply(control, kind);
        Ok(())
    }

    /// Release every held control of a participant (used when they drop)
    pub fn release_controls(&mut self, team: Team) {
        self.paddle_mut(team).controls.release_all();
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.id,
            tick: self.tick,
            phase: self.phase,
            serve_phase: self.serve_phase,
            ball: BallView {
                x: self.ball.position.x,
                y: self.ball.position.y,
                radius: self.ball.radius(),
                direction_x: self.ball.direction.x,
                direction_y: self.ball.direction.y,
                direction_angle: self.ball.direction.angle(),
            },
            left: self.paddle_view(Team::Left),
            right: self.paddle_view(Team::Right),
        }
    }

    fn paddle_view(&self, team: Team) -> PaddleView {
        let paddle = self.paddle(team);
        PaddleView {
            user_id: paddle.owner,
            score: self.score(team),
            x: paddle.position.x,
            y: paddle.position.y,
            width: paddle.width,
            height: paddle.height,
            angle: paddle.direction.angle(),
            charge: paddle.charge_power(),
        }
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            match_id: self.id,
            phase: self.phase,
            left: SideResult {
                user_id: self.left.owner,
                score: self.score_left,
            },
            right: SideResult {
                user_id: self.right.owner,
                score: self.score_right,
            },
            winner: self.winner().map(|team| self.paddle(team).owner),
            forfeited_by: self.forfeited_by,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    /// Winning side once finished. A forfeit decides it outright; otherwise
    /// the higher score wins. Equal scores cannot occur in first-to-max play;
    /// a forced finish on a tie falls through to the right side.
    pub fn winner(&self) -> Option<Team> {
        if self.phase != MatchPhase::Finished || self.abandoned {
            return None;
        }
        if let Some(team) = self.forfeited_by {
            return Some(team.opponent());
        }
        if self.score_left > self.score_right {
            Some(Team::Left)
        } else {
            Some(Team::Right)
        }
    }
}

/// Match-level errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Player {0} is not part of this match")]
    UnknownPlayer(Uuid),

    #[error("Player {0} cannot play against themselves")]
    SamePlayer(Uuid),
}
