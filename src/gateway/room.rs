//! Rooms bind two participants to one match and drive its loop

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::bot::BotController;
use crate::game::{MatchId, MatchPhase, Team};
use crate::ws::protocol::ServerMsg;

use super::service::SessionGateway;

/// Name shown for the server-side opponent
pub const BOT_NAME: &str = "Bot";

/// Seat in a room
#[derive(Debug, Clone)]
pub struct Seat {
    pub user_id: Uuid,
    pub display_name: String,
    pub ready: bool,
}

/// Outcome of a ready request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Only this side is ready so far
    WaitingForOpponent,
    /// Both sides are ready and the loop has not been started yet
    Start,
    /// The loop already runs
    AlreadyStarted,
}

#[derive(Debug)]
pub struct Room {
    pub id: Uuid,
    pub match_id: MatchId,
    pub left: Seat,
    pub right: Seat,
    /// Seat played by the bot
    pub bot: Option<Team>,
    started: bool,
    /// Dropping this ends the room loop
    cancel: Option<oneshot::Sender<()>>,
    pub created_at: Instant,
}

impl Room {
    pub fn new(id: Uuid, match_id: MatchId, left: Seat, right: Seat, bot: Option<Team>) -> Self {
        let mut room = Self {
            id,
            match_id,
            left,
            right,
            bot,
            started: false,
            cancel: None,
            created_at: Instant::now(),
        };
        if let Some(team) = bot {
            room.seat_mut(team).ready = true;
        }
        room
    }

    pub fn seat(&self, team: Team) -> &Seat {
        match team {
            Team::Left => &self.left,
            Team::Right => &self.right,
        }
    }

    fn seat_mut(&mut self, team: Team) -> &mut Seat {
        match team {
            Team::Left => &mut self.left,
            Team::Right => &mut self.right,
        }
    }

    pub fn team_of(&self, user_id: Uuid) -> Option<Team> {
        if self.left.user_id == user_id {
            Some(Team::Left)
        } else if self.right.user_id == user_id {
            Some(Team::Right)
        } else {
            None
        }
    }

    pub fn participants(&self) -> [Uuid; 2] {
        [self.left.user_id, self.right.user_id]
    }

    /// Human participants, the ones that receive messages
    pub fn humans(&self) -> Vec<Uuid> {
        [Team::Left, Team::Right]
            .into_iter()
            .filter(|team| self.bot != Some(*team))
            .map(|team| self.seat(team).user_id)
            .collect()
    }

    pub fn is_bot(&self, team: Team) -> bool {
        self.bot == Some(team)
    }

    /// Record readiness. `Start` is returned at most once per room.
    pub fn mark_ready(&mut self, team: Team) -> Readiness {
        if self.started {
            return Readiness::AlreadyStarted;
        }
        self.seat_mut(team).ready = true;
        if self.left.ready && self.right.ready {
            self.started = true;
            Readiness::Start
        } else {
            Readiness::WaitingForOpponent
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Sides that have not sent ready yet
    pub fn unready(&self) -> Vec<Team> {
        [Team::Left, Team::Right]
            .into_iter()
            .filter(|team| !self.seat(*team).ready)
            .collect()
    }

    /// Hand the room the sender side of its loop's cancellation channel
    pub fn arm(&mut self, cancel: oneshot::Sender<()>) {
        self.cancel = Some(cancel);
    }

    /// Stop the loop, if one runs
    pub fn cancel(&mut self) {
        self.cancel.take();
    }
}

/// Everything the room loop needs; ids only, never the match itself
pub(super) struct RoomLoop {
    pub room_id: Uuid,
    pub match_id: MatchId,
    pub recipients: Vec<Uuid>,
    pub bot: Option<BotController>,
}

/// Drive a room until it is cancelled or its match finishes.
///
/// Simulation and broadcast share this task so a finished match is torn
/// down before another frame goes out.
pub(super) async fn run_room(
    gateway: Arc<SessionGateway>,
    mut room: RoomLoop,
    mut cancel: oneshot::Receiver<()>,
) {
    let settings = gateway.settings().clone();
    let mut sim = interval(settings.tick_interval);
    sim.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames = interval(settings.broadcast_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(room_id = %room.room_id, match_id = %room.match_id, "Room loop started");

    loop {
        tokio::select! {
            biased;

            _ = &mut cancel => {
                debug!(room_id = %room.room_id, "Room loop cancelled");
                break;
            }

            _ = sim.tick() => {
                let phase = gateway.registry().with_match(room.match_id, |game| {
                    if let Some(bot) = room.bot.as_mut() {
                        bot.drive(game);
                    }
                    game.tick();
                    game.phase()
                });

                match phase {
                    Some(MatchPhase::Finished) => {
                        gateway.finish_room(room.room_id);
                        break;
                    }
                    Some(_) => {}
                    None => {
                        debug!(room_id = %room.room_id, "Match gone, stopping room loop");
                        break;
                    }
                }
            }

            _ = frames.tick() => {
                if let Some(snapshot) = gateway.registry().snapshot(room.match_id) {
                    let msg = ServerMsg::GameState(snapshot);
                    for user_id in &room.recipients {
                        gateway.presences().send_to(*user_id, msg.clone());
                    }
                }
            }
        }
    }

    debug!(room_id = %room.room_id, "Room loop exited");
}
