//! Session gateway: presence, pairing, readiness, input relay and teardown

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::bot::BotController;
use crate::game::r#match::{DEFAULT_COURT_SCALE, DEFAULT_MAX_SCORE};
use crate::game::{InputCommand, MatchError, MatchRegistry, MatchSpec, Team};
use crate::http::middleware::Identity;
use crate::store::{MatchRecord, ResultRecorder, StoreError, UserLookup};
use crate::util::time::{interval_for, unix_millis, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, GameStatus, ServerMsg};

use super::presence::{Outbound, PresenceTable};
use super::rendezvous::{Offer, WaitingPlayer, WaitingSlot};
use super::room::{run_room, Readiness, Room, RoomLoop, Seat, BOT_NAME};

/// Default seconds a dropped participant has to come back
pub const DEFAULT_RECONNECT_GRACE_SECS: u64 = 30;

/// Tunables for rooms created by the gateway
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub court_scale: f64,
    pub max_score: u32,
    pub tick_interval: Duration,
    pub broadcast_interval: Duration,
    pub reconnect_grace: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            court_scale: DEFAULT_COURT_SCALE,
            max_score: DEFAULT_MAX_SCORE,
            tick_interval: interval_for(SIMULATION_TPS),
            broadcast_interval: interval_for(SNAPSHOT_TPS),
            reconnect_grace: Duration::from_secs(DEFAULT_RECONNECT_GRACE_SECS),
        }
    }
}

/// Requests the gateway refuses
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unknown user: {0}")]
    UnknownUser(Uuid),

    #[error("Already in a game")]
    AlreadyInRoom,

    #[error("Not in a game")]
    NotInRoom,

    #[error("Unknown room: {0}")]
    UnknownRoom(Uuid),

    #[error("Cannot challenge yourself")]
    SelfChallenge,

    #[error("Unknown opponent: {0}")]
    UnknownOpponent(Uuid),

    #[error("Opponent is already in a game")]
    OpponentBusy,

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("User lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

impl GatewayError {
    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::UnknownUser(_) => "unknownUser",
            GatewayError::AlreadyInRoom => "alreadyInGame",
            GatewayError::NotInRoom => "notInGame",
            GatewayError::UnknownRoom(_) => "unknownRoom",
            GatewayError::SelfChallenge => "selfChallenge",
            GatewayError::UnknownOpponent(_) => "unknownOpponent",
            GatewayError::OpponentBusy => "opponentBusy",
            GatewayError::Match(_) => "matchError",
            GatewayError::Lookup(_) => "lookupFailed",
        }
    }

    /// Requests that conflict with current state and are safe to repeat
    fn is_conflict(&self) -> bool {
        matches!(
            self,
            GatewayError::AlreadyInRoom | GatewayError::NotInRoom | GatewayError::OpponentBusy
        )
    }
}

/// Owns every live session and room
pub struct SessionGateway {
    registry: Arc<MatchRegistry>,
    presences: PresenceTable,
    /// Also serializes seating, so nobody is placed in two rooms
    waiting: Mutex<WaitingSlot>,
    rooms: Mutex<HashMap<Uuid, Room>>,
    results: Arc<dyn ResultRecorder>,
    users: Arc<dyn UserLookup>,
    settings: GatewaySettings,
}

impl SessionGateway {
    pub fn new(
        registry: Arc<MatchRegistry>,
        results: Arc<dyn ResultRecorder>,
        users: Arc<dyn UserLookup>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            registry,
            presences: PresenceTable::new(),
            waiting: Mutex::new(WaitingSlot::new()),
            rooms: Mutex::new(HashMap::new()),
            results,
            users,
            settings,
        }
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    pub fn presences(&self) -> &PresenceTable {
        &self.presences
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn online_players(&self) -> usize {
        self.presences.online()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.lock().is_occupied()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.lock().len()
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Register a verified connection. Returns its connection id.
    pub fn connect(self: &Arc<Self>, identity: Identity, outbound: Outbound) -> Uuid {
        let connection_id = Uuid::new_v4();
        let user_id = identity.user_id;
        let room_id = self.presences.attach(
            user_id,
            identity.display_name.clone(),
            connection_id,
            outbound,
        );

        info!(user_id = %user_id, connection_id = %connection_id, "Player connected");

        self.presences.send_to(
            user_id,
            ServerMsg::Welcome {
                user_id,
                display_name: identity.display_name,
                server_time: unix_millis(),
            },
        );

        if let Some(room_id) = room_id {
            self.rejoin(user_id, room_id);
        }

        connection_id
    }

    /// Put a returning user back into their room
    fn rejoin(&self, user_id: Uuid, room_id: Uuid) {
        let opponent = {
            let rooms = self.rooms.lock();
            rooms.get(&room_id).and_then(|room| {
                let team = room.team_of(user_id)?;
                let opponent = team.opponent();
                Some((
                    room.match_id,
                    room.seat(opponent).user_id,
                    room.is_bot(opponent),
                ))
            })
        };

        let Some((match_id, opponent_id, opponent_is_bot)) = opponent else {
            // Room ended while the user was away
            self.presences.set_room(user_id, None);
            return;
        };

        let opponent_present = opponent_is_bot || self.presences.is_live(opponent_id);
        if opponent_present {
            let resumed = self
                .registry
                .with_match(match_id, |game| game.resume())
                .unwrap_or(false);
            if resumed {
                info!(user_id = %user_id, room_id = %room_id, "Match resumed");
            }
        }

        self.presences
            .send_to(opponent_id, ServerMsg::OpponentReturned { user_id });
        self.presences
            .send_to(user_id, ServerMsg::GameStatus(self.check_game(user_id)));
    }

    /// Connection closed. Stale connections are ignored.
    pub fn disconnect(self: &Arc<Self>, user_id: Uuid, connection_id: Uuid) {
        let Some(presence) = self.presences.get(user_id) else {
            return;
        };
        if presence.connection_id != Some(connection_id) {
            debug!(user_id = %user_id, connection_id = %connection_id, "Ignoring stale disconnect");
            return;
        }

        if self.waiting.lock().withdraw_connection(connection_id).is_some() {
            debug!(user_id = %user_id, "Cleared waiting slot on disconnect");
        }

        let room = presence.current_room.and_then(|room_id| {
            let rooms = self.rooms.lock();
            rooms.get(&room_id).and_then(|room| {
                let team = room.team_of(user_id)?;
                Some((room_id, room.match_id, team, room.seat(team.opponent()).user_id))
            })
        });

        let Some((room_id, match_id, team, opponent_id)) = room else {
            self.presences.remove(user_id);
            info!(user_id = %user_id, "Player disconnected");
            return;
        };

        self.presences.detach(user_id);
        self.registry.with_match(match_id, |game| {
            game.release_controls(team);
            game.pause();
        });

        let grace = self.settings.reconnect_grace;
        self.presences.send_to(
            opponent_id,
            ServerMsg::OpponentLeft {
                user_id,
                grace_secs: grace.as_secs(),
            },
        );

        info!(
            user_id = %user_id,
            room_id = %room_id,
            grace_secs = grace.as_secs(),
            "Player left a live room"
        );

        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            gateway.expire_absence(user_id, room_id, connection_id);
        });
    }

    /// Forfeit the room if the user never came back
    fn expire_absence(&self, user_id: Uuid, room_id: Uuid, connection_id: Uuid) {
        let Some(presence) = self.presences.get(user_id) else {
            return;
        };
        if presence.is_live()
            || presence.last_connection != Some(connection_id)
            || presence.current_room != Some(room_id)
        {
            return;
        }

        let target = {
            let rooms = self.rooms.lock();
            rooms
                .get(&room_id)
                .and_then(|room| Some((room.match_id, room.team_of(user_id)?)))
        };
        let Some((match_id, team)) = target else {
            return;
        };

        warn!(user_id = %user_id, room_id = %room_id, "Reconnect grace expired, forfeiting");
        self.registry.with_match(match_id, |game| game.forfeit(team));
        self.finish_room(room_id);
    }

    // ------------------------------------------------------------------
    // Inbound messages
    // ------------------------------------------------------------------

    /// Handle one message from a connection. The sender is the connection's
    /// verified user, never anything carried in the message.
    pub async fn handle(self: &Arc<Self>, user_id: Uuid, connection_id: Uuid, msg: ClientMsg) {
        let is_current = self
            .presences
            .get(user_id)
            .is_some_and(|p| p.connection_id == Some(connection_id));
        if !is_current {
            debug!(user_id = %user_id, "Message from superseded connection ignored");
            return;
        }

        let result = match msg {
            ClientMsg::Matchmaking => self.find_match(user_id, connection_id),
            ClientMsg::LeaveQueue => {
                self.leave_queue(user_id);
                Ok(())
            }
            ClientMsg::Ready => self.ready(user_id),
            ClientMsg::KeyDown { room_id, key } => {
                self.relay_input(user_id, room_id, &key, true);
                Ok(())
            }
            ClientMsg::KeyUp { room_id, key } => {
                self.relay_input(user_id, room_id, &key, false);
                Ok(())
            }
            ClientMsg::PlayFriend { opponent_id } => self.play_friend(user_id, opponent_id).await,
            ClientMsg::PlayBot => self.play_bot(user_id),
            ClientMsg::CheckGame => {
                let status = self.check_game(user_id);
                self.presences.send_to(user_id, ServerMsg::GameStatus(status));
                Ok(())
            }
            ClientMsg::Ping { t } => {
                self.presences.send_to(
                    user_id,
                    ServerMsg::Pong {
                        t,
                        server_time: unix_millis(),
                    },
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            if e.is_conflict() {
                debug!(user_id = %user_id, error = %e, "Request conflicts with current state");
            } else {
                warn!(user_id = %user_id, error = %e, "Request refused");
            }
            self.presences.send_to(
                user_id,
                ServerMsg::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            );
        }
    }

    /// Random pairing through the single waiting slot
    pub fn find_match(
        self: &Arc<Self>,
        user_id: Uuid,
        connection_id: Uuid,
    ) -> Result<(), GatewayError> {
        let mut waiting = self.waiting.lock();
        let presence = self
            .presences
            .get(user_id)
            .ok_or(GatewayError::UnknownUser(user_id))?;
        if presence.current_room.is_some() {
            return Err(GatewayError::AlreadyInRoom);
        }

        let offer = waiting.offer(WaitingPlayer::new(
            user_id,
            presence.display_name.clone(),
            connection_id,
        ));

        match offer {
            Offer::Parked => {
                debug!(user_id = %user_id, "Parked in waiting slot");
                self.presences.send_to(user_id, ServerMsg::Waiting);
                Ok(())
            }
            Offer::AlreadyWaiting => {
                debug!(user_id = %user_id, "Already waiting, slot kept");
                self.presences.send_to(user_id, ServerMsg::Waiting);
                Ok(())
            }
            Offer::Paired(parked) => {
                debug!(
                    user_id = %user_id,
                    opponent_id = %parked.user_id,
                    waited_ms = parked.wait_time().as_millis() as u64,
                    "Paired"
                );
                let left = Seat {
                    user_id: parked.user_id,
                    display_name: parked.display_name,
                    ready: false,
                };
                let right = Seat {
                    user_id,
                    display_name: presence.display_name,
                    ready: false,
                };
                self.open_room(left, right, None).map(|_| ())
            }
        }
    }

    pub fn leave_queue(&self, user_id: Uuid) {
        if self.waiting.lock().withdraw(user_id).is_some() {
            debug!(user_id = %user_id, "Left waiting slot");
        }
    }

    /// Create the match and room and tell both sides. Callers hold the
    /// waiting slot lock.
    fn open_room(
        self: &Arc<Self>,
        left: Seat,
        right: Seat,
        bot: Option<Team>,
    ) -> Result<Uuid, GatewayError> {
        let spec = MatchSpec {
            left: left.user_id,
            right: right.user_id,
            court_scale: self.settings.court_scale,
            max_score: self.settings.max_score,
            bot,
        };
        let match_id = self.registry.create(&spec)?;
        let room_id = Uuid::new_v4();
        let room = Room::new(room_id, match_id, left, right, bot);

        let notices: Vec<(Uuid, ServerMsg)> = [Team::Left, Team::Right]
            .into_iter()
            .filter(|team| !room.is_bot(*team))
            .map(|team| {
                let me = room.seat(team);
                let opponent = room.seat(team.opponent());
                let found = ServerMsg::GameFound {
                    opponent_id: opponent.user_id,
                    opponent_name: opponent.display_name.clone(),
                    your_name: me.display_name.clone(),
                    side: team,
                    room_id,
                };
                (me.user_id, found)
            })
            .collect();

        info!(
            room_id = %room_id,
            match_id = %match_id,
            left = %room.left.user_id,
            right = %room.right.user_id,
            bot = room.bot.is_some(),
            "Room opened"
        );

        // The room must exist before anyone can point at it
        self.rooms.lock().insert(room_id, room);

        for (user_id, found) in notices {
            self.presences.set_room(user_id, Some(room_id));
            self.presences.send_to(user_id, found);
        }

        let gateway = Arc::clone(self);
        let deadline = self.settings.reconnect_grace;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            gateway.expire_readiness(room_id);
        });

        Ok(room_id)
    }

    /// Close a room whose match never started. A lone unready side
    /// forfeits; if neither side readied the room ends without a result.
    fn expire_readiness(&self, room_id: Uuid) {
        let stalled = {
            let mut rooms = self.rooms.lock();
            if rooms.get(&room_id).is_some_and(|room| !room.is_started()) {
                rooms.remove(&room_id)
            } else {
                None
            }
        };
        let Some(room) = stalled else {
            return;
        };

        match room.unready().as_slice() {
            [team] => {
                let team = *team;
                warn!(
                    room_id = %room_id,
                    user_id = %room.seat(team).user_id,
                    "Ready deadline passed, forfeiting"
                );
                self.registry.with_match(room.match_id, |game| game.forfeit(team));
            }
            _ => {
                warn!(room_id = %room_id, "Ready deadline passed with nobody ready, abandoning");
                self.registry.with_match(room.match_id, |game| game.abandon());
            }
        }

        self.close_room(room);
    }

    /// Readiness handshake; the loop starts once both sides are ready
    pub fn ready(self: &Arc<Self>, user_id: Uuid) -> Result<(), GatewayError> {
        let room_id = self
            .presences
            .room_of(user_id)
            .ok_or(GatewayError::NotInRoom)?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (readiness, match_id, recipients, bot) = {
            let mut rooms = self.rooms.lock();
            let room = rooms
                .get_mut(&room_id)
                .ok_or(GatewayError::UnknownRoom(room_id))?;
            let team = room.team_of(user_id).ok_or(GatewayError::NotInRoom)?;
            let readiness = room.mark_ready(team);
            if readiness == Readiness::Start {
                room.arm(cancel_tx);
            }
            (readiness, room.match_id, room.humans(), room.bot)
        };

        match readiness {
            Readiness::WaitingForOpponent => {
                debug!(user_id = %user_id, room_id = %room_id, "Waiting for opponent to be ready");
                self.presences
                    .send_to(user_id, ServerMsg::WaitingOpponent { room_id });
            }
            Readiness::AlreadyStarted => {
                debug!(user_id = %user_id, room_id = %room_id, "Ready ignored, match running");
            }
            Readiness::Start => {
                self.registry.with_match(match_id, |game| game.start());

                let room_loop = RoomLoop {
                    room_id,
                    match_id,
                    recipients,
                    bot: bot.map(|team| BotController::new(team, rand::random())),
                };
                tokio::spawn(run_room(Arc::clone(self), room_loop, cancel_rx));
                info!(room_id = %room_id, match_id = %match_id, "Match started");
            }
        }

        Ok(())
    }

    /// Forward a key event for the caller's own paddle
    pub fn relay_input(&self, user_id: Uuid, room_id: Uuid, key: &str, pressed: bool) {
        let match_id = {
            let rooms = self.rooms.lock();
            match rooms.get(&room_id) {
                Some(room) if room.team_of(user_id).is_some() => room.match_id,
                Some(_) => {
                    warn!(user_id = %user_id, room_id = %room_id, "Input for a room the user is not in");
                    return;
                }
                None => {
                    warn!(user_id = %user_id, room_id = %room_id, "Input for unknown room");
                    return;
                }
            }
        };

        let cmd = InputCommand {
            match_id,
            player_id: user_id,
            key: key.to_string(),
            event: if pressed { "pressed" } else { "released" }.to_string(),
        };

        if let Err(e) = self.registry.dispatch(&cmd) {
            warn!(user_id = %user_id, room_id = %room_id, error = %e, "Input rejected");
        }
    }

    /// Direct challenge. The opponent gets a room even while offline.
    pub async fn play_friend(
        self: &Arc<Self>,
        user_id: Uuid,
        opponent_id: Uuid,
    ) -> Result<(), GatewayError> {
        if user_id == opponent_id {
            return Err(GatewayError::SelfChallenge);
        }
        let me = self
            .presences
            .get(user_id)
            .ok_or(GatewayError::UnknownUser(user_id))?;
        if me.current_room.is_some() {
            return Err(GatewayError::AlreadyInRoom);
        }

        let opponent_name = match self.presences.get(opponent_id) {
            Some(p) if p.current_room.is_some() => return Err(GatewayError::OpponentBusy),
            Some(p) => p.display_name,
            None => self
                .users
                .display_name(opponent_id)
                .await?
                .ok_or(GatewayError::UnknownOpponent(opponent_id))?,
        };

        // Either side may have been seated while the lookup ran
        let mut waiting = self.waiting.lock();
        if self.presences.room_of(user_id).is_some() {
            return Err(GatewayError::AlreadyInRoom);
        }
        if self.presences.room_of(opponent_id).is_some() {
            return Err(GatewayError::OpponentBusy);
        }

        self.presences.ensure(opponent_id, opponent_name.clone());
        waiting.withdraw(user_id);
        waiting.withdraw(opponent_id);

        let left = Seat {
            user_id,
            display_name: me.display_name,
            ready: false,
        };
        let right = Seat {
            user_id: opponent_id,
            display_name: opponent_name,
            ready: false,
        };
        self.open_room(left, right, None)?;
        Ok(())
    }

    /// Pair the caller with the server-side bot in the right seat
    pub fn play_bot(self: &Arc<Self>, user_id: Uuid) -> Result<(), GatewayError> {
        let mut waiting = self.waiting.lock();
        let me = self
            .presences
            .get(user_id)
            .ok_or(GatewayError::UnknownUser(user_id))?;
        if me.current_room.is_some() {
            return Err(GatewayError::AlreadyInRoom);
        }
        waiting.withdraw(user_id);

        let left = Seat {
            user_id,
            display_name: me.display_name,
            ready: false,
        };
        let right = Seat {
            user_id: Uuid::new_v4(),
            display_name: BOT_NAME.to_string(),
            ready: true,
        };
        self.open_room(left, right, Some(Team::Right))?;
        Ok(())
    }

    /// Where the user stands, for clients resuming after a reload
    pub fn check_game(&self, user_id: Uuid) -> GameStatus {
        let Some(room_id) = self.presences.room_of(user_id) else {
            return GameStatus::idle();
        };

        let seats = {
            let rooms = self.rooms.lock();
            rooms.get(&room_id).and_then(|room| {
                let team = room.team_of(user_id)?;
                let opponent = room.seat(team.opponent());
                Some((
                    room.match_id,
                    team,
                    opponent.user_id,
                    opponent.display_name.clone(),
                ))
            })
        };
        let Some((match_id, side, opponent_id, opponent_name)) = seats else {
            return GameStatus::idle();
        };

        let snapshot = self.registry.snapshot(match_id);
        GameStatus {
            in_game: true,
            room_id: Some(room_id),
            side: Some(side),
            opponent_id: Some(opponent_id),
            opponent_name: Some(opponent_name),
            phase: snapshot.as_ref().map(|s| s.phase),
            snapshot,
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Tear a room down. Safe to call more than once; only the first call
    /// has any effect.
    pub fn finish_room(&self, room_id: Uuid) {
        let Some(room) = self.rooms.lock().remove(&room_id) else {
            return;
        };
        self.close_room(room);
    }

    /// Notify, release and persist a room already taken out of the table
    fn close_room(&self, mut room: Room) {
        let room_id = room.id;
        let summary = self.registry.with_match(room.match_id, |game| {
            game.finish();
            game.summary()
        });

        if let Some(summary) = &summary {
            for user_id in room.humans() {
                self.presences
                    .send_to(user_id, ServerMsg::GameOver(summary.clone()));
            }
        }

        for user_id in room.participants() {
            self.presences.leave_room(user_id, room_id);
        }

        room.cancel();

        let Some(summary) = summary else {
            warn!(room_id = %room_id, match_id = %room.match_id, "Room had no match to finish");
            return;
        };

        if room.bot.is_none() && summary.winner.is_some() {
            let record = MatchRecord {
                room_id,
                player1_id: summary.left.user_id,
                player2_id: summary.right.user_id,
                winner_id: summary.winner,
                player1_score: summary.left.score,
                player2_score: summary.right.score,
                started_at: summary.started_at,
                ended_at: summary.ended_at,
            };
            let results = Arc::clone(&self.results);
            tokio::spawn(async move {
                if let Err(e) = results.record_result(record).await {
                    warn!(room_id = %room_id, error = %e, "Failed to persist match result");
                }
            });
        }

        self.registry.remove(room.match_id);

        info!(
            room_id = %room_id,
            match_id = %summary.match_id,
            left_score = summary.left.score,
            right_score = summary.right.score,
            winner = ?summary.winner,
            forfeited_by = ?summary.forfeited_by,
            duration_secs = ?summary.duration_secs(),
            room_age_secs = room.created_at.elapsed().as_secs(),
            "Room finished"
        );
    }
}
