//! Server-side opponent for `playBot` matches.
//!
//! The bot plays through the same control path as a human: each tick it
//! decides which controls to hold and feeds them to `Match::handle_input`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use super::input::{Control, InputKind};
use super::r#match::Match;
use super::{MatchPhase, ServePhase, Team};

/// Ticks the bot waits before serving (min, max)
const SERVE_DELAY_TICKS: (u32, u32) = (30, 120);
/// Fraction of the paddle height the bot tolerates before moving
const DEAD_ZONE: (f64, f64) = (0.15, 0.45);
/// Horizontal distance at which the bot starts charging a return
const CHARGE_DISTANCE: f64 = 0.25;

#[derive(Debug)]
pub struct BotController {
    team: Team,
    rng: ChaCha8Rng,
    serve_countdown: Option<u32>,
    dead_zone: f64,
}

impl BotController {
    pub fn new(team: Team, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dead_zone = rng.gen_range(DEAD_ZONE.0..DEAD_ZONE.1);
        Self {
            team,
            rng,
            serve_countdown: None,
            dead_zone,
        }
    }

    /// Decide this tick's controls and apply them to the match
    pub fn drive(&mut self, game: &mut Match) {
        if game.phase() != MatchPhase::Active {
            return;
        }

        let paddle = game.paddle(self.team);
        let owner = paddle.owner;
        let paddle_x = paddle.position.x;
        let paddle_y = paddle.position.y;
        let tolerance = paddle.height * self.dead_zone;
        let ball = game.ball().position;

        let mut held = Vec::with_capacity(2);

        match game.serve_phase() {
            serve if serve == ServePhase::serve_of(self.team) => {
                let countdown = self.serve_countdown.get_or_insert_with(|| {
                    self.rng.gen_range(SERVE_DELAY_TICKS.0..=SERVE_DELAY_TICKS.1)
                });
                if *countdown == 0 {
                    held.push(Control::Shoot);
                    self.serve_countdown = None;
                } else {
                    *countdown -= 1;
                }
            }
            serve if serve == ServePhase::rally_toward(self.team) => {
                self.serve_countdown = None;
                if ball.y < paddle_y - tolerance {
                    held.push(Control::Up);
                } else if ball.y > paddle_y + tolerance {
                    held.push(Control::Down);
                }
                if (ball.x - paddle_x).abs() < CHARGE_DISTANCE {
                    held.push(Control::Shoot);
                }
            }
            _ => {
                // Drift back toward the middle while the ball is away
                self.serve_countdown = None;
                let center = game.court().height() / 2.0;
                if paddle_y < center - tolerance {
                    held.push(Control::Down);
                } else if paddle_y > center + tolerance {
                    held.push(Control::Up);
                }
            }
        }

        for control in [Control::Up, Control::Down, Control::Shoot] {
            let kind = if held.contains(&control) {
                InputKind::Pressed
            } else {
                InputKind::Released
            };
            if let Err(e) = game.handle_input(owner, control, kind) {
                warn!(match_id = %game.id(), error = %e, "Bot input rejected");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::r#match::{MatchId, MatchSpec};
    use uuid::Uuid;

    fn bot_match() -> (Match, BotController) {
        let spec = MatchSpec {
            bot: Some(Team::Right),
            ..MatchSpec::new(Uuid::new_v4(), Uuid::new_v4())
        };
        let game = Match::new(MatchId(1), &spec).unwrap();
        (game, BotController::new(Team::Right, 7))
    }

    #[test]
    fn idle_until_match_is_active() {
        let (mut game, mut bot) = bot_match();
        bot.drive(&mut game);
        assert!(!game.paddle(Team::Right).controls.is_pressed(Control::Shoot));
        assert!(game.paddle(Team::Right).is_bot);
    }

    #[test]
    fn bot_serves_within_delay() {
        let (mut game, mut bot) = bot_match();
        game.start();

        // Hand the serve to the bot: clear its lane and let the left side score
        let left = game.paddle(Team::Left).owner;
        let right = game.paddle(Team::Right).owner;
        game.handle_input(right, Control::Down, InputKind::Pressed).unwrap();
        game.handle_input(left, Control::Shoot, InputKind::Pressed).unwrap();
        for _ in 0..400 {
            if game.serve_phase() == ServePhase::ServeRight {
                break;
            }
            game.tick();
        }
        assert_eq!(game.serve_phase(), ServePhase::ServeRight);
        game.handle_input(right, Control::Down, InputKind::Released).unwrap();

        for _ in 0..=SERVE_DELAY_TICKS.1 + 1 {
            bot.drive(&mut game);
            game.tick();
            if game.serve_phase() != ServePhase::ServeRight {
                break;
            }
        }
        assert_eq!(game.serve_phase(), ServePhase::RallyTowardLeft);
    }

    #[test]
    fn bot_tracks_incoming_ball() {
        let (mut game, mut bot) = bot_match();
        game.start();

        let left = game.paddle(Team::Left).owner;
        game.handle_input(left, Control::RotateLeft, InputKind::Pressed).unwrap();
        for _ in 0..8 {
            game.tick();
        }
        game.handle_input(left, Control::RotateLeft, InputKind::Released).unwrap();
        game.handle_input(left, Control::Shoot, InputKind::Pressed).unwrap();
        game.tick();
        assert_eq!(game.serve_phase(), ServePhase::RallyTowardRight);

        // Ball heads up-court (negative y); the bot should move up to meet it
        let start_y = game.paddle(Team::Right).position.y;
        for _ in 0..40 {
            bot.drive(&mut game);
            game.tick();
        }
        assert!(game.paddle(Team::Right).position.y < start_y);
    }
}
