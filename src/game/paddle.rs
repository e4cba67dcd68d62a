//! Paddle movement, rotation, charging and collision

use uuid::Uuid;

use super::court::Court;
use super::input::{Control, Controls};
use super::vector::Vector;
use super::{MatchPhase, ServePhase, Team};

/// Degrees turned per tick while a rotate control is held
pub const ROTATION_SPEED_DEGREES: f64 = 4.0;
/// Charge a paddle starts with and returns to after each hit
pub const DEFAULT_CHARGE_POWER: u32 = 10;
/// Charge ceiling while shoot is held
pub const MAX_CHARGE_POWER: u32 = 98;
/// Charge floor while shoot is released
pub const MIN_CHARGE_POWER: u32 = 12;
/// Charge gained or lost per tick
pub const CHARGE_STEP: u32 = 2;

/// A controllable bar. `direction` is the facing normal; `width` is measured
/// along it and `height` across it.
#[derive(Debug, Clone)]
pub struct Paddle {
    pub owner: Uuid,
    pub team: Team,
    pub position: Vector,
    pub direction: Vector,
    pub width: f64,
    pub height: f64,
    pub movement_speed: f64,
    pub rotation_speed: f64,
    charge_power: u32,
    default_charge_power: u32,
    pub controls: Controls,
    pub is_bot: bool,
}

impl Paddle {
    pub fn new(owner: Uuid, team: Team, court: &Court, is_bot: bool) -> Self {
        let (x, direction) = match team {
            Team::Left => (court.left_line(), Vector::new(1.0, 0.0)),
            Team::Right => (court.right_line(), Vector::new(-1.0, 0.0)),
        };

        Self {
            owner,
            team,
            position: Vector::new(x, court.height() / 2.0),
            direction,
            width: court.width() / 80.0,
            height: court.width() / 10.0,
            movement_speed: court.width() / 200.0,
            rotation_speed: ROTATION_SPEED_DEGREES,
            charge_power: DEFAULT_CHARGE_POWER,
            default_charge_power: DEFAULT_CHARGE_POWER,
            controls: Controls::default(),
            is_bot,
        }
    }

    pub fn charge_power(&self) -> u32 {
        self.charge_power
    }

    /// Advance one tick. Does nothing unless the match is active.
    pub fn update(&mut self, phase: MatchPhase, court: &Court, serve: &mut ServePhase) {
        if phase != MatchPhase::Active {
            return;
        }

        self.update_vertical(court);
        self.update_horizontal(court);
        self.update_rotation();
        self.update_charge(serve);
    }

    fn update_vertical(&mut self, court: &Court) {
        let up = self.controls.is_pressed(Control::Up);
        let down = self.controls.is_pressed(Control::Down);

        let delta = match (up, down) {
            (true, false) => -self.movement_speed,
            (false, true) => self.movement_speed,
            _ => return,
        };

        let half = self.height / 2.0;
        self.position.y = clamp_between(self.position.y + delta, half, court.height() - half);
    }

    fn update_horizontal(&mut self, court: &Court) {
        let left = self.controls.is_pressed(Control::Left);
        let right = self.controls.is_pressed(Control::Right);

        let delta = match (left, right) {
            (true, false) => -self.movement_speed,
            (false, true) => self.movement_speed,
            _ => return,
        };

        let (min_x, max_x) = self.horizontal_bounds(court);
        self.position.x = clamp_between(self.position.x + delta, min_x, max_x);
    }

    /// Column the paddle centre may occupy: its own half, never past its scoring line
    pub fn horizontal_bounds(&self, court: &Court) -> (f64, f64) {
        let half = self.width / 2.0;
        match self.team {
            Team::Left => (court.left_line(), court.center_x() - half),
            Team::Right => (court.center_x() + half, court.right_line()),
        }
    }

    fn update_rotation(&mut self) {
        let rotate_left = self.controls.is_pressed(Control::RotateLeft);
        let rotate_right = self.controls.is_pressed(Control::RotateRight);

        // Mirrored per team so both players turn the same way on screen
        let sign = match (rotate_left, rotate_right, self.team) {
            (true, false, Team::Left) | (false, true, Team::Right) => -1.0,
            (true, false, Team::Right) | (false, true, Team::Left) => 1.0,
            _ => return,
        };

        self.direction.rotate(sign * self.rotation_speed);
    }

    fn update_charge(&mut self, serve: &mut ServePhase) {
        let shooting = self.controls.is_pressed(Control::Shoot);

        if shooting {
            self.charge_power = (self.charge_power + CHARGE_STEP).min(MAX_CHARGE_POWER);
        } else if self.charge_power > MIN_CHARGE_POWER {
            self.charge_power = self
                .charge_power
                .saturating_sub(CHARGE_STEP)
                .max(MIN_CHARGE_POWER);
        }

        if shooting && *serve == ServePhase::serve_of(self.team) {
            *serve = ServePhase::rally_toward(self.team.opponent());
        }
    }

    /// Oriented-box test in the paddle's frame, grown by `radius` on every side
    pub fn is_point_inside(&self, x: f64, y: f64, radius: f64) -> bool {
        let offset = Vector::new(x, y) - self.position;
        let offset_len = offset.length();
        let dir_len = self.direction.length();

        if offset_len <= f64::EPSILON {
            return true;
        }
        if dir_len <= f64::EPSILON {
            return offset_len < radius;
        }

        let cos_angle = offset.dot(&self.direction).abs() / (offset_len * dir_len);
        let sin_angle = offset.cross(&self.direction).abs() / (offset_len * dir_len);

        cos_angle * offset_len < self.width / 2.0 + radius
            && sin_angle * offset_len < self.height / 2.0 + radius
    }

    /// Drop any accumulated charge
    pub fn reset(&mut self) {
        self.charge_power = self.default_charge_power;
    }
}

/// Clamp that tolerates an inverted range by pinning to its midpoint
fn clamp_between(value: f64, min: f64, max: f64) -> f64 {
    if max < min {
        (min + max) / 2.0
    } else {
        value.max(min).min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::InputKind;

    fn paddle(team: Team, court: &Court) -> Paddle {
        Paddle::new(Uuid::new_v4(), team, court, false)
    }

    fn run(paddle: &mut Paddle, court: &Court, ticks: usize) {
        let mut serve = ServePhase::RallyTowardLeft;
        for _ in 0..ticks {
            paddle.update(MatchPhase::Active, court, &mut serve);
        }
    }

    #[test]
    fn vertical_movement_stays_on_court() {
        for scale in [0.1, 0.35, 0.5, 1.0] {
            let court = Court::new(scale);
            let mut p = paddle(Team::Left, &court);

            p.controls.apply(Control::Up, InputKind::Pressed);
            run(&mut p, &court, 500);
            assert!(p.position.y - p.height / 2.0 >= -1e-12);

            p.controls.apply(Control::Up, InputKind::Released);
            p.controls.apply(Control::Down, InputKind::Pressed);
            run(&mut p, &court, 500);
            assert!(p.position.y + p.height / 2.0 <= court.height() + 1e-12);
        }
    }

    #[test]
    fn opposing_buttons_cancel() {
        let court = Court::default();
        let mut p = paddle(Team::Right, &court);
        let start = p.position;
        p.controls.apply(Control::Up, InputKind::Pressed);
        p.controls.apply(Control::Down, InputKind::Pressed);
        run(&mut p, &court, 10);
        assert_eq!(p.position, start);
    }

    #[test]
    fn horizontal_movement_stays_in_own_half() {
        let court = Court::default();
        for team in [Team::Left, Team::Right] {
            let mut p = paddle(team, &court);
            let (min_x, max_x) = p.horizontal_bounds(&court);

            p.controls.apply(Control::Right, InputKind::Pressed);
            run(&mut p, &court, 400);
            assert!(p.position.x <= max_x + 1e-12);
            assert!(p.position.x >= min_x - 1e-12);

            p.controls.apply(Control::Right, InputKind::Released);
            p.controls.apply(Control::Left, InputKind::Pressed);
            run(&mut p, &court, 400);
            assert!(p.position.x >= min_x - 1e-12);

            match team {
                Team::Left => assert!(p.position.x < court.center_x()),
                Team::Right => assert!(p.position.x > court.center_x()),
            }
        }
    }

    #[test]
    fn rotation_is_mirrored_between_teams() {
        let court = Court::default();
        let mut left = paddle(Team::Left, &court);
        let mut right = paddle(Team::Right, &court);

        left.controls.apply(Control::RotateLeft, InputKind::Pressed);
        right.controls.apply(Control::RotateLeft, InputKind::Pressed);
        run(&mut left, &court, 1);
        run(&mut right, &court, 1);

        // Left paddle faces +x, turning clockwise; right faces -x, turning counter-clockwise
        assert!((left.direction.angle() + 4.0).abs() < 1e-9);
        assert!((right.direction.angle() + 176.0).abs() < 1e-9);
    }

    #[test]
    fn charge_rises_while_held_and_decays_after() {
        let court = Court::default();
        let mut p = paddle(Team::Left, &court);
        assert_eq!(p.charge_power(), DEFAULT_CHARGE_POWER);

        p.controls.apply(Control::Shoot, InputKind::Pressed);
        run(&mut p, &court, 100);
        assert_eq!(p.charge_power(), MAX_CHARGE_POWER);

        p.controls.apply(Control::Shoot, InputKind::Released);
        run(&mut p, &court, 100);
        assert_eq!(p.charge_power(), MIN_CHARGE_POWER);

        p.reset();
        assert_eq!(p.charge_power(), DEFAULT_CHARGE_POWER);
    }

    #[test]
    fn shoot_launches_own_serve_only() {
        let court = Court::default();
        let mut left = paddle(Team::Left, &court);
        left.controls.apply(Control::Shoot, InputKind::Pressed);

        let mut serve = ServePhase::ServeRight;
        left.update(MatchPhase::Active, &court, &mut serve);
        assert_eq!(serve, ServePhase::ServeRight);

        let mut serve = ServePhase::ServeLeft;
        left.update(MatchPhase::Active, &court, &mut serve);
        assert_eq!(serve, ServePhase::RallyTowardRight);
    }

    #[test]
    fn inactive_match_freezes_paddle() {
        let court = Court::default();
        let mut p = paddle(Team::Left, &court);
        let start = p.position;
        p.controls.apply(Control::Down, InputKind::Pressed);
        let mut serve = ServePhase::ServeLeft;
        p.update(MatchPhase::Paused, &court, &mut serve);
        assert_eq!(p.position, start);
    }

    #[test]
    fn point_inside_follows_orientation() {
        let court = Court::default();
        let mut p = paddle(Team::Left, &court);
        let (x, y) = (p.position.x, p.position.y);

        // Along the long side
        assert!(p.is_point_inside(x, y + 0.04, 0.0));
        assert!(!p.is_point_inside(x, y + 0.06, 0.0));
        // Across the thin side
        assert!(!p.is_point_inside(x + 0.01, y, 0.0));
        assert!(p.is_point_inside(x + 0.01, y, 0.01));
        // Centre
        assert!(p.is_point_inside(x, y, 0.0));

        // Turned a quarter, the long side lies along x
        p.direction.rotate(90.0);
        assert!(p.is_point_inside(x + 0.04, y, 0.0));
        assert!(!p.is_point_inside(x, y + 0.04, 0.0));
    }
}
