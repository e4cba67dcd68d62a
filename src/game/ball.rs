//! Ball flight, serve attachment and paddle rebounds

use super::court::Court;
use super::paddle::Paddle;
use super::vector::Vector;
use super::{MatchPhase, ServePhase, Team};

/// Rebounds whose doubled dot product falls below this are treated as grazing hits
const GRAZING_THRESHOLD: f64 = 0.5;
/// Speed divisor applied on a wall bounce
const WALL_DAMPING: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct Ball {
    pub position: Vector,
    /// Heading; not necessarily unit length
    pub direction: Vector,
    speed: f64,
    default_speed: f64,
    radius: f64,
}

impl Ball {
    /// Ball resting on the serving paddle
    pub fn new(court: &Court, server: &Paddle) -> Self {
        let default_speed = court.width() / 150.0;
        let mut ball = Self {
            position: server.position,
            direction: server.direction,
            speed: default_speed,
            default_speed,
            radius: court.width() / 40.0,
        };
        ball.attach_to(server);
        ball
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn default_speed(&self) -> f64 {
        self.default_speed
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Advance one tick. Does nothing unless the match is active.
    pub fn update(
        &mut self,
        phase: MatchPhase,
        court: &Court,
        left: &mut Paddle,
        right: &mut Paddle,
        serve: &mut ServePhase,
    ) {
        if phase != MatchPhase::Active {
            return;
        }

        match serve.server() {
            Some(Team::Left) => self.attach_to(left),
            Some(Team::Right) => self.attach_to(right),
            None => self.fly(court, left, right, serve),
        }
    }

    /// Glue to the front edge of the serving paddle and aim along it
    fn attach_to(&mut self, paddle: &Paddle) {
        let reach = paddle.width / 2.0 + self.radius / 2.0;
        self.position = paddle.position + paddle.direction * reach;
        self.direction = paddle.direction;
    }

    fn fly(&mut self, court: &Court, left: &mut Paddle, right: &mut Paddle, serve: &mut ServePhase) {
        let next = self.position + self.direction * self.speed;

        if court.crosses_horizontal_wall(next.y, self.radius) {
            self.direction.y = -self.direction.y;
            self.speed = (self.speed / WALL_DAMPING).max(self.default_speed);
            return;
        }

        let occupant = court.occupant(left, right, next.x, next.y, self.radius / 2.0);
        let paddle = match occupant {
            None => {
                self.position = next;
                return;
            }
            Some(Team::Left) => left,
            Some(Team::Right) => right,
        };

        self.rebound(paddle, serve);
        self.speed *= 1.0 + 2.0 * f64::from(paddle.charge_power()) / 100.0;
        paddle.reset();
    }

    /// Reflect off a paddle, using its facing direction as the reflection axis.
    /// Near-parallel contacts just reverse the ball.
    pub fn rebound(&mut self, paddle: &Paddle, serve: &mut ServePhase) {
        let normal = paddle.direction;
        let dot = 2.0 * self.direction.dot(&normal);

        if dot.abs() < GRAZING_THRESHOLD {
            self.direction = -self.direction;
            return;
        }

        let normal_len = normal.length();
        self.direction = self.direction - normal * (dot / normal_len);
        *serve = serve.flipped();
    }

    /// Back to the default speed. Position and heading are left alone.
    pub fn reset(&mut self) {
        self.speed = self.default_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn setup() -> (Court, Paddle, Paddle) {
        let court = Court::default();
        let left = Paddle::new(Uuid::new_v4(), Team::Left, &court, false);
        let right = Paddle::new(Uuid::new_v4(), Team::Right, &court, false);
        (court, left, right)
    }

    #[test]
    fn serving_ball_follows_paddle() {
        let (court, mut left, mut right) = setup();
        let mut ball = Ball::new(&court, &left);
        let mut serve = ServePhase::ServeLeft;

        left.position.y = 0.1;
        left.direction.rotate(30.0);
        ball.update(MatchPhase::Active, &court, &mut left, &mut right, &mut serve);

        let reach = left.width / 2.0 + ball.radius() / 2.0;
        let expected = left.position + left.direction * reach;
        assert!((ball.position.x - expected.x).abs() < 1e-12);
        assert!((ball.position.y - expected.y).abs() < 1e-12);
        assert_eq!(ball.direction, left.direction);
        assert_eq!(serve, ServePhase::ServeLeft);
    }

    #[test]
    fn rally_moves_by_speed() {
        let (court, mut left, mut right) = setup();
        let mut ball = Ball::new(&court, &left);
        let mut serve = ServePhase::RallyTowardRight;
        let start = ball.position;

        ball.update(MatchPhase::Active, &court, &mut left, &mut right, &mut serve);
        assert!((ball.position.x - (start.x + ball.speed())).abs() < 1e-12);
        assert_eq!(ball.position.y, start.y);
    }

    #[test]
    fn wall_bounce_inverts_y_and_damps_speed() {
        let (court, mut left, mut right) = setup();
        let mut ball = Ball::new(&court, &left);
        let mut serve = ServePhase::RallyTowardRight;

        ball.position = Vector::new(0.5, 0.015);
        ball.direction = Vector::new(0.6, -0.8);
        ball.speed = ball.default_speed() * 3.0;

        ball.update(MatchPhase::Active, &court, &mut left, &mut right, &mut serve);
        assert_eq!(ball.direction, Vector::new(0.6, 0.8));
        assert!((ball.speed() - ball.default_speed() * 2.0).abs() < 1e-12);
        assert_eq!(ball.position, Vector::new(0.5, 0.015));

        // Damping never drops below the default speed
        ball.direction = Vector::new(0.6, -0.8);
        ball.update(MatchPhase::Active, &court, &mut left, &mut right, &mut serve);
        ball.direction = Vector::new(0.6, -0.8);
        ball.update(MatchPhase::Active, &court, &mut left, &mut right, &mut serve);
        assert_eq!(ball.speed(), ball.default_speed());
    }

    #[test]
    fn x_escape_is_not_reflected() {
        let (court, mut left, mut right) = setup();
        let mut ball = Ball::new(&court, &left);
        let mut serve = ServePhase::RallyTowardRight;

        // Right paddle out of the ball's lane
        right.position.y = 0.45;
        ball.position = Vector::new(0.998, 0.2);
        ball.direction = Vector::new(1.0, 0.0);

        ball.update(MatchPhase::Active, &court, &mut left, &mut right, &mut serve);
        assert!(ball.position.x > court.width());
        assert_eq!(ball.direction, Vector::new(1.0, 0.0));
    }

    #[test]
    fn paddle_hit_reflects_speeds_up_and_resets_charge() {
        let (court, mut left, mut right) = setup();
        let mut ball = Ball::new(&court, &left);
        let mut serve = ServePhase::RallyTowardRight;

        ball.position = Vector::new(right.position.x - 0.02, right.position.y);
        ball.direction = Vector::new(1.0, 0.0);
        let speed = ball.speed();

        for _ in 0..20 {
            right.update(MatchPhase::Active, &court, &mut serve);
        }
        right.controls.apply(crate::game::input::Control::Shoot, crate::game::input::InputKind::Pressed);
        right.update(MatchPhase::Active, &court, &mut serve);
        let charge = right.charge_power();
        assert_eq!(charge, 12);

        ball.update(MatchPhase::Active, &court, &mut left, &mut right, &mut serve);
        assert_eq!(ball.direction, Vector::new(-1.0, 0.0));
        assert_eq!(serve, ServePhase::RallyTowardLeft);
        assert!((ball.speed() - speed * (1.0 + 2.0 * 12.0 / 100.0)).abs() < 1e-12);
        assert_eq!(right.charge_power(), 10);
    }

    #[test]
    fn grazing_rebound_is_an_involution() {
        let (court, left, _right) = setup();
        let mut ball = Ball::new(&court, &left);
        let mut serve = ServePhase::RallyTowardLeft;

        // Nearly parallel to the paddle face: 2 * (dir . n) = 0.2
        let before = Vector::new(0.1, 0.9);
        ball.direction = before;
        ball.rebound(&left, &mut serve);
        assert_eq!(ball.direction, -before);
        assert_eq!(serve, ServePhase::RallyTowardLeft);

        ball.rebound(&left, &mut serve);
        assert_eq!(ball.direction, before);
    }

    #[test]
    fn reset_restores_speed_only() {
        let (court, left, _) = setup();
        let mut ball = Ball::new(&court, &left);
        ball.speed = 1.0;
        ball.position = Vector::new(0.3, 0.3);
        ball.reset();
        assert_eq!(ball.speed(), ball.default_speed());
        assert_eq!(ball.position, Vector::new(0.3, 0.3));
    }
}
