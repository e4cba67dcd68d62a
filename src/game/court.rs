//! Court geometry and occupancy / scoring queries

use super::ball::Ball;
use super::paddle::Paddle;
use super::Team;

/// Normalized court width; every other dimension derives from it
pub const COURT_WIDTH: f64 = 1.0;

/// Allowed range for the height scale factor
pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 1.0;

/// Static court geometry. Holds no game objects; callers pass them in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Court {
    width: f64,
    height: f64,
}

impl Court {
    /// Build a court whose height is `scale` times its width, scale clamped to [0.1, 1]
    pub fn new(scale: f64) -> Self {
        let scale = if scale.is_nan() {
            MAX_SCALE
        } else {
            scale.clamp(MIN_SCALE, MAX_SCALE)
        };

        Self {
            width: COURT_WIDTH,
            height: scale * COURT_WIDTH,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn center_x(&self) -> f64 {
        self.width / 2.0
    }

    /// Scoring line on the left side; also the left paddle's home column
    pub fn left_line(&self) -> f64 {
        self.width / 40.0 * 2.0
    }

    /// Scoring line on the right side; also the right paddle's home column
    pub fn right_line(&self) -> f64 {
        self.width / 40.0 * 38.0
    }

    /// Which paddle, if any, covers the point. Left is checked first.
    pub fn occupant(&self, left: &Paddle, right: &Paddle, x: f64, y: f64, radius: f64) -> Option<Team> {
        if left.is_point_inside(x, y, radius) {
            Some(Team::Left)
        } else if right.is_point_inside(x, y, radius) {
            Some(Team::Right)
        } else {
            None
        }
    }

    /// Ball is past the right scoring line: a point for the left side
    pub fn is_left_scored(&self, ball: &Ball) -> bool {
        ball.position.x > self.right_line()
    }

    /// Ball is past the left scoring line: a point for the right side
    pub fn is_right_scored(&self, ball: &Ball) -> bool {
        ball.position.x < self.left_line()
    }

    /// A ball centred at `y` would poke through the top or bottom wall
    pub fn crosses_horizontal_wall(&self, y: f64, radius: f64) -> bool {
        y - radius / 2.0 < 0.0 || y + radius / 2.0 > self.height
    }
}

impl Default for Court {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_clamped() {
        assert_eq!(Court::new(0.01).height(), 0.1);
        assert_eq!(Court::new(3.0).height(), 1.0);
        assert_eq!(Court::new(0.5).height(), 0.5);
        assert_eq!(Court::new(0.5).width(), 1.0);
    }

    #[test]
    fn scoring_lines() {
        let court = Court::default();
        assert!((court.left_line() - 0.05).abs() < 1e-12);
        assert!((court.right_line() - 0.95).abs() < 1e-12);
    }

    #[test]
    fn wall_crossing_uses_half_radius() {
        let court = Court::new(0.5);
        assert!(!court.crosses_horizontal_wall(0.25, 0.025));
        assert!(court.crosses_horizontal_wall(0.01, 0.025));
        assert!(court.crosses_horizontal_wall(0.495, 0.025));
    }
}
