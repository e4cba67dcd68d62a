//! Per-control input model for a paddle

use serde::{Deserialize, Serialize};

/// State of a single control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Released,
    Pressed,
    /// Control is switched off for this paddle; presses are ignored
    Disabled,
}

/// The eight controls a paddle understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Up,
    Down,
    Left,
    Right,
    RotateLeft,
    RotateRight,
    Shoot,
    Pause,
}

impl Control {
    pub const ALL: [Control; 8] = [
        Control::Up,
        Control::Down,
        Control::Left,
        Control::Right,
        Control::RotateLeft,
        Control::RotateRight,
        Control::Shoot,
        Control::Pause,
    ];

    /// Map a client key to its control. Only the fixed key set is accepted.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "w" => Some(Control::Up),
            "s" => Some(Control::Down),
            "a" => Some(Control::Left),
            "d" => Some(Control::Right),
            "j" => Some(Control::RotateLeft),
            "n" => Some(Control::RotateRight),
            " " => Some(Control::Shoot),
            "p" => Some(Control::Pause),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Whether a control went down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Pressed,
    Released,
}

impl InputKind {
    pub fn parse(event: &str) -> Option<Self> {
        match event {
            "pressed" => Some(InputKind::Pressed),
            "released" => Some(InputKind::Released),
            _ => None,
        }
    }
}

/// Button states for all eight controls of one paddle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    states: [ButtonState; 8],
}

impl Controls {
    /// Build a control set; side movement, rotation and shooting can be switched off
    pub fn new(side_enabled: bool, rotation_enabled: bool, shoot_enabled: bool) -> Self {
        let toggle = |enabled: bool| {
            if enabled {
                ButtonState::Released
            } else {
                ButtonState::Disabled
            }
        };

        let mut states = [ButtonState::Released; 8];
        states[Control::Left.index()] = toggle(side_enabled);
        states[Control::Right.index()] = toggle(side_enabled);
        states[Control::RotateLeft.index()] = toggle(rotation_enabled);
        states[Control::RotateRight.index()] = toggle(rotation_enabled);
        states[Control::Shoot.index()] = toggle(shoot_enabled);

        Self { states }
    }

    pub fn state(&self, control: Control) -> ButtonState {
        self.states[control.index()]
    }

    pub fn is_pressed(&self, control: Control) -> bool {
        self.state(control) == ButtonState::Pressed
    }

    /// Apply a press or release; disabled controls stay disabled
    pub fn apply(&mut self, control: Control, kind: InputKind) {
        let slot = &mut self.states[control.index()];
        if *slot == ButtonState::Disabled {
            return;
        }
        *slot = match kind {
            InputKind::Pressed => ButtonState::Pressed,
            InputKind::Released => ButtonState::Released,
        };
    }

    /// Release every enabled control
    pub fn release_all(&mut self) {
        for control in Control::ALL {
            self.apply(control, InputKind::Released);
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new(true, true, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut controls = Controls::default();
        controls.apply(Control::Up, InputKind::Pressed);
        assert!(controls.is_pressed(Control::Up));
        controls.apply(Control::Up, InputKind::Released);
        assert_eq!(controls.state(Control::Up), ButtonState::Released);
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let mut controls = Controls::new(false, true, false);
        controls.apply(Control::Left, InputKind::Pressed);
        controls.apply(Control::Shoot, InputKind::Pressed);
        assert_eq!(controls.state(Control::Left), ButtonState::Disabled);
        assert_eq!(controls.state(Control::Shoot), ButtonState::Disabled);
        assert_eq!(controls.state(Control::RotateLeft), ButtonState::Released);
    }

    #[test]
    fn key_allow_list() {
        assert_eq!(Control::from_key(" "), Some(Control::Shoot));
        assert_eq!(Control::from_key("n"), Some(Control::RotateRight));
        assert_eq!(Control::from_key("x"), None);
        assert_eq!(Control::from_key("W"), None);
        assert_eq!(InputKind::parse("pressed"), Some(InputKind::Pressed));
        assert_eq!(InputKind::parse("held"), None);
    }
}
