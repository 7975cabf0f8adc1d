//! Player input component.
//!
//! The core never binds devices. Game code writes a resolved direction and
//! button signals into [`PlayerInput`]; actions read them as pure queries.

use bevy::prelude::*;

/// Buttons the actions care about.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionButton {
    /// Jump (also charges spindash, drop dash, flight, glide).
    Jump,
    /// Secondary action button.
    Special,
}

impl ActionButton {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        match self {
            Self::Jump => 0,
            Self::Special => 1,
        }
    }
}

/// Phase of a button signal in the current tick.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonPhase {
    /// Pressed this tick.
    Started,
    /// Held since an earlier tick.
    Performed,
    /// Released this tick.
    Canceled,
}

#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
struct ButtonState {
    phase: Option<ButtonPhase>,
    held_ticks: u32,
}

/// Resolved input for one character.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use hedge_controller::prelude::*;
///
/// let mut input = PlayerInput::new();
/// input.set_direction(1, 0);
/// input.set_button(ActionButton::Jump, true);
/// assert!(input.pressed(ActionButton::Jump));
///
/// // Next tick, still holding.
/// input.advance();
/// input.set_button(ActionButton::Jump, true);
/// assert!(input.held(ActionButton::Jump));
/// assert!(!input.pressed(ActionButton::Jump));
/// ```
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct PlayerInput {
    /// Directional input, each component in `{-1, 0, 1}`.
    pub direction: IVec2,
    buttons: [ButtonState; ActionButton::COUNT],
}

impl PlayerInput {
    /// Create an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the direction. Components are reduced to their sign.
    pub fn set_direction(&mut self, x: i32, y: i32) {
        self.direction = IVec2::new(x.signum(), y.signum());
    }

    /// Builder form of [`Self::set_direction`].
    pub fn with_direction(mut self, x: i32, y: i32) -> Self {
        self.set_direction(x, y);
        self
    }

    /// Horizontal input in `{-1, 0, 1}` as a float.
    #[inline]
    pub fn horizontal(&self) -> f32 {
        self.direction.x as f32
    }

    /// Whether down is held.
    #[inline]
    pub fn down(&self) -> bool {
        self.direction.y < 0
    }

    /// Whether up is held.
    #[inline]
    pub fn up(&self) -> bool {
        self.direction.y > 0
    }

    /// Feed the raw held state of a button; the phase is derived from the
    /// previous tick.
    pub fn set_button(&mut self, button: ActionButton, held: bool) {
        let state = &mut self.buttons[button.index()];
        let was_held = matches!(
            state.phase,
            Some(ButtonPhase::Started | ButtonPhase::Performed)
        );
        state.phase = match (was_held, held) {
            (false, true) => Some(ButtonPhase::Started),
            (true, true) => Some(ButtonPhase::Performed),
            (true, false) => Some(ButtonPhase::Canceled),
            (false, false) => None,
        };
        if !held {
            state.held_ticks = 0;
        }
    }

    /// Builder form of [`Self::set_button`].
    pub fn with_button(mut self, button: ActionButton, held: bool) -> Self {
        self.set_button(button, held);
        self
    }

    /// Force a phase, for input sources that already report phases.
    pub fn set_phase(&mut self, button: ActionButton, phase: Option<ButtonPhase>) {
        self.buttons[button.index()].phase = phase;
    }

    /// Phase of `button` this tick.
    pub fn phase(&self, button: ActionButton) -> Option<ButtonPhase> {
        self.buttons[button.index()].phase
    }

    /// Pressed this tick.
    pub fn pressed(&self, button: ActionButton) -> bool {
        self.phase(button) == Some(ButtonPhase::Started)
    }

    /// Held (pressed this tick or earlier).
    pub fn held(&self, button: ActionButton) -> bool {
        matches!(
            self.phase(button),
            Some(ButtonPhase::Started | ButtonPhase::Performed)
        )
    }

    /// Released this tick.
    pub fn released(&self, button: ActionButton) -> bool {
        self.phase(button) == Some(ButtonPhase::Canceled)
    }

    /// Ticks the button has been held before this one.
    pub fn held_ticks(&self, button: ActionButton) -> u32 {
        self.buttons[button.index()].held_ticks
    }

    /// Roll the signals over to the next tick.
    ///
    /// `Started` becomes `Performed`, `Canceled` clears.
    pub fn advance(&mut self) {
        for state in &mut self.buttons {
            state.phase = match state.phase {
                Some(ButtonPhase::Started | ButtonPhase::Performed) => {
                    state.held_ticks = state.held_ticks.saturating_add(1);
                    Some(ButtonPhase::Performed)
                }
                Some(ButtonPhase::Canceled) | None => {
                    state.held_ticks = 0;
                    None
                }
            };
        }
    }

    /// Clear all input.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_is_reduced_to_sign() {
        let input = PlayerInput::new().with_direction(5, -3);
        assert_eq!(input.direction, IVec2::new(1, -1));
        assert!(input.down());
        assert!(!input.up());
        assert_eq!(input.horizontal(), 1.0);
    }

    #[test]
    fn button_phases_follow_held_state() {
        let mut input = PlayerInput::new();
        input.set_button(ActionButton::Jump, true);
        assert_eq!(input.phase(ActionButton::Jump), Some(ButtonPhase::Started));

        input.set_button(ActionButton::Jump, true);
        assert_eq!(input.phase(ActionButton::Jump), Some(ButtonPhase::Performed));

        input.set_button(ActionButton::Jump, false);
        assert!(input.released(ActionButton::Jump));

        input.set_button(ActionButton::Jump, false);
        assert_eq!(input.phase(ActionButton::Jump), None);
    }

    #[test]
    fn advance_rolls_phases() {
        let mut input = PlayerInput::new().with_button(ActionButton::Special, true);
        input.advance();
        assert_eq!(input.phase(ActionButton::Special), Some(ButtonPhase::Performed));
        assert_eq!(input.held_ticks(ActionButton::Special), 1);
        input.advance();
        assert_eq!(input.held_ticks(ActionButton::Special), 2);

        input.set_button(ActionButton::Special, false);
        input.advance();
        assert_eq!(input.phase(ActionButton::Special), None);
        assert_eq!(input.held_ticks(ActionButton::Special), 0);
    }

    #[test]
    fn buttons_are_independent() {
        let input = PlayerInput::new().with_button(ActionButton::Jump, true);
        assert!(input.pressed(ActionButton::Jump));
        assert!(!input.held(ActionButton::Special));
    }
}
