//! Character state types.
//!
//! [`GroundMode`] and [`BodySize`] are part of the simulation. The marker
//! components ([`Grounded`], [`Airborne`], [`TouchingWall`]) mirror the
//! simulation for other game systems and are synced automatically.

use bevy::prelude::*;

use crate::math::normalize_angle;

/// Which cardinal direction currently acts as "down".
///
/// Derived from the ground angle with `round(angle / 90) mod 4`.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GroundMode {
    /// Standing on a floor; the surface faces up.
    #[default]
    Floor,
    /// The surface faces world `+X`.
    RightWall,
    /// Running on a ceiling; the surface faces down.
    Ceiling,
    /// The surface faces world `-X`.
    LeftWall,
}

impl GroundMode {
    /// Ground mode for a surface angle.
    pub fn from_angle(degrees: f32) -> Self {
        let quadrant = (normalize_angle(degrees) / 90.0).round() as i32;
        match quadrant.rem_euclid(4) {
            0 => Self::Floor,
            1 => Self::RightWall,
            2 => Self::Ceiling,
            _ => Self::LeftWall,
        }
    }

    /// Cardinal angle of this mode.
    pub fn angle(self) -> f32 {
        match self {
            Self::Floor => 0.0,
            Self::RightWall => 90.0,
            Self::Ceiling => 180.0,
            Self::LeftWall => 270.0,
        }
    }

    /// Cardinal "up" for this mode.
    pub fn up(self) -> Vec2 {
        match self {
            Self::Floor => Vec2::Y,
            Self::RightWall => Vec2::X,
            Self::Ceiling => Vec2::NEG_Y,
            Self::LeftWall => Vec2::NEG_X,
        }
    }

    /// Cardinal "down" for this mode.
    pub fn down(self) -> Vec2 {
        -self.up()
    }

    /// Height of `point` in this mode's rotated frame.
    ///
    /// `y` for floor, `x` for a right wall, `-y` for a ceiling and `-x` for a
    /// left wall. Greater is closer to the character.
    pub fn vertical(self, point: Vec2) -> f32 {
        point.dot(self.up())
    }
}

/// Body dimensions in use.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BodySize {
    /// Standing size.
    #[default]
    Regular,
    /// Rolled / curled size.
    Shrunk,
}

/// Countdown decremented once per tick.
///
/// Replaces timed coroutines: whatever waits on it checks
/// [`TickCountdown::is_running`] each tick.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCountdown {
    remaining: u32,
}

impl TickCountdown {
    /// Countdown with `ticks` remaining.
    pub fn new(ticks: u32) -> Self {
        Self { remaining: ticks }
    }

    /// Restart with `ticks` remaining.
    pub fn start(&mut self, ticks: u32) {
        self.remaining = ticks;
    }

    /// Stop immediately.
    pub fn stop(&mut self) {
        self.remaining = 0;
    }

    /// Advance one tick. Returns `true` on the tick the countdown finishes.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    /// Ticks left.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether ticks remain.
    pub fn is_running(&self) -> bool {
        self.remaining > 0
    }
}

/// Marker component indicating the character is grounded.
///
/// Added automatically when the ground sensors accept a contact. Removed
/// when the character becomes airborne.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component indicating the character is pushing against a wall.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct TouchingWall {
    /// Direction from the character toward the wall (`-1` left, `1` right).
    pub side: f32,
    /// Normal of the wall surface.
    pub normal: Vec2,
}

impl Default for TouchingWall {
    fn default() -> Self {
        Self {
            side: 1.0,
            normal: Vec2::NEG_X,
        }
    }
}

impl TouchingWall {
    /// Create a new wall touch state.
    pub fn new(side: f32, normal: Vec2) -> Self {
        Self { side, normal }
    }

    /// Check if the wall is on the left side.
    pub fn is_left(&self) -> bool {
        self.side < 0.0
    }

    /// Check if the wall is on the right side.
    pub fn is_right(&self) -> bool {
        self.side > 0.0
    }
}
