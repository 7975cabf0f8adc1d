//! Kinematic state shared by the sensors, the action machine and the
//! integrator.

use bevy::prelude::*;

use crate::math::{normal_from_angle, rotate_offset, tangent_from_angle};
use crate::state::{GroundMode, TickCountdown};

/// Mutable kinematic state of one character.
///
/// `center` is the body center used by every sensor. The entity position is
/// derived from it through the build's pivot point.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct PlayerBody {
    /// Body center in world space.
    pub center: Vec2,
    /// Free velocity (pixels per reference frame).
    pub velocity: Vec2,
    /// Signed speed along the ground tangent while grounded.
    pub ground_velocity: f32,
    /// Whether the ground sensors hold a contact.
    pub grounded: bool,
    /// Surface angle in degrees (clockwise from up). Kept after leaving the
    /// ground so momentum can be re-projected.
    pub ground_angle: f32,
    /// Cardinal mode derived from the ground angle.
    pub ground_mode: GroundMode,
    /// Facing direction, `1` right or `-1` left.
    pub facing: f32,
    /// Whether the active action damages enemies on contact.
    pub attacking: bool,
    /// Horizontal control lock after slipping.
    pub control_lock: TickCountdown,
    /// Invulnerability after taking damage.
    pub invulnerability: TickCountdown,
}

impl Default for PlayerBody {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            velocity: Vec2::ZERO,
            ground_velocity: 0.0,
            grounded: false,
            ground_angle: 0.0,
            ground_mode: GroundMode::Floor,
            facing: 1.0,
            attacking: false,
            control_lock: TickCountdown::default(),
            invulnerability: TickCountdown::default(),
        }
    }
}

impl PlayerBody {
    /// Body at rest at `center`.
    pub fn at(center: Vec2) -> Self {
        Self {
            center,
            ..default()
        }
    }

    /// Angle the sensors are built around: the ground angle while grounded,
    /// flat while airborne.
    #[inline]
    pub fn sensor_angle(&self) -> f32 {
        if self.grounded {
            self.ground_angle
        } else {
            0.0
        }
    }

    /// Surface normal for the sensor angle.
    #[inline]
    pub fn up(&self) -> Vec2 {
        normal_from_angle(self.sensor_angle())
    }

    /// Forward tangent for the sensor angle.
    #[inline]
    pub fn forward(&self) -> Vec2 {
        tangent_from_angle(self.sensor_angle())
    }

    /// Free velocity equivalent to the current ground velocity.
    #[inline]
    pub fn ground_velocity_vector(&self) -> Vec2 {
        tangent_from_angle(self.ground_angle) * self.ground_velocity
    }

    /// Entity position for a pivot offset expressed in body space.
    pub fn entity_position(&self, pivot_point: Vec2) -> Vec2 {
        self.center - rotate_offset(pivot_point, self.sensor_angle())
    }

    /// Set the body center from an entity position.
    pub fn set_entity_position(&mut self, position: Vec2, pivot_point: Vec2) {
        self.center = position + rotate_offset(pivot_point, self.sensor_angle());
    }

    /// Leave the ground keeping the current free velocity.
    pub fn detach(&mut self) {
        self.grounded = false;
        self.ground_mode = GroundMode::Floor;
    }

    /// Leave the ground converting ground velocity into a free vector.
    pub fn launch(&mut self) {
        if self.grounded {
            self.velocity = self.ground_velocity_vector();
        }
        self.detach();
    }

    /// Update the facing from a signed speed or input.
    pub fn face(&mut self, direction: f32) {
        if direction > 0.0 {
            self.facing = 1.0;
        } else if direction < 0.0 {
            self.facing = -1.0;
        }
    }
}
