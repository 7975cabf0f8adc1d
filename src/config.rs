//! Controller configuration.
//!
//! This module defines the read-only tables the core consumes: body
//! dimensions ([`CharacterBuild`]), movement constants ([`PhysicsConfig`]),
//! sensor tuning ([`SensorConfig`]) and the per-stage scalars
//! ([`StageContext`]). Velocities are expressed in pixels per reference frame
//! and converted with [`TickContext::dt_factor`].

use bevy::prelude::*;

use crate::backend::CollisionMask;

/// Per-character body dimensions.
///
/// Radii are measured from the body center. "Shrunk" radii are used while
/// rolling, spinning or crouch-sliding.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CharacterBuild {
    /// Horizontal distance from the center to the ground/ceiling sensors.
    pub width_radius: f32,
    /// Distance from the center to the feet.
    pub height_radius: f32,
    /// Width radius while shrunk.
    pub shrunk_width_radius: f32,
    /// Height radius while shrunk.
    pub shrunk_height_radius: f32,
    /// Distance from the center at which walls stop the body.
    pub push_radius: f32,
    /// Offset from the entity position to the body center, in body space.
    pub pivot_point: Vec2,
    /// Extra sensor length beyond the body radius.
    pub sensor_extension: f32,
    /// Extra headroom probed above the body to report a low ceiling.
    pub low_ceiling_range: f32,
    /// Downward offset of the wall sensors while running on flat floor.
    pub wall_sensor_offset: f32,
    /// Allow splitting large movements into bounded sub-steps.
    pub high_speed_movement: bool,
    /// Layers the sensors collide with.
    pub collision_mask: CollisionMask,
}

impl Default for CharacterBuild {
    fn default() -> Self {
        Self {
            width_radius: 9.0,
            height_radius: 19.0,
            shrunk_width_radius: 7.0,
            shrunk_height_radius: 14.0,
            push_radius: 10.0,
            pivot_point: Vec2::ZERO,
            sensor_extension: 16.0,
            low_ceiling_range: 8.0,
            wall_sensor_offset: 8.0,
            high_speed_movement: true,
            collision_mask: CollisionMask::ALL,
        }
    }
}

impl CharacterBuild {
    /// Build for the classic hedgehog.
    pub fn sonic() -> Self {
        Self::default()
    }

    /// Build for the fox: slightly shorter standing height.
    pub fn tails() -> Self {
        Self {
            height_radius: 15.0,
            shrunk_height_radius: 14.0,
            ..Self::default()
        }
    }

    /// Build for the echidna: wider body.
    pub fn knuckles() -> Self {
        Self {
            width_radius: 10.0,
            ..Self::default()
        }
    }

    /// Set the standing radii.
    pub fn with_radii(mut self, width: f32, height: f32) -> Self {
        self.width_radius = width;
        self.height_radius = height;
        self
    }

    /// Set the shrunk radii.
    pub fn with_shrunk_radii(mut self, width: f32, height: f32) -> Self {
        self.shrunk_width_radius = width;
        self.shrunk_height_radius = height;
        self
    }

    /// Set the push radius.
    pub fn with_push_radius(mut self, radius: f32) -> Self {
        self.push_radius = radius;
        self
    }

    /// Set the sensor extension.
    pub fn with_sensor_extension(mut self, extension: f32) -> Self {
        self.sensor_extension = extension;
        self
    }

    /// Enable or disable high-speed sub-stepping.
    pub fn with_high_speed_movement(mut self, enabled: bool) -> Self {
        self.high_speed_movement = enabled;
        self
    }

    /// Set the pivot point.
    pub fn with_pivot_point(mut self, pivot: Vec2) -> Self {
        self.pivot_point = pivot;
        self
    }
}

/// Movement constants.
///
/// All values are per reference frame (see [`StageContext::physics_multiplier`]).
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    // === Ground ===
    /// Ground acceleration while holding a direction.
    pub acceleration: f32,
    /// Deceleration while holding against the direction of travel.
    pub deceleration: f32,
    /// Friction with no directional input.
    pub friction: f32,
    /// Speed cap reachable by running alone.
    pub top_speed: f32,
    /// Slope factor while running.
    pub slope_factor: f32,
    /// Minimum ground speed to stay attached to steep surfaces.
    pub fall_off_speed: f32,
    /// Ticks of horizontal control lock after slipping off a slope.
    pub control_lock_ticks: u32,

    // === Rolling ===
    /// Friction while rolling.
    pub roll_friction: f32,
    /// Deceleration while holding against a roll.
    pub roll_deceleration: f32,
    /// Slope factor rolling uphill.
    pub roll_slope_up_factor: f32,
    /// Slope factor rolling downhill.
    pub roll_slope_down_factor: f32,
    /// Minimum speed to start a roll.
    pub roll_min_speed: f32,
    /// Speed below which a roll ends.
    pub unroll_speed: f32,

    // === Air ===
    /// Air acceleration.
    pub air_acceleration: f32,
    /// Gravity.
    pub gravity: f32,
    /// Air drag multiplier applied per frame while rising slowly.
    pub air_drag: f32,
    /// Maximum downward speed.
    pub fall_speed_cap: f32,
    /// Hard speed cap on both axes.
    pub max_speed: f32,

    // === Jump ===
    /// Jump launch speed along the ground normal.
    pub jump_velocity: f32,
    /// Upward speed cap applied when jump is released.
    pub jump_release_velocity: f32,

    // === Spindash ===
    /// Base launch speed of a spindash.
    pub spindash_base_speed: f32,
    /// Charge added per jump press.
    pub spindash_charge_step: f32,
    /// Maximum accumulated charge.
    pub spindash_max_charge: f32,

    // === Drop dash ===
    /// Ticks the jump button must be held to arm the drop dash.
    pub drop_dash_charge_ticks: u32,
    /// Launch speed of a drop dash.
    pub drop_dash_speed: f32,
    /// Maximum drop dash speed.
    pub drop_dash_max_speed: f32,

    // === Fly / glide / climb ===
    /// Gravity while flying.
    pub fly_gravity: f32,
    /// Upward acceleration per flap.
    pub fly_lift: f32,
    /// Ticks of flight before tiring.
    pub fly_ticks: u32,
    /// Initial glide speed.
    pub glide_speed: f32,
    /// Glide acceleration.
    pub glide_acceleration: f32,
    /// Maximum glide speed.
    pub glide_top_speed: f32,
    /// Constant glide fall speed.
    pub glide_fall_speed: f32,
    /// Climb speed.
    pub climb_speed: f32,

    // === Damage ===
    /// Knockback applied when hurt.
    pub hurt_knockback: Vec2,
    /// Gravity while hurt.
    pub hurt_gravity: f32,
    /// Invulnerability ticks after being hurt.
    pub invulnerability_ticks: u32,
    /// Launch speed when dying.
    pub death_velocity: f32,

    // === Sharp descent ===
    /// Detach from the ground when the surface suddenly falls away.
    pub detect_sharp_descent: bool,
    /// Angle change (degrees) considered a sharp descent.
    pub sharp_descent_angle: f32,
    /// Minimum ground speed for sharp descent detection.
    pub sharp_descent_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl PhysicsConfig {
    /// Classic 16-bit constants.
    pub fn classic() -> Self {
        Self {
            acceleration: 0.046875,
            deceleration: 0.5,
            friction: 0.046875,
            top_speed: 6.0,
            slope_factor: 0.125,
            fall_off_speed: 2.5,
            control_lock_ticks: 30,
            roll_friction: 0.0234375,
            roll_deceleration: 0.125,
            roll_slope_up_factor: 0.078125,
            roll_slope_down_factor: 0.3125,
            roll_min_speed: 1.0,
            unroll_speed: 0.5,
            air_acceleration: 0.09375,
            gravity: 0.21875,
            air_drag: 0.96875,
            fall_speed_cap: 16.0,
            max_speed: 16.0,
            jump_velocity: 6.5,
            jump_release_velocity: 4.0,
            spindash_base_speed: 8.0,
            spindash_charge_step: 2.0,
            spindash_max_charge: 8.0,
            drop_dash_charge_ticks: 20,
            drop_dash_speed: 8.0,
            drop_dash_max_speed: 12.0,
            fly_gravity: 0.03125,
            fly_lift: 0.125,
            fly_ticks: 480,
            glide_speed: 4.0,
            glide_acceleration: 0.015625,
            glide_top_speed: 24.0,
            glide_fall_speed: 0.5,
            climb_speed: 1.0,
            hurt_knockback: Vec2::new(2.0, 4.0),
            hurt_gravity: 0.1875,
            invulnerability_ticks: 120,
            death_velocity: 7.0,
            detect_sharp_descent: false,
            sharp_descent_angle: 45.0,
            sharp_descent_speed: 6.0,
        }
    }

    /// Constants while submerged.
    pub fn underwater() -> Self {
        let classic = Self::classic();
        Self {
            acceleration: classic.acceleration / 2.0,
            deceleration: classic.deceleration / 2.0,
            friction: classic.friction / 2.0,
            top_speed: classic.top_speed / 2.0,
            air_acceleration: classic.air_acceleration / 2.0,
            gravity: 0.0625,
            jump_velocity: 3.5,
            jump_release_velocity: 2.0,
            ..classic
        }
    }

    /// Set the running constants.
    pub fn with_running(mut self, acceleration: f32, deceleration: f32, friction: f32) -> Self {
        self.acceleration = acceleration;
        self.deceleration = deceleration;
        self.friction = friction;
        self
    }

    /// Set the top speed.
    pub fn with_top_speed(mut self, top_speed: f32) -> Self {
        self.top_speed = top_speed;
        self
    }

    /// Set the running slope factor.
    pub fn with_slope_factor(mut self, slope_factor: f32) -> Self {
        self.slope_factor = slope_factor;
        self
    }

    /// Set gravity.
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// Enable sharp descent detection.
    pub fn with_sharp_descent(mut self, angle: f32, speed: f32) -> Self {
        self.detect_sharp_descent = true;
        self.sharp_descent_angle = angle;
        self.sharp_descent_speed = speed;
        self
    }
}

/// Sensor tuning.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SensorConfig {
    /// Height difference under which two sensor hits count as equal.
    pub tie_epsilon: f32,
    /// Height difference under which landing hits are smoothed.
    pub smoothing_height_threshold: f32,
    /// Angle difference under which a found ledge is treated as a seam.
    pub ledge_angle_leniency: f32,
    /// Base tolerance around the cardinal wall angle.
    pub wall_angle_leniency: f32,
    /// Maximum recursive re-checks for a zero-distance wall overlap.
    pub unstuck_iterations: u32,
    /// Step used to back out of a zero-distance overlap.
    pub unstuck_step: f32,
    /// Upper bound on high-speed sub-steps in one tick.
    pub max_high_speed_steps: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: 0.01,
            smoothing_height_threshold: 4.0,
            ledge_angle_leniency: 65.0,
            wall_angle_leniency: 15.0,
            unstuck_iterations: 4,
            unstuck_step: 1.0,
            max_high_speed_steps: 64,
        }
    }
}

/// Stage-wide scalars injected into every tick.
#[derive(Resource, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Resource)]
pub struct StageContext {
    /// Frame-rate normalisation constant (reference frames per second).
    pub physics_multiplier: f32,
    /// Tile pitch; caps per-tick snapping and sub-step length.
    pub max_block_size: f32,
}

impl Default for StageContext {
    fn default() -> Self {
        Self {
            physics_multiplier: 60.0,
            max_block_size: 16.0,
        }
    }
}

/// Everything a single tick needs to know about time and the stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Seconds elapsed this tick.
    pub delta: f32,
    /// Stage scalars.
    pub stage: StageContext,
}

impl Default for TickContext {
    fn default() -> Self {
        Self {
            delta: 1.0 / 60.0,
            stage: StageContext::default(),
        }
    }
}

impl TickContext {
    /// Context for a tick of `delta` seconds on `stage`.
    pub fn new(delta: f32, stage: StageContext) -> Self {
        Self { delta, stage }
    }

    /// How many reference frames this tick represents.
    #[inline]
    pub fn dt_factor(&self) -> f32 {
        self.delta * self.stage.physics_multiplier
    }

    /// Tile pitch.
    #[inline]
    pub fn max_block_size(&self) -> f32 {
        self.stage.max_block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tick_is_one_reference_frame() {
        let ctx = TickContext::default();
        assert!((ctx.dt_factor() - 1.0).abs() < 1.0e-6);
        assert_eq!(ctx.max_block_size(), 16.0);
    }

    #[test]
    fn underwater_halves_running() {
        let water = PhysicsConfig::underwater();
        let land = PhysicsConfig::classic();
        assert!((water.acceleration - land.acceleration / 2.0).abs() < 1.0e-6);
        assert!(water.gravity < land.gravity);
        assert_eq!(water.roll_friction, land.roll_friction);
    }

    #[test]
    fn builds_differ_per_character() {
        assert!(CharacterBuild::tails().height_radius < CharacterBuild::sonic().height_radius);
        assert!(CharacterBuild::knuckles().width_radius > CharacterBuild::sonic().width_radius);
    }

    #[test]
    fn builder_methods() {
        let build = CharacterBuild::default()
            .with_radii(8.0, 16.0)
            .with_high_speed_movement(false);
        assert_eq!(build.width_radius, 8.0);
        assert!(!build.high_speed_movement);

        let physics = PhysicsConfig::default().with_sharp_descent(30.0, 4.0);
        assert!(physics.detect_sharp_descent);
        assert_eq!(physics.sharp_descent_angle, 30.0);
    }
}
