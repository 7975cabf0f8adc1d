//! Raycast sensors and collision resolution.
//!
//! The character is probed by three pairs of rays:
//!
//! - **A / B** ([`GroundCollision`]) below the body along the surface normal
//! - **C / D** ([`CeilingCollision`]) above the body
//! - **E / F** ([`WallCollision`]) left and right along the surface tangent
//!
//! [`Sensors`] owns the three resolvers and runs them in a fixed order each
//! tick:
//!
//! 1. wall pre-check, so this tick's motion never enters a wall
//! 2. move the body (sub-stepped above one block per tick)
//! 3. ground
//! 4. deferred wall contacts
//! 5. ceiling
//! 6. ground again when the ceiling moved the body

mod ceiling;
mod ground;
mod high_speed;
mod info;
mod ledge;
mod smoothing;
mod wall;

use bevy::prelude::*;

pub use ceiling::CeilingCollision;
pub use ground::{
    ground_speed_from_velocity, velocity_from_ground_speed, GroundCollision, LandingBand,
};
pub use high_speed::HighSpeedData;
pub use info::{cast_sensor, BodyDimensions, PlayerCollisionInfo, SensorFrame, SensorPair};
pub use ledge::{LedgeHelper, LedgePoint, LedgeQuery};
pub use smoothing::{SmoothGroundLandingHelper, SmoothedLanding};
pub use wall::WallCollision;

use crate::backend::TerrainQuery;
use crate::body::PlayerBody;
use crate::config::{CharacterBuild, PhysicsConfig, SensorConfig, TickContext};
use crate::math::rotate_offset;
use crate::state::BodySize;

/// Sensor orchestrator for one character.
#[derive(Debug, Clone)]
pub struct Sensors {
    build: CharacterBuild,
    config: SensorConfig,
    body_size: BodySize,
    ground: GroundCollision,
    ceiling: CeilingCollision,
    wall: WallCollision,
    last_move: Option<HighSpeedData>,
}

impl Default for Sensors {
    fn default() -> Self {
        Self::new(CharacterBuild::default(), SensorConfig::default())
    }
}

impl Sensors {
    pub fn new(build: CharacterBuild, config: SensorConfig) -> Self {
        Self {
            build,
            config,
            body_size: BodySize::Regular,
            ground: GroundCollision::new(config.ledge_angle_leniency),
            ceiling: CeilingCollision::new(),
            wall: WallCollision::new(),
            last_move: None,
        }
    }

    pub fn build(&self) -> &CharacterBuild {
        &self.build
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn ground(&self) -> &GroundCollision {
        &self.ground
    }

    pub fn ceiling(&self) -> &CeilingCollision {
        &self.ceiling
    }

    pub fn wall(&self) -> &WallCollision {
        &self.wall
    }

    /// Sub-step report of the latest update, if it moved at high speed.
    pub fn last_high_speed_move(&self) -> Option<&HighSpeedData> {
        self.last_move.as_ref()
    }

    pub fn body_size(&self) -> BodySize {
        self.body_size
    }

    /// Radii for the current body size.
    pub fn dimensions(&self) -> BodyDimensions {
        let build = &self.build;
        let (width_radius, height_radius) = match self.body_size {
            BodySize::Regular => (build.width_radius, build.height_radius),
            BodySize::Shrunk => (build.shrunk_width_radius, build.shrunk_height_radius),
        };
        BodyDimensions {
            width_radius,
            height_radius,
            push_radius: build.push_radius,
            sensor_extension: build.sensor_extension,
            low_ceiling_range: build.low_ceiling_range,
            wall_sensor_offset: build.wall_sensor_offset,
        }
    }

    /// Switch body size. A grounded body keeps its feet where they are.
    pub fn set_body_size(&mut self, body: &mut PlayerBody, size: BodySize) {
        if size == self.body_size {
            return;
        }
        let before = self.dimensions().height_radius;
        self.body_size = size;
        let after = self.dimensions().height_radius;
        if body.grounded {
            body.center += rotate_offset(Vec2::new(0.0, after - before), body.ground_angle);
        }
        trace!("body size {:?}", size);
    }

    /// Switch to another character's build, keeping a grounded body's feet
    /// in place.
    pub fn set_build(&mut self, body: &mut PlayerBody, build: CharacterBuild) {
        let before = self.dimensions().height_radius;
        self.build = build;
        let after = self.dimensions().height_radius;
        if body.grounded {
            body.center += rotate_offset(Vec2::new(0.0, after - before), body.ground_angle);
        }
    }

    /// Forget all contacts, e.g. after a teleport.
    pub fn clear(&mut self) {
        self.ground.clear();
        self.ceiling.clear();
        self.wall.clear();
        self.last_move = None;
    }

    /// Whether the ceiling sensors report a low ceiling.
    pub fn low_ceiling(&self) -> bool {
        self.ceiling.low_ceiling()
    }

    /// Move the body by its velocity for one tick and resolve collisions.
    ///
    /// Grounded bodies must have their velocity set from the ground velocity
    /// before calling this.
    pub fn update(
        &mut self,
        body: &mut PlayerBody,
        physics: &PhysicsConfig,
        ctx: &TickContext,
        terrain: &dyn TerrainQuery,
    ) {
        let frame = SensorFrame {
            dimensions: self.dimensions(),
            config: self.config,
            physics,
            ctx,
            mask: self.build.collision_mask,
        };
        self.last_move = None;

        self.wall.update(body, &frame, terrain);

        let velocity = body.velocity;
        let displacement = velocity * ctx.dt_factor();
        let distance = displacement.length();
        if self.build.high_speed_movement && distance > ctx.max_block_size() {
            let grounded = body.grounded;
            let data = self.move_at_high_speed(body, velocity, distance, grounded, &frame, terrain);
            self.last_move = Some(data);
            return;
        }

        body.center += displacement;
        self.resolve_step(body, &frame, terrain);
    }

    /// Collision resolution after the body has moved.
    fn resolve_step(&mut self, body: &mut PlayerBody, frame: &SensorFrame, terrain: &dyn TerrainQuery) {
        self.ground.update(body, frame, terrain);
        self.wall.delayed_check(body, frame, terrain);
        self.ceiling.update(body, frame, terrain);
        if self.ceiling.moved_body() {
            self.ground.update(body, frame, terrain);
        }
    }
}
