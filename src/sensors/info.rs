//! Contract shared by the three resolvers and the ray pairs they cast.

use bevy::prelude::*;

use crate::backend::{CollisionMask, RaycastRequest, TerrainQuery};
use crate::body::PlayerBody;
use crate::collision::{CollisionInfo, SensorData, SurfaceHit};
use crate::config::{PhysicsConfig, SensorConfig, TickContext};
use crate::math::rotate_offset;

/// Radii and ray lengths for the body size in use.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct BodyDimensions {
    /// Horizontal distance from the center to the ground/ceiling sensors.
    pub width_radius: f32,
    /// Distance from the center to the feet.
    pub height_radius: f32,
    /// Distance from the center at which walls stop the body.
    pub push_radius: f32,
    /// Extra ray length beyond the radii.
    pub sensor_extension: f32,
    /// Extra head room reported as a low ceiling while grounded.
    pub low_ceiling_range: f32,
    /// How far the wall sensors drop on flat floors.
    pub wall_sensor_offset: f32,
}

/// Everything a resolver reads besides the body and the terrain.
#[derive(Debug, Clone, Copy)]
pub struct SensorFrame<'a> {
    pub dimensions: BodyDimensions,
    pub config: SensorConfig,
    pub physics: &'a PhysicsConfig,
    pub ctx: &'a TickContext,
    pub mask: CollisionMask,
}

/// Shared interface of the ground, ceiling and wall resolvers.
///
/// A resolver casts its sensor pair, decides which hit to trust, mutates the
/// body (reposition, velocity, grounded flag) and keeps a [`CollisionInfo`]
/// snapshot readable for the rest of the tick.
pub trait PlayerCollisionInfo {
    /// Snapshot of the latest check.
    fn info(&self) -> &CollisionInfo;

    /// Snapshot of the check before the latest one.
    fn previous_info(&self) -> &CollisionInfo;

    /// Forget all contact state.
    fn clear(&mut self);

    /// Cast the sensors as if the body were at `position` moving with
    /// `velocity`, and resolve the result into `body`.
    fn check_for_collision(
        &mut self,
        body: &mut PlayerBody,
        position: Vec2,
        velocity: Vec2,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
    );

    /// Run a check from the body's current position and velocity.
    fn update(&mut self, body: &mut PlayerBody, frame: &SensorFrame, terrain: &dyn TerrainQuery) {
        let (position, velocity) = (body.center, body.velocity);
        self.check_for_collision(body, position, velocity, frame, terrain);
    }

    /// Whether the latest check accepted a contact.
    fn has_contact(&self) -> bool {
        self.info().has_contact()
    }
}

/// A resolver's two rays for one cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPair {
    pub left: SensorData,
    pub right: SensorData,
}

impl SensorPair {
    /// Two parallel rays offset `half_width` to either side of `center`
    /// along the surface tangent.
    pub fn parallel(
        center: Vec2,
        base_angle: f32,
        half_width: f32,
        rotation_offset: f32,
        length: f32,
    ) -> Self {
        let left = center + rotate_offset(Vec2::new(-half_width, 0.0), base_angle);
        let right = center + rotate_offset(Vec2::new(half_width, 0.0), base_angle);
        Self {
            left: SensorData::new(left, base_angle, rotation_offset, length),
            right: SensorData::new(right, base_angle, rotation_offset, length),
        }
    }

    /// Two opposed rays from `origin` along the negative and positive
    /// tangent.
    pub fn opposed(origin: Vec2, base_angle: f32, length: f32) -> Self {
        Self {
            left: SensorData::new(origin, base_angle, 270.0, length),
            right: SensorData::new(origin, base_angle, 90.0, length),
        }
    }

    /// Cast both rays.
    pub fn cast(
        &self,
        terrain: &dyn TerrainQuery,
        mask: CollisionMask,
    ) -> (Option<SurfaceHit>, Option<SurfaceHit>) {
        (
            cast_sensor(terrain, &self.left, mask),
            cast_sensor(terrain, &self.right, mask),
        )
    }
}

/// Cast a single sensor ray.
pub fn cast_sensor(
    terrain: &dyn TerrainQuery,
    sensor: &SensorData,
    mask: CollisionMask,
) -> Option<SurfaceHit> {
    RaycastRequest::new(sensor.origin, sensor.direction(), sensor.cast_distance)
        .with_mask(mask)
        .cast(terrain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_pair_rotates_with_base_angle() {
        let pair = SensorPair::parallel(Vec2::ZERO, 0.0, 9.0, 180.0, 35.0);
        assert_eq!(pair.left.origin, Vec2::new(-9.0, 0.0));
        assert_eq!(pair.right.origin, Vec2::new(9.0, 0.0));
        assert!((pair.left.direction() - Vec2::NEG_Y).length() < 1.0e-5);

        // On a right wall the tangent points down, so the left sensor is above.
        let wall = SensorPair::parallel(Vec2::ZERO, 90.0, 9.0, 180.0, 35.0);
        assert!((wall.left.origin - Vec2::new(0.0, 9.0)).length() < 1.0e-4);
        assert!((wall.left.direction() - Vec2::NEG_X).length() < 1.0e-5);
    }

    #[test]
    fn opposed_pair_points_sideways() {
        let pair = SensorPair::opposed(Vec2::ZERO, 0.0, 20.0);
        assert!((pair.left.direction() - Vec2::NEG_X).length() < 1.0e-5);
        assert!((pair.right.direction() - Vec2::X).length() < 1.0e-5);
    }
}
