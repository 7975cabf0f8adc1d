//! Ceiling resolver (sensors C and D).

use bevy::prelude::*;

use crate::backend::TerrainQuery;
use crate::body::PlayerBody;
use crate::collision::{CollisionInfo, SensorHitSide, SurfaceHit};
use crate::math::{angle_in_range, normal_from_angle, tangent_from_angle, EPSILON};
use crate::state::GroundMode;

use super::info::{PlayerCollisionInfo, SensorFrame, SensorPair};

/// Ceiling resolver.
///
/// While airborne and rising it either pushes the body back out of the
/// ceiling or, for sloped ceilings hit mostly vertically, attaches the body
/// to it. While grounded it only reports head room.
#[derive(Debug, Clone, Default)]
pub struct CeilingCollision {
    info: CollisionInfo,
    previous_info: CollisionInfo,
    sensors: Option<SensorPair>,
    low_ceiling: bool,
    moved_body: bool,
    attached: bool,
}

impl CeilingCollision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grounded with a ceiling within the low-ceiling range.
    pub fn low_ceiling(&self) -> bool {
        self.low_ceiling
    }

    /// The latest check repositioned the body.
    pub fn moved_body(&self) -> bool {
        self.moved_body
    }

    /// The latest check attached the body to the ceiling.
    pub fn attached(&self) -> bool {
        self.attached
    }

    /// Rays of the latest check.
    pub fn sensors(&self) -> Option<&SensorPair> {
        self.sensors.as_ref()
    }
}

/// Nearest of two hits; the left one wins ties.
fn nearest(left: Option<SurfaceHit>, right: Option<SurfaceHit>, epsilon: f32) -> Option<SurfaceHit> {
    match (left, right) {
        (Some(l), Some(r)) if r.distance < l.distance - epsilon => Some(r),
        (Some(l), _) => Some(l),
        (None, r) => r,
    }
}

/// Sloped ceilings steep enough to run on.
fn attachable_angle(angle: f32) -> bool {
    angle_in_range(angle, 91.0, 135.0) || angle_in_range(angle, 225.0, 269.0)
}

impl PlayerCollisionInfo for CeilingCollision {
    fn info(&self) -> &CollisionInfo {
        &self.info
    }

    fn previous_info(&self) -> &CollisionInfo {
        &self.previous_info
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn check_for_collision(
        &mut self,
        body: &mut PlayerBody,
        position: Vec2,
        velocity: Vec2,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
    ) {
        self.previous_info = self.info;
        self.low_ceiling = false;
        self.moved_body = false;
        self.attached = false;

        let dims = frame.dimensions;
        let base = body.sensor_angle();
        let up = normal_from_angle(base);
        let pair = SensorPair::parallel(
            position,
            base,
            dims.width_radius,
            0.0,
            dims.height_radius + dims.sensor_extension,
        );
        let (left, right) = pair.cast(terrain, frame.mask);
        self.sensors = Some(pair);

        let side = SensorHitSide::from_hits(left.is_some(), right.is_some());
        let Some(hit) = nearest(left, right, frame.config.tie_epsilon) else {
            self.info = CollisionInfo::none(base + 180.0);
            return;
        };
        let angle = hit.angle();

        if body.grounded {
            self.low_ceiling = hit.distance <= dims.height_radius + dims.low_ceiling_range;
            self.info = CollisionInfo::new(hit, angle, side);
            return;
        }

        let penetration = dims.height_radius - hit.distance;
        let rising = velocity.dot(up) > 0.0;
        if penetration < -EPSILON || !rising {
            self.info = CollisionInfo::none(angle);
            return;
        }

        if penetration > EPSILON {
            body.center -= up * penetration;
            self.moved_body = true;
        }

        let vertical = velocity.dot(up).abs() > velocity.dot(tangent_from_angle(base)).abs();
        if attachable_angle(angle) && vertical {
            body.ground_velocity = body.velocity.dot(tangent_from_angle(angle));
            body.grounded = true;
            body.ground_angle = angle;
            body.ground_mode = GroundMode::from_angle(angle);
            body.velocity = body.ground_velocity_vector();
            self.attached = true;
            self.moved_body = true;
            debug!(
                "attached to ceiling at {angle:.1} deg with ground velocity {:.3}",
                body.ground_velocity
            );
        } else {
            let rise = body.velocity.dot(up);
            if rise > 0.0 {
                body.velocity -= up * rise;
            }
        }
        self.info = CollisionInfo::new(hit, angle, side);
    }
}
