//! Wall resolver (sensors E and F).

use bevy::prelude::*;

use crate::backend::{CollisionMask, TerrainQuery};
use crate::body::PlayerBody;
use crate::collision::{CollisionInfo, SensorData, SensorHitSide, SurfaceHit};
use crate::math::{normalize_angle, round_angle, signed_angle_delta, EPSILON};

use super::info::{cast_sensor, PlayerCollisionInfo, SensorFrame, SensorPair};

/// Size of the box searched for gimmicks around a wall hit.
const GIMMICK_CHECK_SIZE: f32 = 4.0;

/// Wall resolver.
///
/// Casts E (left) and F (right) along the surface tangent and stops the body
/// at its push radius. Contacts whose face is not close enough to a real
/// wall are deferred until the ground has been resolved, because a curve
/// ahead of the character looks like a wall to a horizontal ray.
#[derive(Debug, Clone, Default)]
pub struct WallCollision {
    info: CollisionInfo,
    previous_info: CollisionInfo,
    sensors: Option<SensorPair>,
    pushing: SensorHitSide,
    deferred: bool,
}

#[derive(Debug, Clone, Copy)]
struct WallContact {
    hit: SurfaceHit,
    side: SensorHitSide,
    direction: Vec2,
    /// Distance from the real ray origin, negative when overlapping.
    distance: f32,
}

impl WallCollision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Side the body is pushing against, if any.
    pub fn pushing(&self) -> SensorHitSide {
        self.pushing
    }

    /// A contact was deferred and waits for [`Self::delayed_check`].
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Rays of the latest check.
    pub fn sensors(&self) -> Option<&SensorPair> {
        self.sensors.as_ref()
    }

    /// Re-run a deferred check with the body's resolved ground state. Does
    /// nothing when nothing was deferred.
    pub fn delayed_check(
        &mut self,
        body: &mut PlayerBody,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
    ) {
        if !self.deferred {
            return;
        }
        self.deferred = false;
        let (position, velocity) = (body.center, body.velocity);
        self.check(body, position, velocity, frame, terrain, false);
    }

    fn check(
        &mut self,
        body: &mut PlayerBody,
        position: Vec2,
        velocity: Vec2,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
        allow_defer: bool,
    ) {
        if allow_defer {
            self.previous_info = self.info;
            self.deferred = false;
        }
        self.pushing = SensorHitSide::None;

        let dims = frame.dimensions;
        let base = body.sensor_angle();
        let origin = if body.grounded && round_angle(base) == 0.0 {
            position - body.up() * dims.wall_sensor_offset
        } else {
            position
        };
        let pair = SensorPair::opposed(origin, base, dims.push_radius + dims.sensor_extension);
        self.sensors = Some(pair);

        let motion = velocity * frame.ctx.dt_factor();
        let slope = if body.grounded {
            signed_angle_delta(body.ground_mode.angle(), body.ground_angle).abs()
        } else {
            0.0
        };
        let tolerance = frame.config.wall_angle_leniency + slope;

        let mut contact: Option<WallContact> = None;
        for (sensor, side, wall_angle) in [
            (pair.left, SensorHitSide::Left, base + 90.0),
            (pair.right, SensorHitSide::Right, base + 270.0),
        ] {
            let direction = sensor.direction();
            let Some((hit, backoff)) = cast_unstuck(terrain, &sensor, frame, 0, 0.0) else {
                continue;
            };
            let distance = hit.distance - backoff;
            let gap = distance - dims.push_radius;
            let approach = motion.dot(direction).max(0.0);
            if gap >= approach && gap > -EPSILON {
                continue;
            }

            let deviation = signed_angle_delta(normalize_angle(wall_angle), hit.angle()).abs();
            if deviation > tolerance && !interactive_at(terrain, &hit, frame) {
                if allow_defer {
                    trace!(
                        "deferring {side:?} wall contact, face {:.1} deg off the wall angle",
                        deviation
                    );
                    self.deferred = true;
                }
                continue;
            }

            let candidate = WallContact {
                hit,
                side,
                direction,
                distance,
            };
            // Prefer the side the body moves toward, then the nearer one.
            contact = match contact {
                Some(current)
                    if motion.dot(current.direction) > motion.dot(direction)
                        || (motion.dot(current.direction) == motion.dot(direction)
                            && current.distance <= distance) =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            };
        }

        let Some(contact) = contact else {
            self.info = CollisionInfo::none(base);
            return;
        };

        body.center += contact.direction * (contact.distance - dims.push_radius);
        let into = body.velocity.dot(contact.direction);
        if into > 0.0 {
            body.velocity -= contact.direction * into;
            if body.grounded {
                body.ground_velocity = 0.0;
            }
            self.pushing = contact.side;
        }
        trace!(
            "{:?} wall contact at {:.1} deg",
            contact.side,
            contact.hit.angle()
        );
        self.info = CollisionInfo::new(contact.hit, contact.hit.angle(), contact.side);
    }
}

/// Whether the hit surface is a gimmick or one overlaps the hit point.
fn interactive_at(terrain: &dyn TerrainQuery, hit: &SurfaceHit, frame: &SensorFrame) -> bool {
    if hit.flags.interactive {
        return true;
    }
    let mask = frame.mask.intersection(CollisionMask::GIMMICK);
    if mask == CollisionMask::NONE {
        return false;
    }
    let found = terrain.overlap_box(hit.point, Vec2::splat(GIMMICK_CHECK_SIZE), mask);
    if let Some(entity) = found.first() {
        trace!("gimmick {entity:?} at wall hit {:?}", hit.point);
    }
    !found.is_empty()
}

/// Cast a wall sensor, backing its origin out while it starts exactly on a
/// surface. Returns the hit and how far the origin was backed out.
fn cast_unstuck(
    terrain: &dyn TerrainQuery,
    sensor: &SensorData,
    frame: &SensorFrame,
    depth: u32,
    backoff: f32,
) -> Option<(SurfaceHit, f32)> {
    let hit = cast_sensor(terrain, sensor, frame.mask)?;
    if hit.distance > EPSILON || depth >= frame.config.unstuck_iterations {
        return Some((hit, backoff));
    }
    let step = frame.config.unstuck_step;
    trace!("wall sensor overlapping, re-check {}", depth + 1);
    let retreat = SensorData {
        origin: sensor.origin - sensor.direction() * step,
        cast_distance: sensor.cast_distance + step,
        ..*sensor
    };
    cast_unstuck(terrain, &retreat, frame, depth + 1, backoff + step)
}

impl PlayerCollisionInfo for WallCollision {
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
        self.check(body, position, velocity, frame, terrain, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CollisionMask;
    use crate::collision::SurfaceFlags;
    use crate::config::{PhysicsConfig, SensorConfig, TickContext};
    use crate::sensors::info::BodyDimensions;
    use crate::terrain::{SegmentTerrain, TerrainSegment};

    fn frame<'a>(physics: &'a PhysicsConfig, ctx: &'a TickContext) -> SensorFrame<'a> {
        SensorFrame {
            dimensions: BodyDimensions {
                width_radius: 9.0,
                height_radius: 19.0,
                push_radius: 10.0,
                sensor_extension: 16.0,
                low_ceiling_range: 8.0,
                wall_sensor_offset: 8.0,
            },
            config: SensorConfig::default(),
            physics,
            ctx,
            mask: CollisionMask::ALL,
        }
    }

    fn wall_at(x: f32) -> SegmentTerrain {
        let mut terrain = SegmentTerrain::new();
        // Face pointing -X.
        terrain.add_segment(Vec2::new(x, -100.0), Vec2::new(x, 100.0));
        terrain
    }

    #[test]
    fn stops_grounded_body_at_push_radius() {
        let terrain = wall_at(20.0);
        let (physics, ctx) = (PhysicsConfig::default(), TickContext::default());
        let frame = frame(&physics, &ctx);
        let mut body = PlayerBody::at(Vec2::new(5.0, 19.0));
        body.grounded = true;
        body.ground_velocity = 8.0;
        body.velocity = Vec2::new(8.0, 0.0);

        let mut wall = WallCollision::new();
        wall.update(&mut body, &frame, &terrain);

        assert_eq!(wall.pushing(), SensorHitSide::Right);
        assert_eq!(body.ground_velocity, 0.0);
        assert!(body.velocity.x.abs() < 1.0e-5);
        assert!((body.center.x - 10.0).abs() < 1.0e-3);
    }

    #[test]
    fn ignores_walls_out_of_reach() {
        let terrain = wall_at(40.0);
        let (physics, ctx) = (PhysicsConfig::default(), TickContext::default());
        let frame = frame(&physics, &ctx);
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(1.0, 0.0);
        let mut wall = WallCollision::new();
        wall.update(&mut body, &frame, &terrain);
        assert!(!wall.has_contact());
        assert_eq!(body.velocity, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn slanted_face_is_deferred() {
        let mut terrain = SegmentTerrain::new();
        // A 45 degree ramp rising to the right, face normal up-left.
        terrain.add_segment(Vec2::new(-45.0, -50.0), Vec2::new(55.0, 50.0));
        let (physics, ctx) = (PhysicsConfig::default(), TickContext::default());
        let frame = frame(&physics, &ctx);
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(6.0, 0.0);
        let mut wall = WallCollision::new();
        wall.update(&mut body, &frame, &terrain);
        assert!(wall.is_deferred());
        assert!(!wall.has_contact());
        assert_eq!(body.velocity, Vec2::new(6.0, 0.0));

        // Still slanted on the delayed pass: ignored for good.
        wall.delayed_check(&mut body, &frame, &terrain);
        assert!(!wall.is_deferred());
        assert!(!wall.has_contact());
    }

    #[test]
    fn interactive_faces_are_never_deferred() {
        let mut terrain = SegmentTerrain::new();
        let mut ramp = TerrainSegment::new(Vec2::new(-45.0, -50.0), Vec2::new(55.0, 50.0));
        ramp.flags = SurfaceFlags::INTERACTIVE;
        terrain.push(ramp);
        let (physics, ctx) = (PhysicsConfig::default(), TickContext::default());
        let frame = frame(&physics, &ctx);
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(6.0, 0.0);
        let mut wall = WallCollision::new();
        wall.update(&mut body, &frame, &terrain);
        assert!(!wall.is_deferred());
        assert!(wall.has_contact());
        assert_eq!(wall.pushing(), SensorHitSide::Right);
    }

    #[test]
    fn gimmick_at_the_hit_prevents_deferral() {
        let mut terrain = SegmentTerrain::new();
        terrain.add_segment(Vec2::new(-45.0, -50.0), Vec2::new(55.0, 50.0));
        // A spring just behind the ramp face where the right sensor hits.
        let mut spring = TerrainSegment::new(Vec2::new(5.5, 1.5), Vec2::new(5.5, -1.5));
        spring.entity = Some(Entity::from_raw(7));
        spring.layers = CollisionMask::GIMMICK.0;
        terrain.push(spring);
        let (physics, ctx) = (PhysicsConfig::default(), TickContext::default());
        let frame = frame(&physics, &ctx);
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(6.0, 0.0);
        let mut wall = WallCollision::new();
        wall.update(&mut body, &frame, &terrain);
        assert!(!wall.is_deferred());
        assert_eq!(wall.pushing(), SensorHitSide::Right);
        assert_eq!(wall.info().entity(), None);

        // Sensors masked away from the gimmick layer defer as usual.
        let mut masked = frame;
        masked.mask = CollisionMask::TERRAIN;
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(6.0, 0.0);
        let mut wall = WallCollision::new();
        wall.update(&mut body, &masked, &terrain);
        assert!(wall.is_deferred());
        assert!(!wall.has_contact());
    }

    #[test]
    fn zero_distance_overlap_is_backed_out() {
        let terrain = wall_at(0.0);
        let (physics, ctx) = (PhysicsConfig::default(), TickContext::default());
        let frame = frame(&physics, &ctx);
        // Sensor origin exactly on the wall face.
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(1.0, 0.0);
        let mut wall = WallCollision::new();
        wall.update(&mut body, &frame, &terrain);
        assert!(wall.has_contact());
        assert!((body.center.x + 10.0).abs() < 1.0e-3);
    }
}
