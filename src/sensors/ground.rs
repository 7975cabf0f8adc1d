//! Ground resolver (sensors A and B).

use bevy::prelude::*;

use crate::backend::{RaycastRequest, TerrainQuery};
use crate::body::PlayerBody;
use crate::collision::{CollisionInfo, SensorHitSide, SurfaceHit};
use crate::math::{
    angle_between_points, normal_from_angle, normalize_angle, rotate_offset, sign_or_zero,
    signed_angle_delta, tangent_from_angle, EPSILON,
};
use crate::state::GroundMode;

use super::info::{PlayerCollisionInfo, SensorFrame, SensorPair};
use super::ledge::{LedgeHelper, LedgeQuery};
use super::smoothing::SmoothGroundLandingHelper;

/// Angles closer than this to the mode's cardinal angle count as flat.
const FLAT_TOLERANCE: f32 = 0.5;

/// Landing conversion band for a surface angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingBand {
    /// Within 23° of flat.
    Shallow,
    /// 24° to 45° from flat.
    Medium,
    /// 46° to 90° from flat.
    Steep,
    /// Facing downward; only reached when attaching to a ceiling.
    Ceiling,
}

impl LandingBand {
    /// Band for a surface angle.
    pub fn from_angle(degrees: f32) -> Self {
        let a = normalize_angle(degrees);
        let from_flat = if a > 180.0 { 360.0 - a } else { a };
        if from_flat <= 23.0 {
            Self::Shallow
        } else if from_flat <= 45.0 {
            Self::Medium
        } else if from_flat <= 90.0 {
            Self::Steep
        } else {
            Self::Ceiling
        }
    }
}

/// Ground velocity for a body landing with `velocity` on a surface at
/// `degrees`.
///
/// A velocity already tangent to the surface converts back to its exact
/// signed length in every band.
pub fn ground_speed_from_velocity(velocity: Vec2, degrees: f32) -> f32 {
    let (sin, cos) = normalize_angle(degrees).to_radians().sin_cos();
    let horizontal = velocity.x.abs() >= velocity.y.abs();
    match LandingBand::from_angle(degrees) {
        LandingBand::Shallow => velocity.x / cos,
        LandingBand::Medium if horizontal => velocity.x / cos,
        LandingBand::Medium => -velocity.y * sin,
        LandingBand::Steep if horizontal => velocity.x,
        LandingBand::Steep => -velocity.y / sin,
        LandingBand::Ceiling => velocity.dot(tangent_from_angle(degrees)),
    }
}

/// Free velocity for a ground velocity on a surface at `degrees`.
#[inline]
pub fn velocity_from_ground_speed(ground_velocity: f32, degrees: f32) -> Vec2 {
    tangent_from_angle(degrees) * ground_velocity
}

#[derive(Debug, Clone, Copy)]
struct GroundCandidate {
    hit: SurfaceHit,
    angle: f32,
    /// Sensor used for positioning.
    winner: SensorHitSide,
    /// Sensors that fired.
    side: SensorHitSide,
    /// Direction the sensors were cast in.
    down: Vec2,
}

/// Ground resolver.
///
/// Casts A (left) and B (right) along the previous surface normal, picks the
/// hit to trust, handles ledges and landings, and keeps the body glued to
/// the surface.
#[derive(Debug, Clone, Default)]
pub struct GroundCollision {
    info: CollisionInfo,
    previous_info: CollisionInfo,
    ledge: LedgeHelper,
    smoothing: SmoothGroundLandingHelper,
    previous_center: Option<Vec2>,
    sensors: Option<SensorPair>,
    landed: bool,
}

impl GroundCollision {
    pub fn new(ledge_angle_leniency: f32) -> Self {
        Self {
            ledge: LedgeHelper::new(ledge_angle_leniency),
            ..default()
        }
    }

    /// Whether the latest check turned an airborne body grounded.
    pub fn just_landed(&self) -> bool {
        self.landed
    }

    /// Ledge state.
    pub fn ledge(&self) -> &LedgeHelper {
        &self.ledge
    }

    /// Rays of the latest check.
    pub fn sensors(&self) -> Option<&SensorPair> {
        self.sensors.as_ref()
    }

    fn pick(
        &mut self,
        body: &PlayerBody,
        left: SurfaceHit,
        right: SurfaceHit,
        down: Vec2,
        velocity: Vec2,
        frame: &SensorFrame,
    ) -> GroundCandidate {
        let mode = GroundMode::from_angle(body.sensor_angle());
        let (left_height, right_height) = (mode.vertical(left.point), mode.vertical(right.point));
        // Equal heights resolve to the left sensor.
        let winner = if left_height >= right_height - frame.config.tie_epsilon {
            SensorHitSide::Left
        } else {
            SensorHitSide::Right
        };
        let (hit, other) = match winner {
            SensorHitSide::Left => (left, right),
            _ => (right, left),
        };

        let is_flat = |angle: f32| signed_angle_delta(mode.angle(), angle).abs() < FLAT_TOLERANCE;
        if is_flat(other.angle()) && !is_flat(hit.angle()) {
            if body.grounded {
                return GroundCandidate {
                    hit,
                    angle: angle_between_points(left.point, right.point),
                    winner,
                    side: SensorHitSide::Both,
                    down,
                };
            }
            let landing = self.smoothing.resolve(
                &left,
                &right,
                mode,
                body.ground_angle,
                velocity,
                frame.config.smoothing_height_threshold,
            );
            // Only the angle is smoothed. Positioning stays on the higher hit
            // so the body never sinks into it.
            return GroundCandidate {
                hit,
                angle: landing.angle,
                winner,
                side: SensorHitSide::Both,
                down,
            };
        }

        GroundCandidate {
            hit,
            angle: hit.angle(),
            winner,
            side: SensorHitSide::Both,
            down,
        }
    }

    fn single(
        &mut self,
        body: &PlayerBody,
        hit: SurfaceHit,
        side: SensorHitSide,
        down: Vec2,
        position: Vec2,
        velocity: Vec2,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
    ) -> Option<GroundCandidate> {
        match self.previous_center {
            Some(previous_center) if body.grounded => {
                let ground_info = CollisionInfo::new(hit, hit.angle(), side);
                let query = LedgeQuery {
                    ground_info: &ground_info,
                    previous_ground_info: &self.previous_info,
                    sensor_side: side,
                    single_hit: &hit,
                    velocity,
                    previous_center,
                    center: position,
                    height_radius: frame.dimensions.height_radius,
                    width_radius: frame.dimensions.width_radius,
                    max_block_size: frame.ctx.max_block_size(),
                    mask: frame.mask,
                };
                if self.ledge.ledge_exceeded(terrain, &query) {
                    debug!("walked past ledge on the {:?} side", side.opposite());
                    return None;
                }
            }
            _ if self.ledge.beyond_exceeded(
                side,
                position,
                frame.dimensions.height_radius,
                velocity,
            ) =>
            {
                trace!("{side:?} sensor still under an exceeded ledge, not landing");
                return None;
            }
            _ => self.ledge.reset(),
        }
        Some(GroundCandidate {
            hit,
            angle: hit.angle(),
            winner: side,
            side,
            down,
        })
    }

    fn accepts(
        &self,
        body: &PlayerBody,
        candidate: &GroundCandidate,
        velocity: Vec2,
        frame: &SensorFrame,
    ) -> bool {
        let snap = candidate.hit.distance - frame.dimensions.height_radius;
        if !body.grounded {
            // Land only when touching and not moving away from the surface.
            return snap <= EPSILON && velocity.dot(normal_from_angle(candidate.angle)) <= EPSILON;
        }
        if snap > frame.ctx.max_block_size() {
            return false;
        }
        let physics = frame.physics;
        if physics.detect_sharp_descent
            && body.ground_velocity.abs() >= physics.sharp_descent_speed
        {
            let dive = signed_angle_delta(body.ground_angle, candidate.angle)
                * sign_or_zero(body.ground_velocity);
            if dive > physics.sharp_descent_angle {
                debug!(
                    "sharp descent from {:.1} to {:.1} deg, detaching",
                    body.ground_angle, candidate.angle
                );
                return false;
            }
        }
        true
    }

    fn attach(
        &mut self,
        body: &mut PlayerBody,
        candidate: GroundCandidate,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
    ) {
        let angle = normalize_angle(candidate.angle);
        if !body.grounded {
            body.ground_velocity = ground_speed_from_velocity(body.velocity, angle);
            body.grounded = true;
            body.velocity = velocity_from_ground_speed(body.ground_velocity, angle);
            self.landed = true;
            debug!(
                "landed at {angle:.1} deg with ground velocity {:.3}",
                body.ground_velocity
            );
        }
        body.ground_angle = angle;
        body.ground_mode = GroundMode::from_angle(angle);
        self.stick(body, &candidate, frame, terrain);
        self.info = CollisionInfo::new(candidate.hit, angle, candidate.side);
    }

    /// Glue the body to the surface along the new down direction, measured
    /// from the winning sensor's position.
    fn stick(
        &self,
        body: &mut PlayerBody,
        candidate: &GroundCandidate,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
    ) {
        let dims = frame.dimensions;
        let normal = normal_from_angle(body.ground_angle);
        let offset = Vec2::new(candidate.winner.sign() * dims.width_radius, 0.0);
        let origin = body.center + rotate_offset(offset, body.ground_angle);
        let reach = dims.height_radius + frame.ctx.max_block_size();
        let stick = RaycastRequest::new(origin, -normal, reach)
            .with_mask(frame.mask)
            .cast(terrain);
        match stick {
            Some(hit) => body.center -= normal * (hit.distance - dims.height_radius),
            None => {
                body.center += candidate.down * (candidate.hit.distance - dims.height_radius)
            }
        }
    }

    fn release(&mut self, body: &mut PlayerBody) {
        if body.grounded {
            debug!("left the ground at {:.1} deg", body.ground_angle);
            body.detach();
        }
        self.info = CollisionInfo::none(body.ground_angle);
    }
}

impl PlayerCollisionInfo for GroundCollision {
    fn info(&self) -> &CollisionInfo {
        &self.info
    }

    fn previous_info(&self) -> &CollisionInfo {
        &self.previous_info
    }

    fn clear(&mut self) {
        self.info = CollisionInfo::default();
        self.previous_info = CollisionInfo::default();
        self.ledge.reset();
        self.previous_center = None;
        self.sensors = None;
        self.landed = false;
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
        self.landed = false;

        let dims = frame.dimensions;
        let base = body.sensor_angle();
        let down = -normal_from_angle(base);
        let pair = SensorPair::parallel(
            position,
            base,
            dims.width_radius,
            180.0,
            dims.height_radius + dims.sensor_extension,
        );
        let (left, right) = pair.cast(terrain, frame.mask);
        self.sensors = Some(pair);

        let candidate = match (left, right) {
            (Some(left), Some(right)) => {
                self.ledge.reset();
                Some(self.pick(body, left, right, down, velocity, frame))
            }
            (Some(hit), None) => self.single(
                body,
                hit,
                SensorHitSide::Left,
                down,
                position,
                velocity,
                frame,
                terrain,
            ),
            (None, Some(hit)) => self.single(
                body,
                hit,
                SensorHitSide::Right,
                down,
                position,
                velocity,
                frame,
                terrain,
            ),
            (None, None) => {
                self.ledge.reset();
                None
            }
        };

        match candidate {
            Some(candidate) if self.accepts(body, &candidate, velocity, frame) => {
                self.attach(body, candidate, frame, terrain)
            }
            _ => self.release(body),
        }
        self.previous_center = Some(body.center);
    }
}
