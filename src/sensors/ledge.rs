//! Ledge detection for single-sensor ground contact.
//!
//! When only one ground sensor finds floor, the character is either walking
//! off an edge or straddling a seam between two surfaces. [`LedgeHelper`]
//! finds the real corner with two extra rays and reports when the body has
//! travelled past it.

use bevy::prelude::*;

use crate::backend::{CollisionMask, RaycastRequest, TerrainQuery};
use crate::collision::{CollisionInfo, SensorHitSide, SurfaceHit};
use crate::math::{
    normal_from_angle, sign_or_zero, signed_angle_delta, tangent_from_angle, EPSILON,
};

/// How far below the surface the side ray runs.
const PROBE_DEPTH: f32 = 2.0;
/// Inset from the face used to find the top of the corner.
const CORNER_INSET: f32 = 0.5;

/// Inputs for one ledge query.
#[derive(Debug, Clone, Copy)]
pub struct LedgeQuery<'a> {
    /// Contact built from the remaining sensor this tick.
    pub ground_info: &'a CollisionInfo,
    /// Ground contact of the previous tick.
    pub previous_ground_info: &'a CollisionInfo,
    /// Which sensor still hits.
    pub sensor_side: SensorHitSide,
    /// The remaining sensor's hit.
    pub single_hit: &'a SurfaceHit,
    pub velocity: Vec2,
    /// Body center at the end of the previous tick.
    pub previous_center: Vec2,
    /// Body center now.
    pub center: Vec2,
    pub height_radius: f32,
    pub width_radius: f32,
    pub max_block_size: f32,
    pub mask: CollisionMask,
}

/// A located ledge corner.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct LedgePoint {
    /// Corner on the supporting surface.
    pub point: Vec2,
    /// Angle of the supporting surface at the corner.
    pub angle: f32,
    /// Unit direction from the body toward the drop.
    pub direction: Vec2,
    /// Side of the sensor that still hits.
    pub supported_side: SensorHitSide,
}

/// Finds and caches the ledge for the current single-sensor ambiguity.
#[derive(Reflect, Debug, Clone, Default, PartialEq)]
pub struct LedgeHelper {
    ledge: Option<LedgePoint>,
    /// Ledge the body last walked off, kept while it falls past it.
    exceeded: Option<LedgePoint>,
    angle_leniency: f32,
}

impl LedgeHelper {
    /// Helper treating face angles within `angle_leniency` degrees of the
    /// surface as a seam rather than a ledge.
    pub fn new(angle_leniency: f32) -> Self {
        Self {
            ledge: None,
            exceeded: None,
            angle_leniency,
        }
    }

    /// Currently cached ledge.
    pub fn ledge(&self) -> Option<&LedgePoint> {
        self.ledge.as_ref()
    }

    /// Ledge the body walked off most recently.
    pub fn exceeded(&self) -> Option<&LedgePoint> {
        self.exceeded.as_ref()
    }

    /// Drop the cached and the exceeded ledge.
    pub fn reset(&mut self) {
        self.ledge = None;
        self.exceeded = None;
    }

    /// Whether an airborne body whose `side` sensor alone still hits is
    /// beyond the ledge it walked off. Such a hit must not land the body
    /// back on the edge.
    pub fn beyond_exceeded(
        &self,
        side: SensorHitSide,
        center: Vec2,
        height_radius: f32,
        velocity: Vec2,
    ) -> bool {
        self.exceeded
            .filter(|ledge| ledge.supported_side == side)
            .is_some_and(|ledge| {
                let foot = center - normal_from_angle(ledge.angle) * height_radius;
                past_ledge(foot, &ledge, velocity)
            })
    }

    /// Whether the body has moved past the ledge the missing sensor hangs
    /// over. Once exceeded the ledge moves from the cache to
    /// [`Self::exceeded`].
    pub fn ledge_exceeded(&mut self, terrain: &dyn TerrainQuery, query: &LedgeQuery) -> bool {
        if !matches!(query.sensor_side, SensorHitSide::Left | SensorHitSide::Right) {
            self.reset();
            return false;
        }

        let cached = self
            .ledge
            .filter(|ledge| ledge.supported_side == query.sensor_side);
        let ledge = match cached {
            Some(ledge) => ledge,
            None => match self.find_ledge(terrain, query) {
                Some(ledge) => {
                    trace!("ledge found at {:?}", ledge.point);
                    self.ledge = Some(ledge);
                    ledge
                }
                None => {
                    self.ledge = None;
                    return false;
                }
            },
        };

        let foot = query.center - normal_from_angle(ledge.angle) * query.height_radius;
        if past_ledge(foot, &ledge, query.velocity) {
            self.ledge = None;
            self.exceeded = Some(ledge);
            return true;
        }
        false
    }

    fn find_ledge(&self, terrain: &dyn TerrainQuery, query: &LedgeQuery) -> Option<LedgePoint> {
        let angle = if query.previous_ground_info.has_contact() {
            query.previous_ground_info.angle()
        } else {
            query.ground_info.angle()
        };
        let normal = normal_from_angle(angle);
        let toward = tangent_from_angle(angle) * query.sensor_side.opposite().sign();

        let previous_foot = query.previous_center - normal * query.height_radius;
        let search = query.width_radius + query.max_block_size;
        let origin = previous_foot + toward * search - normal * PROBE_DEPTH;

        let face = RaycastRequest::new(origin, -toward, search)
            .with_mask(query.mask)
            .cast(terrain)?;
        if face.distance <= EPSILON {
            return None;
        }

        let top_origin = face.point + normal * (PROBE_DEPTH * 2.0) - toward * CORNER_INSET;
        let top = RaycastRequest::new(top_origin, -normal, PROBE_DEPTH * 4.0)
            .with_mask(query.mask)
            .cast(terrain);
        let (point, top_angle) = match top {
            Some(hit) => (hit.point + toward * CORNER_INSET, hit.angle()),
            None => (face.point + normal * PROBE_DEPTH, angle),
        };

        if signed_angle_delta(top_angle, face.angle()).abs() < self.angle_leniency {
            trace!("single sensor over a seam, not a ledge");
            return None;
        }
        // The corner has to lie beyond the supporting sensor.
        if (point - query.single_hit.point).dot(toward) < 0.0 {
            return None;
        }

        Some(LedgePoint {
            point,
            angle: top_angle,
            direction: toward,
            supported_side: query.sensor_side,
        })
    }
}

/// Whether `foot` has passed the ledge on the axis that dominates `velocity`.
fn past_ledge(foot: Vec2, ledge: &LedgePoint, velocity: Vec2) -> bool {
    let x_axis = (
        ledge.direction.x.abs() > EPSILON,
        (foot.x - ledge.point.x) * sign_or_zero(ledge.direction.x),
    );
    let y_axis = (
        ledge.direction.y.abs() > EPSILON,
        (foot.y - ledge.point.y) * sign_or_zero(ledge.direction.y),
    );
    let horizontal = if velocity.length_squared() > EPSILON {
        velocity.x.abs() >= velocity.y.abs()
    } else {
        ledge.direction.x.abs() >= ledge.direction.y.abs()
    };
    let (primary, secondary) = if horizontal {
        (x_axis, y_axis)
    } else {
        (y_axis, x_axis)
    };
    if primary.0 {
        primary.1 > 0.0
    } else {
        secondary.0 && secondary.1 > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::SegmentTerrain;

    fn platform() -> SegmentTerrain {
        let mut terrain = SegmentTerrain::new();
        // Top at y = 0, right edge at x = 0.
        terrain.add_box(Vec2::new(-100.0, -50.0), Vec2::new(100.0, 50.0));
        terrain
    }

    fn query<'a>(
        info: &'a CollisionInfo,
        hit: &'a SurfaceHit,
        previous_center: Vec2,
        center: Vec2,
    ) -> LedgeQuery<'a> {
        LedgeQuery {
            ground_info: info,
            previous_ground_info: info,
            sensor_side: SensorHitSide::Left,
            single_hit: hit,
            velocity: Vec2::new(1.0, 0.0),
            previous_center,
            center,
            height_radius: 19.0,
            width_radius: 9.0,
            max_block_size: 16.0,
            mask: CollisionMask::ALL,
        }
    }

    #[test]
    fn finds_box_corner() {
        let terrain = platform();
        let hit = SurfaceHit::new(19.0, Vec2::Y, Vec2::new(-11.0, 0.0), None);
        let info = CollisionInfo::new(hit, 0.0, SensorHitSide::Left);
        let mut helper = LedgeHelper::new(65.0);

        let center = Vec2::new(-2.0, 19.0);
        assert!(!helper.ledge_exceeded(&terrain, &query(&info, &hit, center, center)));
        let ledge = helper.ledge().expect("corner cached");
        assert!(ledge.point.x.abs() < 1.0e-3);
        assert!(ledge.point.y.abs() < 1.0e-3);
        assert!((ledge.direction - Vec2::X).length() < 1.0e-5);
    }

    #[test]
    fn exceeded_once_foot_passes_edge() {
        let terrain = platform();
        let hit = SurfaceHit::new(19.0, Vec2::Y, Vec2::new(-11.0, 0.0), None);
        let info = CollisionInfo::new(hit, 0.0, SensorHitSide::Left);
        let mut helper = LedgeHelper::new(65.0);

        let start = Vec2::new(-2.0, 19.0);
        assert!(!helper.ledge_exceeded(&terrain, &query(&info, &hit, start, start)));
        let moved = start + Vec2::new(16.0, 0.0);
        assert!(helper.ledge_exceeded(&terrain, &query(&info, &hit, start, moved)));
        assert!(helper.ledge().is_none());
        assert!(helper.exceeded().is_some());
    }

    #[test]
    fn exceeded_ledge_refuses_the_remaining_sensor() {
        let terrain = platform();
        let hit = SurfaceHit::new(19.0, Vec2::Y, Vec2::new(-11.0, 0.0), None);
        let info = CollisionInfo::new(hit, 0.0, SensorHitSide::Left);
        let mut helper = LedgeHelper::new(65.0);

        let start = Vec2::new(-2.0, 19.0);
        assert!(!helper.ledge_exceeded(&terrain, &query(&info, &hit, start, start)));
        let moved = Vec2::new(14.0, 19.0);
        assert!(helper.ledge_exceeded(&terrain, &query(&info, &hit, start, moved)));

        // Falling and drifting further out: still beyond.
        let falling = Vec2::new(2.0, -1.0);
        assert!(helper.beyond_exceeded(
            SensorHitSide::Left,
            Vec2::new(4.0, 18.8),
            19.0,
            falling
        ));
        assert!(helper.beyond_exceeded(
            SensorHitSide::Left,
            Vec2::new(6.0, 10.0),
            19.0,
            Vec2::new(0.5, -6.0)
        ));
        // The other sensor, or a body back over the platform, is not.
        assert!(!helper.beyond_exceeded(
            SensorHitSide::Right,
            Vec2::new(4.0, 18.8),
            19.0,
            falling
        ));
        assert!(!helper.beyond_exceeded(
            SensorHitSide::Left,
            Vec2::new(-3.0, 18.8),
            19.0,
            Vec2::new(-2.0, -1.0)
        ));

        helper.reset();
        assert!(helper.exceeded().is_none());
        assert!(!helper.beyond_exceeded(
            SensorHitSide::Left,
            Vec2::new(4.0, 18.8),
            19.0,
            falling
        ));
    }

    #[test]
    fn shallow_face_is_a_seam() {
        let mut terrain = SegmentTerrain::new();
        // Flat floor that continues into a gentle downward slope.
        terrain.add_segment(Vec2::new(-100.0, 0.0), Vec2::ZERO);
        terrain.add_segment(Vec2::ZERO, Vec2::new(100.0, -30.0));
        let hit = SurfaceHit::new(19.0, Vec2::Y, Vec2::new(-11.0, 0.0), None);
        let info = CollisionInfo::new(hit, 0.0, SensorHitSide::Left);
        let mut helper = LedgeHelper::new(65.0);
        let center = Vec2::new(-2.0, 19.0);
        assert!(!helper.ledge_exceeded(&terrain, &query(&info, &hit, center, center)));
        assert!(helper.ledge().is_none());
    }

    #[test]
    fn both_sides_never_exceed() {
        let terrain = platform();
        let hit = SurfaceHit::new(19.0, Vec2::Y, Vec2::new(-11.0, 0.0), None);
        let info = CollisionInfo::new(hit, 0.0, SensorHitSide::Both);
        let mut helper = LedgeHelper::new(65.0);
        let mut q = query(&info, &hit, Vec2::ZERO, Vec2::new(40.0, 19.0));
        q.sensor_side = SensorHitSide::Both;
        assert!(!helper.ledge_exceeded(&terrain, &q));
    }
}
