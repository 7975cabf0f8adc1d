//! Sensor hit and collision snapshot types.
//!
//! A [`SurfaceHit`] is the raw answer of one terrain ray. A [`CollisionInfo`]
//! is what a resolver keeps after deciding which of its two sensors to trust
//! for the current tick.

use bevy::prelude::*;

use crate::math::{angle_from_normal, angle_to_vector, normalize_angle};

/// Extra properties of the surface that was hit.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceFlags {
    /// The surface belongs to an interactive object (spring, monitor, push
    /// block). Wall contact against these is never deferred.
    pub interactive: bool,
    /// The surface can be passed through from below.
    pub one_way: bool,
}

impl SurfaceFlags {
    /// Plain solid terrain.
    pub const SOLID: Self = Self {
        interactive: false,
        one_way: false,
    };

    /// Interactive object.
    pub const INTERACTIVE: Self = Self {
        interactive: true,
        one_way: false,
    };

    /// One-way platform.
    pub const ONE_WAY: Self = Self {
        interactive: false,
        one_way: true,
    };
}

/// Information about a raycast collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Distance from the ray origin to the hit point.
    pub distance: f32,
    /// Normal of the surface at the hit point.
    pub normal: Vec2,
    /// World position of the hit point.
    pub point: Vec2,
    /// Entity that owns the surface, if any.
    pub entity: Option<Entity>,
    /// Surface properties.
    pub flags: SurfaceFlags,
}

impl SurfaceHit {
    /// Create a hit on plain solid terrain.
    pub fn new(distance: f32, normal: Vec2, point: Vec2, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
            flags: SurfaceFlags::SOLID,
        }
    }

    /// Attach surface flags.
    pub fn with_flags(mut self, flags: SurfaceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Surface angle of the hit normal.
    #[inline]
    pub fn angle(&self) -> f32 {
        angle_from_normal(self.normal)
    }
}

/// Which of a resolver's two sensors produced the accepted contact.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SensorHitSide {
    /// No contact.
    #[default]
    None,
    /// Only the left (A / C / E) sensor.
    Left,
    /// Only the right (B / D / F) sensor.
    Right,
    /// Both sensors hit.
    Both,
}

impl SensorHitSide {
    /// Side for a pair of sensor results.
    pub fn from_hits(left: bool, right: bool) -> Self {
        match (left, right) {
            (true, true) => Self::Both,
            (true, false) => Self::Left,
            (false, true) => Self::Right,
            (false, false) => Self::None,
        }
    }

    /// The opposite single side. `Both` and `None` are their own opposites.
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            other => other,
        }
    }

    /// `-1` for left, `1` for right, `0` otherwise.
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
            _ => 0.0,
        }
    }
}

/// Snapshot of one resolver's result for a single tick.
///
/// The angle is always normalised into `[0, 360)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionInfo {
    hit: Option<SurfaceHit>,
    angle: f32,
    side: SensorHitSide,
}

impl CollisionInfo {
    /// Create a snapshot for an accepted contact.
    pub fn new(hit: SurfaceHit, angle: f32, side: SensorHitSide) -> Self {
        Self {
            hit: Some(hit),
            angle: normalize_angle(angle),
            side,
        }
    }

    /// Snapshot with no contact that still remembers an orientation.
    pub fn none(angle: f32) -> Self {
        Self {
            hit: None,
            angle: normalize_angle(angle),
            side: SensorHitSide::None,
        }
    }

    /// The accepted hit, if any.
    #[inline]
    pub fn hit(&self) -> Option<&SurfaceHit> {
        self.hit.as_ref()
    }

    /// Whether the resolver accepted a contact.
    #[inline]
    pub fn has_contact(&self) -> bool {
        self.hit.is_some()
    }

    /// Surface angle in `[0, 360)`.
    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Which sensor(s) fired.
    #[inline]
    pub fn side(&self) -> SensorHitSide {
        self.side
    }

    /// Entity of the contacted surface.
    pub fn entity(&self) -> Option<Entity> {
        self.hit.and_then(|h| h.entity)
    }

    /// Contact point in world space.
    pub fn point(&self) -> Option<Vec2> {
        self.hit.map(|h| h.point)
    }
}

/// Description of one sensor ray for a single cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorData {
    /// Ray origin in world space.
    pub origin: Vec2,
    /// Angle the sensor family is built around (the previous surface angle).
    pub base_angle: f32,
    /// Offset added to the base angle for this particular ray.
    pub rotation_offset: f32,
    /// Final cast angle (`base_angle + rotation_offset`, normalised).
    pub cast_angle: f32,
    /// Ray length.
    pub cast_distance: f32,
}

impl SensorData {
    /// Build a sensor from a base angle and an offset.
    pub fn new(origin: Vec2, base_angle: f32, rotation_offset: f32, cast_distance: f32) -> Self {
        Self {
            origin,
            base_angle,
            rotation_offset,
            cast_angle: normalize_angle(base_angle + rotation_offset),
            cast_distance: cast_distance.max(0.0),
        }
    }

    /// Unit direction of the ray.
    #[inline]
    pub fn direction(&self) -> Vec2 {
        angle_to_vector(self.cast_angle)
    }

    /// Point at the far end of the ray.
    pub fn end(&self) -> Vec2 {
        self.origin + self.direction() * self.cast_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_hit_angle() {
        let hit = SurfaceHit::new(5.0, Vec2::Y, Vec2::new(10.0, 0.0), None);
        assert_eq!(hit.distance, 5.0);
        assert_eq!(hit.angle(), 0.0);
        assert_eq!(hit.flags, SurfaceFlags::SOLID);
    }

    #[test]
    fn surface_hit_with_entity_and_flags() {
        let entity = Entity::from_raw(42);
        let hit = SurfaceHit::new(3.0, Vec2::X, Vec2::ZERO, Some(entity))
            .with_flags(SurfaceFlags::INTERACTIVE);
        assert_eq!(hit.entity, Some(entity));
        assert!(hit.flags.interactive);
        assert!((hit.angle() - 90.0).abs() < 1.0e-4);
    }

    #[test]
    fn collision_info_normalises_angle() {
        let hit = SurfaceHit::new(1.0, Vec2::Y, Vec2::ZERO, None);
        let info = CollisionInfo::new(hit, -30.0, SensorHitSide::Left);
        assert!((info.angle() - 330.0).abs() < 1.0e-4);
        assert!(info.has_contact());

        let empty = CollisionInfo::none(720.0);
        assert_eq!(empty.angle(), 0.0);
        assert!(!empty.has_contact());
        assert_eq!(empty.side(), SensorHitSide::None);
    }

    #[test]
    fn sensor_side_from_hits() {
        assert_eq!(SensorHitSide::from_hits(true, true), SensorHitSide::Both);
        assert_eq!(SensorHitSide::from_hits(true, false), SensorHitSide::Left);
        assert_eq!(SensorHitSide::from_hits(false, true), SensorHitSide::Right);
        assert_eq!(SensorHitSide::from_hits(false, false), SensorHitSide::None);
        assert_eq!(SensorHitSide::Left.opposite(), SensorHitSide::Right);
    }

    #[test]
    fn sensor_data_points_down_for_floor() {
        let sensor = SensorData::new(Vec2::ZERO, 0.0, 180.0, 20.0);
        let dir = sensor.direction();
        assert!(dir.x.abs() < 1.0e-5);
        assert!((dir.y + 1.0).abs() < 1.0e-5);
        assert!((sensor.end().y + 20.0).abs() < 1.0e-4);
    }
}
