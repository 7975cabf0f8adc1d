//! Landing on irregular seams.
//!
//! Polygon curves are built from many short edges, so the two ground sensors
//! often land on different edges of the same curve. Picking strictly by
//! height there makes the landing angle jitter between the edges.

use bevy::prelude::*;

use crate::collision::{SensorHitSide, SurfaceHit};
use crate::math::{angle_between_points, normalize_angle, signed_angle_delta, EPSILON};
use crate::state::GroundMode;

/// Both edge angles must be this close to the chord to count as one curve.
const CURVE_TOLERANCE: f32 = 22.5;

/// Result of a smoothed landing.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SmoothedLanding {
    /// Sensor whose surface the landing angle follows.
    pub side: SensorHitSide,
    /// Angle to land with.
    pub angle: f32,
}

/// Chooses the landing hit when both sensors hit surfaces of different
/// angles while airborne.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothGroundLandingHelper {
    last: Option<SmoothedLanding>,
}

impl SmoothGroundLandingHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result of the latest [`Self::resolve`].
    pub fn last(&self) -> Option<SmoothedLanding> {
        self.last
    }

    /// Pick a side and angle for a landing with hits from both sensors.
    ///
    /// Hits further apart than `height_threshold` in the mode's frame are
    /// plain height comparisons. Closer hits prefer the surface that
    /// continues `previous_angle`, or the direction of `velocity` when the
    /// previous angle is flat. When both edges lie along the chord between
    /// the hit points the chord angle is used.
    pub fn resolve(
        &mut self,
        left: &SurfaceHit,
        right: &SurfaceHit,
        mode: GroundMode,
        previous_angle: f32,
        velocity: Vec2,
        height_threshold: f32,
    ) -> SmoothedLanding {
        let result = Self::pick(left, right, mode, previous_angle, velocity, height_threshold);
        self.last = Some(result);
        result
    }

    fn pick(
        left: &SurfaceHit,
        right: &SurfaceHit,
        mode: GroundMode,
        previous_angle: f32,
        velocity: Vec2,
        height_threshold: f32,
    ) -> SmoothedLanding {
        let (left_height, right_height) = (mode.vertical(left.point), mode.vertical(right.point));
        let higher = if left_height >= right_height {
            SensorHitSide::Left
        } else {
            SensorHitSide::Right
        };
        let angle_of = |side: SensorHitSide| match side {
            SensorHitSide::Right => right.angle(),
            _ => left.angle(),
        };

        if (left_height - right_height).abs() > height_threshold {
            return SmoothedLanding {
                side: higher,
                angle: angle_of(higher),
            };
        }

        let reference = reference_angle(previous_angle, velocity);
        let left_delta = signed_angle_delta(reference, left.angle()).abs();
        let right_delta = signed_angle_delta(reference, right.angle()).abs();
        let side = if (left_delta - right_delta).abs() <= EPSILON {
            higher
        } else if left_delta < right_delta {
            SensorHitSide::Left
        } else {
            SensorHitSide::Right
        };

        let chord = angle_between_points(left.point, right.point);
        let same_curve = signed_angle_delta(left.angle(), chord).abs() <= CURVE_TOLERANCE
            && signed_angle_delta(right.angle(), chord).abs() <= CURVE_TOLERANCE;
        SmoothedLanding {
            side,
            angle: if same_curve { chord } else { angle_of(side) },
        }
    }
}

/// Surface angle the landing should continue.
fn reference_angle(previous_angle: f32, velocity: Vec2) -> f32 {
    let previous = normalize_angle(previous_angle);
    if previous.round() != 0.0 || velocity.x.abs() <= EPSILON {
        return previous;
    }
    // Surface a body moving along `velocity` would be gliding on.
    let travel = velocity * velocity.x.signum();
    normalize_angle((-travel.y).atan2(travel.x).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::normal_from_angle;

    fn hit(point: Vec2, angle: f32) -> SurfaceHit {
        SurfaceHit::new(10.0, normal_from_angle(angle), point, None)
    }

    #[test]
    fn far_apart_hits_use_height() {
        let mut helper = SmoothGroundLandingHelper::new();
        let left = hit(Vec2::new(-9.0, 0.0), 0.0);
        let right = hit(Vec2::new(9.0, 10.0), 30.0);
        let landing = helper.resolve(&left, &right, GroundMode::Floor, 0.0, Vec2::ZERO, 4.0);
        assert_eq!(landing.side, SensorHitSide::Right);
        assert!((landing.angle - 30.0).abs() < 1.0e-3);
        assert_eq!(helper.last(), Some(landing));
    }

    #[test]
    fn close_hits_continue_previous_angle() {
        let mut helper = SmoothGroundLandingHelper::new();
        // A flat edge next to a steep one; the chord matches neither.
        let left = hit(Vec2::new(-9.0, 0.0), 0.0);
        let right = hit(Vec2::new(9.0, 1.0), 60.0);
        let landing = helper.resolve(&left, &right, GroundMode::Floor, 55.0, Vec2::ZERO, 4.0);
        assert_eq!(landing.side, SensorHitSide::Right);
        assert!((landing.angle - 60.0).abs() < 1.0e-3);
    }

    #[test]
    fn same_curve_uses_chord() {
        let mut helper = SmoothGroundLandingHelper::new();
        let left = hit(Vec2::new(-9.0, 0.0), 0.0);
        let right = hit(Vec2::new(9.0, -3.0), 15.0);
        let landing = helper.resolve(&left, &right, GroundMode::Floor, 0.0, Vec2::ZERO, 4.0);
        let chord = angle_between_points(left.point, right.point);
        assert!((landing.angle - chord).abs() < 1.0e-3);
        assert!(chord > 0.0 && chord < 15.0);
    }

    #[test]
    fn velocity_breaks_flat_reference() {
        // Falling while moving left: travel surface descends to the left.
        let angle = reference_angle(0.0, Vec2::new(-4.0, -4.0));
        assert!((angle - 315.0).abs() < 1.0e-3);
    }
}
