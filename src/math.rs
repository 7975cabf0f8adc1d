//! Angle and geometry helpers.
//!
//! All angles in this crate are degrees in `[0, 360)`, measured **clockwise**
//! from world up (`+Y`) to a surface normal. A surface at angle `θ` therefore
//! has normal `(sin θ, cos θ)` and forward tangent `(cos θ, -sin θ)`, which is
//! the direction a positive ground velocity moves the character.

use bevy::prelude::*;

/// Tolerance used when comparing angles and distances.
pub const EPSILON: f32 = 1.0e-4;

/// Wrap any angle (degrees) into `[0, 360)`.
///
/// Non-finite input maps to `0.0` so a bad normal can never poison the
/// sensor state.
#[inline]
pub fn normalize_angle(degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Round an angle to the nearest whole degree, normalised.
#[inline]
pub fn round_angle(degrees: f32) -> f32 {
    normalize_angle(normalize_angle(degrees).round())
}

/// Clamp an angle to `[min, max]` after normalising it.
///
/// The range must not wrap; use [`angle_in_range`] for wrapping ranges.
#[inline]
pub fn clamp_angle(degrees: f32, min: f32, max: f32) -> f32 {
    normalize_angle(degrees).clamp(min, max)
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
///
/// Positive results are clockwise.
#[inline]
pub fn signed_angle_delta(from: f32, to: f32) -> f32 {
    let delta = normalize_angle(to - from);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

/// Whether `degrees` lies in the inclusive range `[start, end]`.
///
/// Ranges that wrap past 360 (`start > end`) are supported, so
/// `angle_in_range(350.0, 337.0, 23.0)` is true.
#[inline]
pub fn angle_in_range(degrees: f32, start: f32, end: f32) -> bool {
    let a = normalize_angle(degrees);
    let start = normalize_angle(start);
    let end = normalize_angle(end);
    if start <= end {
        a >= start && a <= end
    } else {
        a >= start || a <= end
    }
}

/// Surface angle for a normal vector.
pub fn angle_from_normal(normal: Vec2) -> f32 {
    if normal.length_squared() <= EPSILON * EPSILON {
        return 0.0;
    }
    normalize_angle(normal.x.atan2(normal.y).to_degrees())
}

/// Unit normal of a surface at `degrees`.
#[inline]
pub fn normal_from_angle(degrees: f32) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(sin, cos)
}

/// Forward tangent of a surface at `degrees`.
#[inline]
pub fn tangent_from_angle(degrees: f32) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(cos, -sin)
}

/// Unit vector pointing in the direction `degrees` (clockwise from up).
#[inline]
pub fn angle_to_vector(degrees: f32) -> Vec2 {
    normal_from_angle(degrees)
}

/// Direction of `vector` in degrees clockwise from up.
#[inline]
pub fn vector_to_angle(vector: Vec2) -> f32 {
    angle_from_normal(vector)
}

/// Rotate a body-local offset into world space for a body standing on a
/// surface at `degrees`.
///
/// Local `+Y` maps onto the surface normal and local `+X` onto the forward
/// tangent.
#[inline]
pub fn rotate_offset(offset: Vec2, degrees: f32) -> Vec2 {
    tangent_from_angle(degrees) * offset.x + normal_from_angle(degrees) * offset.y
}

/// Angle of the surface running from `left` to `right`.
///
/// This is the tangent direction of the chord turned back into a surface
/// angle, so two points at equal height give `0`.
pub fn angle_between_points(left: Vec2, right: Vec2) -> f32 {
    let chord = right - left;
    if chord.length_squared() <= EPSILON * EPSILON {
        return 0.0;
    }
    // tangent (cos θ, -sin θ) => θ = atan2(-y, x)
    normalize_angle((-chord.y).atan2(chord.x).to_degrees())
}

/// Move `current` toward `target` by at most `step`, never overshooting.
#[inline]
pub fn approach(current: f32, target: f32, step: f32) -> f32 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

/// Sign of `value` with zero mapped to zero.
#[inline]
pub fn sign_or_zero(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1.0e-3
    }

    #[test]
    fn normalize_wraps_into_range() {
        for raw in [-720.5, -360.0, -1.0, 0.0, 45.0, 359.99, 360.0, 725.0, 1.0e6] {
            let n = normalize_angle(raw);
            assert!((0.0..360.0).contains(&n), "{raw} -> {n}");
        }
        assert!(close(normalize_angle(-90.0), 270.0));
        assert!(close(normalize_angle(450.0), 90.0));
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [-1234.5, -0.0001, 12.0, 359.9999, 360.0, 9999.0] {
            let once = normalize_angle(raw);
            assert_eq!(normalize_angle(once), once);
        }
    }

    #[test]
    fn normalize_handles_non_finite() {
        assert_eq!(normalize_angle(f32::NAN), 0.0);
        assert_eq!(normalize_angle(f32::INFINITY), 0.0);
    }

    #[test]
    fn signed_delta_takes_short_way() {
        assert!(close(signed_angle_delta(350.0, 10.0), 20.0));
        assert!(close(signed_angle_delta(10.0, 350.0), -20.0));
        assert!(close(signed_angle_delta(90.0, 270.0), 180.0));
    }

    #[test]
    fn range_check_supports_wrapping() {
        assert!(angle_in_range(350.0, 337.0, 23.0));
        assert!(angle_in_range(10.0, 337.0, 23.0));
        assert!(!angle_in_range(30.0, 337.0, 23.0));
        assert!(angle_in_range(30.0, 24.0, 45.0));
    }

    #[test]
    fn normal_and_angle_agree() {
        for degrees in [0.0, 30.0, 90.0, 135.0, 180.0, 270.0, 300.0] {
            let normal = normal_from_angle(degrees);
            assert!(close(angle_from_normal(normal), normalize_angle(degrees)));
            assert!(normal.dot(tangent_from_angle(degrees)).abs() < 1.0e-5);
        }
    }

    #[test]
    fn clockwise_convention() {
        // 90 degrees clockwise from up points to +X.
        let n = normal_from_angle(90.0);
        assert!(close(n.x, 1.0) && close(n.y, 0.0));
        // A floor's tangent points right.
        let t = tangent_from_angle(0.0);
        assert!(close(t.x, 1.0) && close(t.y, 0.0));
    }

    #[test]
    fn rotate_offset_maps_local_axes() {
        let up = rotate_offset(Vec2::Y, 90.0);
        assert!(close(up.x, 1.0) && close(up.y, 0.0));
        let right = rotate_offset(Vec2::X, 0.0);
        assert!(close(right.x, 1.0));
        let down_left = rotate_offset(Vec2::new(-9.0, -19.0), 0.0);
        assert!(close(down_left.x, -9.0) && close(down_left.y, -19.0));
    }

    #[test]
    fn chord_angle_matches_slope() {
        // Rising to the right at 45 degrees -> normal points up-left -> 315.
        let angle = angle_between_points(Vec2::ZERO, Vec2::new(10.0, 10.0));
        assert!(close(angle, 315.0));
        assert!(close(angle_between_points(Vec2::ZERO, Vec2::new(5.0, 0.0)), 0.0));
    }

    #[test]
    fn approach_never_overshoots() {
        assert_eq!(approach(10.0, 0.0, 3.0), 7.0);
        assert_eq!(approach(1.0, 0.0, 3.0), 0.0);
        assert_eq!(approach(-1.0, 0.0, 3.0), 0.0);
    }

    #[test]
    fn rounding_normalises() {
        assert_eq!(round_angle(359.6), 0.0);
        assert_eq!(round_angle(-0.4), 0.0);
        assert_eq!(round_angle(44.5), 45.0);
        assert_eq!(clamp_angle(400.0, 0.0, 30.0), 30.0);
    }
}
