//! Rotation helpers on top of glam.
//!
//! Conventions: a rotation's local +Z is its forward axis, +Y its up axis and
//! +X its right axis. Angles crossing module boundaries are in degrees.

pub use glam::{EulerRot, Mat3, Quat, Vec3};

/// Below this squared length a direction is treated as degenerate
pub const DIRECTION_EPSILON: f32 = 1e-8;

/// Slack on the fully-extended reach so float noise on `d == L1 + L2` still
/// yields an exact zero bend.
pub const REACH_EPSILON: f32 = 1e-4;

/// Extension trait exposing the basis axes of a rotation.
pub trait QuatAxes {
    /// Rotated +Z
    fn forward(&self) -> Vec3;
    /// Rotated +Y
    fn up(&self) -> Vec3;
    /// Rotated +X
    fn right(&self) -> Vec3;
}

impl QuatAxes for Quat {
    #[inline]
    fn forward(&self) -> Vec3 {
        *self * Vec3::Z
    }

    #[inline]
    fn up(&self) -> Vec3 {
        *self * Vec3::Y
    }

    #[inline]
    fn right(&self) -> Vec3 {
        *self * Vec3::X
    }
}

/// Rotation whose forward axis points along `forward` and whose up axis lies
/// in the plane of `forward` and `up`.
///
/// Returns identity for a zero `forward`. If `up` is parallel to `forward` a
/// perpendicular up is picked so the result is always a valid rotation.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let f = forward.normalize_or_zero();
    if f.length_squared() < DIRECTION_EPSILON {
        return Quat::IDENTITY;
    }

    let mut r = up.cross(f);
    if r.length_squared() < DIRECTION_EPSILON {
        r = f.any_orthonormal_vector().cross(f);
    }
    let r = r.normalize();
    let u = f.cross(r);

    Quat::from_mat3(&Mat3::from_cols(r, u, f)).normalize()
}

/// Look rotation with world up as the up-hint
#[inline]
pub fn look_rotation_up(forward: Vec3) -> Quat {
    look_rotation(forward, Vec3::Y)
}

/// Axis-angle rotation with the angle in degrees. A zero axis yields identity.
pub fn angle_axis(degrees: f32, axis: Vec3) -> Quat {
    let axis = axis.normalize_or_zero();
    if axis.length_squared() < DIRECTION_EPSILON {
        return Quat::IDENTITY;
    }
    Quat::from_axis_angle(axis, degrees.to_radians())
}

/// Interior angle (degrees) at the root joint of a two-segment chain whose
/// root-to-target distance is `d`.
///
/// Unreachable configurations (target too far, too close, or degenerate
/// lengths) return 0, meaning the chain is laid straight toward the target.
pub fn bend_angle(d: f32, upper: f32, lower: f32) -> f32 {
    if !(d.is_finite() && upper > 0.0) {
        return 0.0;
    }
    if d >= upper + lower - REACH_EPSILON || d <= (upper - lower).abs() {
        return 0.0;
    }

    let cos = (d * d + upper * upper - lower * lower) / (2.0 * d * upper);
    if !(-1.0..=1.0).contains(&cos) {
        return 0.0;
    }
    cos.acos().to_degrees()
}

/// Wrap an angle in degrees into [-180, 180]
pub fn normalize_angle(mut degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    degrees %= 360.0;
    if degrees > 180.0 {
        degrees -= 360.0;
    } else if degrees < -180.0 {
        degrees += 360.0;
    }
    degrees
}

/// Wrap then clamp an angle in degrees
#[inline]
pub fn clamp_angle(degrees: f32, min: f32, max: f32) -> f32 {
    normalize_angle(degrees).clamp(min, max)
}

/// Perpendicular distance from `point` to the ray starting at `origin`
/// along `direction`. A zero direction measures distance to the origin.
pub fn distance_to_ray(origin: Vec3, direction: Vec3, point: Vec3) -> f32 {
    let dir = direction.normalize_or_zero();
    if dir.length_squared() < DIRECTION_EPSILON {
        return origin.distance(point);
    }
    dir.cross(point - origin).length()
}

/// Pitch/yaw/roll in degrees, applied roll first, then pitch, then yaw
pub fn to_pitch_yaw_roll(rotation: Quat) -> Vec3 {
    let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
    Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Inverse of [`to_pitch_yaw_roll`]
pub fn from_pitch_yaw_roll(angles: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        angles.y.to_radians(),
        angles.x.to_radians(),
        angles.z.to_radians(),
    )
}

/// Forward axis of `rotation` projected onto the horizontal plane
pub fn flat_forward(rotation: Quat) -> Vec3 {
    let forward = rotation.forward();
    let flat = Vec3::new(forward.x, 0.0, forward.z);
    if flat.length_squared() < DIRECTION_EPSILON {
        // Facing straight up or down: fall back to where the up axis points
        let up = rotation.up();
        let sign = if forward.y > 0.0 { -1.0 } else { 1.0 };
        return Vec3::new(up.x * sign, 0.0, up.z * sign).normalize_or_zero();
    }
    flat.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-4;

    #[test]
    fn test_look_rotation_maps_axes() {
        let q = look_rotation(Vec3::X, Vec3::Y);
        assert!(q.forward().abs_diff_eq(Vec3::X, TOL), "forward {:?}", q.forward());
        assert!(q.up().abs_diff_eq(Vec3::Y, TOL), "up {:?}", q.up());

        let identity = look_rotation(Vec3::Z, Vec3::Y);
        assert!(identity.abs_diff_eq(Quat::IDENTITY, TOL));
    }

    #[test]
    fn test_look_rotation_degenerate_inputs() {
        assert_eq!(look_rotation(Vec3::ZERO, Vec3::Y), Quat::IDENTITY);

        // Up parallel to forward still gives a proper rotation
        let q = look_rotation(Vec3::Y, Vec3::Y);
        assert!(q.is_finite());
        assert!(q.forward().abs_diff_eq(Vec3::Y, TOL));
    }

    #[test]
    fn test_bend_angle_right_triangle() {
        // 3-4-5 triangle: angle at root between hypotenuse 5 and side 4
        let angle = bend_angle(5.0, 4.0, 3.0);
        let expected = (4.0f32 / 5.0).acos().to_degrees();
        assert!((angle - expected).abs() < 1e-3, "got {}", angle);
    }

    #[test]
    fn test_bend_angle_unreachable_is_zero() {
        assert_eq!(bend_angle(3.0, 1.0, 1.0), 0.0);
        assert_eq!(bend_angle(2.0, 1.0, 1.0), 0.0);
        assert_eq!(bend_angle(0.1, 1.0, 0.5), 0.0);
        assert_eq!(bend_angle(0.0, 1.0, 1.0), 0.0);
        assert_eq!(bend_angle(1.0, 0.0, 1.0), 0.0);
        assert_eq!(bend_angle(f32::NAN, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_normalize_and_clamp_angle() {
        assert!((normalize_angle(270.0) + 90.0).abs() < TOL);
        assert!((normalize_angle(-270.0) - 90.0).abs() < TOL);
        assert!((normalize_angle(720.0 + 10.0) - 10.0).abs() < TOL);
        assert_eq!(clamp_angle(120.0, -90.0, 90.0), 90.0);
        assert_eq!(clamp_angle(-300.0, -45.0, 45.0), 45.0);
    }

    #[test]
    fn test_distance_to_ray() {
        let d = distance_to_ray(Vec3::ZERO, Vec3::X * 3.0, Vec3::new(2.0, 0.5, 0.0));
        assert!((d - 0.5).abs() < TOL);
    }

    #[test]
    fn test_pitch_yaw_roll_round_trip() {
        let angles = Vec3::new(20.0, -35.0, 10.0);
        let back = to_pitch_yaw_roll(from_pitch_yaw_roll(angles));
        assert!(back.abs_diff_eq(angles, 1e-2), "got {:?}", back);
    }

    #[test]
    fn test_flat_forward_ignores_pitch() {
        let q = Quat::from_rotation_y(0.5) * Quat::from_rotation_x(-0.7);
        let flat = flat_forward(q);
        let expected = Quat::from_rotation_y(0.5) * Vec3::Z;
        assert!(flat.abs_diff_eq(expected, TOL), "got {:?}", flat);
    }
}
