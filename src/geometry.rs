//! Planar vector helpers used by the beam-spring force law.
//!
//! All quantities live in the x-y plane; the z component is carried along so
//! that positions and forces can share [`nalgebra::Vector3`] but it is never
//! written to by the simulation.

use std::f64::consts::PI;

/// Position, velocity or force in the lattice plane.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Convenience helper for creating in-plane [`Vector3`] instances.
///
/// # Examples
/// ```
/// use stickslip::vector;
///
/// let r = vector(1.0, -2.0);
/// assert_eq!(r.y, -2.0);
/// assert_eq!(r.z, 0.0);
/// ```
#[must_use]
pub fn vector(x: f64, y: f64) -> Vector3 {
    Vector3::new(x, y, 0.0)
}

/// The z component of `a × b` for two in-plane vectors.
#[must_use]
pub fn cross_2d(a: &Vector3, b: &Vector3) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Angle of `delta` measured counter-clockwise from the x axis.
#[must_use]
pub fn bearing(delta: &Vector3) -> f64 {
    delta.y.atan2(delta.x)
}

/// `direction` rotated a quarter turn counter-clockwise.
#[must_use]
pub fn perpendicular(direction: &Vector3) -> Vector3 {
    vector(-direction.y, direction.x)
}

/// Map an angle into the half-open interval (-π, π].
///
/// # Examples
/// ```
/// use stickslip::geometry::wrap_angle;
///
/// let wrapped = wrap_angle(1.5 * std::f64::consts::PI);
/// assert!((wrapped + 0.5 * std::f64::consts::PI).abs() < 1.0e-12);
/// ```
#[must_use]
pub fn wrap_angle(angle: f64) -> f64 {
    let mut wrapped = angle % (2.0 * PI);
    if wrapped > PI {
        wrapped -= 2.0 * PI;
    } else if wrapped <= -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

/// Rotate an offset clockwise by `phi`.
///
/// The driver beam measures its tilt clockwise, so a positive beam angle lowers
/// the nodes to the right of its centre.
#[must_use]
pub fn rotate_clockwise(offset: &Vector3, phi: f64) -> Vector3 {
    let (sin, cos) = phi.sin_cos();
    vector(
        offset.x * cos + offset.y * sin,
        -offset.x * sin + offset.y * cos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cross_product_of_axes_is_unit() {
        assert_relative_eq!(cross_2d(&vector(1.0, 0.0), &vector(0.0, 1.0)), 1.0);
        assert_relative_eq!(cross_2d(&vector(0.0, 1.0), &vector(1.0, 0.0)), -1.0);
    }

    #[test]
    fn wrap_angle_handles_branch_cut() {
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(2.0 * PI + 0.1), 0.1, epsilon = 1.0e-12);
        assert_relative_eq!(wrap_angle(-PI - 0.1), PI - 0.1, epsilon = 1.0e-12);
    }

    #[test]
    fn perpendicular_is_counter_clockwise() {
        let p = perpendicular(&vector(1.0, 0.0));
        assert_eq!(p, vector(0.0, 1.0));
    }

    #[test]
    fn clockwise_rotation_lowers_right_hand_side() {
        let rotated = rotate_clockwise(&vector(1.0, 0.0), 0.5 * PI);
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(rotated.y, -1.0, epsilon = 1.0e-12);
    }
}
