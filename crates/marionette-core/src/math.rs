//! Quaternion and vector helpers shared by the solvers and the store.

use nalgebra::{UnitQuaternion, UnitVector3, Vector3};

/// |dot| threshold below which an axis candidate counts as "not parallel"
/// when picking a reference perpendicular.
pub const PARALLEL_DOT: f32 = 0.5;

/// Squared length under which a direction is treated as degenerate.
pub const DEGENERATE_LEN_SQ: f32 = 1e-12;

/// Shortest-path continuity fix for the quaternion double cover.
///
/// If the relative rotation from `reference` to `rotation` has a negative
/// scalar component, all four components of `rotation` are negated. The
/// rotation itself is unchanged; only the sign of its representation is,
/// which is what keeps adjacent solved keyframes from popping.
pub fn fix_reverse_rotation(
    rotation: UnitQuaternion<f32>,
    reference: &UnitQuaternion<f32>,
) -> UnitQuaternion<f32> {
    let relative = reference.inverse() * rotation;
    if relative.w < 0.0 {
        UnitQuaternion::new_unchecked(-rotation.into_inner())
    } else {
        rotation
    }
}

/// Re-store a rotation in normalized angle-axis form.
///
/// Near-antipodal quaternions (scalar part close to -1) fail the
/// axis-angle conversion in the host curve layer; collapsing onto the
/// representation with a non-negative scalar part first avoids that.
pub fn normalize_angle_axis(rotation: UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let positive = if rotation.w < 0.0 {
        UnitQuaternion::new_unchecked(-rotation.into_inner())
    } else {
        rotation
    };
    match positive.axis_angle() {
        Some((axis, angle)) => UnitQuaternion::from_axis_angle(&axis, angle),
        None => UnitQuaternion::identity(),
    }
}

/// Signed angle from `a` to `b` around `axis`, in radians, in (-pi, pi].
///
/// Both vectors are projected onto the plane perpendicular to `axis`;
/// returns 0 when either projection is degenerate.
pub fn signed_angle_about(axis: &UnitVector3<f32>, a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let n = axis.into_inner();
    let pa = a - n * a.dot(&n);
    let pb = b - n * b.dot(&n);
    if pa.norm_squared() < DEGENERATE_LEN_SQ || pb.norm_squared() < DEGENERATE_LEN_SQ {
        return 0.0;
    }
    pa.cross(&pb).dot(&n).atan2(pa.dot(&pb))
}

/// Reference perpendicular to `axis`.
///
/// Crosses against world up, or world right when `axis` is too parallel
/// to up (|dot| >= [`PARALLEL_DOT`]). Falls back to +Z for a degenerate
/// axis.
pub fn perpendicular(axis: &Vector3<f32>) -> Vector3<f32> {
    let len_sq = axis.norm_squared();
    if len_sq < DEGENERATE_LEN_SQ {
        return Vector3::z();
    }
    let dir = axis / len_sq.sqrt();
    let reference = if dir.dot(&Vector3::y()).abs() < PARALLEL_DOT {
        Vector3::y()
    } else {
        Vector3::x()
    };
    let perp = dir.cross(&reference);
    if perp.norm_squared() < DEGENERATE_LEN_SQ {
        Vector3::z()
    } else {
        perp.normalize()
    }
}

/// Wrap degrees into (-180, 180].
pub fn wrap_degrees(deg: f32) -> f32 {
    let mut d = deg % 360.0;
    if d <= -180.0 {
        d += 360.0;
    } else if d > 180.0 {
        d -= 360.0;
    }
    d
}

/// Fraction of a rotation: identity at weight 0, the full arc at 1.
pub fn scale_rotation(rotation: &UnitQuaternion<f32>, weight: f32) -> UnitQuaternion<f32> {
    if weight >= 1.0 {
        *rotation
    } else if weight <= 0.0 {
        UnitQuaternion::identity()
    } else {
        rotation.powf(weight)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
