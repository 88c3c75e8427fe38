//! Rotation and rigid-transform math shared by pose types and the
//! registration Jacobians.
//!
//! The Euler convention is ZYX extrinsic throughout: a `(roll, pitch,
//! yaw)` triple builds `R = Rz(yaw) * Ry(pitch) * Rx(roll)`. Forward
//! and inverse conversions use the same builder so `T * T⁻¹ = I`
//! holds to floating precision.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// Rotation matrix for ZYX-extrinsic Euler angles.
pub fn rotation_matrix(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    rot_z(yaw) * rot_y(pitch) * rot_x(roll)
}

/// Partial derivatives of [`rotation_matrix`] with respect to roll,
/// pitch and yaw, in that order.
pub fn rotation_derivatives(roll: f64, pitch: f64, yaw: f64) -> [Matrix3<f64>; 3] {
    let rx = rot_x(roll);
    let ry = rot_y(pitch);
    let rz = rot_z(yaw);

    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();

    #[rustfmt::skip]
    let drx = Matrix3::new(
        0.0, 0.0, 0.0,
        0.0, -sr, -cr,
        0.0,  cr, -sr,
    );
    #[rustfmt::skip]
    let dry = Matrix3::new(
        -sp, 0.0,  cp,
        0.0, 0.0, 0.0,
        -cp, 0.0, -sp,
    );
    #[rustfmt::skip]
    let drz = Matrix3::new(
        -sy, -cy, 0.0,
         cy, -sy, 0.0,
        0.0, 0.0, 0.0,
    );

    [rz * ry * drx, rz * dry * rx, drz * ry * rx]
}

/// Exact inverse of a rigid-body matrix: `[Rᵀ, -Rᵀt]`.
///
/// Unlike a general matrix inverse this cannot fail and does not
/// amplify rounding error in the rotation block.
pub fn inverse_rigid(m: &Matrix4<f64>) -> Matrix4<f64> {
    let r = m.fixed_view::<3, 3>(0, 0);
    let t = m.fixed_view::<3, 1>(0, 3);
    let rt = r.transpose();

    let mut out = Matrix4::identity();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
    out.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-rt * t));
    out
}

/// Split a rigid-body matrix into translation and unit quaternion.
pub fn decompose(m: &Matrix4<f64>) -> (Vector3<f64>, UnitQuaternion<f64>) {
    let t = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let rot = Rotation3::from_matrix_unchecked(m.fixed_view::<3, 3>(0, 0).into_owned());
    (t, UnitQuaternion::from_rotation_matrix(&rot))
}

fn rot_x(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    #[rustfmt::skip]
    let m = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0,   c,  -s,
        0.0,   s,   c,
    );
    m
}

fn rot_y(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    #[rustfmt::skip]
    let m = Matrix3::new(
          c, 0.0,   s,
        0.0, 1.0, 0.0,
         -s, 0.0,   c,
    );
    m
}

fn rot_z(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    #[rustfmt::skip]
    let m = Matrix3::new(
          c,  -s, 0.0,
          s,   c, 0.0,
        0.0, 0.0, 1.0,
    );
    m
}
