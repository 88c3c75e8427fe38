//! 6-DoF rigid transform parameterized by translation + Euler angles.

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::math;

/// A rigid transform as `(x, y, z, roll, pitch, yaw)`.
///
/// Angles are radians, ZYX extrinsic: the equivalent matrix is
/// `T(x,y,z) * Rz(yaw) * Ry(pitch) * Rx(roll)`. This is the state the
/// registration solver optimizes and the unit of the keyframe gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Transform {
    /// Create a transform from explicit components.
    #[inline]
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            z,
            roll,
            pitch,
            yaw,
        }
    }

    /// The identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// Build from a 6-element slice ordered `(x, y, z, roll, pitch, yaw)`.
    ///
    /// Returns `None` when the slice length is not 6.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        if values.len() != 6 {
            return None;
        }
        Some(Self::new(
            values[0] as f64,
            values[1] as f64,
            values[2] as f64,
            values[3] as f64,
            values[4] as f64,
            values[5] as f64,
        ))
    }

    /// Convert to the equivalent 4x4 rigid-body matrix.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&math::rotation_matrix(self.roll, self.pitch, self.yaw));
        m.fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&Vector3::new(self.x, self.y, self.z));
        m
    }

    /// The matrix of the inverse transform.
    pub fn inverse_matrix(&self) -> Matrix4<f64> {
        math::inverse_rigid(&self.to_matrix())
    }

    /// Squared norm of the translational part.
    #[inline]
    pub fn translation_norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Squared norm of the rotational part.
    #[inline]
    pub fn rotation_norm_squared(&self) -> f64 {
        self.roll * self.roll + self.pitch * self.pitch + self.yaw * self.yaw
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
