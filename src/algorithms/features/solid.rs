//! Feature extraction for the solid-state scanner.
//!
//! The non-repetitive pattern has no ring structure, so the cloud is
//! treated as one scan sequence. Smooth stretches become plane
//! features; everything else lands in the unstructured `non` class.
//! The scanner produces no line class.

use crate::core::types::{FeatureObjects, Point, PointCloud};

/// Half-width of the smoothness window.
const CURVATURE_WINDOW: usize = 2;
/// Maximum curvature for a plane point; sharper returns become `non`.
const PLANE_MAX_CURVATURE: f32 = 0.05;
/// Returns closer than this are inside the scanner blind zone.
const MIN_RANGE: f32 = 1.0;

/// Extract plane and non features from one solid-state cloud.
pub fn extract(cloud: &PointCloud) -> FeatureObjects {
    let valid: Vec<&Point> = cloud
        .iter()
        .filter(|p| {
            p.range_squared() >= MIN_RANGE * MIN_RANGE
                && p.x.is_finite()
                && p.y.is_finite()
                && p.z.is_finite()
        })
        .collect();

    let mut plane = PointCloud::new();
    let mut non = PointCloud::new();

    let n = valid.len();
    if n >= 2 * CURVATURE_WINDOW + 1 {
        for i in CURVATURE_WINDOW..n - CURVATURE_WINDOW {
            let p = valid[i];
            let (mut dx, mut dy, mut dz) = (0.0f32, 0.0f32, 0.0f32);
            for j in 1..=CURVATURE_WINDOW {
                let a = valid[i - j];
                let b = valid[i + j];
                dx += a.x + b.x - 2.0 * p.x;
                dy += a.y + b.y - 2.0 * p.y;
                dz += a.z + b.z - 2.0 * p.z;
            }
            let curvature = dx * dx + dy * dy + dz * dz;
            if curvature < PLANE_MAX_CURVATURE {
                plane.push(*p);
            } else {
                non.push(*p);
            }
        }
    }

    FeatureObjects {
        line_features: None,
        plane_features: Some(plane),
        non_features: Some(non),
    }
}
