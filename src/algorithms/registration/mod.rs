//! Scan-to-map registration.
//!
//! [`register`] aligns one feature frame against the fused local map
//! by iterative least squares: each iteration gathers point-to-line
//! and point-to-plane correspondences from the per-sensor kernels,
//! accumulates the normal equations and solves for a 6-DoF update.
//!
//! Degeneracy handling follows the source system it reimplements: the
//! eigenvalues of `ATA` are inspected at iteration 0 only, and when
//! any falls below the configured threshold the whole diagonal is
//! ridged by 0.5. Later iterations rebuild `ATA` from scratch without
//! the ridge; the first step escapes the degenerate basin and
//! subsequent linearizations are trusted as-is.

mod kernels;

pub use kernels::PrimitiveSearch;

use nalgebra::{Matrix3, Matrix6, SymmetricEigen, Vector3, Vector6};

use crate::core::math;
use crate::core::types::{FeatureFrame, PointCloud, Transform};

/// Iteration cap for one registration call.
const MAX_ITERATIONS: usize = 30;
/// Squared-norm convergence bound, applied separately to the
/// translational and rotational parts of the update.
const CONVERGENCE_EPS: f64 = 1e-7;
/// Row weight for unstructured solid-scanner points.
const NON_FEATURE_WEIGHT: f32 = 0.5;

/// Which primitive a pairing matches against.
#[derive(Clone, Copy)]
enum Kernel {
    Line,
    Plane,
}

/// One observed sub-cloud paired with its local-map index.
struct Pairing<'a> {
    observed: &'a PointCloud,
    search: &'a PrimitiveSearch,
    kernel: Kernel,
    weight: f32,
}

/// Accumulated normal equations `ATA * delta = ATb`.
struct NormalEquations {
    ata: Matrix6<f32>,
    atb: Vector6<f32>,
    rows: usize,
}

impl Default for NormalEquations {
    fn default() -> Self {
        Self {
            ata: Matrix6::zeros(),
            atb: Vector6::zeros(),
            rows: 0,
        }
    }
}

impl NormalEquations {
    fn add_row(&mut self, jacobian: Vector6<f32>, residual: f32) {
        self.ata += jacobian * jacobian.transpose();
        self.atb -= jacobian * residual;
        self.rows += 1;
    }
}

/// Register `observed` against the fused `local` map.
///
/// Returns the pose of the observed frame relative to the local map's
/// head frame. Never fails: with no usable correspondences the current
/// estimate (initially `initial`) is returned unchanged.
pub fn register(
    observed: &FeatureFrame,
    local: &FeatureFrame,
    degeneracy_threshold: f32,
    initial: Transform,
) -> Transform {
    let spin_lines = build_search(&local.spin.line_features);
    let spin_planes = build_search(&local.spin.plane_features);
    let solid_planes = build_search(&local.solid.plane_features);

    let mut pairings: Vec<Pairing<'_>> = Vec::with_capacity(4);
    add_pairing(&mut pairings, &observed.spin.line_features, &spin_lines, Kernel::Line, 1.0);
    add_pairing(&mut pairings, &observed.spin.plane_features, &spin_planes, Kernel::Plane, 1.0);
    add_pairing(&mut pairings, &observed.solid.plane_features, &solid_planes, Kernel::Plane, 1.0);
    // Unstructured points lean on the same local planes, just softer.
    add_pairing(
        &mut pairings,
        &observed.solid.non_features,
        &solid_planes,
        Kernel::Plane,
        NON_FEATURE_WEIGHT,
    );

    let mut estimate = initial;
    for iteration in 0..MAX_ITERATIONS {
        let system = build_system(&pairings, &estimate);

        if system.rows == 0 {
            log::info!("registration found no correspondences; keeping current estimate");
            return estimate;
        }

        let mut ata = system.ata;
        if iteration == 0 {
            apply_degeneracy_guard(&mut ata, degeneracy_threshold);
        }

        let delta = match ata.qr().solve(&system.atb) {
            Some(delta) => delta,
            None => {
                log::warn!("registration normal equations not solvable; keeping current estimate");
                return estimate;
            }
        };

        estimate.x += delta[0] as f64;
        estimate.y += delta[1] as f64;
        estimate.z += delta[2] as f64;
        estimate.roll += delta[3] as f64;
        estimate.pitch += delta[4] as f64;
        estimate.yaw += delta[5] as f64;

        let delta_xyz =
            (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]) as f64;
        let delta_rpy =
            (delta[3] * delta[3] + delta[4] * delta[4] + delta[5] * delta[5]) as f64;
        if delta_xyz < CONVERGENCE_EPS && delta_rpy < CONVERGENCE_EPS {
            return estimate;
        }
    }

    estimate
}

/// Ridge `ata` when the scene under-constrains the solve.
///
/// `ata` is symmetric positive-semidefinite, so its spectrum is real
/// and a symmetric eigensolver suffices. When any eigenvalue falls
/// below `threshold`, 0.5 is added to every diagonal element; the step
/// stays finite without fabricating signal along the null directions.
/// Returns whether the ridge was applied.
pub(crate) fn apply_degeneracy_guard(ata: &mut Matrix6<f32>, threshold: f32) -> bool {
    let eigen = SymmetricEigen::new(*ata);
    let degenerate = eigen.eigenvalues.iter().any(|&lambda| lambda < threshold);
    if degenerate {
        for i in 0..6 {
            ata[(i, i)] += 0.5;
        }
    }
    degenerate
}

fn build_search(cloud: &Option<PointCloud>) -> Option<PrimitiveSearch> {
    cloud.as_ref().and_then(PrimitiveSearch::new)
}

fn add_pairing<'a>(
    pairings: &mut Vec<Pairing<'a>>,
    observed: &'a Option<PointCloud>,
    search: &'a Option<PrimitiveSearch>,
    kernel: Kernel,
    weight: f32,
) {
    if let (Some(observed), Some(search)) = (observed.as_ref(), search.as_ref()) {
        if !observed.is_empty() {
            pairings.push(Pairing {
                observed,
                search,
                kernel,
                weight,
            });
        }
    }
}

fn build_system(pairings: &[Pairing<'_>], estimate: &Transform) -> NormalEquations {
    let rotation: Matrix3<f32> =
        math::rotation_matrix(estimate.roll, estimate.pitch, estimate.yaw).cast();
    let translation = Vector3::new(estimate.x as f32, estimate.y as f32, estimate.z as f32);
    let derivatives: [Matrix3<f32>; 3] =
        math::rotation_derivatives(estimate.roll, estimate.pitch, estimate.yaw)
            .map(|d| d.cast());

    let mut system = NormalEquations::default();
    for pairing in pairings {
        for point in pairing.observed.iter() {
            let p = Vector3::new(point.x, point.y, point.z);
            let q = rotation * p + translation;

            let matched = match pairing.kernel {
                Kernel::Line => pairing.search.line_residual(&q),
                Kernel::Plane => pairing.search.plane_residual(&q),
            };
            let Some((normal, residual)) = matched else {
                continue;
            };

            let jacobian = Vector6::new(
                normal.x,
                normal.y,
                normal.z,
                normal.dot(&(derivatives[0] * p)),
                normal.dot(&(derivatives[1] * p)),
                normal.dot(&(derivatives[2] * p)),
            ) * pairing.weight;
            system.add_row(jacobian, pairing.weight * residual);
        }
    }
    system
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Point;
    use approx::assert_relative_eq;

    /// Plane patches on three orthogonal walls plus one corner line.
    fn structured_frame() -> FeatureFrame {
        let mut plane = PointCloud::new();
        for i in 0..12 {
            for j in 0..12 {
                let (a, b) = (i as f32 * 0.25 - 1.5, j as f32 * 0.25 - 1.5);
                plane.push(Point::new(4.0, a, b)); // wall x = 4
                plane.push(Point::new(a, 4.0, b)); // wall y = 4
                plane.push(Point::new(a, b, -1.0)); // floor z = -1
            }
        }
        let line: PointCloud = (0..15)
            .map(|i| Point::new(4.0, 4.0, i as f32 * 0.2 - 1.5))
            .collect();

        let mut solid_plane = PointCloud::new();
        let mut solid_non = PointCloud::new();
        for i in 0..11 {
            for j in 0..11 {
                let (a, b) = (i as f32 * 0.27 - 1.35, j as f32 * 0.27 - 1.35);
                solid_plane.push(Point::new(4.0, a, b));
                // Offset sampling of the same wall: matched against the
                // local plane cloud at reduced weight.
                solid_non.push(Point::new(4.0, a + 0.1, b + 0.1));
            }
        }

        FeatureFrame {
            spin: crate::core::types::FeatureObjects {
                line_features: Some(line),
                plane_features: Some(plane),
                non_features: None,
            },
            solid: crate::core::types::FeatureObjects {
                line_features: None,
                plane_features: Some(solid_plane),
                non_features: Some(solid_non),
            },
        }
    }

    /// Observe `frame` from a sensor displaced by `pose`: every point
    /// moves by the inverse transform.
    fn observe_from(frame: &FeatureFrame, pose: &Transform) -> FeatureFrame {
        let inverse = pose.inverse_matrix();
        let map = |cloud: &Option<PointCloud>| cloud.as_ref().map(|c| c.transformed(&inverse));
        FeatureFrame {
            spin: crate::core::types::FeatureObjects {
                line_features: map(&frame.spin.line_features),
                plane_features: map(&frame.spin.plane_features),
                non_features: None,
            },
            solid: crate::core::types::FeatureObjects {
                line_features: None,
                plane_features: map(&frame.solid.plane_features),
                non_features: map(&frame.solid.non_features),
            },
        }
    }

    #[test]
    fn test_identity_registration() {
        let frame = structured_frame();
        let result = register(&frame, &frame, 10.0, Transform::identity());
        assert!(result.translation_norm_squared() < 1e-6);
        assert!(result.rotation_norm_squared() < 1e-6);
    }

    #[test]
    fn test_recovers_translation() {
        let local = structured_frame();
        let truth = Transform::new(0.3, -0.2, 0.1, 0.0, 0.0, 0.0);
        let observed = observe_from(&local, &truth);

        let result = register(&observed, &local, 10.0, Transform::identity());
        assert_relative_eq!(result.x, truth.x, epsilon = 1e-3);
        assert_relative_eq!(result.y, truth.y, epsilon = 1e-3);
        assert_relative_eq!(result.z, truth.z, epsilon = 1e-3);
    }

    #[test]
    fn test_recovers_translation_under_noise() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let local = structured_frame();
        let truth = Transform::new(0.25, -0.15, 0.05, 0.0, 0.0, 0.0);
        let mut observed = observe_from(&local, &truth);

        // 5 mm of sensor noise on the observed plane points.
        if let Some(cloud) = observed.spin.plane_features.as_mut() {
            for p in cloud.points.iter_mut() {
                p.x += rng.gen_range(-0.005..0.005);
                p.y += rng.gen_range(-0.005..0.005);
                p.z += rng.gen_range(-0.005..0.005);
            }
        }

        let result = register(&observed, &local, 10.0, Transform::identity());
        assert_relative_eq!(result.x, truth.x, epsilon = 0.01);
        assert_relative_eq!(result.y, truth.y, epsilon = 0.01);
        assert_relative_eq!(result.z, truth.z, epsilon = 0.01);
    }

    #[test]
    fn test_recovers_rotation_and_translation() {
        let local = structured_frame();
        let truth = Transform::new(0.2, 0.1, -0.05, 0.01, -0.02, 0.04);
        let observed = observe_from(&local, &truth);

        let result = register(&observed, &local, 10.0, Transform::identity());
        assert_relative_eq!(result.x, truth.x, epsilon = 5e-3);
        assert_relative_eq!(result.y, truth.y, epsilon = 5e-3);
        assert_relative_eq!(result.z, truth.z, epsilon = 5e-3);
        assert_relative_eq!(result.yaw, truth.yaw, epsilon = 5e-3);
    }

    #[test]
    fn test_initial_guess_is_used() {
        let local = structured_frame();
        let truth = Transform::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let observed = observe_from(&local, &truth);

        // A good initial guess keeps the solve inside the
        // correspondence gate even for a large motion.
        let guess = Transform::new(0.9, 0.0, 0.0, 0.0, 0.0, 0.0);
        let result = register(&observed, &local, 10.0, guess);
        assert_relative_eq!(result.x, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_no_correspondences_returns_initial() {
        let empty = FeatureFrame::default();
        let guess = Transform::new(0.5, 0.5, 0.5, 0.1, 0.1, 0.1);
        let result = register(&empty, &empty, 10.0, guess);
        assert_eq!(result, guess);
    }

    #[test]
    fn test_degenerate_scene_stays_finite() {
        // A single plane constrains only 3 of 6 DoF.
        let mut plane = PointCloud::new();
        for i in 0..12 {
            for j in 0..12 {
                plane.push(Point::new(
                    i as f32 * 0.3 - 1.8,
                    j as f32 * 0.3 - 1.8,
                    1.0,
                ));
            }
        }
        let frame = FeatureFrame {
            spin: crate::core::types::FeatureObjects {
                line_features: None,
                plane_features: Some(plane),
                non_features: None,
            },
            solid: Default::default(),
        };

        let result = register(&frame, &frame, 10.0, Transform::identity());
        for value in [
            result.x,
            result.y,
            result.z,
            result.roll,
            result.pitch,
            result.yaw,
        ] {
            assert!(value.is_finite());
            assert!(value.abs() < 1.0, "runaway step: {value}");
        }
    }

    #[test]
    fn test_degeneracy_guard_ridges_diagonal() {
        // Rank-deficient system: only the x axis is observed.
        let mut ata = Matrix6::zeros();
        ata[(0, 0)] = 100.0;
        assert!(apply_degeneracy_guard(&mut ata, 10.0));
        assert_relative_eq!(ata[(0, 0)], 100.5);
        for i in 1..6 {
            assert_relative_eq!(ata[(i, i)], 0.5);
        }
    }

    #[test]
    fn test_degeneracy_guard_leaves_healthy_system() {
        let mut ata = Matrix6::identity() * 50.0;
        assert!(!apply_degeneracy_guard(&mut ata, 10.0));
        assert_relative_eq!(ata[(0, 0)], 50.0);
    }
}
