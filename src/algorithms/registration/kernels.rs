//! Correspondence kernels: nearest-primitive search over a local-map
//! sub-cloud.
//!
//! Each kernel is a pure function of the query point and the indexed
//! sub-cloud: it finds the nearest neighbors, fits the geometric
//! primitive (line or plane), and emits the residual together with its
//! gradient direction. One accepted correspondence becomes one row of
//! the linearized system.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};

use crate::core::types::PointCloud;

/// Neighbors fetched per query for primitive fitting.
const NEIGHBORS: usize = 5;
/// Squared distance gate on the nearest neighbor (m^2).
const MAX_CORRESPONDENCE_DIST_SQ: f32 = 5.0;
/// A neighbor set is line-like when the principal eigenvalue dominates
/// the middle one by this factor.
const LINE_EIGEN_RATIO: f32 = 3.0;
/// Every support point must sit within this distance of the fitted
/// plane (m).
const PLANE_FIT_TOLERANCE: f32 = 0.2;

/// K-d tree index over one local-map sub-cloud.
pub struct PrimitiveSearch {
    points: Vec<Vector3<f32>>,
    tree: KdTree<f32, 3>,
}

impl PrimitiveSearch {
    /// Index a sub-cloud. Returns `None` when the cloud is too small
    /// to support primitive fitting.
    pub fn new(cloud: &PointCloud) -> Option<Self> {
        if cloud.len() < NEIGHBORS {
            return None;
        }
        let mut tree: KdTree<f32, 3> = KdTree::new();
        let mut points = Vec::with_capacity(cloud.len());
        for (i, p) in cloud.iter().enumerate() {
            tree.add(&[p.x, p.y, p.z], i as u64);
            points.push(Vector3::new(p.x, p.y, p.z));
        }
        Some(Self { points, tree })
    }

    fn neighbors(&self, query: &Vector3<f32>) -> Option<[Vector3<f32>; NEIGHBORS]> {
        let found = self
            .tree
            .nearest_n::<SquaredEuclidean>(&[query.x, query.y, query.z], NEIGHBORS);
        if found.len() < NEIGHBORS || found[0].distance > MAX_CORRESPONDENCE_DIST_SQ {
            return None;
        }
        let mut out = [Vector3::zeros(); NEIGHBORS];
        for (slot, neighbor) in out.iter_mut().zip(found.iter()) {
            *slot = self.points[neighbor.item as usize];
        }
        Some(out)
    }

    /// Point-to-line correspondence.
    ///
    /// Fits a line through the neighbor set by covariance
    /// eigen-decomposition; accepted when the set is sufficiently
    /// elongated. Returns the residual gradient direction and the
    /// point-to-line distance.
    pub fn line_residual(&self, query: &Vector3<f32>) -> Option<(Vector3<f32>, f32)> {
        let neighbors = self.neighbors(query)?;

        let mut centroid = Vector3::zeros();
        for p in &neighbors {
            centroid += p;
        }
        centroid /= NEIGHBORS as f32;

        let mut covariance = Matrix3::zeros();
        for p in &neighbors {
            let d = p - centroid;
            covariance += d * d.transpose();
        }

        let eigen = SymmetricEigen::new(covariance);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap()
        });
        let (major, middle) = (order[0], order[1]);
        if eigen.eigenvalues[major] < LINE_EIGEN_RATIO * eigen.eigenvalues[middle].max(1e-9) {
            return None;
        }

        let direction: Vector3<f32> = eigen.eigenvectors.column(major).into_owned();
        let moment = (query - centroid).cross(&direction);
        let distance = moment.norm();
        if distance < 1e-6 {
            // On the line: zero residual with an undefined gradient.
            return None;
        }
        Some((direction.cross(&(moment / distance)), distance))
    }

    /// Point-to-plane correspondence.
    ///
    /// Fits `n . p = -1` to the neighbor set by a 3x3 normal-equation
    /// solve and rejects fits any support point strays from. Returns
    /// the unit normal and the signed point-to-plane distance.
    pub fn plane_residual(&self, query: &Vector3<f32>) -> Option<(Vector3<f32>, f32)> {
        let neighbors = self.neighbors(query)?;

        let mut m = Matrix3::zeros();
        let mut rhs = Vector3::zeros();
        for p in &neighbors {
            m += p * p.transpose();
            rhs -= p;
        }
        let raw = m.try_inverse()? * rhs;
        let norm = raw.norm();
        if norm < 1e-6 {
            return None;
        }
        let normal = raw / norm;
        let offset = 1.0 / norm;

        for p in &neighbors {
            if (normal.dot(p) + offset).abs() > PLANE_FIT_TOLERANCE {
                return None;
            }
        }
        Some((normal, normal.dot(query) + offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Point;
    use approx::assert_relative_eq;

    fn line_cloud() -> PointCloud {
        (0..20)
            .map(|i| Point::new(i as f32 * 0.1, 1.0, 2.0))
            .collect()
    }

    fn plane_cloud() -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..10 {
            for j in 0..10 {
                cloud.push(Point::new(i as f32 * 0.2, j as f32 * 0.2, 1.5));
            }
        }
        cloud
    }

    #[test]
    fn test_too_small_cloud_rejected() {
        let cloud: PointCloud = (0..3).map(|i| Point::new(i as f32, 0.0, 0.0)).collect();
        assert!(PrimitiveSearch::new(&cloud).is_none());
    }

    #[test]
    fn test_line_residual_distance() {
        let search = PrimitiveSearch::new(&line_cloud()).unwrap();
        // 0.5 m off the line along +z.
        let (gradient, distance) = search
            .line_residual(&Vector3::new(0.5, 1.0, 2.5))
            .unwrap();
        assert_relative_eq!(distance, 0.5, epsilon = 1e-5);
        // Gradient points from the line toward the query.
        assert_relative_eq!(gradient.z.abs(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(gradient.x.abs(), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_line_residual_rejects_planar_set() {
        let search = PrimitiveSearch::new(&plane_cloud()).unwrap();
        assert!(search.line_residual(&Vector3::new(1.0, 1.0, 1.6)).is_none());
    }

    #[test]
    fn test_plane_residual_signed_distance() {
        let search = PrimitiveSearch::new(&plane_cloud()).unwrap();
        let (normal, above) = search
            .plane_residual(&Vector3::new(1.0, 1.0, 1.6))
            .unwrap();
        let (_, below) = search
            .plane_residual(&Vector3::new(1.0, 1.0, 1.4))
            .unwrap();
        assert_relative_eq!(normal.z.abs(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(above.abs(), 0.1, epsilon = 1e-4);
        // Opposite sides of the plane have opposite signs.
        assert!(above * below < 0.0);
    }

    #[test]
    fn test_distance_gate() {
        let search = PrimitiveSearch::new(&plane_cloud()).unwrap();
        assert!(search
            .plane_residual(&Vector3::new(50.0, 50.0, 1.5))
            .is_none());
    }
}
