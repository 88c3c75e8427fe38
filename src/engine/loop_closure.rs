//! Loop-closure integration.
//!
//! The detector itself (descriptor matching, ICP verification, pose
//! graph relaxation) is an external collaborator behind the
//! [`LoopClosure`] trait. The [`LoopAdapter`] owns the trait object
//! and applies its corrections: rewriting the keyframe ring and the
//! past trajectory, and rebuilding the visualization edge list.

use nalgebra::Matrix4;

use crate::config::LoopConfig;
use crate::core::types::{FeatureObjects, LoopEdge, LoopMarker, PointCloud, TrajectoryPose};
use crate::engine::local_map::LocalMap;

/// Contract of the external loop-closure module.
pub trait LoopClosure: Send {
    /// Receive the forwarded loop settings before the first frame.
    fn configure(&mut self, params: &LoopConfig);

    /// Inspect a new keyframe. Returns the first trajectory index
    /// whose pose changed, or 0 when nothing changed.
    fn loop_detection(
        &mut self,
        cloud: &PointCloud,
        spin_features: &FeatureObjects,
        pose: &Matrix4<f64>,
    ) -> usize;

    /// Corrected pose `back_index` steps before the current head
    /// (1 names the head).
    fn btr(&self, back_index: usize) -> Matrix4<f64>;

    /// Corrected world pose at a global trajectory index.
    fn tr(&self, index: usize) -> Matrix4<f64>;

    /// Currently known loop edges.
    fn edges(&self) -> Vec<LoopEdge>;
}

/// Applies loop-module corrections to the odometry state.
pub struct LoopAdapter {
    module: Box<dyn LoopClosure>,
    edges: Vec<LoopEdge>,
    markers: Vec<LoopMarker>,
}

impl LoopAdapter {
    /// Wrap a loop module, forwarding the configured parameters.
    pub fn new(mut module: Box<dyn LoopClosure>, params: &LoopConfig) -> Self {
        module.configure(params);
        Self {
            module,
            edges: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Loop edges from the last detection.
    pub fn edges(&self) -> &[LoopEdge] {
        &self.edges
    }

    /// World-space edge segments for visualization.
    pub fn markers(&self) -> &[LoopMarker] {
        &self.markers
    }

    /// Feed one accepted keyframe to the module and apply any global
    /// correction it reports. Returns the (possibly corrected) pose of
    /// the current frame.
    pub fn apply(
        &mut self,
        cloud: &PointCloud,
        spin_features: &FeatureObjects,
        pose: &Matrix4<f64>,
        local_maps: &mut LocalMap,
        trajectory: &mut [TrajectoryPose],
    ) -> Matrix4<f64> {
        let first_changed = self.module.loop_detection(cloud, spin_features, pose);
        if first_changed == 0 {
            return *pose;
        }

        log::info!(
            "loop closure rewrites trajectory from index {}",
            first_changed
        );

        for back_index in 1..=local_maps.len() {
            local_maps.set(back_index, self.module.btr(back_index));
        }
        for index in first_changed..trajectory.len() {
            trajectory[index].pose = self.module.tr(index);
        }

        self.edges = self.module.edges();
        self.markers = self
            .edges
            .iter()
            .map(|edge| LoopMarker {
                from: translation(&self.module.tr(edge.source_kf)),
                to: translation(&self.module.tr(edge.target_kf)),
            })
            .collect();

        self.module.btr(1)
    }
}

fn translation(m: &Matrix4<f64>) -> [f64; 3] {
    [m[(0, 3)], m[(1, 3)], m[(2, 3)]]
}
