//! Sliding-window odometry core.
//!
//! Owns the keyframe ring, carries the previous incremental pose as
//! the next initial guess, decides keyframe promotion by per-axis
//! motion thresholds, and hands accepted keyframes to loop closure.

use nalgebra::Matrix4;
use thiserror::Error;

use crate::algorithms::registration::register;
use crate::config::{KeyframeConfig, PipelineConfig};
use crate::core::types::{
    FeatureFrame, FeatureObjects, LoopMarker, PointCloud, TrajectoryPose, Transform,
};
use crate::engine::local_map::LocalMap;
use crate::engine::loop_closure::{LoopAdapter, LoopClosure};

/// Why a frame was skipped. Recoverable: the pipeline logs and moves
/// on to the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameRejection {
    #[error("spin features not enough")]
    SpinFeatures,
    #[error("solid features not enough")]
    SolidFeatures,
}

/// Minimum feature counts a present sub-cloud must reach before the
/// solver is asked to work with it.
fn feature_ok(objects: &FeatureObjects) -> bool {
    if let Some(lines) = &objects.line_features {
        if lines.len() < 10 {
            return false;
        }
    }
    if let Some(planes) = &objects.plane_features {
        if planes.len() < 100 {
            return false;
        }
    }
    if let Some(non) = &objects.non_features {
        if non.len() < 100 {
            return false;
        }
    }
    true
}

/// Sliding-window odometry state.
pub struct Odometry {
    local_maps: LocalMap,
    next_initial_guess: Transform,
    trajectory: Vec<TrajectoryPose>,
    degeneracy_threshold: f32,
    keyframe: KeyframeConfig,
    loop_adapter: Option<LoopAdapter>,
}

impl Odometry {
    /// Create the odometry core. The loop module is consulted only
    /// when loop closure is enabled in the configuration.
    pub fn new(config: &PipelineConfig, loop_module: Option<Box<dyn LoopClosure>>) -> Self {
        let loop_adapter = if config.loop_closure.enable {
            loop_module.map(|module| LoopAdapter::new(module, &config.loop_closure))
        } else {
            None
        };
        Self {
            local_maps: LocalMap::new(),
            next_initial_guess: Transform::identity(),
            trajectory: Vec::new(),
            degeneracy_threshold: config.registration.degeneracy_threshold,
            keyframe: config.keyframe.clone(),
            loop_adapter,
        }
    }

    /// Register a frame against the fused local map.
    ///
    /// Returns the incremental pose of the frame relative to the
    /// current head, not a world pose. The first accepted frame seeds
    /// the ring at the identity.
    pub fn update(&mut self, frame: &FeatureFrame) -> Result<Transform, FrameRejection> {
        if !feature_ok(&frame.spin) {
            return Err(FrameRejection::SpinFeatures);
        }
        if !feature_ok(&frame.solid) {
            return Err(FrameRejection::SolidFeatures);
        }

        if self.local_maps.is_empty() {
            self.local_maps.push(frame.clone(), Matrix4::identity());
            return Ok(Transform::identity());
        }

        let threshold = self.degeneracy_threshold;
        let guess = self.next_initial_guess;
        let fused = self.local_maps.get_local_map();
        let tr = register(frame, fused, threshold, guess);
        self.next_initial_guess = tr;
        Ok(tr)
    }

    /// Process one frame end to end: register, gate, promote, loop.
    ///
    /// Returns the world pose of the frame, or `None` when the frame
    /// was rejected. A pose below every keyframe threshold is returned
    /// without mutating the window (interpolated pose only).
    pub fn mapping(
        &mut self,
        spin_cloud: &PointCloud,
        frame: &FeatureFrame,
        time: f64,
    ) -> Option<Matrix4<f64>> {
        let seeded = self.local_maps.is_empty();
        let tr = match self.update(frame) {
            Ok(tr) => tr,
            Err(reason) => {
                log::info!("frame dropped: {}", reason);
                return None;
            }
        };

        let pose = self.local_maps.tr() * tr.to_matrix();

        if seeded {
            self.trajectory.push(TrajectoryPose { time, pose });
            return Some(pose);
        }

        if self.below_keyframe_thresholds(&tr) {
            return Some(pose);
        }

        self.local_maps.push(frame.clone(), pose);
        self.trajectory.push(TrajectoryPose { time, pose });

        if let Some(adapter) = self.loop_adapter.as_mut() {
            let corrected = adapter.apply(
                spin_cloud,
                &frame.spin,
                &pose,
                &mut self.local_maps,
                &mut self.trajectory,
            );
            return Some(corrected);
        }
        Some(pose)
    }

    fn below_keyframe_thresholds(&self, tr: &Transform) -> bool {
        tr.x.abs() < self.keyframe.x
            && tr.y.abs() < self.keyframe.y
            && tr.z.abs() < self.keyframe.z
            && tr.roll.abs() < self.keyframe.roll
            && tr.pitch.abs() < self.keyframe.pitch
            && tr.yaw.abs() < self.keyframe.yaw
    }

    /// Accepted keyframe poses in insertion order.
    pub fn trajectory(&self) -> &[TrajectoryPose] {
        &self.trajectory
    }

    /// Number of keyframes currently in the sliding window.
    pub fn window_len(&self) -> usize {
        self.local_maps.len()
    }

    /// Loop markers for visualization (empty without a module).
    pub fn loop_markers(&self) -> &[LoopMarker] {
        self.loop_adapter.as_ref().map_or(&[], LoopAdapter::markers)
    }
}
