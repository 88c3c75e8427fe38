//! Feature-extraction stage.
//!
//! Consumes synchronized sensor messages from its queue, runs the
//! per-sensor kernels, drops under-featured frames, moves the
//! solid-state sub-clouds into the spinning-scanner frame, and emits
//! `(message, features)` pairs to the registered delegates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nalgebra::Matrix4;

use crate::algorithms::features;
use crate::config::{PipelineConfig, SensorConfig};
use crate::core::types::{FeatureFrame, FeatureObjects, SyncedMessage};
use crate::error::{Result, TandemError};
use crate::io::{Fanout, SyncedQueue};

/// Stage minimum for spin line features.
const MIN_SPIN_LINES: usize = 20;
/// Stage minimum for spin plane features.
const MIN_SPIN_PLANES: usize = 100;

/// Output of the feature stage: the original message plus its
/// extracted features.
#[derive(Clone)]
pub struct FeatureEvent {
    pub message: SyncedMessage,
    pub frame: FeatureFrame,
}

/// Handle to the feature-extraction worker.
pub struct FeatureStage {
    queue: Arc<SyncedQueue<SyncedMessage>>,
    should_stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FeatureStage {
    /// Spawn the worker. `downstream` must already carry every
    /// consumer; it is moved into the worker and cannot change later.
    pub fn spawn(config: &PipelineConfig, downstream: Fanout<FeatureEvent>) -> Result<Self> {
        let sensors = config.sensors.clone();
        let extrinsic = sensors.extrinsic_transform()?;
        log::info!(
            "solid-to-spin extrinsic: {} {} {} {} {} {}",
            extrinsic.x,
            extrinsic.y,
            extrinsic.z,
            extrinsic.roll,
            extrinsic.pitch,
            extrinsic.yaw
        );
        let extrinsic_inverse = extrinsic.inverse_matrix();

        let queue = Arc::new(SyncedQueue::new());
        let should_stop = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new()
            .name("features".into())
            .spawn({
                let queue = Arc::clone(&queue);
                let should_stop = Arc::clone(&should_stop);
                move || worker(&queue, &should_stop, &sensors, &extrinsic_inverse, &downstream)
            })
            .map_err(|e| TandemError::Thread(e.to_string()))?;

        Ok(Self {
            queue,
            should_stop,
            handle: Some(handle),
        })
    }

    /// Enqueue a synchronized message (the upstream delegate target).
    pub fn push(&self, message: SyncedMessage) {
        self.queue.push(message);
    }

    /// Stop the worker and wait for it to drain.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.should_stop.store(true, Ordering::Release);
            self.queue.notify();
            handle.join().ok();
        }
    }
}

impl Drop for FeatureStage {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn worker(
    queue: &SyncedQueue<SyncedMessage>,
    should_stop: &AtomicBool,
    sensors: &SensorConfig,
    extrinsic_inverse: &Matrix4<f64>,
    downstream: &Fanout<FeatureEvent>,
) {
    log::info!("feature stage started");
    loop {
        let batch = queue.acquire(|| should_stop.load(Ordering::Acquire));
        if batch.is_empty() {
            break;
        }
        for message in batch {
            if should_stop.load(Ordering::Acquire) {
                break;
            }
            if let Some(frame) = extract(&message, sensors, extrinsic_inverse) {
                downstream.emit(&FeatureEvent { message, frame });
            }
        }
    }
    log::info!("feature stage stopped");
}

/// Run the enabled kernels on one message. `None` drops the frame.
fn extract(
    message: &SyncedMessage,
    sensors: &SensorConfig,
    extrinsic_inverse: &Matrix4<f64>,
) -> Option<FeatureFrame> {
    let mut frame = FeatureFrame::default();

    if sensors.use_spin {
        frame.spin = features::spin::extract(&message.spin_cloud);
        let lines = FeatureObjects::count(&frame.spin.line_features);
        let planes = FeatureObjects::count(&frame.spin.plane_features);
        if lines < MIN_SPIN_LINES || planes < MIN_SPIN_PLANES {
            log::info!("spin features not enough ({lines} lines, {planes} planes)");
            return None;
        }
    }

    if sensors.use_solid {
        frame.solid = features::solid::extract(&message.solid_cloud);
        let planes = FeatureObjects::count(&frame.solid.plane_features);
        let non = FeatureObjects::count(&frame.solid.non_features);
        if planes == 0 || non == 0 {
            log::info!("solid features empty ({planes} planes, {non} non)");
            return None;
        }
        // Express the solid sub-clouds in the spinning-scanner frame.
        if let Some(cloud) = frame.solid.plane_features.take() {
            frame.solid.plane_features = Some(cloud.transformed(extrinsic_inverse));
        }
        if let Some(cloud) = frame.solid.non_features.take() {
            frame.solid.non_features = Some(cloud.transformed(extrinsic_inverse));
        }
    }

    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Point;

    fn sensors(use_spin: bool, use_solid: bool) -> SensorConfig {
        SensorConfig {
            use_spin,
            use_solid,
            extrinsic: vec![0.0; 6],
        }
    }

    #[test]
    fn test_sparse_spin_cloud_dropped() {
        let message = SyncedMessage {
            time: 0.0,
            spin_cloud: (0..30).map(|i| Point::new(i as f32, 0.0, 0.0)).collect(),
            solid_cloud: Default::default(),
        };
        let out = extract(&message, &sensors(true, false), &Matrix4::identity());
        assert!(out.is_none());
    }

    /// Raster sweep over a folded wall: yields both plane and non
    /// features, so the stage keeps the frame.
    fn folded_solid_cloud() -> crate::core::types::PointCloud {
        let mut solid_cloud = crate::core::types::PointCloud::new();
        for row in 0..20 {
            let z = -0.5 + row as f32 * 0.05;
            for step in 0..180 {
                let azimuth = (step as f32 - 90.0).to_radians();
                let (s, c) = azimuth.sin_cos();
                let range = if azimuth < std::f32::consts::FRAC_PI_4 {
                    5.0 / c
                } else {
                    5.0 / s
                };
                solid_cloud.push(Point::new(range * c, range * s, z));
            }
        }
        solid_cloud
    }

    #[test]
    fn test_solid_only_frame_keeps_spin_absent() {
        let message = SyncedMessage {
            time: 0.0,
            spin_cloud: Default::default(),
            solid_cloud: folded_solid_cloud(),
        };
        let out = extract(&message, &sensors(false, true), &Matrix4::identity()).unwrap();
        assert!(out.spin.line_features.is_none());
        assert!(out.spin.plane_features.is_none());
        assert!(out.solid.plane_features.is_some());
        assert!(out.solid.non_features.is_some());
    }

    #[test]
    fn test_extrinsic_applied_to_solid_clouds() {
        let message = SyncedMessage {
            time: 0.0,
            spin_cloud: Default::default(),
            solid_cloud: folded_solid_cloud(),
        };

        // The inverse extrinsic shifts every solid point by -10 m in z.
        let extrinsic_inverse =
            crate::core::types::Transform::new(0.0, 0.0, 10.0, 0.0, 0.0, 0.0).inverse_matrix();
        let out = extract(&message, &sensors(false, true), &extrinsic_inverse).unwrap();

        let zs: Vec<f32> = out
            .solid
            .plane_features
            .iter()
            .chain(out.solid.non_features.iter())
            .flat_map(|c| c.iter().map(|p| p.z))
            .collect();
        assert!(!zs.is_empty());
        for z in zs {
            assert!(z < -5.0, "point not moved by extrinsic inverse: {z}");
        }
    }
}
