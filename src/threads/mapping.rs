//! Mapping stage.
//!
//! Consumes feature events, runs the odometry core, and publishes
//! value-copied snapshots (pose, global clouds, trajectory, loop
//! markers) through the [`MappingOutput`] sink on its own thread. The
//! drain epilogue writes the TUM trajectory dump when configured.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nalgebra::Matrix4;

use crate::config::PipelineConfig;
use crate::core::types::{LoopMarker, PointCloud, TrajectoryPose};
use crate::engine::{LoopClosure, Odometry};
use crate::error::{Result, TandemError};
use crate::io::{trajectory, SyncedQueue};
use crate::threads::feature::FeatureEvent;

/// Egress sink for the mapping worker.
///
/// All methods are invoked on the mapping thread with snapshots the
/// sink may copy out; implementations must not block for long.
pub trait MappingOutput: Send {
    /// Rigid transform map -> spin sensor for the current frame.
    fn publish_pose(&mut self, time: f64, pose: &Matrix4<f64>);

    /// Raw clouds of the current frame expressed in the map frame.
    fn publish_clouds(&mut self, time: f64, spin: &PointCloud, solid: &PointCloud);

    /// The trajectory after this frame, in insertion order.
    fn publish_trajectory(&mut self, trajectory: &[TrajectoryPose]);

    /// Loop-edge segments; only called when non-empty.
    fn publish_loop_markers(&mut self, markers: &[LoopMarker]);
}

/// Cloneable enqueue handle for the mapping queue.
#[derive(Clone)]
pub struct MappingHandle {
    queue: Arc<SyncedQueue<FeatureEvent>>,
}

impl MappingHandle {
    /// Enqueue one feature event (the feature-delegate target).
    pub fn push(&self, event: FeatureEvent) {
        self.queue.push(event);
    }
}

/// Handle to the mapping worker.
pub struct MappingStage {
    queue: Arc<SyncedQueue<FeatureEvent>>,
    should_stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MappingStage {
    /// Spawn the worker. The loop module is optional; without one the
    /// pipeline runs pure odometry.
    pub fn spawn(
        config: &PipelineConfig,
        loop_module: Option<Box<dyn LoopClosure>>,
        output: Box<dyn MappingOutput>,
    ) -> Result<Self> {
        let extrinsic_inverse = config.sensors.extrinsic_transform()?.inverse_matrix();
        let config = config.clone();

        let queue = Arc::new(SyncedQueue::new());
        let should_stop = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new()
            .name("mapping".into())
            .spawn({
                let queue = Arc::clone(&queue);
                let should_stop = Arc::clone(&should_stop);
                move || worker(&queue, &should_stop, config, extrinsic_inverse, loop_module, output)
            })
            .map_err(|e| TandemError::Thread(e.to_string()))?;

        Ok(Self {
            queue,
            should_stop,
            handle: Some(handle),
        })
    }

    /// A cloneable handle feeding this stage's queue.
    pub fn handle(&self) -> MappingHandle {
        MappingHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Stop the worker, run its drain epilogue and join it.
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

impl Drop for MappingStage {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn worker(
    queue: &SyncedQueue<FeatureEvent>,
    should_stop: &AtomicBool,
    config: PipelineConfig,
    extrinsic_inverse: Matrix4<f64>,
    loop_module: Option<Box<dyn LoopClosure>>,
    mut output: Box<dyn MappingOutput>,
) {
    let mut odometry = Odometry::new(&config, loop_module);
    let save_path = config.output.mapping_save_path.clone();
    log::info!("mapping stage started (save path: {:?})", save_path);

    loop {
        let batch = queue.acquire(|| should_stop.load(Ordering::Acquire));
        if batch.is_empty() {
            break;
        }
        for event in batch {
            if should_stop.load(Ordering::Acquire) {
                break;
            }

            let message = &event.message;
            let Some(pose) = odometry.mapping(&message.spin_cloud, &event.frame, message.time)
            else {
                continue;
            };

            let spin_global = message.spin_cloud.transformed(&pose);
            let solid_global = message.solid_cloud.transformed(&(pose * extrinsic_inverse));
            output.publish_clouds(message.time, &spin_global, &solid_global);
            output.publish_pose(message.time, &pose);
            output.publish_trajectory(odometry.trajectory());
            if !odometry.loop_markers().is_empty() {
                output.publish_loop_markers(odometry.loop_markers());
            }
        }
    }

    if !save_path.is_empty() {
        if odometry.trajectory().is_empty() {
            log::info!("no trajectory to save");
        } else {
            match trajectory::save_tum(Path::new(&save_path), odometry.trajectory()) {
                Ok(path) => log::info!(
                    "saved {} poses to {}",
                    odometry.trajectory().len(),
                    path.display()
                ),
                Err(e) => log::error!("trajectory save failed: {}", e),
            }
        }
    }

    log::info!("mapping stage stopped");
}
