//! Core value types.

mod frame;
mod point;
mod transform;

pub use frame::{FeatureFrame, FeatureObjects, LoopEdge, LoopMarker, SyncedMessage, TrajectoryPose};
pub use point::{Point, PointCloud};
pub use transform::Transform;
