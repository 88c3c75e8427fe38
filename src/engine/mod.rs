//! Orchestration layer: the keyframe window, the odometry core and
//! the loop-closure adapter.

pub mod local_map;
pub mod loop_closure;
pub mod odometry;

pub use local_map::{LocalMap, WINDOW_SIZE};
pub use loop_closure::{LoopAdapter, LoopClosure};
pub use odometry::{FrameRejection, Odometry};
