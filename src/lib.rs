//! TandemSLAM - dual-LiDAR odometry and mapping.
//!
//! Consumes time-synchronized point clouds from a spinning multi-line
//! scanner and a solid-state scanner, and produces a 6-DoF trajectory
//! plus per-frame global clouds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   threads/                          │  ← Stage workers + wiring
//! │          (FeatureStage, MappingStage)               │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │        (local map, odometry, loop closure)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │          (feature extraction, registration)         │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                 core/ + io/                         │  ← Foundation
//! │        (types, math, queue, fan-out, dumps)         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Data flow
//!
//! The sensor-sync layer feeds [`Pipeline::ingest`]. The feature
//! worker turns raw clouds into line/plane/non feature sub-clouds per
//! sensor and drops under-featured frames. The mapping worker
//! registers each feature frame against a 20-keyframe sliding window,
//! promotes keyframes by per-axis motion thresholds, consults the
//! loop-closure module, and publishes poses, global clouds and loop
//! markers through a [`MappingOutput`] sink. On shutdown the
//! trajectory is dumped in TUM format.

// ============================================================================
// Layer 1: Foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: I/O infrastructure (queue, fan-out, persistence)
// ============================================================================
pub mod io;

// ============================================================================
// Layer 3: Algorithms (depends on core)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Layer 4: Engine (depends on core, algorithms)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 5: Threads (depends on all layers)
// ============================================================================
pub mod threads;

pub mod config;
pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::types::{
    FeatureFrame, FeatureObjects, LoopEdge, LoopMarker, Point, PointCloud, SyncedMessage,
    TrajectoryPose, Transform,
};

// Configuration
pub use config::{
    KeyframeConfig, LoopConfig, OutputConfig, PipelineConfig, RegistrationConfig, SensorConfig,
};

// Errors
pub use error::{Result, TandemError};

// Engine
pub use engine::{FrameRejection, LocalMap, LoopAdapter, LoopClosure, Odometry, WINDOW_SIZE};

// Algorithms
pub use algorithms::registration::register;

// I/O
pub use io::{Fanout, SyncedQueue};

// Threads
pub use threads::{FeatureEvent, FeatureStage, MappingHandle, MappingOutput, MappingStage, Pipeline};
