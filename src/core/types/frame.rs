//! Frame-level types flowing through the pipeline.

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use super::point::PointCloud;

/// Feature sub-clouds produced by one sensor for one frame.
///
/// `None` means "this sensor does not produce this class" — distinct
/// from `Some(empty)`, which means "produced nothing this frame" and
/// gets the frame dropped upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureObjects {
    /// Sharp edge points matched against lines in the local map.
    pub line_features: Option<PointCloud>,
    /// Flat points matched against planes in the local map.
    pub plane_features: Option<PointCloud>,
    /// Unstructured points, matched against planes at reduced weight.
    pub non_features: Option<PointCloud>,
}

impl FeatureObjects {
    /// Point count of a sub-cloud, treating an absent cloud as 0.
    pub fn count(cloud: &Option<PointCloud>) -> usize {
        cloud.as_ref().map_or(0, |c| c.len())
    }
}

/// Features from both sensors at one synchronized capture instant.
///
/// Per-sensor conventions: the spinning scanner fills `line` + `plane`;
/// the solid-state scanner fills `plane` + `non`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub spin: FeatureObjects,
    pub solid: FeatureObjects,
}

/// A time-synchronized pair of raw clouds from the upstream driver.
///
/// Passes through the pipeline unchanged so the mapping stage can
/// publish the full-resolution clouds in the map frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncedMessage {
    /// Capture timestamp in seconds.
    pub time: f64,
    /// Raw cloud from the spinning scanner (its frame is the pipeline
    /// reference frame).
    pub spin_cloud: PointCloud,
    /// Raw cloud from the solid-state scanner, in its own frame.
    pub solid_cloud: PointCloud,
}

/// One trajectory entry: the world pose of an accepted keyframe.
#[derive(Debug, Clone)]
pub struct TrajectoryPose {
    /// Capture timestamp in seconds.
    pub time: f64,
    /// World-from-sensor rigid transform.
    pub pose: Matrix4<f64>,
}

/// A detected loop between two keyframes, by trajectory index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopEdge {
    pub source_kf: usize,
    pub target_kf: usize,
}

/// A renderable loop edge: world-space segment endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopMarker {
    pub from: [f64; 3],
    pub to: [f64; 3],
}
