//! Per-sensor feature extraction kernels.
//!
//! Each kernel is a pure function from one raw cloud to a set of
//! optional feature sub-clouds. An absent sub-cloud means the sensor
//! never produces that class; an empty one means this frame produced
//! nothing and should be dropped by the caller.

pub mod solid;
pub mod spin;
