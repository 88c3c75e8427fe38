//! Core algorithms: feature extraction and scan-to-map registration.

pub mod features;
pub mod registration;
