//! Sliding window of recent keyframes.
//!
//! A fixed-capacity ring holds the last [`WINDOW_SIZE`] keyframes
//! together with their world poses. The fused local map — every
//! entry's features expressed in the coordinate frame of the current
//! head — is built lazily and memoized; any mutation (a push or a
//! retroactive pose rewrite from loop closure) invalidates it.

use nalgebra::Matrix4;

use crate::core::math;
use crate::core::types::{FeatureFrame, PointCloud};

/// Number of keyframes retained in the ring.
pub const WINDOW_SIZE: usize = 20;

struct Entry {
    frame: FeatureFrame,
    pose: Matrix4<f64>,
}

/// Keyframe ring with a memoized fused map.
pub struct LocalMap {
    entries: Vec<Option<Entry>>,
    head: usize,
    count: usize,
    fused: Option<FeatureFrame>,
}

impl LocalMap {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self {
            entries: (0..WINDOW_SIZE).map(|_| None).collect(),
            head: WINDOW_SIZE - 1,
            count: 0,
            fused: None,
        }
    }

    /// Number of valid entries (at most [`WINDOW_SIZE`]).
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the ring holds no keyframes.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Insert a keyframe at the new head, overwriting the oldest slot
    /// once the ring is full. Invalidates the fused map.
    pub fn push(&mut self, frame: FeatureFrame, pose: Matrix4<f64>) {
        self.head = (self.head + 1) % WINDOW_SIZE;
        if self.count < WINDOW_SIZE {
            self.count += 1;
        }
        self.entries[self.head] = Some(Entry { frame, pose });
        self.fused = None;
    }

    /// World pose of the head keyframe.
    ///
    /// # Panics
    /// Panics when the ring is empty.
    pub fn tr(&self) -> Matrix4<f64> {
        assert!(self.count > 0, "tr() requires a non-empty local map");
        match &self.entries[self.head] {
            Some(entry) => entry.pose,
            None => unreachable!("head entry exists while count > 0"),
        }
    }

    /// Rewrite the pose `back_index` steps before the head (1 names
    /// the head itself). Feature payloads are untouched; the fused map
    /// is invalidated. Used by loop closure.
    ///
    /// # Panics
    /// Panics unless `1 <= back_index <= len()`.
    pub fn set(&mut self, back_index: usize, pose: Matrix4<f64>) {
        let slot = self.slot_at_back(back_index);
        match &mut self.entries[slot] {
            Some(entry) => entry.pose = pose,
            None => unreachable!("back-indexed entry exists while back_index <= count"),
        }
        self.fused = None;
    }

    /// World pose `back_index` steps before the head.
    ///
    /// # Panics
    /// Panics unless `1 <= back_index <= len()`.
    pub fn pose_at_back(&self, back_index: usize) -> Matrix4<f64> {
        match &self.entries[self.slot_at_back(back_index)] {
            Some(entry) => entry.pose,
            None => unreachable!("back-indexed entry exists while back_index <= count"),
        }
    }

    /// The fused local map: the union of all entries expressed in the
    /// head frame (the head's own points pass through the identity).
    /// Memoized until the next mutation.
    pub fn get_local_map(&mut self) -> &FeatureFrame {
        if self.fused.is_none() {
            self.fused = Some(self.fuse());
        }
        self.fused.as_ref().unwrap()
    }

    /// Map a back index onto a ring slot.
    ///
    /// Valid slots are `0..count` while filling (the first push lands
    /// on slot 0) and the whole ring once full, so the wrap arm adds
    /// `count` rather than `WINDOW_SIZE`.
    fn slot_at_back(&self, back_index: usize) -> usize {
        assert!(
            back_index >= 1 && back_index <= self.count,
            "back_index {} outside 1..={}",
            back_index,
            self.count
        );
        if back_index <= self.head + 1 {
            self.head + 1 - back_index
        } else {
            self.count + self.head + 1 - back_index
        }
    }

    fn fuse(&self) -> FeatureFrame {
        assert!(self.count > 0, "cannot fuse an empty local map");
        let head_inverse = math::inverse_rigid(&self.tr());

        let mut fused = FeatureFrame::default();
        for slot in 0..self.count {
            let entry = match &self.entries[slot] {
                Some(entry) => entry,
                None => unreachable!("slots 0..count are always occupied"),
            };
            let relative = head_inverse * entry.pose;
            accumulate(
                &mut fused.spin.line_features,
                &entry.frame.spin.line_features,
                &relative,
            );
            accumulate(
                &mut fused.spin.plane_features,
                &entry.frame.spin.plane_features,
                &relative,
            );
            accumulate(
                &mut fused.solid.plane_features,
                &entry.frame.solid.plane_features,
                &relative,
            );
            accumulate(
                &mut fused.solid.non_features,
                &entry.frame.solid.non_features,
                &relative,
            );
        }
        fused
    }
}

impl Default for LocalMap {
    fn default() -> Self {
        Self::new()
    }
}

fn accumulate(dst: &mut Option<PointCloud>, src: &Option<PointCloud>, m: &Matrix4<f64>) {
    if let Some(src) = src {
        dst.get_or_insert_with(PointCloud::new)
            .extend_transformed(src, m);
    }
}
