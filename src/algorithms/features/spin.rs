//! Feature extraction for the spinning multi-line scanner.
//!
//! Points are bucketed by laser ring in scan order. Local curvature
//! over a ±5 window separates sharp returns (promoted to line
//! features, a few per ring segment) from smooth returns (plane
//! features). The scanner produces no `non` class.

use crate::core::types::{FeatureObjects, PointCloud};

/// Half-width of the curvature window.
const CURVATURE_WINDOW: usize = 5;
/// Angular segments per ring; edge picks are capped per segment so
/// features spread over the full revolution.
const RING_SEGMENTS: usize = 6;
/// Edge picks allowed per segment.
const MAX_EDGES_PER_SEGMENT: usize = 4;
/// Minimum curvature for an edge pick.
const EDGE_MIN_CURVATURE: f32 = 0.1;
/// Maximum curvature for a plane point.
const PLANE_MAX_CURVATURE: f32 = 0.1;

/// Extract line and plane features from one spinning-scanner cloud.
pub fn extract(cloud: &PointCloud) -> FeatureObjects {
    let mut line = PointCloud::new();
    let mut plane = PointCloud::new();

    for ring in bucket_by_ring(cloud) {
        extract_ring(cloud, &ring, &mut line, &mut plane);
    }

    FeatureObjects {
        line_features: Some(line),
        plane_features: Some(plane),
        non_features: None,
    }
}

/// Group point indices by ring, preserving scan order within a ring.
fn bucket_by_ring(cloud: &PointCloud) -> Vec<Vec<usize>> {
    let max_ring = cloud.iter().map(|p| p.ring).max().unwrap_or(0) as usize;
    let mut rings = vec![Vec::new(); max_ring + 1];
    for (i, p) in cloud.iter().enumerate() {
        rings[p.ring as usize].push(i);
    }
    rings.retain(|r| !r.is_empty());
    rings
}

fn extract_ring(cloud: &PointCloud, ring: &[usize], line: &mut PointCloud, plane: &mut PointCloud) {
    let n = ring.len();
    if n < 2 * CURVATURE_WINDOW + 1 {
        return;
    }

    let first = CURVATURE_WINDOW;
    let last = n - CURVATURE_WINDOW; // exclusive
    let mut curvature = vec![0.0f32; n];
    for i in first..last {
        curvature[i] = curvature_at(cloud, ring, i);
    }

    // Edge picks: per segment, the sharpest few above threshold, with
    // in-ring neighbors of each pick suppressed so edges do not clump.
    let mut suppressed = vec![false; n];
    let span = (last - first).div_ceil(RING_SEGMENTS);
    for segment in 0..RING_SEGMENTS {
        let seg_start = first + segment * span;
        let seg_end = (seg_start + span).min(last);
        if seg_start >= seg_end {
            break;
        }

        let mut order: Vec<usize> = (seg_start..seg_end).collect();
        order.sort_by(|&a, &b| curvature[b].partial_cmp(&curvature[a]).unwrap());

        let mut picked = 0;
        for i in order {
            if curvature[i] <= EDGE_MIN_CURVATURE {
                break;
            }
            if suppressed[i] {
                continue;
            }
            line.push(cloud.points[ring[i]]);
            picked += 1;
            let lo = i.saturating_sub(CURVATURE_WINDOW);
            let hi = (i + CURVATURE_WINDOW).min(n - 1);
            for s in &mut suppressed[lo..=hi] {
                *s = true;
            }
            if picked == MAX_EDGES_PER_SEGMENT {
                break;
            }
        }
    }

    for i in first..last {
        if curvature[i] < PLANE_MAX_CURVATURE && !suppressed[i] {
            plane.push(cloud.points[ring[i]]);
        }
    }
}

/// Curvature of the in-ring point at position `i`: squared norm of the
/// summed displacement to its window neighbors.
fn curvature_at(cloud: &PointCloud, ring: &[usize], i: usize) -> f32 {
    let p = cloud.points[ring[i]];
    let (mut dx, mut dy, mut dz) = (0.0f32, 0.0f32, 0.0f32);
    for j in 1..=CURVATURE_WINDOW {
        let a = cloud.points[ring[i - j]];
        let b = cloud.points[ring[i + j]];
        dx += a.x + b.x - 2.0 * p.x;
        dy += a.y + b.y - 2.0 * p.y;
        dz += a.z + b.z - 2.0 * p.z;
    }
    dx * dx + dy * dy + dz * dz
}
