//! Point and point-cloud types shared by both sensors.

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// A single LiDAR return.
///
/// `ring` is the laser channel index on the spinning scanner (the
/// solid-state scanner reports 0) and `time_offset` is the capture
/// offset in seconds relative to the frame timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate in meters (sensor frame)
    pub x: f32,
    /// Y coordinate in meters (sensor frame)
    pub y: f32,
    /// Z coordinate in meters (sensor frame)
    pub z: f32,
    /// Return intensity (sensor units)
    pub intensity: f32,
    /// Laser ring index
    pub ring: u16,
    /// Offset from frame timestamp in seconds
    pub time_offset: f32,
}

impl Point {
    /// Create a point with zero intensity on ring 0.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            intensity: 0.0,
            ring: 0,
            time_offset: 0.0,
        }
    }

    /// Squared distance from the sensor origin.
    #[inline]
    pub fn range_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
}

/// An ordered, owned point cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Point>,
}

impl PointCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create an empty cloud with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the cloud holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point.
    #[inline]
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Iterate over points.
    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Return a copy of this cloud with every point moved by a rigid
    /// transform. Intensity, ring and time offset are preserved.
    pub fn transformed(&self, m: &Matrix4<f64>) -> PointCloud {
        let mut out = PointCloud::with_capacity(self.len());
        out.extend_transformed(self, m);
        out
    }

    /// Append every point of `other`, moved by a rigid transform.
    pub fn extend_transformed(&mut self, other: &PointCloud, m: &Matrix4<f64>) {
        let r = m.fixed_view::<3, 3>(0, 0).into_owned();
        let t = m.fixed_view::<3, 1>(0, 3).into_owned();
        self.points.reserve(other.len());
        for p in other.iter() {
            let v = nalgebra::Vector3::new(p.x as f64, p.y as f64, p.z as f64);
            let w = r * v + t;
            self.points.push(Point {
                x: w.x as f32,
                y: w.y as f32,
                z: w.z as f32,
                ..*p
            });
        }
    }
}

impl FromIterator<Point> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
