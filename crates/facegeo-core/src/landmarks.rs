//! Landmark points and the 468-point face mesh topology.
//!
//! Only a fixed subset of mesh indices is ever read. A caller feeding a
//! different topology must remap to these indices first.

use serde::{Deserialize, Serialize};

/// Mesh indices read by the geometry stage.
pub mod topology {
    /// Number of points in the supported face mesh.
    pub const MESH_SIZE: usize = 468;

    pub const CROWN: usize = 10;
    pub const CHIN: usize = 152;
    pub const FOREHEAD_LEFT: usize = 70;
    pub const FOREHEAD_RIGHT: usize = 300;
    pub const TEMPLE_LEFT: usize = 127;
    pub const TEMPLE_RIGHT: usize = 356;
    pub const CHEEKBONE_LEFT: usize = 234;
    pub const CHEEKBONE_RIGHT: usize = 454;
    pub const JAW_ANGLE_LEFT: usize = 172;
    pub const JAW_ANGLE_RIGHT: usize = 397;
    pub const JAW_LEFT: usize = 176;
    pub const JAW_RIGHT: usize = 400;
    pub const GLABELLA: usize = 168;
    pub const NOSE_BASE: usize = 2;
    pub const EYE_OUTER_LEFT: usize = 33;
    pub const EYE_OUTER_RIGHT: usize = 263;
    pub const MOUTH_LEFT: usize = 61;
    pub const MOUTH_RIGHT: usize = 291;
}

/// A single landmark in image-normalized or pixel coordinates.
///
/// `z` is carried for completeness; the geometry stage works in the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar Euclidean distance.
    pub fn distance(&self, other: &Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Positionally indexed landmarks for one face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at a mesh index. Out-of-range indices and non-finite
    /// coordinates both read as absent.
    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied().filter(Point::is_finite)
    }

    /// Overwrite (or extend to) a mesh index.
    pub fn set(&mut self, index: usize, point: Point) {
        if index >= self.points.len() {
            self.points
                .resize(index + 1, Point { x: f64::NAN, y: f64::NAN, z: 0.0 });
        }
        self.points[index] = point;
    }

    /// Copy with every coordinate multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Point { x: p.x * factor, y: p.y * factor, z: p.z * factor })
                .collect(),
        }
    }

    /// Whether the set spans every index of the supported mesh.
    pub fn is_full_mesh(&self) -> bool {
        self.points.len() >= topology::MESH_SIZE
    }
}

impl From<Vec<Point>> for LandmarkSet {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}
