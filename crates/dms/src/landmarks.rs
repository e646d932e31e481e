//! Normalized landmark representation
//!
//! Inference backends convert whatever they produce into these types once;
//! geometry code only ever sees normalized image coordinates in [0, 1].

use serde::{Deserialize, Serialize};

/// A single landmark in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Relative depth, same scale as `x`
    pub z: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in 3D
    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// Euclidean distance in the image plane
    pub fn distance_2d(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Face mesh indices used by geometry extraction (478-point mesh with irises)
pub mod face_index {
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const CHIN: usize = 152;
    pub const LEFT_CHEEK: usize = 234;
    pub const RIGHT_CHEEK: usize = 454;

    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const LEFT_EYE_UPPER: usize = 159;
    pub const LEFT_EYE_LOWER: usize = 145;

    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_UPPER: usize = 386;
    pub const RIGHT_EYE_LOWER: usize = 374;

    pub const LEFT_IRIS_CENTER: usize = 468;
    pub const RIGHT_IRIS_CENTER: usize = 473;

    /// Full mesh size including iris points
    pub const MESH_SIZE: usize = 478;
}

/// Body pose indices (33-point upper/full body model)
pub mod pose_index {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;

    pub const POSE_SIZE: usize = 33;
}

/// Face mesh for one detected face
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceLandmarks {
    points: Vec<Landmark>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether iris points are present (refined mesh)
    pub fn has_iris(&self) -> bool {
        self.points.len() > face_index::RIGHT_IRIS_CENTER
    }

    /// Overwrite a single point, growing the mesh if needed
    pub fn set(&mut self, index: usize, landmark: Landmark) {
        if index >= self.points.len() {
            self.points.resize(index + 1, Landmark::default());
        }
        self.points[index] = landmark;
    }
}

/// Body pose for one detected person
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseLandmarks {
    points: Vec<Landmark>,
}

impl PoseLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        if index >= self.points.len() {
            self.points.resize(index + 1, Landmark::default());
        }
        self.points[index] = landmark;
    }
}
