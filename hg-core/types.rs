#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interest point as reported by a detector. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
    pub octave: i32,
    pub class_id: i32,
}

impl Keypoint {
    /// Keypoint at `(x, y)` with every other field at its detector-neutral value.
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            size: 1.0,
            angle: -1.0,
            response: 0.0,
            octave: 0,
            class_id: -1,
        }
    }

    /// Location in double precision, the form the geometry code works in.
    pub fn pt(&self) -> [f64; 2] {
        [self.x as f64, self.y as f64]
    }
}

/// Fixed-length real-valued descriptor, compared only by distance.
pub type Descriptor = Vec<f32>;

/// Object keypoint `object_index` matched to scene keypoint `scene_index`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correspondence {
    pub object_index: usize,
    pub scene_index: usize,
    /// Euclidean descriptor distance at match time
    pub distance: f32,
}

impl Correspondence {
    pub fn new(object_index: usize, scene_index: usize, distance: f32) -> Self {
        Self {
            object_index,
            scene_index,
            distance,
        }
    }
}
