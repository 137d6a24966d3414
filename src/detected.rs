//! Per-request star types: detections coming in from an upstream star
//! detector and the identifications handed back to the caller.
//!
//! Both only live for the duration of a single identification call.

use serde::{Deserialize, Serialize};

/// A star detection in an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedStar {
    /// Centroid position in pixels along columns. Origin is the top-left
    /// image corner, +X points right.
    pub x: f64,
    /// Centroid position in pixels along rows. +Y points down.
    pub y: f64,
}

impl DetectedStar {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A detection that was assigned a catalog identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedStar {
    /// Index of the detection in the input slice.
    pub detected_index: usize,
    pub x: f64,
    pub y: f64,
    pub catalog_id: u64,
    /// Fraction of this detection's votes that support `catalog_id`, in [0, 1].
    pub confidence: f64,
    /// Number of votes supporting `catalog_id`.
    pub votes: u32,
}
