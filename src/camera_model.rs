//! Camera model: linear pixel scale and principal point.
//!
//! Maps detected pixel positions to camera-frame unit vectors through a
//! pinhole (gnomonic) projection around the optical axis.
//!
//! # Coordinate conventions
//!
//! - **Pixel coordinates**: origin at the top-left corner, +X right, +Y down.
//! - **Camera frame**: +X right, +Y down, +Z along the optical axis.
//!
//! # Pipeline
//!
//! ```text
//! pixel → subtract principal point → divide by f → (ξ, η, 1) → normalize
//! unit vector → divide by z → multiply by f → add principal point → pixel
//! ```

use serde::{Deserialize, Serialize};

use crate::Vector3;

/// Research-setup scaling factor (pixels per degree).
pub const DEFAULT_SCALING_FACTOR: f64 = 18.18;

/// Camera intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Linear pixel-to-angle scale: pixels per degree of offset at the optical axis.
    pub scaling_factor: f64,
    /// Pixel position of the optical axis `[x, y]`, normally the image center.
    pub principal_point: [f64; 2],
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            scaling_factor: DEFAULT_SCALING_FACTOR,
            principal_point: [0.0, 0.0],
        }
    }
}

impl CameraModel {
    pub fn new(scaling_factor: f64, principal_point: [f64; 2]) -> Self {
        Self {
            scaling_factor,
            principal_point,
        }
    }

    /// Camera model with the principal point at the center of a `width` x `height` image.
    pub fn centered(scaling_factor: f64, image_width: u32, image_height: u32) -> Self {
        Self::new(
            scaling_factor,
            [image_width as f64 / 2.0, image_height as f64 / 2.0],
        )
    }

    /// Whether the model can project points at all.
    pub fn is_valid(&self) -> bool {
        self.scaling_factor.is_finite()
            && self.scaling_factor > 0.0
            && self.principal_point.iter().all(|c| c.is_finite())
    }

    /// Focal length in pixels: `scaling_factor * 180 / π`.
    pub fn focal_length_px(&self) -> f64 {
        self.scaling_factor.to_degrees()
    }

    /// Convert pixel coordinates to tangent-plane coordinates (radians at the axis).
    pub fn pixel_to_tanplane(&self, px: f64, py: f64) -> (f64, f64) {
        let f = self.focal_length_px();
        (
            (px - self.principal_point[0]) / f,
            (py - self.principal_point[1]) / f,
        )
    }

    /// Convert tangent-plane coordinates to pixel coordinates.
    pub fn tanplane_to_pixel(&self, xi: f64, eta: f64) -> (f64, f64) {
        let f = self.focal_length_px();
        (
            xi * f + self.principal_point[0],
            eta * f + self.principal_point[1],
        )
    }

    /// Camera-frame unit vector for a pixel position.
    pub fn pixel_to_uvec(&self, px: f64, py: f64) -> Vector3 {
        let (xi, eta) = self.pixel_to_tanplane(px, py);
        Vector3::new(xi, eta, 1.0).normalize()
    }

    /// Pixel position for a camera-frame direction.
    ///
    /// Returns `None` for directions at or behind the image plane.
    pub fn uvec_to_pixel(&self, v: &Vector3) -> Option<(f64, f64)> {
        if v.z <= 0.0 {
            return None;
        }
        Some(self.tanplane_to_pixel(v.x / v.z, v.y / v.z))
    }
}
