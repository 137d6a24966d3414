use serde::{Deserialize, Serialize};

use crate::Vector3;

/// A catalog star used for pattern indexing.
///
/// RA & Dec are in radians (J2000). The magnitude is only carried through for
/// display and subset selection; identification is purely geometric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    /// Catalog number (HR number for the Bright Star Catalogue).
    pub id: u64,
    pub ra_rad: f64,
    pub dec_rad: f64,
    pub mag: f32,
    /// Proper name, if the catalog has one.
    pub name: Option<String>,
}

impl StarRecord {
    /// Unit vector pointing to the star's position on the celestial sphere.
    pub fn uvec(&self) -> Vector3 {
        radec_to_uvec(self.ra_rad, self.dec_rad)
    }

    /// Proper name, falling back to `"HR <id>"`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(n) if !n.is_empty() => n.clone(),
            _ => format!("HR {}", self.id),
        }
    }
}

/// Unit vector for a (RA, Dec) direction in radians.
pub fn radec_to_uvec(ra_rad: f64, dec_rad: f64) -> Vector3 {
    let (sin_ra, cos_ra) = ra_rad.sin_cos();
    let (sin_dec, cos_dec) = dec_rad.sin_cos();
    Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
}
