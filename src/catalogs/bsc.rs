//! Yale Bright Star Catalogue (BSC5) records in JSON form.
//!
//! The JSON rendition of the catalog is an array of objects whose fields are
//! all strings, e.g.
//!
//! ```json
//! { "B": "α", "N": "Dubhe", "C": "UMa", "Dec": "+61° 45′ 03″", "F": "50",
//!   "HR": "4301", "K": "5000", "RA": "11h 03m 43.7s", "V": "1.79" }
//! ```
//!
//! Only `HR`, `RA`, `Dec`, `V` and the optional proper name `N` are used.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::StarRecord;

/// A raw BSC record as it appears in the JSON catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BscRecord {
    #[serde(rename = "HR")]
    pub hr: Option<String>,
    #[serde(rename = "N")]
    pub name: Option<String>,
    #[serde(rename = "RA")]
    pub ra: Option<String>,
    #[serde(rename = "Dec")]
    pub dec: Option<String>,
    #[serde(rename = "V")]
    pub vmag: Option<String>,
}

/// Pull the numeric fields out of a sexagesimal string such as
/// `"11h 03m 43.7s"` or `"+61° 45′ 03″"`.
fn sexagesimal_fields(s: &str) -> Option<[f64; 3]> {
    let mut fields = [0.0f64; 3];
    let mut n = 0;
    for token in s
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|t| !t.is_empty())
    {
        if n == 3 {
            return None;
        }
        fields[n] = token.parse().ok()?;
        n += 1;
    }
    if n == 3 {
        Some(fields)
    } else {
        None
    }
}

/// Parse right ascension in `"HHh MMm SS.Ss"` form into radians.
pub fn parse_ra_hms(s: &str) -> Option<f64> {
    let [h, m, sec] = sexagesimal_fields(s)?;
    if h >= 24.0 || m >= 60.0 || sec >= 60.0 {
        return None;
    }
    let hours = h + m / 60.0 + sec / 3600.0;
    Some((hours * 15.0).to_radians())
}

/// Parse declination in `"±DD° MM′ SS″"` form into radians.
pub fn parse_dec_dms(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let sign = if trimmed.starts_with('-') || trimmed.starts_with('\u{2212}') {
        -1.0
    } else {
        1.0
    };
    let [d, m, sec] = sexagesimal_fields(trimmed)?;
    if m >= 60.0 || sec >= 60.0 {
        return None;
    }
    let deg = d + m / 60.0 + sec / 3600.0;
    if deg > 90.0 {
        return None;
    }
    Some((sign * deg).to_radians())
}

/// Convert a raw record into a [`StarRecord`].
///
/// Returns `None` when the HR number, position, or magnitude is missing or malformed.
pub fn star_from_bsc(record: &BscRecord) -> Option<StarRecord> {
    let id: u64 = record.hr.as_deref()?.trim().parse().ok()?;
    let ra_rad = parse_ra_hms(record.ra.as_deref()?)?;
    let dec_rad = parse_dec_dms(record.dec.as_deref()?)?;
    let mag: f32 = record.vmag.as_deref()?.trim().parse().ok()?;
    let name = record
        .name
        .as_ref()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    Some(StarRecord {
        id,
        ra_rad,
        dec_rad,
        mag,
        name,
    })
}

/// Load the catalog from an in-memory JSON document.
///
/// Records that cannot be converted are skipped.
pub fn load_bsc_catalog(json: &str) -> anyhow::Result<Vec<StarRecord>> {
    let records: Vec<BscRecord> = serde_json::from_str(json)?;
    let total = records.len();
    let stars: Vec<StarRecord> = records.iter().filter_map(star_from_bsc).collect();
    if stars.len() < total {
        debug!("Skipped {} unusable BSC records", total - stars.len());
    }
    Ok(stars)
}

pub fn load_bsc_catalog_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<StarRecord>> {
    let data = std::fs::read_to_string(path.as_ref())?;
    let stars = load_bsc_catalog(&data)?;
    info!(
        "Loaded {} BSC stars from {}",
        stars.len(),
        path.as_ref().display()
    );
    Ok(stars)
}
