//! Star Pattern Hash Table (SPHT) and the identification engine built on it.
//!
//! 1. **Indexing**: every unordered pair of catalog-subset stars is hashed by
//!    its quantized angular separation into a bucket of candidate pairs.
//! 2. **Identification**: every pair of detected stars is hashed the same way;
//!    the matching bucket and its two neighbors supply candidate catalog pairs,
//!    which vote on the identity of each detection. Triangle consensus
//!    resolves which star of a candidate pair belongs to which detection.

pub mod hasher;
pub mod identify;
pub mod indexer;
pub mod store;

use std::collections::BTreeMap;
use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::camera_model::CameraModel;
use crate::{IdentifiedStar, SphtError, SphtResult};

/// Quantized angular-separation bucket.
pub type HashKey = u32;

// ── Quantization step ───────────────────────────────────────────────────────

/// Bucket width used to discretize angular separation (the `al_parameter`).
///
/// Stored in degrees; `1.0` means one-degree buckets.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct QuantizationStep {
    degrees: f64,
}

impl QuantizationStep {
    pub fn from_degrees(degrees: f64) -> SphtResult<Self> {
        if !degrees.is_finite() || degrees <= 0.0 {
            return Err(SphtError::validation(format!(
                "quantization step must be a positive finite angle, got {}",
                degrees
            )));
        }
        Ok(Self { degrees })
    }

    pub fn from_radians(radians: f64) -> SphtResult<Self> {
        Self::from_degrees(radians.to_degrees())
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    pub fn radians(&self) -> f64 {
        self.degrees.to_radians()
    }

    /// Whether two steps describe the same bucketing.
    pub fn matches(&self, other: &QuantizationStep) -> bool {
        (self.degrees - other.degrees).abs() <= STEP_MATCH_TOLERANCE_DEG
    }
}

impl Default for QuantizationStep {
    fn default() -> Self {
        Self { degrees: 1.0 }
    }
}

impl fmt::Display for QuantizationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees)
    }
}

const STEP_MATCH_TOLERANCE_DEG: f64 = 1e-12;

// ── The index ───────────────────────────────────────────────────────────────

/// One candidate catalog pair. `id_a` precedes `id_b` in the catalog order
/// the index was built from.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct StarPair {
    pub id_a: u64,
    pub id_b: u64,
    /// Angular separation in radians.
    pub distance_rad: f64,
}

impl StarPair {
    /// The pair's ids in ascending order; identifies the unordered pair.
    pub fn unordered_ids(&self) -> (u64, u64) {
        if self.id_a <= self.id_b {
            (self.id_a, self.id_b)
        } else {
            (self.id_b, self.id_a)
        }
    }
}

/// Immutable star pattern hash table.
///
/// Built once (or loaded from a snapshot) and then shared read-only across
/// any number of concurrent identification calls.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Spht {
    step: QuantizationStep,
    buckets: BTreeMap<HashKey, Vec<StarPair>>,
}

impl Spht {
    pub(crate) fn from_buckets(
        step: QuantizationStep,
        buckets: BTreeMap<HashKey, Vec<StarPair>>,
    ) -> Self {
        Self { step, buckets }
    }

    /// An index with no pairs. Identification against it always reports
    /// [`NoMatchReason::IndexUnavailable`].
    pub fn empty(step: QuantizationStep) -> Self {
        Self::from_buckets(step, BTreeMap::new())
    }

    pub fn quantization_step(&self) -> QuantizationStep {
        self.step
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn num_pairs(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Largest bucket occupancy; a rough measure of matching ambiguity.
    pub fn max_bucket_len(&self) -> usize {
        self.buckets.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Pairs stored under `key`, in insertion order.
    pub fn bucket(&self, key: HashKey) -> &[StarPair] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All non-empty buckets in ascending key order.
    pub fn buckets(&self) -> impl Iterator<Item = (HashKey, &[StarPair])> + '_ {
        self.buckets.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Pairs in bucket `key` and its immediate neighbors, ascending by key.
    pub fn candidates_near(&self, key: HashKey) -> impl Iterator<Item = &StarPair> + '_ {
        self.buckets
            .range(hasher::neighbor_keys(key))
            .flat_map(|(_, pairs)| pairs.iter())
    }
}

// ── Configuration for index building ────────────────────────────────────────

/// Parameters controlling index construction.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Bucket width. Default 1°.
    pub quantization_step: QuantizationStep,
    /// Upper bound on catalog subset size; build cost is quadratic in it.
    /// Default 2000.
    pub max_catalog_stars: usize,
    /// Abort the build after this many milliseconds. None = no limit.
    pub timeout_ms: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            quantization_step: QuantizationStep::default(),
            max_catalog_stars: 2000,
            timeout_ms: None,
        }
    }
}

// ── Configuration for identification ────────────────────────────────────────

/// Parameters for a single identification call.
#[derive(Debug, Clone)]
pub struct IdentifyConfig {
    /// Pixel-to-direction mapping.
    pub camera: CameraModel,
    /// Bucket width the caller expects; must match the index.
    pub quantization_step: QuantizationStep,
    /// Only the first `max_detected_stars` detections are used. Default 32.
    pub max_detected_stars: usize,
    /// Triangle consensus runs over this many leading detections; the rest
    /// are resolved against them. Values below 3 act as 3. Default 12.
    pub max_consensus_stars: usize,
    /// Upper bound on triangle hypotheses examined per call. Default 5,000,000.
    pub max_consensus_work: usize,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            camera: CameraModel::default(),
            quantization_step: QuantizationStep::default(),
            max_detected_stars: 32,
            max_consensus_stars: 12,
            max_consensus_work: 5_000_000,
        }
    }
}

impl IdentifyConfig {
    /// Configuration for an image of the given size, principal point at its center.
    pub fn new(
        scaling_factor: f64,
        quantization_step: QuantizationStep,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self {
            camera: CameraModel::centered(scaling_factor, image_width, image_height),
            quantization_step,
            ..Default::default()
        }
    }
}

// ── Identification result ───────────────────────────────────────────────────

/// Why an identification produced no stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    /// Fewer than two usable detections.
    InsufficientInput,
    /// The index holds no pairs.
    IndexUnavailable,
    /// The camera scaling factor or principal point is not usable.
    InvalidCamera,
    /// The requested quantization step differs from the one the index was built with.
    StepMismatch,
    /// The requested quantization step is not a positive finite angle.
    InvalidStep,
    /// Candidates were examined but no detection collected any votes.
    NoMatch,
}

impl NoMatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoMatchReason::InsufficientInput => "insufficient input",
            NoMatchReason::IndexUnavailable => "index unavailable",
            NoMatchReason::InvalidCamera => "invalid camera model",
            NoMatchReason::StepMismatch => "quantization step mismatch",
            NoMatchReason::InvalidStep => "invalid quantization step",
            NoMatchReason::NoMatch => "no match",
        }
    }
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work done by one identification call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentifyStats {
    /// Catalog pairs retrieved for the consensus detections.
    pub candidate_pairs: usize,
    /// Detection triangles evaluated.
    pub triangles: usize,
    /// Triangle hypotheses examined; never exceeds `max_consensus_work`.
    pub hypotheses: usize,
    /// Anchor lookups for detections past the consensus prefix.
    pub anchor_lookups: usize,
    /// Whether triangle consensus stopped on its work budget.
    pub budget_exhausted: bool,
}

/// Outcome of an identification call.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    /// Identified detections, ordered by detected-star index.
    pub stars: Vec<IdentifiedStar>,
    /// Populated only when `stars` is empty.
    pub reason: Option<NoMatchReason>,
    pub stats: IdentifyStats,
}

impl Identification {
    pub(crate) fn failure(reason: NoMatchReason) -> Self {
        Self {
            stars: Vec::new(),
            reason: Some(reason),
            stats: IdentifyStats::default(),
        }
    }

    pub(crate) fn from_stars(stars: Vec<IdentifiedStar>, stats: IdentifyStats) -> Self {
        let reason = stars.is_empty().then_some(NoMatchReason::NoMatch);
        Self {
            stars,
            reason,
            stats,
        }
    }

    /// Catalog id assigned to a given detection, if any.
    pub fn catalog_id_for(&self, detected_index: usize) -> Option<u64> {
        self.stars
            .iter()
            .find(|s| s.detected_index == detected_index)
            .map(|s| s.catalog_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_validation() {
        assert!(QuantizationStep::from_degrees(1.0).is_ok());
        assert!(matches!(
            QuantizationStep::from_degrees(0.0),
            Err(SphtError::Validation(_))
        ));
        assert!(QuantizationStep::from_degrees(-0.5).is_err());
        assert!(QuantizationStep::from_degrees(f64::NAN).is_err());
        assert!(QuantizationStep::from_radians(f64::INFINITY).is_err());
    }

    #[test]
    fn test_step_units() {
        let step = QuantizationStep::from_radians(std::f64::consts::PI / 180.0).unwrap();
        assert!((step.degrees() - 1.0).abs() < 1e-12);
        assert!(step.matches(&QuantizationStep::default()));
        assert!(!step.matches(&QuantizationStep::from_degrees(0.5).unwrap()));
    }

    #[test]
    fn test_candidates_near_includes_neighbors() {
        let step = QuantizationStep::default();
        let pair = |a, b, d: f64| StarPair {
            id_a: a,
            id_b: b,
            distance_rad: d.to_radians(),
        };
        let mut buckets = BTreeMap::new();
        buckets.insert(3, vec![pair(1, 2, 3.5)]);
        buckets.insert(4, vec![pair(1, 3, 4.2), pair(2, 3, 4.9)]);
        buckets.insert(5, vec![pair(3, 4, 5.1)]);
        buckets.insert(7, vec![pair(1, 4, 7.7)]);
        let spht = Spht::from_buckets(step, buckets);

        let ids: Vec<(u64, u64)> = spht.candidates_near(4).map(|p| (p.id_a, p.id_b)).collect();
        assert_eq!(ids, vec![(1, 2), (1, 3), (2, 3), (3, 4)]);
        assert_eq!(spht.candidates_near(0).count(), 0);
        assert_eq!(spht.candidates_near(8).count(), 1);
        assert_eq!(spht.num_pairs(), 5);
        assert_eq!(spht.num_buckets(), 4);
        assert_eq!(spht.max_bucket_len(), 2);
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(NoMatchReason::InsufficientInput.to_string(), "insufficient input");
        assert_eq!(NoMatchReason::IndexUnavailable.to_string(), "index unavailable");
        assert_eq!(NoMatchReason::InvalidStep.to_string(), "invalid quantization step");
        let r = Identification::from_stars(Vec::new(), IdentifyStats::default());
        assert_eq!(r.reason, Some(NoMatchReason::NoMatch));
    }
}
