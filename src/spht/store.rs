//! Index persistence.
//!
//! Two encodings carry the same content:
//!
//! - **JSON**: a structured document,
//!   `{"quantizationStep": 1.0, "buckets": [{"hashKey": 5, "pairs": [[4301, 4295, 0.0937], ...]}]}`,
//!   with the step in degrees, distances in radians and buckets in ascending key order.
//! - **rkyv**: a binary snapshot for fast loading.
//!
//! Loading is always checked against the running configuration and catalog:
//! a snapshot built with a different quantization step is a
//! [`SphtError::VersionMismatch`], and one that references stars missing from
//! the catalog (or is otherwise malformed) is [`SphtError::CorruptData`].

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{SphtError, SphtResult, StarRecord};

use super::hasher::key_for_distance;
use super::{HashKey, QuantizationStep, Spht, StarPair};

/// On-disk encoding of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Rkyv,
}

impl SnapshotFormat {
    /// `.json` files are JSON documents; everything else is an rkyv snapshot.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SnapshotFormat::Json,
            _ => SnapshotFormat::Rkyv,
        }
    }
}

// ── JSON document ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SphtDocument {
    /// Degrees.
    quantization_step: f64,
    buckets: Vec<BucketDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketDocument {
    hash_key: HashKey,
    /// `[idA, idB, distance_rad]`
    pairs: Vec<(u64, u64, f64)>,
}

impl From<&Spht> for SphtDocument {
    fn from(spht: &Spht) -> Self {
        SphtDocument {
            quantization_step: spht.step.degrees(),
            buckets: spht
                .buckets
                .iter()
                .map(|(&hash_key, pairs)| BucketDocument {
                    hash_key,
                    pairs: pairs
                        .iter()
                        .map(|p| (p.id_a, p.id_b, p.distance_rad))
                        .collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<SphtDocument> for Spht {
    type Error = SphtError;

    fn try_from(doc: SphtDocument) -> SphtResult<Self> {
        let step = QuantizationStep::from_degrees(doc.quantization_step).map_err(|_| {
            SphtError::corrupt(format!(
                "invalid quantization step {}",
                doc.quantization_step
            ))
        })?;
        let mut buckets = BTreeMap::new();
        for bucket in doc.buckets {
            let pairs: Vec<StarPair> = bucket
                .pairs
                .into_iter()
                .map(|(id_a, id_b, distance_rad)| StarPair {
                    id_a,
                    id_b,
                    distance_rad,
                })
                .collect();
            if buckets.insert(bucket.hash_key, pairs).is_some() {
                return Err(SphtError::corrupt(format!(
                    "bucket {} appears more than once",
                    bucket.hash_key
                )));
            }
        }
        Ok(Spht::from_buckets(step, buckets))
    }
}

// ── Save / load ─────────────────────────────────────────────────────────────

impl Spht {
    /// Encode the index. The quantization step is recorded in the output.
    pub fn save(&self, format: SnapshotFormat) -> SphtResult<Vec<u8>> {
        match format {
            SnapshotFormat::Json => serde_json::to_vec(&SphtDocument::from(self))
                .map_err(|e| SphtError::Encode(e.to_string())),
            SnapshotFormat::Rkyv => rkyv::to_bytes::<rkyv::rancor::Error>(self)
                .map(|bytes| bytes.to_vec())
                .map_err(|e| SphtError::Encode(e.to_string())),
        }
    }

    /// Decode an index and check it against the running step and catalog.
    pub fn load(
        bytes: &[u8],
        format: SnapshotFormat,
        catalog: &[StarRecord],
        expected_step: QuantizationStep,
    ) -> SphtResult<Self> {
        let spht = match format {
            SnapshotFormat::Json => {
                let doc: SphtDocument = serde_json::from_slice(bytes)
                    .map_err(|e| SphtError::corrupt(format!("JSON decode failed: {}", e)))?;
                Spht::try_from(doc)?
            }
            SnapshotFormat::Rkyv => {
                // rkyv needs an aligned buffer; plain file reads are not.
                let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
                aligned.extend_from_slice(bytes);
                let spht = rkyv::from_bytes::<Spht, rkyv::rancor::Error>(&aligned)
                    .map_err(|e| SphtError::corrupt(format!("rkyv decode failed: {}", e)))?;
                // Archived data bypasses the step constructor.
                QuantizationStep::from_degrees(spht.step.degrees()).map_err(|_| {
                    SphtError::corrupt(format!(
                        "invalid quantization step {}",
                        spht.step.degrees()
                    ))
                })?;
                spht
            }
        };

        if !spht.step.matches(&expected_step) {
            return Err(SphtError::VersionMismatch {
                expected: expected_step.degrees(),
                found: spht.step.degrees(),
            });
        }
        spht.check_against_catalog(catalog)?;
        Ok(spht)
    }

    /// Write the index to `path`, format chosen by extension.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SphtResult<()> {
        let path = path.as_ref();
        let bytes = self.save(SnapshotFormat::from_path(path))?;
        std::fs::write(path, &bytes)?;
        info!("Saved SPHT to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Read an index from `path`, format chosen by extension.
    pub fn load_from_file<P: AsRef<Path>>(
        path: P,
        catalog: &[StarRecord],
        expected_step: QuantizationStep,
    ) -> SphtResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let spht = Self::load(&bytes, SnapshotFormat::from_path(path), catalog, expected_step)?;
        info!(
            "Loaded SPHT from {}: {} pairs in {} buckets",
            path.display(),
            spht.num_pairs(),
            spht.num_buckets()
        );
        Ok(spht)
    }

    /// Structural checks on a decoded index.
    fn check_against_catalog(&self, catalog: &[StarRecord]) -> SphtResult<()> {
        let known: HashSet<u64> = catalog.iter().map(|s| s.id).collect();
        let mut seen: HashSet<(u64, u64)> = HashSet::with_capacity(self.num_pairs());

        for (&key, pairs) in &self.buckets {
            for pair in pairs {
                for id in [pair.id_a, pair.id_b] {
                    if !known.contains(&id) {
                        return Err(SphtError::corrupt(format!(
                            "catalog id {} is not in the loaded catalog",
                            id
                        )));
                    }
                }
                if pair.id_a == pair.id_b {
                    return Err(SphtError::corrupt(format!(
                        "pair links catalog id {} to itself",
                        pair.id_a
                    )));
                }
                if !seen.insert(pair.unordered_ids()) {
                    return Err(SphtError::corrupt(format!(
                        "pair ({}, {}) is stored more than once",
                        pair.id_a, pair.id_b
                    )));
                }
                let d = pair.distance_rad;
                if !d.is_finite() || !(0.0..=std::f64::consts::PI).contains(&d) {
                    return Err(SphtError::corrupt(format!(
                        "pair ({}, {}) has invalid distance {}",
                        pair.id_a, pair.id_b, d
                    )));
                }
                let expected = key_for_distance(d, self.step);
                if expected.abs_diff(key) > 1 {
                    return Err(SphtError::corrupt(format!(
                        "pair ({}, {}) filed under bucket {} but its distance hashes to {}",
                        pair.id_a, pair.id_b, key, expected
                    )));
                }
            }
        }
        Ok(())
    }
}
