//! Index construction: hash every unordered pair of a catalog subset.
//!
//! Rows of the pair triangle (`i` against every `j > i`) are computed in
//! parallel and collected in row order, so bucket contents come out in catalog
//! enumeration order no matter how many worker threads take part.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::info;

use crate::{SphtError, SphtResult, StarRecord, Vector3};

use super::hasher::{angular_distance, key_for_distance};
use super::{BuildConfig, HashKey, QuantizationStep, Spht, StarPair};

impl Spht {
    /// Build an index over `stars` (at least 2, distinct ids).
    pub fn build(stars: &[StarRecord], config: &BuildConfig) -> SphtResult<Self> {
        let never = AtomicBool::new(false);
        Self::build_with_cancel(stars, config, &never)
    }

    /// Build an index, aborting with [`SphtError::BuildAborted`] as soon as
    /// `cancel` is set or the configured timeout elapses.
    pub fn build_with_cancel(
        stars: &[StarRecord],
        config: &BuildConfig,
        cancel: &AtomicBool,
    ) -> SphtResult<Self> {
        validate_subset(stars, config)?;

        let t0 = Instant::now();
        let step = config.quantization_step;
        let deadline = config.timeout_ms.map(Duration::from_millis);
        let vectors: Vec<Vector3> = stars.iter().map(StarRecord::uvec).collect();
        let n = stars.len();

        info!(
            "Building SPHT over {} stars ({} pairs), step {}",
            n,
            n * (n - 1) / 2,
            step
        );

        let rows: Vec<Option<Vec<(HashKey, StarPair)>>> = (0..n - 1)
            .into_par_iter()
            .map(|i| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                if let Some(limit) = deadline {
                    if t0.elapsed() >= limit {
                        return None;
                    }
                }
                Some(pair_row(stars, &vectors, i, step))
            })
            .collect();

        if rows.iter().any(Option::is_none) {
            let reason = if cancel.load(Ordering::Relaxed) {
                "cancelled".to_string()
            } else {
                format!(
                    "exceeded time budget of {} ms",
                    config.timeout_ms.unwrap_or_default()
                )
            };
            return Err(SphtError::BuildAborted(reason));
        }

        let mut buckets: BTreeMap<HashKey, Vec<StarPair>> = BTreeMap::new();
        for (key, pair) in rows.into_iter().flatten().flatten() {
            buckets.entry(key).or_default().push(pair);
        }

        let spht = Spht::from_buckets(step, buckets);
        info!(
            "Built SPHT: {} pairs in {} buckets (max occupancy {}) in {:.1} ms",
            spht.num_pairs(),
            spht.num_buckets(),
            spht.max_bucket_len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(spht)
    }
}

/// Pairs `(i, j)` for every `j > i`, in order of `j`.
fn pair_row(
    stars: &[StarRecord],
    vectors: &[Vector3],
    i: usize,
    step: QuantizationStep,
) -> Vec<(HashKey, StarPair)> {
    ((i + 1)..stars.len())
        .map(|j| {
            let distance_rad = angular_distance(&vectors[i], &vectors[j]);
            (
                key_for_distance(distance_rad, step),
                StarPair {
                    id_a: stars[i].id,
                    id_b: stars[j].id,
                    distance_rad,
                },
            )
        })
        .collect()
}

fn validate_subset(stars: &[StarRecord], config: &BuildConfig) -> SphtResult<()> {
    if stars.len() < 2 {
        return Err(SphtError::validation(format!(
            "need at least 2 catalog stars to build an index, got {}",
            stars.len()
        )));
    }
    if stars.len() > config.max_catalog_stars {
        return Err(SphtError::validation(format!(
            "catalog subset of {} stars exceeds the configured limit of {}",
            stars.len(),
            config.max_catalog_stars
        )));
    }
    let mut seen = HashSet::with_capacity(stars.len());
    for star in stars {
        if !seen.insert(star.id) {
            return Err(SphtError::validation(format!(
                "duplicate catalog id {} in subset",
                star.id
            )));
        }
        if !star.ra_rad.is_finite() || !star.dec_rad.is_finite() {
            return Err(SphtError::validation(format!(
                "catalog star {} has a non-finite position",
                star.id
            )));
        }
    }
    Ok(())
}
