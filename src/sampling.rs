//! Deterministic catalog subset selection.
//!
//! The index is built over a catalog *subset*: pair count grows with the
//! square of the subset size, and so does the number of false candidates per
//! bucket. Subsets are drawn by uniform sampling without replacement from a
//! seeded generator so that reference datasets are reproducible.
//!
//! Note that the exact sequence depends on the PRNG implementation
//! (`rand::rngs::StdRng` here); a different generator with the same seed
//! yields a different subset. Tests therefore pin subsets as literal data.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::{SphtError, SphtResult, StarRecord};

/// Uniformly sample `count` distinct stars using a fixed seed.
pub fn sample_catalog(stars: &[StarRecord], count: usize, seed: u64) -> SphtResult<Vec<StarRecord>> {
    if count > stars.len() {
        return Err(SphtError::validation(format!(
            "cannot sample {} stars from a catalog of {}",
            count,
            stars.len()
        )));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(index::sample(&mut rng, stars.len(), count)
        .iter()
        .map(|i| stars[i].clone())
        .collect())
}

/// Sample `random_count` stars, then append every catalog star whose id is
/// listed in `required_ids` and was not already sampled, in catalog order.
pub fn research_subset(
    stars: &[StarRecord],
    random_count: usize,
    seed: u64,
    required_ids: &[u64],
) -> SphtResult<Vec<StarRecord>> {
    let mut subset = sample_catalog(stars, random_count, seed)?;
    let mut chosen: HashSet<u64> = subset.iter().map(|s| s.id).collect();
    let required: HashSet<u64> = required_ids.iter().copied().collect();
    for star in stars {
        if required.contains(&star.id) && chosen.insert(star.id) {
            subset.push(star.clone());
        }
    }
    Ok(subset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(n: u64) -> Vec<StarRecord> {
        (1..=n)
            .map(|id| StarRecord {
                id,
                ra_rad: id as f64 * 0.01,
                dec_rad: 0.0,
                mag: 5.0,
                name: None,
            })
            .collect()
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let stars = catalog(200);
        let a = sample_catalog(&stars, 5, 42).unwrap();
        let b = sample_catalog(&stars, 5, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn test_sampling_without_replacement() {
        let stars = catalog(30);
        let all = sample_catalog(&stars, 30, 7).unwrap();
        let ids: HashSet<u64> = all.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 30);
    }

    #[test]
    fn test_oversample_is_rejected() {
        let stars = catalog(3);
        assert!(matches!(
            sample_catalog(&stars, 4, 1),
            Err(SphtError::Validation(_))
        ));
    }

    #[test]
    fn test_research_subset_appends_required_once() {
        let stars = catalog(50);
        let sampled = sample_catalog(&stars, 5, 42).unwrap();
        let already = sampled[0].id;
        let required = vec![already, 10, 20, 30, 999];
        let subset = research_subset(&stars, 5, 42, &required).unwrap();

        assert_eq!(&subset[..5], &sampled[..]);
        let ids: Vec<u64> = subset.iter().map(|s| s.id).collect();
        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len(), "no duplicates");
        for id in [10, 20, 30] {
            assert!(ids.contains(&id));
        }
        // Unknown ids are ignored
        assert!(!ids.contains(&999));
    }
}
