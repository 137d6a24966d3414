//! Identification: match detected stars against the index by pairwise
//! angular distance and consensus voting.
//!
//! 1. Project every detection to a camera-frame unit vector.
//! 2. For every pair of detections, hash their separation and collect the
//!    catalog pairs filed under that bucket and its two neighbors.
//! 3. Each candidate pair votes for both of its catalog ids on both
//!    detections, since a single pair cannot say which star is which.
//! 4. With three or more detections the orientation is resolved by
//!    consensus: every detection triangle keeps only the catalog triangles
//!    whose three pairs were all retrieved, and of those only the best fit
//!    (smallest summed distance residual) votes.
//! 5. Each detection takes its most-voted catalog id, then duplicate
//!    assignments are reduced to the strongest claim.
//!
//! Triangle consensus runs only over the first `max_consensus_stars`
//! detections and stops after `max_consensus_work` hypotheses. Detections
//! past that prefix are resolved against the identified prefix stars
//! (anchors): the anchor's catalog id fixes one end of each candidate pair,
//! so only the partner is voted on. Work per call is therefore linear in the
//! number of detections beyond the prefix.
//!
//! With only two detections there is no triangle to vote on, and the raw
//! pair votes cannot tell the two stars of a pair apart. That is a limit of
//! the information available, not a failure: at most one of the two will be
//! identified, at half confidence.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::{DetectedStar, IdentifiedStar, Vector3};

use super::hasher::{angular_distance, key_for_distance};
use super::{Identification, IdentifyConfig, IdentifyStats, NoMatchReason, Spht};

/// Triangle hypotheses within this summed residual (radians) of the best one
/// share the triangle's votes.
const CONSENSUS_EPSILON: f64 = 1e-9;

/// Votes per catalog id for one detection.
type VoteTally = HashMap<u64, u32>;

// ── Candidate generation ────────────────────────────────────────────────────

/// Catalog pairs retrieved for one pair of detections.
#[derive(Debug, Default)]
struct PairMatches {
    /// `(id_a, id_b, residual)` in retrieval order.
    candidates: Vec<(u64, u64, f64)>,
    /// Residual keyed by unordered ids.
    residuals: HashMap<(u64, u64), f64>,
    /// For each catalog id, the ids it is paired with and the residual.
    partners: HashMap<u64, Vec<(u64, f64)>>,
}

impl PairMatches {
    fn collect(spht: &Spht, distance_rad: f64) -> Self {
        let key = key_for_distance(distance_rad, spht.step);
        let mut out = PairMatches::default();
        for pair in spht.candidates_near(key) {
            let residual = (pair.distance_rad - distance_rad).abs();
            out.candidates.push((pair.id_a, pair.id_b, residual));
            out.residuals.insert(ordered(pair.id_a, pair.id_b), residual);
            out.partners
                .entry(pair.id_a)
                .or_default()
                .push((pair.id_b, residual));
            out.partners
                .entry(pair.id_b)
                .or_default()
                .push((pair.id_a, residual));
        }
        out
    }
}

#[inline]
fn ordered(a: u64, b: u64) -> (u64, u64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Upper-triangle table of pair matches, indexed by detection indices.
struct MatchTable {
    k: usize,
    cells: Vec<PairMatches>,
}

impl MatchTable {
    fn build(spht: &Spht, vectors: &[Vector3]) -> Self {
        let k = vectors.len();
        let mut cells: Vec<PairMatches> = (0..k * k).map(|_| PairMatches::default()).collect();
        for i in 0..k {
            for j in (i + 1)..k {
                let d = angular_distance(&vectors[i], &vectors[j]);
                cells[i * k + j] = PairMatches::collect(spht, d);
            }
        }
        Self { k, cells }
    }

    /// Matches for detections `i < j`.
    fn get(&self, i: usize, j: usize) -> &PairMatches {
        &self.cells[i * self.k + j]
    }

    fn total_candidates(&self) -> usize {
        self.cells.iter().map(|c| c.candidates.len()).sum()
    }
}

// ── Voting ──────────────────────────────────────────────────────────────────

/// Every candidate pair credits both of its ids to both detections.
fn pair_votes(table: &MatchTable) -> Vec<VoteTally> {
    let k = table.k;
    let mut votes = vec![VoteTally::new(); k];
    for i in 0..k {
        for j in (i + 1)..k {
            for &(a, b, _) in &table.get(i, j).candidates {
                for det in [i, j] {
                    *votes[det].entry(a).or_insert(0) += 1;
                    *votes[det].entry(b).or_insert(0) += 1;
                }
            }
        }
    }
    votes
}

/// Orientation-resolved votes from detection triangles.
///
/// Triangles are visited in growing-prefix order (every triangle closing on
/// detection 2, then on 3, ...) so that a truncated pass still covers the
/// leading detections evenly. Stops once `budget` hypotheses were examined.
fn triangle_votes(table: &MatchTable, budget: usize, stats: &mut IdentifyStats) -> Vec<VoteTally> {
    let k = table.k;
    let mut votes = vec![VoteTally::new(); k];
    let mut kept: Vec<(f64, u64, u64, u64)> = Vec::new();

    'triangles: for l in 2..k {
        for j in 1..l {
            for i in 0..j {
                let ij = table.get(i, j);
                let il = table.get(i, l);
                let jl = table.get(j, l);
                if ij.candidates.is_empty() || il.candidates.is_empty() || jl.candidates.is_empty() {
                    continue;
                }
                stats.triangles += 1;
                kept.clear();
                let mut best = f64::INFINITY;

                for &(a, b, r_ij) in &ij.candidates {
                    for (x, y) in [(a, b), (b, a)] {
                        let Some(partners) = il.partners.get(&x) else {
                            continue;
                        };
                        for &(z, r_il) in partners {
                            if stats.hypotheses >= budget {
                                stats.budget_exhausted = true;
                                break 'triangles;
                            }
                            stats.hypotheses += 1;
                            if z == y {
                                continue;
                            }
                            let Some(&r_jl) = jl.residuals.get(&ordered(y, z)) else {
                                continue;
                            };
                            let r = r_ij + r_il + r_jl;
                            if r + CONSENSUS_EPSILON < best {
                                kept.clear();
                            }
                            if r <= best + CONSENSUS_EPSILON {
                                kept.push((r, x, y, z));
                                best = best.min(r);
                            }
                        }
                    }
                }

                kept.retain(|h| h.0 <= best + CONSENSUS_EPSILON);
                for &(_, x, y, z) in &kept {
                    *votes[i].entry(x).or_insert(0) += 1;
                    *votes[j].entry(y).or_insert(0) += 1;
                    *votes[l].entry(z).or_insert(0) += 1;
                }
            }
        }
    }
    votes
}

/// Votes for a detection outside the consensus prefix. Each anchor
/// `(direction, catalog id)` credits the partner ids whose catalog distance
/// to the anchor's id best fits the measured separation.
fn anchor_votes(
    spht: &Spht,
    anchors: &[(Vector3, u64)],
    target: &Vector3,
    stats: &mut IdentifyStats,
) -> VoteTally {
    let mut tally = VoteTally::new();
    let mut kept: Vec<(f64, u64)> = Vec::new();
    for (anchor, anchor_id) in anchors {
        stats.anchor_lookups += 1;
        let d = angular_distance(anchor, target);
        kept.clear();
        let mut best = f64::INFINITY;
        for pair in spht.candidates_near(key_for_distance(d, spht.step)) {
            let partner = if pair.id_a == *anchor_id {
                pair.id_b
            } else if pair.id_b == *anchor_id {
                pair.id_a
            } else {
                continue;
            };
            let r = (pair.distance_rad - d).abs();
            if r + CONSENSUS_EPSILON < best {
                kept.clear();
            }
            if r <= best + CONSENSUS_EPSILON {
                kept.push((r, partner));
                best = best.min(r);
            }
        }
        kept.retain(|h| h.0 <= best + CONSENSUS_EPSILON);
        for &(_, partner) in &kept {
            *tally.entry(partner).or_insert(0) += 1;
        }
    }
    tally
}

// ── Assignment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct Assignment {
    catalog_id: u64,
    votes: u32,
    confidence: f64,
}

/// Most-voted id per detection; vote ties go to the lowest catalog id.
fn assign(votes: &[VoteTally]) -> Vec<Option<Assignment>> {
    votes
        .iter()
        .map(|tally| {
            let total: u32 = tally.values().sum();
            if total == 0 {
                return None;
            }
            let (&catalog_id, &winning) = tally
                .iter()
                .max_by(|(id_a, v_a), (id_b, v_b)| v_a.cmp(v_b).then(id_b.cmp(id_a)))?;
            Some(Assignment {
                catalog_id,
                votes: winning,
                confidence: winning as f64 / total as f64,
            })
        })
        .collect()
}

/// Keep one detection per catalog id: highest confidence, then most votes,
/// then lowest detection index. The others become unidentified.
fn enforce_uniqueness(assignments: &mut [Option<Assignment>]) {
    let mut owner: HashMap<u64, usize> = HashMap::new();
    for idx in 0..assignments.len() {
        let Some(candidate) = assignments[idx] else {
            continue;
        };
        match owner.get(&candidate.catalog_id).copied() {
            None => {
                owner.insert(candidate.catalog_id, idx);
            }
            Some(current) => {
                let Some(held) = assignments[current] else {
                    continue;
                };
                let stronger = candidate.confidence > held.confidence
                    || (candidate.confidence == held.confidence && candidate.votes > held.votes);
                if stronger {
                    assignments[current] = None;
                    owner.insert(candidate.catalog_id, idx);
                } else {
                    assignments[idx] = None;
                }
            }
        }
    }
}

// ── Entry point ─────────────────────────────────────────────────────────────

impl Spht {
    /// Identify detected stars against this index.
    ///
    /// Detections with non-finite coordinates are ignored, as is everything
    /// past the first `config.max_detected_stars` usable detections. Failure
    /// is reported through [`Identification::reason`]; this never panics on
    /// caller input.
    pub fn identify(&self, detected: &[DetectedStar], config: &IdentifyConfig) -> Identification {
        let t0 = Instant::now();

        let usable: Vec<(usize, DetectedStar)> = detected
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, d)| d.is_finite())
            .take(config.max_detected_stars)
            .collect();

        if usable.len() < 2 {
            return Identification::failure(NoMatchReason::InsufficientInput);
        }
        if self.is_empty() {
            return Identification::failure(NoMatchReason::IndexUnavailable);
        }
        if !config.camera.is_valid() {
            return Identification::failure(NoMatchReason::InvalidCamera);
        }
        if !self.step.matches(&config.quantization_step) {
            return Identification::failure(NoMatchReason::StepMismatch);
        }

        let vectors: Vec<Vector3> = usable
            .iter()
            .map(|(_, d)| config.camera.pixel_to_uvec(d.x, d.y))
            .collect();

        let mut stats = IdentifyStats::default();
        let mut assignments = if vectors.len() < 3 {
            let table = MatchTable::build(self, &vectors);
            stats.candidate_pairs = table.total_candidates();
            assign(&pair_votes(&table))
        } else {
            let n = vectors.len().min(config.max_consensus_stars.max(3));
            let (head, tail) = vectors.split_at(n);
            let table = MatchTable::build(self, head);
            stats.candidate_pairs = table.total_candidates();
            let votes = triangle_votes(&table, config.max_consensus_work, &mut stats);
            let mut resolved = assign(&votes);
            enforce_uniqueness(&mut resolved);

            let anchors: Vec<(Vector3, u64)> = resolved
                .iter()
                .zip(head)
                .filter_map(|(a, v)| a.map(|a| (*v, a.catalog_id)))
                .collect();
            let tail_votes: Vec<VoteTally> = tail
                .iter()
                .map(|v| anchor_votes(self, &anchors, v, &mut stats))
                .collect();
            resolved.extend(assign(&tail_votes));
            resolved
        };
        enforce_uniqueness(&mut assignments);

        let stars: Vec<IdentifiedStar> = assignments
            .iter()
            .zip(&usable)
            .filter_map(|(a, &(detected_index, d))| {
                a.map(|a| IdentifiedStar {
                    detected_index,
                    x: d.x,
                    y: d.y,
                    catalog_id: a.catalog_id,
                    confidence: a.confidence,
                    votes: a.votes,
                })
            })
            .collect();

        debug!(
            "Identified {} of {} detections ({:?}) in {:.2} ms",
            stars.len(),
            usable.len(),
            stats,
            t0.elapsed().as_secs_f64() * 1000.0
        );

        Identification::from_stars(stars, stats)
    }
}
