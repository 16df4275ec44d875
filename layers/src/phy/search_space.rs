//! PDCCH Search Space
//!
//! Energy-based candidate enumeration over the whole control region, plus the
//! per-RNTI hashing that decides whether a location is legal for an address
//! (3GPP TS 36.213 Section 9.1.1).

use crate::phy::control_region::{ControlRegion, BITS_PER_CCE};
use common::types::{AggregationLevel, Rnti};
use std::ops::Range;
use tracing::trace;

/// Default mean |LLR| a block needs to become a candidate
pub const DEFAULT_LLR_THRESHOLD: f32 = 0.7;

/// CCEs spanned by the common search space
pub const COMMON_SPACE_CCES: usize = 16;

const HASH_MULTIPLIER: u64 = 39827;
const HASH_MODULUS: u64 = 65537;

/// One candidate control-channel location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Aggregation level
    pub level: AggregationLevel,
    /// First CCE
    pub ncce: usize,
    /// Mean absolute LLR over the candidate's bits
    pub mean_llr: f32,
    /// Already decoded or covered by a decoded neighbour
    pub checked: bool,
}

impl Candidate {
    /// CCE range covered by this candidate
    pub fn cce_range(&self) -> Range<usize> {
        self.ncce..self.ncce + self.level.cces()
    }

    /// Whether two candidates share at least one CCE
    pub fn overlaps(&self, other: &Range<usize>) -> bool {
        let own = self.cce_range();
        own.start < other.end && other.start < own.end
    }
}

/// Mean absolute value of a block of soft bits
fn mean_magnitude(llrs: &[f32]) -> f32 {
    if llrs.is_empty() {
        return 0.0;
    }
    llrs.iter().map(|l| l.abs()).sum::<f32>() / llrs.len() as f32
}

/// Enumerate candidate locations, largest aggregation level first
///
/// The region is tiled by non-overlapping, L-aligned blocks for each level; a block
/// is a candidate when its mean |LLR| exceeds `threshold`.
pub fn generate_candidates(region: &ControlRegion, threshold: f32) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for level in AggregationLevel::DESCENDING {
        let cces = level.cces();
        let blocks = region.nof_cce() / cces;
        for block in 0..blocks {
            let ncce = block * cces;
            let Some(llrs) = region.cce_llrs(ncce, cces) else {
                continue;
            };
            let mean_llr = mean_magnitude(llrs);
            if mean_llr > threshold {
                candidates.push(Candidate {
                    level,
                    ncce,
                    mean_llr,
                    checked: false,
                });
            }
        }
    }

    trace!(
        "{} candidates over {} CCEs ({} bits)",
        candidates.len(),
        region.nof_cce(),
        region.nof_cce() * BITS_PER_CCE
    );
    candidates
}

/// Mark every candidate overlapping `range` as checked
pub fn mark_overlapping(candidates: &mut [Candidate], range: &Range<usize>) {
    for candidate in candidates.iter_mut() {
        if candidate.overlaps(range) {
            candidate.checked = true;
        }
    }
}

/// UE-specific candidates per aggregation level, M(L)
pub fn ue_specific_candidates(level: AggregationLevel) -> usize {
    match level {
        AggregationLevel::L1 | AggregationLevel::L2 => 6,
        AggregationLevel::L4 | AggregationLevel::L8 => 2,
    }
}

/// Hash variable Y_k for an RNTI in subframe `sf_idx`
pub fn hash_y(rnti: Rnti, sf_idx: u8) -> u64 {
    let mut y = rnti.value() as u64;
    for _ in 0..=sf_idx {
        y = (HASH_MULTIPLIER * y) % HASH_MODULUS;
    }
    y
}

/// First CCEs of the UE-specific search space
pub fn ue_specific_locations(
    rnti: Rnti,
    sf_idx: u8,
    nof_cce: usize,
    level: AggregationLevel,
) -> Vec<usize> {
    let cces = level.cces();
    let slots = nof_cce / cces;
    if slots == 0 {
        return Vec::new();
    }

    let y = hash_y(rnti, sf_idx) as usize;
    (0..ue_specific_candidates(level))
        .map(|m| cces * ((y + m) % slots))
        .collect()
}

/// First CCEs of the common search space (aggregation 4 and 8 only)
pub fn common_locations(nof_cce: usize, level: AggregationLevel) -> Vec<usize> {
    match level {
        AggregationLevel::L4 | AggregationLevel::L8 => {
            let cces = level.cces();
            let span = nof_cce.min(COMMON_SPACE_CCES);
            (0..span / cces).map(|m| m * cces).collect()
        }
        _ => Vec::new(),
    }
}

/// Whether `(level, ncce)` may carry a DCI addressed to `rnti`
pub fn is_legal_location(
    rnti: Rnti,
    sf_idx: u8,
    nof_cce: usize,
    level: AggregationLevel,
    ncce: usize,
    allow_common: bool,
) -> bool {
    if ue_specific_locations(rnti, sf_idx, nof_cce, level).contains(&ncce) {
        return true;
    }
    allow_common && common_locations(nof_cce, level).contains(&ncce)
}
