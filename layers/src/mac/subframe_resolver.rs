//! Subframe Resource Resolver
//!
//! Enforces the cell's PRB budget on the set of grants decoded in one subframe.
//! When the decoded grants over-claim the carrier, reliable grants are kept and
//! the remainder is chosen by an exact subset-sum search, falling back to a
//! greedy fill.

use crate::mac::ue_tracker::UeTracker;
use crate::phy::pdcch::{DecodedMessage, Resolution};
use common::types::{Direction, Tti};
use interfaces::message_types::DciRecord;
use tracing::{debug, warn};

/// Budget slack tried in order by the exact search
pub const DEFAULT_BUDGET_OFFSETS: [u16; 3] = [0, 4, 8];

/// Largest unreliable group searched exhaustively
pub const MAX_SEARCH_MESSAGES: usize = 16;

/// Resolved grants for one subframe, as stored in the status ring
#[derive(Debug, Clone, Default)]
pub struct SubframeDecodeResult {
    /// Unwrapped subframe index
    pub index: u64,
    pub tti: Tti,
    /// PRB budget of the cell when the subframe was decoded
    pub cell_prb: u16,
    pub downlink: Vec<DecodedMessage>,
    pub uplink: Vec<DecodedMessage>,
    /// Log lines for the kept grants
    pub records: Vec<DciRecord>,
}

impl SubframeDecodeResult {
    /// Result for a subframe that was never decoded
    pub fn empty(index: u64, tti: Tti) -> Self {
        Self {
            index,
            tti,
            ..Default::default()
        }
    }

    pub fn nof_dl(&self) -> usize {
        self.downlink.len()
    }

    pub fn nof_ul(&self) -> usize {
        self.uplink.len()
    }

    /// PRBs granted on the downlink
    pub fn dl_prb(&self) -> u32 {
        self.downlink.iter().map(|m| m.nof_prb as u32).sum()
    }

    /// PRBs granted on the uplink
    pub fn ul_prb(&self) -> u32 {
        self.uplink.iter().map(|m| m.nof_prb as u32).sum()
    }
}

/// How a direction group was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneMethod {
    /// Group already fits
    WithinBudget,
    /// Unreliable grants chosen to hit `target` PRBs exactly
    ExactSubset { target: u16 },
    /// Largest-first fill below the budget
    Greedy,
    /// No budget known; group returned as is
    Unconfigured,
}

/// Outcome for one direction group
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub kept: Vec<DecodedMessage>,
    pub pruned: usize,
    pub method: PruneMethod,
}

/// Search `sizes` for the lexicographically first r-combination summing to `need`,
/// trying the smallest r first
fn find_exact_subset(sizes: &[u16], need: u32) -> Option<Vec<usize>> {
    if need == 0 {
        return Some(Vec::new());
    }

    let mut chosen = Vec::with_capacity(sizes.len());
    for r in 1..=sizes.len() {
        chosen.clear();
        if extend_combination(sizes, r, 0, need, &mut chosen) {
            return Some(chosen);
        }
    }
    None
}

fn extend_combination(
    sizes: &[u16],
    r: usize,
    start: usize,
    remaining: u32,
    chosen: &mut Vec<usize>,
) -> bool {
    if chosen.len() == r {
        return remaining == 0;
    }

    for i in start..sizes.len() {
        if sizes.len() - i < r - chosen.len() {
            break;
        }
        let size = sizes[i] as u32;
        if size > remaining {
            continue;
        }
        chosen.push(i);
        if extend_combination(sizes, r, i + 1, remaining - size, chosen) {
            return true;
        }
        chosen.pop();
    }
    false
}

/// PRB budget enforcement
#[derive(Debug, Clone)]
pub struct SubframeResolver {
    offsets: Vec<u16>,
    max_search: usize,
}

impl Default for SubframeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_OFFSETS.to_vec(), MAX_SEARCH_MESSAGES)
    }
}

impl SubframeResolver {
    /// Create a resolver with the given budget slack offsets and exhaustive search cap
    pub fn new(offsets: Vec<u16>, max_search: usize) -> Self {
        Self { offsets, max_search }
    }

    /// Prune one direction group to `budget` PRBs
    pub fn resolve_group<F>(
        &self,
        messages: Vec<DecodedMessage>,
        budget: u16,
        is_reliable: F,
    ) -> GroupOutcome
    where
        F: Fn(&DecodedMessage) -> bool,
    {
        let total: u32 = messages.iter().map(|m| m.nof_prb as u32).sum();
        if total <= budget as u32 {
            return GroupOutcome {
                kept: messages,
                pruned: 0,
                method: PruneMethod::WithinBudget,
            };
        }
        if budget == 0 {
            warn!("No PRB budget configured; keeping {} grants unresolved", messages.len());
            return GroupOutcome {
                kept: messages,
                pruned: 0,
                method: PruneMethod::Unconfigured,
            };
        }

        let budget32 = budget as u32;
        let mut keep = vec![false; messages.len()];
        let mut unreliable = Vec::new();
        let mut floor = 0u32;
        for (i, message) in messages.iter().enumerate() {
            if is_reliable(message) {
                keep[i] = true;
                floor += message.nof_prb as u32;
            } else {
                unreliable.push(i);
            }
        }

        if floor > budget32 {
            warn!(
                "Reliable grants claim {} PRBs over a budget of {}; treating all {} as unreliable",
                floor,
                budget,
                messages.len()
            );
            keep.iter_mut().for_each(|k| *k = false);
            unreliable = (0..messages.len()).collect();
            floor = 0;
        }

        let mut method = PruneMethod::Greedy;
        if unreliable.len() > self.max_search {
            warn!(
                "{} unreliable grants exceed the search cap of {}; using greedy fill",
                unreliable.len(),
                self.max_search
            );
        } else {
            let sizes: Vec<u16> = unreliable.iter().map(|&i| messages[i].nof_prb).collect();
            for &offset in &self.offsets {
                let Some(target) = budget32.checked_sub(offset as u32) else {
                    continue;
                };
                let Some(need) = target.checked_sub(floor) else {
                    continue;
                };
                if let Some(subset) = find_exact_subset(&sizes, need) {
                    for s in subset {
                        keep[unreliable[s]] = true;
                    }
                    method = PruneMethod::ExactSubset { target: target as u16 };
                    break;
                }
            }
        }

        if method == PruneMethod::Greedy {
            let mut order = unreliable.clone();
            order.sort_by(|&a, &b| messages[b].nof_prb.cmp(&messages[a].nof_prb));
            let mut running = floor;
            for i in order {
                let prb = messages[i].nof_prb as u32;
                if running + prb < budget32 {
                    keep[i] = true;
                    running += prb;
                }
            }
        }

        let before = messages.len();
        let kept: Vec<DecodedMessage> = messages
            .into_iter()
            .zip(keep)
            .filter_map(|(message, k)| if k { Some(message) } else { None })
            .collect();

        debug!(
            "Pruned {} of {} grants ({} PRBs claimed, budget {}) via {:?}",
            before - kept.len(),
            before,
            total,
            budget,
            method
        );

        GroupOutcome {
            pruned: before - kept.len(),
            kept,
            method,
        }
    }

    /// Split a subframe's accepted grants by direction and prune each group
    ///
    /// Returns the result and the number of grants pruned.
    pub fn resolve(
        &self,
        index: u64,
        tti: Tti,
        messages: Vec<DecodedMessage>,
        budget: u16,
        tracker: &UeTracker,
        now: u64,
    ) -> (SubframeDecodeResult, usize) {
        let (downlink, uplink): (Vec<_>, Vec<_>) =
            messages.into_iter().partition(|m| m.direction == Direction::Downlink);

        let is_reliable = |m: &DecodedMessage| {
            m.resolution == Resolution::HighConfidence || tracker.is_active(m.rnti, now)
        };

        let dl = self.resolve_group(downlink, budget, is_reliable);
        let ul = self.resolve_group(uplink, budget, is_reliable);

        let result = SubframeDecodeResult {
            index,
            tti,
            cell_prb: budget,
            downlink: dl.kept,
            uplink: ul.kept,
            records: Vec::new(),
        };
        (result, dl.pruned + ul.pruned)
    }
}
