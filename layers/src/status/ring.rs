//! Per-Carrier Status Ring
//!
//! Bounded circular log of recent subframe results shared by the decoder threads
//! of one carrier. A thread takes a token for a subframe before decoding it and
//! returns the token together with the result. The header only moves once no
//! token is outstanding, so every subframe behind it is final.

use crate::mac::subframe_resolver::SubframeDecodeResult;
use crate::LayerError;
use common::types::{AggregationLevel, CarrierId, Tti, TTI_MODULO};
use common::utils::{unwrap_tti, wrap_tti};
use std::ops::RangeInclusive;
use tracing::{debug, trace, warn};

/// Lifecycle of one ring slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Not claimed by any decoder
    Free,
    /// A decoder holds the token
    Taken,
    /// Result written
    Resolved,
}

#[derive(Debug, Clone)]
struct RingSlot {
    index: Option<u64>,
    state: SlotState,
    result: SubframeDecodeResult,
}

impl RingSlot {
    fn reset(&mut self, index: u64) {
        self.index = Some(index);
        self.state = SlotState::Free;
        self.result = SubframeDecodeResult::empty(index, Tti(wrap_tti(index)));
    }
}

/// Token-guarded ring of subframe results for one carrier
#[derive(Debug)]
pub struct StatusRing {
    carrier: CarrierId,
    slots: Vec<RingSlot>,
    max_tokens: usize,
    outstanding: usize,
    /// Oldest subframe not yet final
    header: Option<u64>,
    /// Newest subframe claimed
    touched: Option<u64>,
    /// First subframe ever claimed
    first: Option<u64>,
}

impl StatusRing {
    /// Create a ring; capacity must exceed the largest aggregation level times the token count
    pub fn new(carrier: CarrierId, capacity: usize, max_tokens: usize) -> Result<Self, LayerError> {
        if max_tokens == 0 {
            return Err(LayerError::InvalidConfiguration(format!(
                "{}: at least one decoder thread is required",
                carrier
            )));
        }
        if capacity <= AggregationLevel::MAX_CCES * max_tokens {
            return Err(LayerError::InvalidConfiguration(format!(
                "{}: ring capacity {} must exceed {} x {} decoder threads",
                carrier,
                capacity,
                AggregationLevel::MAX_CCES,
                max_tokens
            )));
        }

        let slots = (0..capacity)
            .map(|_| RingSlot {
                index: None,
                state: SlotState::Free,
                result: SubframeDecodeResult::default(),
            })
            .collect();

        Ok(Self {
            carrier,
            slots,
            max_tokens,
            outstanding: 0,
            header: None,
            touched: None,
            first: None,
        })
    }

    pub fn carrier(&self) -> CarrierId {
        self.carrier
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Tokens currently held by decoders
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Oldest unwrapped subframe index that is not final
    pub fn header(&self) -> Option<u64> {
        self.header
    }

    /// Newest unwrapped subframe index claimed
    pub fn touched(&self) -> Option<u64> {
        self.touched
    }

    /// Newest final subframe index
    pub fn last_finalized(&self) -> Option<u64> {
        match (self.first, self.header) {
            (Some(first), Some(header)) if header > first => Some(header - 1),
            _ => None,
        }
    }

    fn position(&self, index: u64) -> usize {
        (index % self.slots.len() as u64) as usize
    }

    /// Claim the slot for `tti`; returns its unwrapped index
    pub fn take_token(&mut self, tti: Tti) -> Result<u64, LayerError> {
        if self.outstanding >= self.max_tokens {
            warn!(
                "{}: token request for TTI {} refused, {} of {} tokens outstanding",
                self.carrier, tti, self.outstanding, self.max_tokens
            );
            return Err(LayerError::TokenUnavailable {
                carrier: self.carrier,
                tti,
                outstanding: self.outstanding,
            });
        }

        // Start one epoch in so a late first subframe does not underflow
        let index = match self.touched {
            Some(touched) => unwrap_tti(tti.0, touched),
            None => tti.0 as u64 + TTI_MODULO as u64,
        };
        let header = self.header.unwrap_or(index);

        if index < header {
            debug!("{}: TTI {} is behind header {}", self.carrier, tti, header);
            return Err(LayerError::StaleSubframe { carrier: self.carrier, tti });
        }
        if index >= header + self.slots.len() as u64 {
            warn!(
                "{}: TTI {} is {} subframes ahead of header {}, ring holds {}",
                self.carrier,
                tti,
                index - header,
                header,
                self.slots.len()
            );
            return Err(LayerError::RingOverflow { carrier: self.carrier, tti });
        }

        let touched = self.touched.unwrap_or(index.saturating_sub(1));
        if index > touched {
            // Skipped subframes become empty slots inside the window
            for skipped in touched + 1..index {
                let pos = self.position(skipped);
                self.slots[pos].reset(skipped);
            }
            let pos = self.position(index);
            self.slots[pos].reset(index);
            self.touched = Some(index);
        }

        let pos = self.position(index);
        let slot = &mut self.slots[pos];
        if slot.index != Some(index) || slot.state != SlotState::Free {
            debug!("{}: TTI {} claimed twice", self.carrier, tti);
            return Err(LayerError::DuplicateSubframe { carrier: self.carrier, tti });
        }
        slot.state = SlotState::Taken;

        self.header = Some(header);
        self.first.get_or_insert(index);
        self.outstanding += 1;
        trace!(
            "{}: token taken for {} ({} outstanding)",
            self.carrier,
            index,
            self.outstanding
        );
        Ok(index)
    }

    /// Store the result for a claimed slot and release its token
    ///
    /// Returns the range of subframes that became final, if the header moved.
    pub fn return_token(
        &mut self,
        index: u64,
        mut result: SubframeDecodeResult,
    ) -> Result<Option<RangeInclusive<u64>>, LayerError> {
        let pos = self.position(index);
        let slot = &mut self.slots[pos];
        if slot.index != Some(index) || slot.state != SlotState::Taken {
            return Err(LayerError::UnknownToken { carrier: self.carrier, index });
        }

        result.index = index;
        result.tti = Tti(wrap_tti(index));
        slot.result = result;
        slot.state = SlotState::Resolved;
        self.outstanding -= 1;

        if self.outstanding > 0 {
            return Ok(None);
        }

        match (self.header, self.touched) {
            (Some(header), Some(touched)) if header <= touched => {
                self.header = Some(touched + 1);
                trace!("{}: header advanced {} -> {}", self.carrier, header, touched + 1);
                Ok(Some(header..=touched))
            }
            _ => Ok(None),
        }
    }

    /// Result stored for `index`, if the slot still holds it
    pub fn slot(&self, index: u64) -> Option<&SubframeDecodeResult> {
        let slot = &self.slots[self.position(index)];
        if slot.index == Some(index) {
            Some(&slot.result)
        } else {
            None
        }
    }

    /// State of the slot holding `index`
    pub fn slot_state(&self, index: u64) -> Option<SlotState> {
        let slot = &self.slots[self.position(index)];
        slot.index.filter(|&i| i == index).map(|_| slot.state)
    }

    /// Results in a range, skipping indices the ring no longer holds
    pub fn results(
        &self,
        range: RangeInclusive<u64>,
    ) -> impl Iterator<Item = &SubframeDecodeResult> {
        range.filter_map(move |index| self.slot(index))
    }

    /// Up to `n` most recent final results, oldest first
    pub fn recent(&self, n: usize) -> Vec<&SubframeDecodeResult> {
        let (Some(first), Some(last)) = (self.first, self.last_finalized()) else {
            return Vec::new();
        };
        let n = n.min(self.slots.len()) as u64;
        let start = last.saturating_sub(n.saturating_sub(1)).max(first);
        self.results(start..=last).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(threads: usize) -> StatusRing {
        StatusRing::new(CarrierId(0), 64, threads).unwrap()
    }

    #[test]
    fn test_capacity_check() {
        assert!(StatusRing::new(CarrierId(0), 24, 3).is_err());
        assert!(StatusRing::new(CarrierId(0), 25, 3).is_ok());
        assert!(StatusRing::new(CarrierId(0), 25, 0).is_err());
    }

    #[test]
    fn test_token_exhaustion_leaves_state_untouched() {
        let mut ring = ring(3);
        for tti in 100..103 {
            ring.take_token(Tti(tti)).unwrap();
        }
        let (header, touched) = (ring.header(), ring.touched());

        let err = ring.take_token(Tti(103)).unwrap_err();
        assert!(matches!(err, LayerError::TokenUnavailable { outstanding: 3, .. }));
        assert_eq!(ring.outstanding(), 3);
        assert_eq!(ring.header(), header);
        assert_eq!(ring.touched(), touched);
    }

    #[test]
    fn test_header_waits_for_all_tokens() {
        let mut ring = ring(3);
        let a = ring.take_token(Tti(10)).unwrap();
        let b = ring.take_token(Tti(11)).unwrap();
        let c = ring.take_token(Tti(12)).unwrap();

        assert_eq!(ring.return_token(c, SubframeDecodeResult::default()).unwrap(), None);
        assert_eq!(ring.return_token(a, SubframeDecodeResult::default()).unwrap(), None);
        assert_eq!(ring.header(), Some(a));

        let finalized = ring.return_token(b, SubframeDecodeResult::default()).unwrap().unwrap();
        assert_eq!(finalized, a..=c);
        assert_eq!(ring.header(), Some(c + 1));
        assert_eq!(ring.last_finalized(), Some(c));
        assert_eq!(ring.results(finalized).count(), 3);
    }

    #[test]
    fn test_skipped_subframes_are_finalized_empty() {
        let mut ring = ring(2);
        let a = ring.take_token(Tti(20)).unwrap();
        let b = ring.take_token(Tti(24)).unwrap();
        assert_eq!(b - a, 4);
        assert_eq!(ring.slot_state(a + 2), Some(SlotState::Free));

        ring.return_token(a, SubframeDecodeResult::default()).unwrap();
        let finalized = ring.return_token(b, SubframeDecodeResult::default()).unwrap().unwrap();
        assert_eq!(finalized, a..=b);
        assert_eq!(ring.slot(a + 1).unwrap().nof_dl(), 0);
    }

    #[test]
    fn test_late_subframe_fills_gap() {
        let mut ring = ring(2);
        let a = ring.take_token(Tti(30)).unwrap();
        let b = ring.take_token(Tti(32)).unwrap();
        ring.return_token(b, SubframeDecodeResult::default()).unwrap();
        // TTI 31 arrives late but the header has not passed it
        let c = ring.take_token(Tti(31)).unwrap();
        assert_eq!(c, a + 1);
        ring.return_token(a, SubframeDecodeResult::default()).unwrap();
        assert_eq!(ring.return_token(c, SubframeDecodeResult::default()).unwrap(), Some(a..=b));
    }

    #[test]
    fn test_stale_duplicate_and_overflow() {
        let mut ring = ring(2);
        let a = ring.take_token(Tti(50)).unwrap();
        assert!(matches!(ring.take_token(Tti(50)), Err(LayerError::DuplicateSubframe { .. })));
        ring.return_token(a, SubframeDecodeResult::default()).unwrap();

        assert!(matches!(ring.take_token(Tti(50)), Err(LayerError::StaleSubframe { .. })));
        assert!(matches!(ring.take_token(Tti(40)), Err(LayerError::StaleSubframe { .. })));
        assert!(matches!(ring.take_token(Tti(51 + 64)), Err(LayerError::RingOverflow { .. })));
        assert_eq!(ring.outstanding(), 0);
        assert!(matches!(
            ring.return_token(a, SubframeDecodeResult::default()),
            Err(LayerError::UnknownToken { .. })
        ));
    }

    #[test]
    fn test_tti_wraparound() {
        let mut ring = ring(1);
        let a = ring.take_token(Tti(TTI_MODULO - 1)).unwrap();
        ring.return_token(a, SubframeDecodeResult::default()).unwrap();
        let b = ring.take_token(Tti(0)).unwrap();
        assert_eq!(b, a + 1);
        ring.return_token(b, SubframeDecodeResult::default()).unwrap();
        assert_eq!(ring.slot(b).unwrap().tti, Tti(0));
    }

    #[test]
    fn test_token_balance_under_random_order() {
        use rand::seq::SliceRandom;
        let mut rng = rand::thread_rng();
        let mut ring = ring(4);
        let mut held: Vec<u64> = Vec::new();
        let mut next_tti = 0u32;

        for _ in 0..2000 {
            if held.len() < 4 && (held.is_empty() || rand::random::<bool>()) {
                match ring.take_token(Tti(next_tti % TTI_MODULO)) {
                    Ok(index) => {
                        held.push(index);
                        next_tti += 1;
                    }
                    // Retry once the oldest token comes back
                    Err(LayerError::RingOverflow { .. }) => {}
                    Err(e) => panic!("unexpected refusal: {}", e),
                }
            } else {
                held.shuffle(&mut rng);
                let index = held.pop().unwrap();
                ring.return_token(index, SubframeDecodeResult::default()).unwrap();
            }

            assert!(ring.outstanding() <= 4);
            if let (Some(header), Some(min_held)) = (ring.header(), held.iter().min()) {
                assert!(header <= *min_held);
            }
        }
    }

    #[test]
    fn test_recent_results() {
        let mut ring = ring(1);
        for tti in 0..10 {
            let index = ring.take_token(Tti(tti)).unwrap();
            ring.return_token(index, SubframeDecodeResult::default()).unwrap();
        }
        let recent = ring.recent(4);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].tti, Tti(6));
        assert_eq!(recent[3].tti, Tti(9));
        assert_eq!(ring.recent(100).len(), 10);
    }
}
