//! Per-Carrier Context
//!
//! Everything the decoder threads of one carrier share: cell parameters, the
//! SFN counter, the active UE tracker and the status ring, each behind its own
//! lock. Decoding itself happens outside these locks.

use crate::engine::PipelineConfig;
use crate::mac::{LocationResolver, SubframeDecodeResult, SubframeResolver, UeTracker};
use crate::phy::pdcch::{DecodedMessage, LocationDecode};
use crate::status::ring::StatusRing;
use crate::status::usage::UsageSample;
use crate::LayerError;
use common::types::{CarrierId, CellParams, Rnti, Tti, SFN_MODULO};
use interfaces::dci_log::DciSink;
use interfaces::message_types::DciRecord;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame counter advanced once per radio frame
#[derive(Debug, Default, Clone, Copy)]
pub struct SfnCounter {
    current: Option<u16>,
    /// Frame already advanced past, for duplicate suppression
    advanced_from: Option<u16>,
    resyncs: u64,
}

impl SfnCounter {
    /// Track the frame number reported with a subframe
    ///
    /// Returns true when this call advanced the counter.
    pub fn observe(&mut self, sfn: u16, sf_idx: u8) -> bool {
        let sfn = sfn % SFN_MODULO as u16;
        let Some(current) = self.current else {
            self.current = Some(sfn);
            return self.advance_at_end(sfn, sf_idx);
        };

        let previous = (current + SFN_MODULO as u16 - 1) % SFN_MODULO as u16;
        if sfn != current && sfn != previous {
            warn!("SFN jumped from {} to {}", current, sfn);
            self.current = Some(sfn);
            self.advanced_from = None;
            self.resyncs += 1;
        }
        self.advance_at_end(sfn, sf_idx)
    }

    fn advance_at_end(&mut self, sfn: u16, sf_idx: u8) -> bool {
        if sf_idx != 9 || self.current != Some(sfn) || self.advanced_from == Some(sfn) {
            return false;
        }
        self.advanced_from = Some(sfn);
        self.current = Some((sfn + 1) % SFN_MODULO as u16);
        true
    }

    /// Frame currently in progress
    pub fn current(&self) -> Option<u16> {
        self.current
    }

    /// Discontinuities seen in the reported frame numbers
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }
}

/// Lock-free counters for one carrier
#[derive(Debug, Default)]
pub struct CarrierStats {
    pub subframes: AtomicU64,
    pub messages: AtomicU64,
    pub location_discards: AtomicU64,
    pub budget_pruned: AtomicU64,
    pub token_refusals: AtomicU64,
    pub stale_subframes: AtomicU64,
    pub records_logged: AtomicU64,
}

/// Point-in-time copy of [`CarrierStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CarrierStatsSnapshot {
    pub subframes: u64,
    pub messages: u64,
    pub location_discards: u64,
    pub budget_pruned: u64,
    pub token_refusals: u64,
    pub stale_subframes: u64,
    pub records_logged: u64,
}

impl CarrierStats {
    pub fn snapshot(&self) -> CarrierStatsSnapshot {
        CarrierStatsSnapshot {
            subframes: self.subframes.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            location_discards: self.location_discards.load(Ordering::Relaxed),
            budget_pruned: self.budget_pruned.load(Ordering::Relaxed),
            token_refusals: self.token_refusals.load(Ordering::Relaxed),
            stale_subframes: self.stale_subframes.load(Ordering::Relaxed),
            records_logged: self.records_logged.load(Ordering::Relaxed),
        }
    }
}

/// Shared state of one monitored carrier
pub struct CarrierContext {
    id: CarrierId,
    target: Option<Rnti>,
    cell: RwLock<Option<CellParams>>,
    sfn: Mutex<SfnCounter>,
    tracker: Mutex<UeTracker>,
    ring: Mutex<StatusRing>,
    /// Finalized records waiting for the sink, in ring order
    pending: Mutex<Vec<DciRecord>>,
    location_resolver: LocationResolver,
    subframe_resolver: SubframeResolver,
    stats: CarrierStats,
}

impl CarrierContext {
    pub fn new(id: CarrierId, config: &PipelineConfig) -> Result<Self, LayerError> {
        let ring = StatusRing::new(id, config.ring_capacity, config.decoder_threads)?;
        Ok(Self {
            id,
            target: config.target,
            cell: RwLock::new(None),
            sfn: Mutex::new(SfnCounter::default()),
            tracker: Mutex::new(UeTracker::new(config.inactivity_window)),
            ring: Mutex::new(ring),
            pending: Mutex::new(Vec::new()),
            location_resolver: LocationResolver::new(config.decoder.thresholds.high_confidence),
            subframe_resolver: SubframeResolver::new(
                config.budget_offsets.clone(),
                config.max_search,
            ),
            stats: CarrierStats::default(),
        })
    }

    pub fn id(&self) -> CarrierId {
        self.id
    }

    pub fn target(&self) -> Option<Rnti> {
        self.target
    }

    /// Cell parameters, once detected
    pub fn cell(&self) -> Option<CellParams> {
        *self.cell.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the detected cell; later detections replace it
    pub fn set_cell(&self, params: CellParams) {
        let mut cell = self.cell.write().unwrap_or_else(PoisonError::into_inner);
        if *cell != Some(params) {
            info!(
                "{}: cell PCI {} with {} PRB and {} ports",
                self.id, params.pci.0, params.nof_prb, params.nof_ports
            );
            *cell = Some(params);
        }
    }

    /// Feed the SFN counter
    pub fn observe_sfn(&self, sfn: u16, sf_idx: u8) -> bool {
        lock(&self.sfn).observe(sfn, sf_idx)
    }

    pub fn current_sfn(&self) -> Option<u16> {
        lock(&self.sfn).current()
    }

    pub fn stats(&self) -> &CarrierStats {
        &self.stats
    }

    /// Claim a ring slot for `tti`
    pub fn take_token(&self, tti: Tti) -> Result<u64, LayerError> {
        let result = lock(&self.ring).take_token(tti);
        match &result {
            Ok(_) => {}
            Err(LayerError::TokenUnavailable { .. }) => {
                self.stats.token_refusals.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.stale_subframes.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Store a result and queue the records of any subframes it finalized
    pub fn return_token(
        &self,
        index: u64,
        result: SubframeDecodeResult,
    ) -> Result<Option<RangeInclusive<u64>>, LayerError> {
        let mut ring = lock(&self.ring);
        let finalized = ring.return_token(index, result)?;
        if let Some(range) = &finalized {
            let mut pending = lock(&self.pending);
            for slot in ring.results(range.clone()) {
                pending.extend(slot.records.iter().cloned());
            }
        }
        Ok(finalized)
    }

    /// Write queued records to `sink` in ring order
    pub fn flush_records(&self, sink: &Mutex<Box<dyn DciSink>>) -> usize {
        let mut pending = lock(&self.pending);
        if pending.is_empty() {
            return 0;
        }
        let mut sink = lock(sink);
        let mut written = 0;
        for record in pending.drain(..) {
            match sink.write_record(&record) {
                Ok(()) => written += 1,
                Err(e) => warn!("{}: failed to log DCI for TTI {}: {}", self.id, record.tti, e),
            }
        }
        self.stats.records_logged.fetch_add(written as u64, Ordering::Relaxed);
        written
    }

    /// Resolve one subframe's decodes against the tracker and record accepted grants
    pub fn resolve_subframe(
        &self,
        index: u64,
        tti: Tti,
        locations: Vec<LocationDecode>,
        budget: u16,
    ) -> SubframeDecodeResult {
        let mut tracker = lock(&self.tracker);

        let mut accepted: Vec<DecodedMessage> = Vec::with_capacity(locations.len());
        for location in locations {
            match self.location_resolver.resolve(location.messages, &tracker, index) {
                Some(message) => accepted.push(message),
                None => {
                    self.stats.location_discards.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let (mut result, pruned) =
            self.subframe_resolver.resolve(index, tti, accepted, budget, &tracker, index);
        if pruned > 0 {
            self.stats.budget_pruned.fetch_add(pruned as u64, Ordering::Relaxed);
        }

        for message in result.downlink.iter().chain(result.uplink.iter()) {
            tracker.update(message.rnti, message.direction, index);
        }
        result.records = result
            .downlink
            .iter()
            .chain(result.uplink.iter())
            .map(|message| dci_record(message, &tracker, index))
            .collect();

        let kept = result.records.len() as u64;
        self.stats.messages.fetch_add(kept, Ordering::Relaxed);
        self.stats.subframes.fetch_add(1, Ordering::Relaxed);
        debug!("{}: TTI {} kept {} grants, pruned {}", self.id, tti, kept, pruned);
        result
    }

    /// Currently active RNTIs
    pub fn nof_active(&self) -> usize {
        let tracker = lock(&self.tracker);
        let now = lock(&self.ring).last_finalized().unwrap_or(0);
        tracker.nof_active(now)
    }

    /// Forget all tracked UEs
    pub fn reset_tracker(&self) {
        lock(&self.tracker).reset();
    }

    /// Ring header (oldest unfinalized subframe)
    pub fn header(&self) -> Option<u64> {
        lock(&self.ring).header()
    }

    /// Usage samples for the last `n` finalized subframes
    pub fn recent_samples(&self, n: usize) -> Vec<UsageSample> {
        let ring = lock(&self.ring);
        ring.recent(n)
            .into_iter()
            .map(|result| UsageSample::from_result(result, self.target))
            .collect()
    }
}

/// Log line for one kept grant, with tracker columns after the update
fn dci_record(message: &DecodedMessage, tracker: &UeTracker, now: u64) -> DciRecord {
    let activity = tracker.activity(message.rnti);
    let rnti_or_zero = |rnti: Option<Rnti>| rnti.map(|r| r.value()).unwrap_or(0);

    DciRecord {
        tti: message.tti.0,
        rnti: message.rnti.value(),
        nof_prb: message.nof_prb,
        mcs_tb1: message.tb[0].mcs,
        mcs_tb2: message.tb[1].mcs,
        tbs_tb1: message.tb[0].tbs,
        tbs_tb2: message.tb[1].tbs,
        tbs_hm_tb1: message.tb[0].tbs_hm,
        tbs_hm_tb2: message.tb[1].tbs_hm,
        decode_prob: message.confidence,
        l: message.level.log2(),
        ncce: message.ncce as u16,
        max_freq_rnti: rnti_or_zero(tracker.busiest()),
        max_dl_freq_rnti: rnti_or_zero(tracker.busiest_dl()),
        max_ul_freq_rnti: rnti_or_zero(tracker.busiest_ul()),
        nof_active_ue: tracker.nof_active(now) as u32,
        active: tracker.is_active(message.rnti, now),
        my_dl_cnt: activity.map(|a| a.dl).unwrap_or(0),
        my_ul_cnt: activity.map(|a| a.ul).unwrap_or(0),
        format: message.format.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::pdcch::{Resolution, TransportBlockInfo};
    use crate::phy::search_space::Candidate;
    use common::types::{AggregationLevel, DciFormat};
    use interfaces::dci_log::MemorySink;

    fn message(rnti: u16, format: DciFormat, nof_prb: u16, ncce: usize) -> DecodedMessage {
        DecodedMessage {
            rnti: Rnti(rnti),
            tti: Tti(5),
            direction: format.direction(),
            format,
            level: AggregationLevel::L2,
            ncce,
            confidence: 95.0,
            nof_prb,
            tb: [TransportBlockInfo::default(); 2],
            harq_pid: 0,
            carrier_indicator: 0,
            resolution: Resolution::Unresolved,
        }
    }

    fn location(messages: Vec<DecodedMessage>) -> LocationDecode {
        LocationDecode {
            candidate: Candidate {
                level: messages[0].level,
                ncce: messages[0].ncce,
                mean_llr: 1.0,
                checked: true,
            },
            messages,
        }
    }

    fn context() -> CarrierContext {
        let config = PipelineConfig {
            decoder_threads: 2,
            ring_capacity: 32,
            target: Some(Rnti(100)),
            ..Default::default()
        };
        CarrierContext::new(CarrierId(0), &config).unwrap()
    }

    #[test]
    fn test_sfn_counter_advances_once_per_frame() {
        let mut counter = SfnCounter::default();
        assert!(!counter.observe(10, 3));
        assert_eq!(counter.current(), Some(10));
        assert!(counter.observe(10, 9));
        // Second thread reporting the same subframe 9
        assert!(!counter.observe(10, 9));
        assert_eq!(counter.current(), Some(11));
        assert!(!counter.observe(11, 0));
        assert_eq!(counter.resyncs(), 0);
    }

    #[test]
    fn test_sfn_counter_wraps_and_resyncs() {
        let mut counter = SfnCounter::default();
        assert!(counter.observe(1023, 9));
        assert_eq!(counter.current(), Some(0));
        counter.observe(500, 2);
        assert_eq!(counter.current(), Some(500));
        assert_eq!(counter.resyncs(), 1);
    }

    #[test]
    fn test_resolve_subframe_updates_tracker_and_records() {
        let ctx = context();
        let locations = vec![
            location(vec![message(100, DciFormat::Format1A, 10, 0)]),
            location(vec![message(200, DciFormat::Format0, 6, 4)]),
        ];
        let result = ctx.resolve_subframe(30, Tti(5), locations, 50);
        assert_eq!(result.nof_dl(), 1);
        assert_eq!(result.nof_ul(), 1);
        assert_eq!(result.records.len(), 2);

        let record = &result.records[0];
        assert_eq!(record.rnti, 100);
        assert_eq!(record.my_dl_cnt, 1);
        assert!(record.active);
        assert_eq!(record.nof_active_ue, 2);
        assert_eq!(record.format, "1A");
        assert_eq!(ctx.stats().snapshot().messages, 2);
    }

    #[test]
    fn test_ambiguous_location_is_counted() {
        let ctx = context();
        let mut a = message(300, DciFormat::Format1A, 5, 0);
        let mut b = message(400, DciFormat::Format2, 5, 0);
        a.confidence = 80.0;
        b.confidence = 82.0;
        let result = ctx.resolve_subframe(0, Tti(0), vec![location(vec![a, b])], 50);
        assert_eq!(result.nof_dl(), 0);
        assert_eq!(ctx.stats().snapshot().location_discards, 1);
    }

    #[test]
    fn test_finalized_records_reach_sink() {
        let ctx = context();
        let sink: Mutex<Box<dyn DciSink>> = Mutex::new(Box::new(MemorySink::default()));

        let a = ctx.take_token(Tti(5)).unwrap();
        let b = ctx.take_token(Tti(6)).unwrap();
        assert!(ctx.take_token(Tti(7)).is_err());
        assert_eq!(ctx.stats().snapshot().token_refusals, 1);

        let grant = location(vec![message(100, DciFormat::Format1A, 4, 0)]);
        let result = ctx.resolve_subframe(b, Tti(6), vec![grant], 50);
        assert!(ctx.return_token(b, result).unwrap().is_none());
        assert_eq!(ctx.flush_records(&sink), 0);

        let result = ctx.resolve_subframe(a, Tti(5), Vec::new(), 50);
        assert_eq!(ctx.return_token(a, result).unwrap(), Some(a..=b));
        assert_eq!(ctx.flush_records(&sink), 1);
        assert_eq!(ctx.recent_samples(10).len(), 2);
        assert_eq!(ctx.recent_samples(10)[1].ue_dl_prb, 4);
    }

    #[test]
    fn test_set_cell() {
        let ctx = context();
        assert!(ctx.cell().is_none());
        let cell = CellParams::new(common::types::Pci(7), 25, 1).unwrap();
        ctx.set_cell(cell);
        assert_eq!(ctx.cell(), Some(cell));
        ctx.reset_tracker();
    }
}
