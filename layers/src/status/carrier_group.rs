//! Carrier Group
//!
//! Umbrella over the monitored carriers. Each carrier runs its own ring on its
//! own unwrapped timeline; the group header follows the slowest carrier and the
//! group is declared synchronized the first time every carrier's header points
//! at the same radio subframe. Decoder threads of all carriers share the
//! group's ticket drain.

use crate::engine::carrier::CarrierContext;
use crate::status::ticket::TicketDrain;
use crate::status::usage::{CarrierReport, RateEstimate, StatusReport};
use crate::LayerError;
use common::types::CarrierId;
use common::utils::{unwrap_tti, wrap_tti};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy)]
struct GroupState {
    header: Option<u64>,
    synchronized: bool,
}

/// Minimum of the carrier headers after mapping them onto one timeline
///
/// Returns `None` until every carrier has a header.
pub fn group_header(headers: &[Option<u64>], reference: Option<u64>) -> Option<(u64, bool)> {
    let headers: Vec<u64> = headers.iter().copied().collect::<Option<_>>()?;
    let first = *headers.first()?;
    let reference = reference.unwrap_or(first);

    let wrapped: Vec<u32> = headers.iter().map(|&h| wrap_tti(h)).collect();
    let aligned = wrapped.windows(2).all(|w| w[0] == w[1]);
    let min = wrapped.iter().map(|&w| unwrap_tti(w, reference)).min()?;
    Some((min, aligned))
}

/// All carriers monitored by one process
pub struct CarrierGroup {
    carriers: Vec<Arc<CarrierContext>>,
    state: Mutex<GroupState>,
    drain: TicketDrain,
}

impl CarrierGroup {
    pub fn new(carriers: Vec<Arc<CarrierContext>>) -> Result<Self, LayerError> {
        if carriers.is_empty() {
            return Err(LayerError::InvalidConfiguration("no carriers configured".to_string()));
        }
        for (i, carrier) in carriers.iter().enumerate() {
            if carrier.id() != CarrierId(i) {
                return Err(LayerError::InvalidConfiguration(format!(
                    "carrier at position {} has id {}",
                    i,
                    carrier.id()
                )));
            }
        }
        Ok(Self {
            carriers,
            state: Mutex::new(GroupState::default()),
            drain: TicketDrain::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn carriers(&self) -> &[Arc<CarrierContext>] {
        &self.carriers
    }

    pub fn carrier(&self, id: CarrierId) -> Result<&Arc<CarrierContext>, LayerError> {
        self.carriers.get(id.0).ok_or(LayerError::UnknownCarrier(id))
    }

    /// Decoder tickets across every carrier
    pub fn drain(&self) -> &TicketDrain {
        &self.drain
    }

    pub fn header(&self) -> Option<u64> {
        self.lock().header
    }

    pub fn is_synchronized(&self) -> bool {
        self.lock().synchronized
    }

    /// Recompute the group header from the carrier rings
    ///
    /// The header never moves backwards and synchronization, once reached, is kept.
    pub fn advance_header(&self) -> Option<u64> {
        let headers: Vec<Option<u64>> = self.carriers.iter().map(|c| c.header()).collect();

        let mut state = self.lock();
        let (min, aligned) = group_header(&headers, state.header)?;

        if state.header.map_or(true, |h| min > h) {
            state.header = Some(min);
        }
        if aligned && !state.synchronized {
            state.synchronized = true;
            info!(
                "All {} carriers aligned at TTI {}, group synchronized",
                self.carriers.len(),
                wrap_tti(min)
            );
        }
        debug!("Group header {:?} (synchronized: {})", state.header, state.synchronized);
        state.header
    }

    /// Usage columns for the last `n` finalized subframes of every carrier
    pub fn report(&self, n: usize) -> StatusReport {
        let state = *self.lock();
        let carriers = self
            .carriers
            .iter()
            .map(|c| CarrierReport::from_samples(c.id(), &c.recent_samples(n)))
            .collect();
        StatusReport {
            header: state.header,
            synchronized: state.synchronized,
            carriers,
        }
    }

    /// Rate prediction over the last `n` subframes; needs a synchronized group
    pub fn rate_estimate(&self, n: usize) -> Option<RateEstimate> {
        if !self.is_synchronized() {
            return None;
        }
        let windows: Vec<_> = self.carriers.iter().map(|c| c.recent_samples(n)).collect();
        Some(RateEstimate::from_windows(windows.iter().map(Vec::as_slice)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PipelineConfig;
    use crate::mac::SubframeDecodeResult;
    use common::types::{Tti, TTI_MODULO};

    fn group(n: usize) -> CarrierGroup {
        let config = PipelineConfig {
            decoder_threads: 1,
            ring_capacity: 16,
            ..Default::default()
        };
        let carriers = (0..n)
            .map(|i| Arc::new(CarrierContext::new(CarrierId(i), &config).unwrap()))
            .collect();
        CarrierGroup::new(carriers).unwrap()
    }

    fn step(carrier: &CarrierContext, tti: u32) {
        let index = carrier.take_token(Tti(tti % TTI_MODULO)).unwrap();
        carrier.return_token(index, SubframeDecodeResult::default()).unwrap();
    }

    #[test]
    fn test_group_header_function() {
        assert_eq!(group_header(&[Some(10), None], None), None);
        assert_eq!(group_header(&[Some(10), Some(10)], None), Some((10, true)));
        assert_eq!(group_header(&[Some(12), Some(10)], None), Some((10, false)));

        // Carriers on different epochs map onto the reference timeline
        let m = TTI_MODULO as u64;
        let headers = [Some(m + 5), Some(3 * m + 5)];
        assert_eq!(group_header(&headers, Some(m + 4)), Some((m + 5, true)));
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(CarrierGroup::new(Vec::new()).is_err());
    }

    #[test]
    fn test_synchronization_latches() {
        let group = group(2);
        let (a, b) = (&group.carriers()[0], &group.carriers()[1]);

        assert!(group.advance_header().is_none());
        step(a, 100);
        step(a, 101);
        step(b, 100);
        group.advance_header();
        assert!(!group.is_synchronized());
        assert!(group.rate_estimate(10).is_none());

        step(b, 101);
        let header = group.advance_header().unwrap();
        assert!(group.is_synchronized());
        assert_eq!(wrap_tti(header), 102);

        // Carrier a runs ahead; the group stays synchronized and follows b
        step(a, 102);
        assert_eq!(group.advance_header(), Some(header));
        assert!(group.is_synchronized());
        assert!(group.rate_estimate(10).is_some());
    }

    #[test]
    fn test_report_covers_all_carriers() {
        let group = group(2);
        for tti in 0..5 {
            step(&group.carriers()[0], tti);
        }
        let report = group.report(3);
        assert_eq!(report.carriers.len(), 2);
        assert_eq!(report.carriers[0].len(), 3);
        assert!(report.carriers[1].is_empty());
        assert!(!report.synchronized);
        assert!(group.carrier(CarrierId(2)).is_err());
    }
}
