//! Decoder Worker
//!
//! One OS thread of a carrier's decoder pool. Each iteration pulls the next
//! aligned subframe, claims a ring token, blind decodes without holding any
//! lock, resolves the decodes against the tracker and hands the result back
//! to the ring.

use crate::engine::carrier::CarrierContext;
use crate::engine::shutdown::ShutdownFlag;
use crate::phy::control_region::ControlRegion;
use crate::phy::pdcch::{BlindDecoder, BlindDecoderConfig};
use crate::status::carrier_group::CarrierGroup;
use crate::LayerError;
use common::types::{CellParams, Tti};
use interfaces::dci_log::DciSink;
use interfaces::message_types::{AlignedSubframe, FeedEvent};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Shared event queue of one carrier
pub type EventQueue = Arc<Mutex<Receiver<FeedEvent>>>;

/// What happened to one subframe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubframeOutcome {
    /// Decoded and stored in the ring
    Stored { index: u64, finalized: bool },
    /// Cell not yet detected
    NoCell,
    /// Ring refused the token
    Refused,
}

/// One decoder thread
pub struct DecoderWorker {
    carrier: Arc<CarrierContext>,
    group: Arc<CarrierGroup>,
    events: EventQueue,
    sink: Arc<Mutex<Box<dyn DciSink>>>,
    shutdown: Arc<ShutdownFlag>,
    config: BlindDecoderConfig,
    poll_interval: Duration,
    decoder: Option<BlindDecoder>,
    ticket: usize,
}

impl DecoderWorker {
    pub fn new(
        carrier: Arc<CarrierContext>,
        group: Arc<CarrierGroup>,
        events: EventQueue,
        sink: Arc<Mutex<Box<dyn DciSink>>>,
        shutdown: Arc<ShutdownFlag>,
        config: BlindDecoderConfig,
        poll_interval: Duration,
    ) -> Self {
        let ticket = group.drain().register();
        Self {
            carrier,
            group,
            events,
            sink,
            shutdown,
            config,
            poll_interval,
            decoder: None,
            ticket,
        }
    }

    pub fn ticket(&self) -> usize {
        self.ticket
    }

    /// Decoder for `cell`, created on first use or when the cell changes
    fn decoder_for(&mut self, cell: CellParams) -> Result<&mut BlindDecoder, LayerError> {
        let stale = self.decoder.as_ref().map_or(true, |d| *d.cell() != cell);
        if stale {
            let decoder = BlindDecoder::new(self.config.clone(), cell)?;
            debug!("{}: decoder {} ready for PCI {}", self.carrier.id(), self.ticket, cell.pci.0);
            self.decoder = Some(decoder);
        }
        self.decoder
            .as_mut()
            .ok_or_else(|| LayerError::InvalidState("decoder missing after creation".to_string()))
    }

    /// Decode one subframe end to end
    ///
    /// Errors are fatal for this worker (decoder context creation).
    pub fn process_subframe(
        &mut self,
        subframe: &AlignedSubframe,
    ) -> Result<SubframeOutcome, LayerError> {
        let Some(cell) = self.carrier.cell() else {
            trace!("{}: subframe before cell detection ignored", self.carrier.id());
            return Ok(SubframeOutcome::NoCell);
        };

        if self.carrier.observe_sfn(subframe.sfn, subframe.sf_idx) {
            trace!("{}: frame {} complete", self.carrier.id(), subframe.sfn);
        }
        let tti = Tti::from_sfn(subframe.sfn, subframe.sf_idx);

        // Fail before claiming a token so a broken context never stalls the ring
        self.decoder_for(cell)?;

        let index = match self.carrier.take_token(tti) {
            Ok(index) => index,
            Err(e) => {
                debug!("{}: skipping TTI {}: {}", self.carrier.id(), tti, e);
                return Ok(SubframeOutcome::Refused);
            }
        };

        let region = ControlRegion::from_symbols(
            &subframe.control_symbols,
            &cell,
            subframe.sf_idx,
            subframe.cfi,
        );
        let locations = match self.decoder.as_mut() {
            Some(decoder) => decoder.decode_subframe(&region, tti),
            None => Vec::new(),
        };
        trace!(
            "{}: TTI {} CFI {} ({} CCEs): {} locations decoded",
            self.carrier.id(),
            tti,
            subframe.cfi,
            region.nof_cce(),
            locations.len()
        );

        let result = self.carrier.resolve_subframe(index, tti, locations, cell.nof_prb);
        let finalized = self.carrier.return_token(index, result)?;
        let advanced = finalized.is_some();
        if advanced {
            self.carrier.flush_records(&self.sink);
            self.group.advance_header();
        }
        Ok(SubframeOutcome::Stored { index, finalized: advanced })
    }

    fn handle(&mut self, event: FeedEvent) -> Result<(), LayerError> {
        match event {
            FeedEvent::CellDetected(cell) => {
                self.carrier.set_cell(cell);
                Ok(())
            }
            FeedEvent::Subframe(subframe) => self.process_subframe(&subframe).map(|_| ()),
        }
    }

    fn next_event(&self) -> Result<Option<FeedEvent>, RecvTimeoutError> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        match events.recv_timeout(self.poll_interval) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Run until shutdown; the ticket is retired when the worker is dropped
    pub fn run(mut self) {
        let carrier = self.carrier.id();
        info!("{}: decoder thread {} started", carrier, self.ticket);

        while !self.shutdown.is_set() {
            let event = match self.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(_) => {
                    info!("{}: feed closed, decoder thread {} stopping", carrier, self.ticket);
                    break;
                }
            };

            if let Err(e) = self.handle(event) {
                match e {
                    LayerError::InitializationFailed(_) | LayerError::InvalidConfiguration(_) => {
                        error!(
                            "{}: decoder thread {} cannot continue: {}",
                            carrier, self.ticket, e
                        );
                        self.shutdown.request();
                        break;
                    }
                    other => warn!("{}: decoder thread {}: {}", carrier, self.ticket, other),
                }
            }
        }

        debug!("{}: decoder thread {} leaving loop", carrier, self.ticket);
    }
}

impl Drop for DecoderWorker {
    fn drop(&mut self) {
        self.group.drain().retire(self.ticket);
        // Decoder buffers are released only after every higher ticket is gone
        drop(self.decoder.take());
        debug!("{}: decoder thread {} retired", self.carrier.id(), self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PipelineConfig;
    use crate::phy::dci::{riv_encode, Dci, DciLayout, ResourceAllocation, TransportBlockFields};
    use crate::phy::pdcch::encode_dci;
    use crate::phy::scrambling::{pdcch_cinit, scramble_bits};
    use crate::phy::search_space::ue_specific_locations;
    use crate::phy::control_region::{nof_cce, BITS_PER_CCE};
    use common::types::{AggregationLevel, CarrierId, DciFormat, Pci, Rnti};
    use interfaces::dci_log::MemorySink;
    use num_complex::Complex32;
    use std::sync::mpsc::sync_channel;

    fn cell() -> CellParams {
        CellParams::new(Pci(3), 25, 2).unwrap()
    }

    /// Control region symbols carrying one Format 1A grant
    fn subframe(rnti: Rnti, sfn: u16, sf_idx: u8) -> AlignedSubframe {
        let cell = cell();
        let cfi = 2;
        let total = nof_cce(cfi, cell.nof_prb, cell.nof_ports);
        let layout = DciLayout::new(DciFormat::Format1A, cell.nof_prb, cell.nof_ports).unwrap();
        let dci = Dci::new(
            DciFormat::Format1A,
            ResourceAllocation::Type2 {
                riv: riv_encode(0, 6, cell.nof_prb),
                distributed: false,
            },
            TransportBlockFields {
                mcs: 9,
                ndi: true,
                rv: 0,
                enabled: true,
            },
        );
        let level = AggregationLevel::L4;
        let ncce = ue_specific_locations(rnti, sf_idx, total, level)[0];

        let mut bits = vec![0u8; total * BITS_PER_CCE];
        let coded = encode_dci(&layout, &dci, rnti, level);
        let span = ncce * BITS_PER_CCE..ncce * BITS_PER_CCE + coded.len();
        bits[span.clone()].copy_from_slice(&coded);
        scramble_bits(&mut bits, pdcch_cinit(sf_idx, cell.pci.0));

        // Unused CCEs stay silent
        let amplitude = std::f32::consts::FRAC_1_SQRT_2;
        let level_of = |b: u8| if b == 0 { amplitude } else { -amplitude };
        let control_symbols = bits
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| {
                if span.contains(&(2 * i)) {
                    Complex32::new(level_of(pair[0]), level_of(pair[1]))
                } else {
                    Complex32::new(0.0, 0.0)
                }
            })
            .collect();

        AlignedSubframe {
            carrier: CarrierId(0),
            sfn,
            sf_idx,
            cfi,
            control_symbols,
        }
    }

    fn carrier_config(threads: usize) -> PipelineConfig {
        PipelineConfig {
            decoder_threads: threads,
            ring_capacity: 64,
            ..Default::default()
        }
    }

    fn worker_in(carrier: &Arc<CarrierContext>, group: &Arc<CarrierGroup>) -> DecoderWorker {
        let (_tx, rx) = sync_channel(4);
        let sink: Arc<Mutex<Box<dyn DciSink>>> =
            Arc::new(Mutex::new(Box::new(MemorySink::default())));
        DecoderWorker::new(
            Arc::clone(carrier),
            Arc::clone(group),
            Arc::new(Mutex::new(rx)),
            sink,
            Arc::new(ShutdownFlag::new()),
            BlindDecoderConfig {
                formats: vec![DciFormat::Format0, DciFormat::Format1A],
                ..Default::default()
            },
            Duration::from_millis(10),
        )
    }

    fn worker(threads: usize) -> DecoderWorker {
        let config = carrier_config(threads);
        let carrier = Arc::new(CarrierContext::new(CarrierId(0), &config).unwrap());
        let group = Arc::new(CarrierGroup::new(vec![Arc::clone(&carrier)]).unwrap());
        worker_in(&carrier, &group)
    }

    #[test]
    fn test_subframe_before_cell_detection() {
        let mut worker = worker(1);
        let outcome = worker.process_subframe(&subframe(Rnti(0x1234), 0, 0)).unwrap();
        assert_eq!(outcome, SubframeOutcome::NoCell);
    }

    #[test]
    fn test_grant_is_decoded_and_finalized() {
        let mut worker = worker(1);
        worker.handle(FeedEvent::CellDetected(cell())).unwrap();

        let outcome = worker.process_subframe(&subframe(Rnti(0x1234), 7, 4)).unwrap();
        let SubframeOutcome::Stored { index, finalized } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert!(finalized);
        assert_eq!(worker.group.header(), Some(index + 1));

        let samples = worker.carrier.recent_samples(1);
        assert_eq!(samples[0].cell_dl_prb, 6);
        assert!(worker.carrier.stats().snapshot().records_logged >= 1);
    }

    #[test]
    fn test_duplicate_subframe_refused() {
        let mut worker = worker(1);
        worker.handle(FeedEvent::CellDetected(cell())).unwrap();
        let sf = subframe(Rnti(0x2000), 1, 1);
        assert!(matches!(worker.process_subframe(&sf).unwrap(), SubframeOutcome::Stored { .. }));
        assert_eq!(worker.process_subframe(&sf).unwrap(), SubframeOutcome::Refused);
    }

    #[test]
    fn test_run_retires_on_shutdown() {
        let worker = worker(1);
        let shutdown = Arc::clone(&worker.shutdown);
        let group = Arc::clone(&worker.group);
        let handle = std::thread::spawn(move || worker.run());
        shutdown.request();
        handle.join().unwrap();
        assert_eq!(group.drain().live(), 0);
    }

    #[test]
    fn test_tickets_are_ordered_across_carriers() {
        let config = carrier_config(2);
        let carriers: Vec<_> = (0..2)
            .map(|i| Arc::new(CarrierContext::new(CarrierId(i), &config).unwrap()))
            .collect();
        let group = Arc::new(CarrierGroup::new(carriers.clone()).unwrap());

        let mut workers: Vec<_> = [0, 1, 0, 1]
            .iter()
            .map(|&i| worker_in(&carriers[i], &group))
            .collect();
        let tickets: Vec<_> = workers.iter().map(DecoderWorker::ticket).collect();
        assert_eq!(tickets, vec![0, 1, 2, 3]);
        assert_eq!(group.drain().live(), 4);

        // Carrier 0's lowest ticket outlives carrier 1's higher ones
        let lowest = workers.remove(0);
        let handle = std::thread::spawn(move || drop(lowest));
        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        while let Some(worker) = workers.pop() {
            drop(worker);
        }
        handle.join().unwrap();
        assert_eq!(group.drain().live(), 0);
    }
}
