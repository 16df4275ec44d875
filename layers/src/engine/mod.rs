//! Monitoring Engine
//!
//! Owns the carrier contexts and their decoder thread pools. Each carrier gets
//! one event queue fed by the synchronization layer and `decoder_threads` OS
//! threads competing for it.

pub mod carrier;
pub mod decoder;
pub mod shutdown;

pub use carrier::{CarrierContext, CarrierStatsSnapshot, SfnCounter};
pub use decoder::{DecoderWorker, EventQueue, SubframeOutcome};
pub use shutdown::ShutdownFlag;

use crate::mac::subframe_resolver::{DEFAULT_BUDGET_OFFSETS, MAX_SEARCH_MESSAGES};
use crate::mac::DEFAULT_INACTIVITY_WINDOW;
use crate::phy::pdcch::BlindDecoderConfig;
use crate::status::carrier_group::CarrierGroup;
use crate::status::usage::{RateEstimate, StatusReport};
use crate::LayerError;
use common::types::{CarrierId, Rnti};
use interfaces::dci_log::DciSink;
use interfaces::message_types::FeedEvent;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default decoder threads per carrier
pub const DEFAULT_DECODER_THREADS: usize = 3;

/// Default ring slots per carrier
pub const DEFAULT_RING_CAPACITY: usize = 1000;

/// How long shutdown waits for decoder tickets before joining anyway
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Processing parameters shared by every carrier
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub decoder_threads: usize,
    pub ring_capacity: usize,
    pub decoder: BlindDecoderConfig,
    /// Subframes an RNTI stays active without a grant
    pub inactivity_window: u64,
    pub budget_offsets: Vec<u16>,
    pub max_search: usize,
    /// RNTI whose grants fill the UE usage columns
    pub target: Option<Rnti>,
    /// How long a decoder blocks on its queue before checking for shutdown
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decoder_threads: DEFAULT_DECODER_THREADS,
            ring_capacity: DEFAULT_RING_CAPACITY,
            decoder: BlindDecoderConfig::default(),
            inactivity_window: DEFAULT_INACTIVITY_WINDOW,
            budget_offsets: DEFAULT_BUDGET_OFFSETS.to_vec(),
            max_search: MAX_SEARCH_MESSAGES,
            target: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl PipelineConfig {
    /// Reject settings no carrier could run with
    pub fn validate(&self) -> Result<(), LayerError> {
        if self.decoder.formats.is_empty() {
            return Err(LayerError::InvalidConfiguration("no DCI formats enabled".to_string()));
        }
        if self.budget_offsets.is_empty() {
            return Err(LayerError::InvalidConfiguration("no PRB budget offsets".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(LayerError::InvalidConfiguration(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Running engine: carrier group plus decoder threads
pub struct MonitorEngine {
    group: Arc<CarrierGroup>,
    shutdown: Arc<ShutdownFlag>,
    sink: Arc<Mutex<Box<dyn DciSink>>>,
    handles: Vec<JoinHandle<()>>,
}

impl MonitorEngine {
    /// Build the carrier contexts and start every decoder thread
    ///
    /// `feeds[i]` is the event queue of carrier `i`.
    pub fn start(
        config: PipelineConfig,
        feeds: Vec<Receiver<FeedEvent>>,
        sink: Box<dyn DciSink>,
    ) -> Result<Self, LayerError> {
        config.validate()?;

        let carriers = (0..feeds.len())
            .map(|i| CarrierContext::new(CarrierId(i), &config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let group = Arc::new(CarrierGroup::new(carriers)?);
        let shutdown = Arc::new(ShutdownFlag::new());
        let sink = Arc::new(Mutex::new(sink));

        let mut engine = Self {
            group,
            shutdown,
            sink,
            handles: Vec::new(),
        };

        for (carrier, feed) in engine.group.carriers().to_vec().into_iter().zip(feeds) {
            let queue: EventQueue = Arc::new(Mutex::new(feed));
            for n in 0..config.decoder_threads {
                let worker = DecoderWorker::new(
                    Arc::clone(&carrier),
                    Arc::clone(&engine.group),
                    Arc::clone(&queue),
                    Arc::clone(&engine.sink),
                    Arc::clone(&engine.shutdown),
                    config.decoder.clone(),
                    config.poll_interval,
                );
                let spawned = std::thread::Builder::new()
                    .name(format!("dec-{}-{}", carrier.id().0, n))
                    .spawn(move || worker.run());
                match spawned {
                    Ok(handle) => engine.handles.push(handle),
                    Err(e) => {
                        // Workers already running must not outlive the failure
                        engine.stop();
                        return Err(LayerError::InitializationFailed(format!(
                            "cannot spawn decoder thread for {}: {}",
                            carrier.id(),
                            e
                        )));
                    }
                }
            }
            info!("{}: {} decoder threads started", carrier.id(), config.decoder_threads);
        }

        Ok(engine)
    }

    pub fn group(&self) -> &Arc<CarrierGroup> {
        &self.group
    }

    pub fn shutdown_flag(&self) -> &Arc<ShutdownFlag> {
        &self.shutdown
    }

    /// Whether shutdown was requested, by a caller or by a failed decoder
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_set()
    }

    /// Per-carrier counters
    pub fn stats(&self) -> Vec<(CarrierId, CarrierStatsSnapshot)> {
        self.group
            .carriers()
            .iter()
            .map(|c| (c.id(), c.stats().snapshot()))
            .collect()
    }

    pub fn report(&self, n: usize) -> StatusReport {
        self.group.report(n)
    }

    pub fn rate_estimate(&self, n: usize) -> Option<RateEstimate> {
        self.group.rate_estimate(n)
    }

    /// Request shutdown, wait for the decoder tickets to drain, join every
    /// decoder thread and flush the sink
    pub fn stop(&mut self) {
        self.shutdown.request();
        let drain = self.group.drain();
        if !drain.wait_drained(DRAIN_TIMEOUT) {
            warn!("{} decoder tickets still live after {:?}", drain.live(), DRAIN_TIMEOUT);
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("Decoder thread panicked");
            }
        }
        for carrier in self.group.carriers() {
            carrier.flush_records(&self.sink);
        }
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = sink.flush() {
            warn!("Failed to flush DCI sink: {}", e);
        }
        info!("Monitor engine stopped");
    }
}

impl Drop for MonitorEngine {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::dci_log::MemorySink;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            decoder: BlindDecoderConfig {
                formats: Vec::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        let (_tx, rx) = sync_channel(1);
        assert!(MonitorEngine::start(config, vec![rx], Box::new(MemorySink::default())).is_err());
        let no_feeds = MonitorEngine::start(
            PipelineConfig::default(),
            Vec::new(),
            Box::new(MemorySink::default()),
        );
        assert!(no_feeds.is_err());
    }

    #[test]
    fn test_ring_too_small_rejected() {
        let config = PipelineConfig {
            decoder_threads: 4,
            ring_capacity: 32,
            ..Default::default()
        };
        let (_tx, rx) = sync_channel(1);
        let err = MonitorEngine::start(config, vec![rx], Box::new(MemorySink::default())).err();
        assert!(matches!(err, Some(LayerError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_start_and_stop() {
        let config = PipelineConfig {
            decoder_threads: 2,
            ring_capacity: 64,
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        let (tx_a, rx_a) = sync_channel(8);
        let (tx_b, rx_b) = sync_channel(8);
        let sink = Box::new(MemorySink::default());
        let mut engine = MonitorEngine::start(config, vec![rx_a, rx_b], sink).unwrap();
        assert_eq!(engine.stats().len(), 2);
        assert!(!engine.is_stopping());
        // Two carriers with two threads each share one ticket sequence
        assert_eq!(engine.group().drain().live(), 4);

        engine.stop();
        assert!(engine.is_stopping());
        assert_eq!(engine.group().drain().live(), 0);
        drop((tx_a, tx_b));
    }
}
