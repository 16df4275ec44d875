//! ZMQ Subframe Feed
//!
//! Receives aligned subframes from the external synchronization layer over a
//! ZeroMQ SUB socket and forwards them to a carrier's dispatch queue.

use crate::message_types::{FeedEvent, FeedMessage};
use crate::InterfaceError;
use common::types::CarrierId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use zmq::Context;

/// Default receive timeout so the feed thread can observe shutdown
pub const DEFAULT_RECV_TIMEOUT_MS: i32 = 100;

/// Back-off between attempts to queue a cell detection
const CELL_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Feed configuration for one carrier
#[derive(Debug, Clone)]
pub struct SubframeFeedConfig {
    /// Carrier fed by this socket
    pub carrier: CarrierId,
    /// Address of the synchronization layer's PUB socket
    pub address: String,
    /// Receive timeout in milliseconds
    pub recv_timeout_ms: i32,
}

impl SubframeFeedConfig {
    pub fn new(carrier: CarrierId, address: impl Into<String>) -> Self {
        Self {
            carrier,
            address: address.into(),
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT_MS,
        }
    }
}

/// Feed counters
#[derive(Debug, Default, Clone)]
pub struct FeedStats {
    pub subframes: u64,
    pub malformed: u64,
    /// Subframes lost to a full dispatch queue
    pub dropped: u64,
}

/// Queue one event for the decoders; false once the queue is closed
///
/// Subframes are dropped when the queue is full. A cell detection is retried
/// until it is queued or `running` clears.
fn forward(
    carrier: CarrierId,
    sink: &SyncSender<FeedEvent>,
    event: FeedEvent,
    running: &AtomicBool,
    stats: &mut FeedStats,
) -> bool {
    let mut event = event;
    loop {
        match sink.try_send(event) {
            Ok(()) => return true,
            Err(TrySendError::Full(FeedEvent::Subframe(_))) => {
                stats.dropped += 1;
                if stats.dropped % 1000 == 1 {
                    warn!("{}: dispatch queue full, {} subframes dropped", carrier, stats.dropped);
                }
                return true;
            }
            Err(TrySendError::Full(cell)) => {
                if !running.load(Ordering::Acquire) {
                    debug!("{}: cell detection abandoned at shutdown", carrier);
                    return true;
                }
                event = cell;
                std::thread::sleep(CELL_RETRY_INTERVAL);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("{}: dispatch queue closed, stopping feed", carrier);
                return false;
            }
        }
    }
}

/// Running subframe feed; joins its thread on drop of the handle
pub struct ZmqSubframeFeed {
    carrier: CarrierId,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<FeedStats>>,
}

impl ZmqSubframeFeed {
    /// Connect and start forwarding events into `sink`
    pub fn spawn(
        config: SubframeFeedConfig,
        sink: SyncSender<FeedEvent>,
    ) -> Result<Self, InterfaceError> {
        let context = Context::new();
        let socket = context.socket(zmq::SUB)?;
        socket.set_subscribe(b"")?;
        socket.set_rcvtimeo(config.recv_timeout_ms)?;
        socket.connect(&config.address)?;
        info!("{}: subframe feed connected to {}", config.carrier, config.address);

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let carrier = config.carrier;

        let handle = std::thread::Builder::new()
            .name(format!("feed-{}", carrier.0))
            .spawn(move || {
                // Keep the context alive for the socket's lifetime
                let _context = context;
                let mut stats = FeedStats::default();

                while thread_running.load(Ordering::Acquire) {
                    let bytes = match socket.recv_bytes(0) {
                        Ok(bytes) => bytes,
                        Err(zmq::Error::EAGAIN) => continue,
                        Err(e) => {
                            error!("{}: feed receive failed: {}", carrier, e);
                            break;
                        }
                    };

                    let decoded =
                        FeedMessage::from_wire(&bytes).and_then(|m| m.into_event(carrier));
                    let event = match decoded {
                        Ok(event) => event,
                        Err(e) => {
                            stats.malformed += 1;
                            warn!("{}: dropping malformed feed message: {}", carrier, e);
                            continue;
                        }
                    };

                    if matches!(event, FeedEvent::Subframe(_)) {
                        stats.subframes += 1;
                    }

                    if !forward(carrier, &sink, event, &thread_running, &mut stats) {
                        break;
                    }
                }

                info!("{}: subframe feed stopped after {} subframes", carrier, stats.subframes);
                stats
            })?;

        Ok(Self {
            carrier,
            running,
            handle: Some(handle),
        })
    }

    /// Carrier served by this feed
    pub fn carrier(&self) -> CarrierId {
        self.carrier
    }

    /// Stop the feed thread and return its counters
    pub fn shutdown(mut self) -> FeedStats {
        self.stop()
    }

    fn stop(&mut self) -> FeedStats {
        self.running.store(false, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => FeedStats::default(),
        }
    }
}

impl Drop for ZmqSubframeFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
