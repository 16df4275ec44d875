//! ZeroMQ Handler Implementation
//!
//! Publishes finalized DCI records and status reports to downstream consumers

use crate::dci_log::DciSink;
use crate::message_types::DciRecord;
use crate::InterfaceError;
use serde::Serialize;
use tracing::{debug, info};
use zmq::Context;

/// Topic prefix for DCI record frames
pub const DCI_TOPIC: &[u8] = b"dci";
/// Topic prefix for status report frames
pub const STATUS_TOPIC: &[u8] = b"status";

/// ZMQ socket types
#[derive(Debug, Clone, Copy)]
pub enum SocketType {
    /// Publish-Subscribe pattern (monitor as publisher)
    Pub,
    /// Push-Pull pattern (monitor as pusher)
    Push,
}

/// ZMQ handler configuration
#[derive(Debug, Clone)]
pub struct ZmqConfig {
    /// Socket type
    pub socket_type: SocketType,
    /// Bind address for subscribers
    pub bind_address: String,
    /// High water mark for outgoing messages
    pub hwm: i32,
}

/// ZMQ publisher for DCI records and status reports
pub struct ZmqHandler {
    config: ZmqConfig,
    context: Context,
    socket: Option<zmq::Socket>,
    sent: u64,
}

impl ZmqHandler {
    /// Create a new ZMQ handler
    pub fn new(config: ZmqConfig) -> Self {
        Self {
            config,
            context: Context::new(),
            socket: None,
            sent: 0,
        }
    }

    /// Bind the socket
    pub fn initialize(&mut self) -> Result<(), InterfaceError> {
        info!("Initializing ZMQ handler");

        let socket = match self.config.socket_type {
            SocketType::Pub => self.context.socket(zmq::PUB)?,
            SocketType::Push => self.context.socket(zmq::PUSH)?,
        };
        socket.set_sndhwm(self.config.hwm)?;
        socket.bind(&self.config.bind_address)?;
        info!("ZMQ {:?} socket bound to {}", self.config.socket_type, self.config.bind_address);

        self.socket = Some(socket);
        Ok(())
    }

    /// Actual bound endpoint (resolves wildcard ports)
    pub fn endpoint(&self) -> Result<String, InterfaceError> {
        let socket = self.socket.as_ref().ok_or(InterfaceError::NotInitialized)?;
        socket
            .get_last_endpoint()?
            .map_err(|_| InterfaceError::InvalidConfig("non UTF-8 endpoint".to_string()))
    }

    /// Publish a topic-prefixed frame pair
    fn send_frames(&mut self, topic: &[u8], payload: &[u8]) -> Result<(), InterfaceError> {
        let socket = self.socket.as_ref().ok_or(InterfaceError::NotInitialized)?;
        socket.send(topic, zmq::SNDMORE)?;
        socket.send(payload, 0)?;
        self.sent += 1;
        Ok(())
    }

    /// Publish any serializable value as JSON under the status topic
    pub fn publish_json<T: Serialize>(&mut self, value: &T) -> Result<(), InterfaceError> {
        let json = serde_json::to_vec(value)?;
        debug!("Publishing status frame: {} bytes", json.len());
        self.send_frames(STATUS_TOPIC, &json)
    }

    /// Frames sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl DciSink for ZmqHandler {
    fn write_record(&mut self, record: &DciRecord) -> Result<(), InterfaceError> {
        let line = record.to_tsv();
        self.send_frames(DCI_TOPIC, line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_uninitialized_handler_rejects_records() {
        let mut handler = ZmqHandler::new(ZmqConfig {
            socket_type: SocketType::Pub,
            bind_address: "tcp://127.0.0.1:*".to_string(),
            hwm: 1000,
        });
        assert!(matches!(handler.publish_json(&1u8), Err(InterfaceError::NotInitialized)));
    }

    #[test]
    fn test_push_pull_delivery() {
        let mut handler = ZmqHandler::new(ZmqConfig {
            socket_type: SocketType::Push,
            bind_address: "tcp://127.0.0.1:*".to_string(),
            hwm: 1000,
        });
        handler.initialize().unwrap();
        let endpoint = handler.endpoint().unwrap();

        let context = Context::new();
        let pull = context.socket(zmq::PULL).unwrap();
        pull.set_rcvtimeo(2000).unwrap();
        pull.connect(&endpoint).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        handler.publish_json(&vec![1u32, 2, 3]).unwrap();

        let topic = pull.recv_bytes(0).unwrap();
        let payload = pull.recv_bytes(0).unwrap();
        assert_eq!(topic, STATUS_TOPIC);
        assert_eq!(payload, b"[1,2,3]");
        assert_eq!(handler.sent(), 1);
    }
}
