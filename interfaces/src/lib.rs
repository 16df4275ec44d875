//! External Collaborator Interfaces Library
//!
//! This crate provides the seams between the decoding core and the outside world:
//! the subframe feed from the synchronization layer and the DCI record sinks.

pub mod message_types;
pub mod subframe_feed;
pub mod dci_log;
pub mod zmq_handler;

use thiserror::Error;

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("ZMQ error: {0}")]
    ZmqError(#[from] zmq::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Wire decoding error: {0}")]
    WireError(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid message format")]
    InvalidMessage,

    #[error("Interface not initialized")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
