//! Passive Control Channel Monitoring Layers
//!
//! This crate implements the blind PDCCH decoding core: search space generation,
//! multi-format trial decoding, per-location and per-subframe disambiguation, and
//! the per-carrier status ring that lets several decoder threads share a carrier.

pub mod phy;
pub mod mac;
pub mod status;
pub mod engine;

use common::types::{CarrierId, Tti};
use thiserror::Error;

/// Common errors for the monitoring layers
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Unknown carrier {0}")]
    UnknownCarrier(CarrierId),

    #[error("{carrier}: no token available for TTI {tti} ({outstanding} outstanding)")]
    TokenUnavailable {
        carrier: CarrierId,
        tti: Tti,
        outstanding: usize,
    },

    #[error("{carrier}: TTI {tti} is behind the ring header")]
    StaleSubframe { carrier: CarrierId, tti: Tti },

    #[error("{carrier}: TTI {tti} would overwrite an unresolved ring slot")]
    RingOverflow { carrier: CarrierId, tti: Tti },

    #[error("{carrier}: TTI {tti} already claimed")]
    DuplicateSubframe { carrier: CarrierId, tti: Tti },

    #[error("{carrier}: no outstanding token for ring index {index}")]
    UnknownToken { carrier: CarrierId, index: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}
