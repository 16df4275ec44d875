//! Physical Layer (PHY) Submodules
//!
//! This module contains the LTE PDCCH receive chain used for passive monitoring,
//! according to 3GPP TS 36.211-36.213.

pub mod control_region;
pub mod scrambling;
pub mod convolutional;
pub mod rate_match;
pub mod search_space;
pub mod dci;
pub mod tbs;
pub mod pdcch;

// Re-export commonly used types
pub use control_region::{nof_cce, ControlRegion, BITS_PER_CCE};
pub use dci::{Dci, DciLayout, ResourceAllocation, TransportBlockFields};
pub use pdcch::{
    encode_dci, BlindDecoder, BlindDecoderConfig, DecodeThresholds, DecodedMessage, LocationDecode,
    Resolution, TransportBlockInfo, DEFAULT_FORMATS,
};
pub use search_space::{generate_candidates, Candidate};
pub use tbs::McsTable;
