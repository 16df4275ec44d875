//! Message Types for the Synchronization Feed and DCI Output
//!
//! Defines the wire formats exchanged with the front-end and downstream consumers

use common::types::{CarrierId, CellParams, Pci};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

use crate::InterfaceError;

/// Message published by the synchronization layer for one carrier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeedMessage {
    /// Cell detected and MIB decoded; sent once per carrier
    CellDetected {
        /// Physical cell identity
        pci: u16,
        /// Cell bandwidth in PRBs
        nof_prb: u16,
        /// Cell-specific antenna ports
        nof_ports: u8,
    },
    /// One aligned subframe of control-region samples
    Subframe(SubframeMessage),
}

/// Aligned subframe as carried on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubframeMessage {
    /// System frame number
    pub sfn: u16,
    /// Subframe index (0-9)
    pub sf_idx: u8,
    /// Control format indicator decoded from PCFICH
    pub cfi: u8,
    /// Equalized PDCCH resource elements in CCE order, as (I, Q) pairs
    pub control_iq: Vec<[f32; 2]>,
}

/// Event delivered to a carrier after wire decoding
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Cell parameters became known
    CellDetected(CellParams),
    /// A subframe is ready for blind decoding
    Subframe(AlignedSubframe),
}

/// One aligned subframe handed to the decoder threads
#[derive(Debug, Clone)]
pub struct AlignedSubframe {
    /// Originating carrier
    pub carrier: CarrierId,
    /// System frame number
    pub sfn: u16,
    /// Subframe index (0-9)
    pub sf_idx: u8,
    /// Control format indicator
    pub cfi: u8,
    /// Equalized PDCCH resource elements in CCE order
    pub control_symbols: Vec<Complex32>,
}

impl FeedMessage {
    /// Decode a feed message from its bincode representation
    pub fn from_wire(bytes: &[u8]) -> Result<Self, InterfaceError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Encode to bincode
    pub fn to_wire(&self) -> Result<Vec<u8>, InterfaceError> {
        Ok(bincode::serialize(self)?)
    }

    /// Attach carrier context and validate
    pub fn into_event(self, carrier: CarrierId) -> Result<FeedEvent, InterfaceError> {
        match self {
            FeedMessage::CellDetected { pci, nof_prb, nof_ports } => {
                let pci = Pci::new(pci).ok_or(InterfaceError::InvalidMessage)?;
                CellParams::new(pci, nof_prb, nof_ports)
                    .map(FeedEvent::CellDetected)
                    .ok_or(InterfaceError::InvalidMessage)
            }
            FeedMessage::Subframe(msg) => {
                if msg.sf_idx > 9 {
                    return Err(InterfaceError::InvalidMessage);
                }
                Ok(FeedEvent::Subframe(AlignedSubframe {
                    carrier,
                    sfn: msg.sfn,
                    sf_idx: msg.sf_idx,
                    cfi: msg.cfi,
                    control_symbols: msg
                        .control_iq
                        .into_iter()
                        .map(|[re, im]| Complex32::new(re, im))
                        .collect(),
                }))
            }
        }
    }
}

/// One accepted DCI as written to the log sink, one tab-separated line per record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DciRecord {
    pub tti: u32,
    pub rnti: u16,
    pub nof_prb: u16,
    pub mcs_tb1: u8,
    pub mcs_tb2: u8,
    pub tbs_tb1: u32,
    pub tbs_tb2: u32,
    pub tbs_hm_tb1: u32,
    pub tbs_hm_tb2: u32,
    pub decode_prob: f32,
    /// Aggregation level as log2 of the CCE count
    pub l: u8,
    pub ncce: u16,
    pub max_freq_rnti: u16,
    pub max_dl_freq_rnti: u16,
    pub max_ul_freq_rnti: u16,
    pub nof_active_ue: u32,
    pub active: bool,
    pub my_dl_cnt: u32,
    pub my_ul_cnt: u32,
    pub format: String,
}

impl DciRecord {
    /// Column header matching [`DciRecord::to_tsv`]
    pub const HEADER: &'static str = "tti\trnti\tnof_prb\tmcs_tb1\tmcs_tb2\ttbs_tb1\ttbs_tb2\t\
        tbs_hm_tb1\ttbs_hm_tb2\tdecode_prob\tL\tncce\tmax_freq_rnti\tmax_dl_freq_rnti\t\
        max_ul_freq_rnti\tnof_active_ue\tactive\tmy_dl_cnt\tmy_ul_cnt\tformat";

    /// Render as one tab-separated line (no trailing newline)
    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.tti,
            self.rnti,
            self.nof_prb,
            self.mcs_tb1,
            self.mcs_tb2,
            self.tbs_tb1,
            self.tbs_tb2,
            self.tbs_hm_tb1,
            self.tbs_hm_tb2,
            self.decode_prob,
            self.l,
            self.ncce,
            self.max_freq_rnti,
            self.max_dl_freq_rnti,
            self.max_ul_freq_rnti,
            self.nof_active_ue,
            self.active as u8,
            self.my_dl_cnt,
            self.my_ul_cnt,
            self.format,
        )
    }
}
