//! Common Types for the LTE Control Channel Monitor
//!
//! Defines fundamental identifiers shared by the decoding core and its collaborators

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};

/// Number of subframes in one radio frame
pub const SUBFRAMES_PER_FRAME: u32 = 10;

/// Number of distinct system frame numbers
pub const SFN_MODULO: u32 = 1024;

/// TTI counter wraps after 1024 frames (10.24 s)
pub const TTI_MODULO: u32 = SFN_MODULO * SUBFRAMES_PER_FRAME;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Lowest RNTI accepted from a blind decode by default
    pub const MIN_VALID: u16 = 0x000A;
    /// Highest C-RNTI; 0xFFF4..=0xFFFC are reserved
    pub const MAX_VALID: u16 = 0xFFF3;
    /// Paging RNTI
    pub const P_RNTI: Self = Self(0xFFFE);
    /// System information RNTI
    pub const SI_RNTI: Self = Self(0xFFFF);

    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Dense index into per-address tables
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Whether the RNTI falls inside `[min, max]`
    pub fn in_range(&self, min: u16, max: u16) -> bool {
        self.0 >= min && self.0 <= max
    }
}

impl std::fmt::Display for Rnti {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Radio carrier identifier (index into the carrier arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CarrierId(pub usize);

impl std::fmt::Display for CarrierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "carrier{}", self.0)
    }
}

/// Physical cell identity (LTE: 0..=503)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid LTE PCI value
    pub const MAX: u16 = 503;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// Subframe timing index, `sfn * 10 + sf_idx`, wrapping at [`TTI_MODULO`]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tti(pub u32);

impl Tti {
    /// Build a TTI from system frame number and subframe index
    pub fn from_sfn(sfn: u16, sf_idx: u8) -> Self {
        Self(((sfn as u32 % SFN_MODULO) * SUBFRAMES_PER_FRAME + sf_idx as u32) % TTI_MODULO)
    }

    /// System frame number
    pub fn sfn(&self) -> u16 {
        (self.0 / SUBFRAMES_PER_FRAME) as u16
    }

    /// Subframe index within the frame (0-9)
    pub fn sf_idx(&self) -> u8 {
        (self.0 % SUBFRAMES_PER_FRAME) as u8
    }

    /// Next TTI, wrapping
    pub fn next(&self) -> Self {
        Self((self.0 + 1) % TTI_MODULO)
    }
}

impl std::fmt::Display for Tti {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Link direction of a scheduling grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Downlink assignment
    Downlink,
    /// Uplink grant
    Uplink,
}

/// PDCCH aggregation level, in CCEs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum AggregationLevel {
    /// 1 CCE
    L1 = 1,
    /// 2 CCEs
    L2 = 2,
    /// 4 CCEs
    L4 = 4,
    /// 8 CCEs
    L8 = 8,
}

impl AggregationLevel {
    /// Search order used by the blind decoder (largest first)
    pub const DESCENDING: [AggregationLevel; 4] = [Self::L8, Self::L4, Self::L2, Self::L1];

    /// Largest aggregation level
    pub const MAX_CCES: usize = 8;

    /// Number of CCEs covered
    pub fn cces(&self) -> usize {
        *self as usize
    }

    /// log2 of the CCE count, as used in log output
    pub fn log2(&self) -> u8 {
        match self {
            Self::L1 => 0,
            Self::L2 => 1,
            Self::L4 => 2,
            Self::L8 => 3,
        }
    }
}

/// DCI formats understood by the blind decoder
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize,
)]
pub enum DciFormat {
    /// Uplink grant
    Format0 = 0,
    /// Single codeword downlink, type 0/1 allocation
    Format1 = 1,
    /// Compact downlink, type 2 allocation
    Format1A = 2,
    /// Closed-loop spatial multiplexing
    Format2 = 3,
    /// Open-loop spatial multiplexing
    Format2A = 4,
}

impl DciFormat {
    /// Direction of the grant carried by this format
    pub fn direction(&self) -> Direction {
        match self {
            Self::Format0 => Direction::Uplink,
            _ => Direction::Downlink,
        }
    }

    /// Multi-antenna formats carry two transport blocks
    pub fn is_multi_antenna(&self) -> bool {
        matches!(self, Self::Format2 | Self::Format2A)
    }

    /// Label used in DCI log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Format0 => "0",
            Self::Format1 => "1",
            Self::Format1A => "1A",
            Self::Format2 => "2",
            Self::Format2A => "2A",
        }
    }
}

impl std::str::FromStr for DciFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().trim_start_matches("FORMAT") {
            "0" => Ok(Self::Format0),
            "1" => Ok(Self::Format1),
            "1A" => Ok(Self::Format1A),
            "2" => Ok(Self::Format2),
            "2A" => Ok(Self::Format2A),
            other => Err(format!("Unknown DCI format: {}", other)),
        }
    }
}

/// Cell parameters learned after cell detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellParams {
    /// Physical cell identity
    pub pci: Pci,
    /// Number of physical resource blocks (the per-subframe PRB budget)
    pub nof_prb: u16,
    /// Number of cell-specific antenna ports (1, 2 or 4)
    pub nof_ports: u8,
}

impl CellParams {
    /// Create cell parameters with validation
    pub fn new(pci: Pci, nof_prb: u16, nof_ports: u8) -> Option<Self> {
        let prb_ok = (6..=110).contains(&nof_prb);
        let ports_ok = matches!(nof_ports, 1 | 2 | 4);
        if prb_ok && ports_ok {
            Some(Self { pci, nof_prb, nof_ports })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn test_pci_validation() {
        assert!(Pci::new(0).is_some());
        assert!(Pci::new(503).is_some());
        assert!(Pci::new(504).is_none());
    }

    #[test]
    fn test_tti_components() {
        let tti = Tti::from_sfn(1023, 9);
        assert_eq!(tti.0, 10239);
        assert_eq!(tti.sfn(), 1023);
        assert_eq!(tti.sf_idx(), 9);
        assert_eq!(tti.next(), Tti(0));
        assert_eq!(Tti::default(), Tti::from_sfn(0, 0));
    }

    #[test]
    fn test_aggregation_level_from_primitive() {
        assert_eq!(AggregationLevel::from_u8(4), Some(AggregationLevel::L4));
        assert_eq!(AggregationLevel::from_u8(3), None);
        assert_eq!(AggregationLevel::L8.log2(), 3);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("1a".parse::<DciFormat>().unwrap(), DciFormat::Format1A);
        assert_eq!("Format2A".parse::<DciFormat>().unwrap(), DciFormat::Format2A);
        assert!("3".parse::<DciFormat>().is_err());
        assert_eq!(DciFormat::Format0.direction(), Direction::Uplink);
    }

    #[test]
    fn test_cell_params_validation() {
        let pci = Pci::new(1).unwrap();
        assert!(CellParams::new(pci, 50, 2).is_some());
        assert!(CellParams::new(pci, 111, 2).is_none());
        assert!(CellParams::new(pci, 50, 3).is_none());
    }
}
