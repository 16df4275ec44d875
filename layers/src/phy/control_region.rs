//! PDCCH Control Region
//!
//! Soft demapping and descrambling of the control region, and CCE bookkeeping
//! (3GPP TS 36.211 Section 6.8)

use crate::phy::scrambling::{descramble_soft, pdcch_cinit};
use common::types::CellParams;
use num_complex::Complex32;
use tracing::trace;

/// Bits carried by one CCE (9 REGs x 4 REs x 2 bits)
pub const BITS_PER_CCE: usize = 72;

/// Resource element groups per CCE
pub const REGS_PER_CCE: usize = 9;

/// REGs used by PCFICH in symbol 0
const PCFICH_REGS: usize = 4;

/// REGs per PHICH group (normal CP)
const REGS_PER_PHICH_GROUP: usize = 3;

/// Number of PHICH groups for Ng = 1
pub fn phich_groups(nof_prb: u16) -> usize {
    (nof_prb as usize + 7) / 8
}

/// Number of CCEs available for PDCCH given the CFI
pub fn nof_cce(cfi: u8, nof_prb: u16, nof_ports: u8) -> usize {
    if !(1..=3).contains(&cfi) {
        return 0;
    }

    let prb = nof_prb as usize;
    let mut regs = 0;
    for symbol in 0..cfi {
        regs += match symbol {
            0 => 2 * prb,
            1 if nof_ports == 4 => 2 * prb,
            _ => 3 * prb,
        };
    }

    let reserved = PCFICH_REGS + REGS_PER_PHICH_GROUP * phich_groups(nof_prb);
    regs.saturating_sub(reserved) / REGS_PER_CCE
}

/// Soft QPSK demapping; positive LLR means bit 0
pub fn qpsk_llrs(symbols: &[Complex32]) -> Vec<f32> {
    let scale = std::f32::consts::SQRT_2;
    let mut llrs = Vec::with_capacity(symbols.len() * 2);
    for symbol in symbols {
        llrs.push(scale * symbol.re);
        llrs.push(scale * symbol.im);
    }
    llrs
}

/// Descrambled soft bits of one subframe's control region
#[derive(Debug, Clone)]
pub struct ControlRegion {
    llrs: Vec<f32>,
    nof_cce: usize,
}

impl ControlRegion {
    /// Demap and descramble equalized control-region symbols (CCE order)
    ///
    /// The region is truncated or zero-padded to the CCE count derived from the CFI;
    /// zero LLRs act as erasures.
    pub fn from_symbols(symbols: &[Complex32], cell: &CellParams, sf_idx: u8, cfi: u8) -> Self {
        let nof_cce = nof_cce(cfi, cell.nof_prb, cell.nof_ports);
        let mut llrs = qpsk_llrs(symbols);
        llrs.resize(nof_cce * BITS_PER_CCE, 0.0);
        descramble_soft(&mut llrs, pdcch_cinit(sf_idx, cell.pci.0));

        trace!(
            "Control region sf {} cfi {}: {} symbols, {} CCEs",
            sf_idx,
            cfi,
            symbols.len(),
            nof_cce
        );

        Self { llrs, nof_cce }
    }

    /// Build from already descrambled soft bits
    pub fn from_llrs(mut llrs: Vec<f32>, nof_cce: usize) -> Self {
        llrs.resize(nof_cce * BITS_PER_CCE, 0.0);
        Self { llrs, nof_cce }
    }

    /// CCEs in this region
    pub fn nof_cce(&self) -> usize {
        self.nof_cce
    }

    /// All soft bits
    pub fn llrs(&self) -> &[f32] {
        &self.llrs
    }

    /// Soft bits of `count` CCEs starting at `ncce`, if in range
    pub fn cce_llrs(&self, ncce: usize, count: usize) -> Option<&[f32]> {
        if ncce + count > self.nof_cce {
            return None;
        }
        Some(&self.llrs[ncce * BITS_PER_CCE..(ncce + count) * BITS_PER_CCE])
    }
}
