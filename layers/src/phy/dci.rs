//! Downlink Control Information Formats
//!
//! Payload sizes and field layouts for DCI formats 0, 1, 1A, 2 and 2A
//! (3GPP TS 36.212 Section 5.3.3.1, FDD).

use common::types::DciFormat;
use common::utils::{append_bits, ceil_log2, read_bits};

/// Payload sizes that collide with the PDCCH rate-matching ambiguity and get one padding bit
pub const AMBIGUOUS_SIZES: [usize; 10] = [12, 14, 16, 20, 24, 26, 32, 40, 44, 56];

/// CRC length appended to every DCI
pub const CRC_BITS: usize = 16;

/// Resource block group size P (36.213 Table 7.1.6.1-1)
pub fn rbg_size(nof_prb: u16) -> usize {
    match nof_prb {
        0..=10 => 1,
        11..=26 => 2,
        27..=63 => 3,
        _ => 4,
    }
}

/// Number of RBGs covering the carrier
pub fn nof_rbg(nof_prb: u16) -> usize {
    let p = rbg_size(nof_prb);
    (nof_prb as usize + p - 1) / p
}

/// Bits of a type 2 resource indication value
pub fn riv_bits(nof_prb: u16) -> usize {
    let n = nof_prb as u32;
    ceil_log2(n * (n + 1) / 2) as usize
}

/// Encode a contiguous allocation as a resource indication value
pub fn riv_encode(start: u16, len: u16, nof_prb: u16) -> u32 {
    let (n, s, l) = (nof_prb as u32, start as u32, len as u32);
    if l - 1 <= n / 2 {
        n * (l - 1) + s
    } else {
        n * (n - l + 1) + (n - 1 - s)
    }
}

/// Decode a resource indication value into `(start, length)`
pub fn riv_decode(riv: u32, nof_prb: u16) -> Option<(u16, u16)> {
    let n = nof_prb as u32;
    if n == 0 || riv >= n * (n + 1) / 2 {
        return None;
    }

    let a = riv / n;
    let b = riv % n;
    let (start, len) = if a + b < n { (b, a + 1) } else { (n - 1 - b, n - a + 1) };
    if len == 0 || start + len > n {
        return None;
    }
    Some((start as u16, len as u16))
}

/// Resource allocation carried by a DCI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAllocation {
    /// Type 0: bitmap over resource block groups, MSB is RBG 0
    Type0 { bitmap: u32 },
    /// Type 1: bitmap over PRBs of one RBG subset
    Type1 { subset: u8, shift: bool, bitmap: u32 },
    /// Type 2: contiguous virtual resource blocks
    Type2 { riv: u32, distributed: bool },
}

/// Per transport block fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportBlockFields {
    /// Modulation and coding scheme index
    pub mcs: u8,
    /// New data indicator
    pub ndi: bool,
    /// Redundancy version
    pub rv: u8,
    /// False for a disabled second codeword
    pub enabled: bool,
}

/// Unpacked DCI payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dci {
    pub format: DciFormat,
    pub allocation: ResourceAllocation,
    /// Allocated PRBs derived from the allocation
    pub nof_prb: u16,
    pub tb: [TransportBlockFields; 2],
    pub harq_pid: u8,
    pub tpc: u8,
    /// Format 0 frequency hopping flag
    pub hopping: bool,
    /// Format 0 cyclic shift for DM-RS
    pub dmrs_cshift: u8,
    /// Format 0 CQI request
    pub cqi_request: bool,
    /// Format 2/2A transport block to codeword swap flag
    pub swap: bool,
    /// Format 2/2A precoding information
    pub precoding: u8,
    /// Cross-carrier indicator (absent in these formats, always 0)
    pub carrier_indicator: u8,
}

impl Dci {
    /// Grant skeleton with the given allocation and first transport block
    pub fn new(
        format: DciFormat,
        allocation: ResourceAllocation,
        tb1: TransportBlockFields,
    ) -> Self {
        Self {
            format,
            allocation,
            nof_prb: 0,
            tb: [tb1, TransportBlockFields::default()],
            harq_pid: 0,
            tpc: 0,
            hopping: false,
            dmrs_cshift: 0,
            cqi_request: false,
            swap: false,
            precoding: 0,
            carrier_indicator: 0,
        }
    }
}

/// Bit layout of one format for one cell configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DciLayout {
    pub format: DciFormat,
    pub nof_prb: u16,
    pub nof_ports: u8,
    /// Payload length without CRC
    pub payload_bits: usize,
}

/// Format 0 / 1A size after alignment
fn size_format0_1a(nof_prb: u16) -> usize {
    let mut size = riv_bits(nof_prb) + 15;
    if AMBIGUOUS_SIZES.contains(&size) {
        size += 1;
    }
    size
}

fn ra_header_bits(nof_prb: u16) -> usize {
    if nof_prb > 10 {
        1
    } else {
        0
    }
}

fn precoding_bits(format: DciFormat, nof_ports: u8) -> usize {
    match (format, nof_ports) {
        (DciFormat::Format2, 2) => 3,
        (DciFormat::Format2, 4) => 6,
        (DciFormat::Format2A, 4) => 2,
        _ => 0,
    }
}

impl DciLayout {
    /// Layout for a format, or `None` if the format cannot occur in this cell
    pub fn new(format: DciFormat, nof_prb: u16, nof_ports: u8) -> Option<Self> {
        if nof_prb == 0 {
            return None;
        }
        if format.is_multi_antenna() && nof_ports < 2 {
            return None;
        }

        let rbg_bits = ra_header_bits(nof_prb) + nof_rbg(nof_prb);
        let payload_bits = match format {
            DciFormat::Format0 | DciFormat::Format1A => size_format0_1a(nof_prb),
            DciFormat::Format1 => {
                let mut size = rbg_bits + 13;
                if size == size_format0_1a(nof_prb) {
                    size += 1;
                }
                while AMBIGUOUS_SIZES.contains(&size) {
                    size += 1;
                }
                size
            }
            DciFormat::Format2 | DciFormat::Format2A => {
                let mut size = rbg_bits + 22 + precoding_bits(format, nof_ports);
                while AMBIGUOUS_SIZES.contains(&size) {
                    size += 1;
                }
                size
            }
        };

        Some(Self {
            format,
            nof_prb,
            nof_ports,
            payload_bits,
        })
    }

    /// Payload plus CRC
    pub fn coded_bits(&self) -> usize {
        self.payload_bits + CRC_BITS
    }

    fn hopping_bits(&self) -> usize {
        if self.nof_prb < 50 {
            1
        } else {
            2
        }
    }

    /// PRBs covered by a type 0 bitmap
    fn type0_prbs(&self, bitmap: u32) -> u16 {
        let p = rbg_size(self.nof_prb);
        let groups = nof_rbg(self.nof_prb);
        let mut prbs = 0;
        for rbg in 0..groups {
            if (bitmap >> (groups - 1 - rbg)) & 1 == 1 {
                prbs += if rbg == groups - 1 {
                    self.nof_prb as usize - p * (groups - 1)
                } else {
                    p
                };
            }
        }
        prbs as u16
    }

    fn type1_bitmap_bits(&self) -> usize {
        let p = rbg_size(self.nof_prb);
        nof_rbg(self.nof_prb).saturating_sub(ceil_log2(p as u32) as usize + 1)
    }

    /// PRBs allocated by a resource allocation
    pub fn allocated_prbs(&self, allocation: &ResourceAllocation) -> Option<u16> {
        let prbs = match *allocation {
            ResourceAllocation::Type0 { bitmap } => self.type0_prbs(bitmap),
            ResourceAllocation::Type1 { bitmap, .. } => bitmap.count_ones() as u16,
            ResourceAllocation::Type2 { riv, .. } => riv_decode(riv, self.nof_prb)?.1,
        };
        if prbs == 0 {
            None
        } else {
            Some(prbs)
        }
    }

    fn pack_rbg_allocation(&self, bits: &mut Vec<u8>, allocation: &ResourceAllocation) {
        let header = ra_header_bits(self.nof_prb) == 1;
        match *allocation {
            ResourceAllocation::Type1 { subset, shift, bitmap } if header => {
                bits.push(1);
                append_bits(bits, subset as u32, ceil_log2(rbg_size(self.nof_prb) as u32) as usize);
                bits.push(shift as u8);
                append_bits(bits, bitmap, self.type1_bitmap_bits());
            }
            ResourceAllocation::Type0 { bitmap } => {
                if header {
                    bits.push(0);
                }
                append_bits(bits, bitmap, nof_rbg(self.nof_prb));
            }
            _ => {
                if header {
                    bits.push(0);
                }
                append_bits(bits, 0, nof_rbg(self.nof_prb));
            }
        }
    }

    fn unpack_rbg_allocation(&self, bits: &[u8], offset: &mut usize) -> ResourceAllocation {
        let type1 = ra_header_bits(self.nof_prb) == 1 && read_bits(bits, offset, 1) == 1;
        if type1 {
            let subset_bits = ceil_log2(rbg_size(self.nof_prb) as u32) as usize;
            let subset = read_bits(bits, offset, subset_bits) as u8;
            let shift = read_bits(bits, offset, 1) == 1;
            let bitmap = read_bits(bits, offset, self.type1_bitmap_bits());
            ResourceAllocation::Type1 { subset, shift, bitmap }
        } else {
            ResourceAllocation::Type0 {
                bitmap: read_bits(bits, offset, nof_rbg(self.nof_prb)),
            }
        }
    }

    /// Serialize a DCI into exactly `payload_bits` bits
    pub fn pack(&self, dci: &Dci) -> Vec<u8> {
        let mut bits = Vec::with_capacity(self.payload_bits);
        let riv_len = riv_bits(self.nof_prb);
        let (riv, distributed) = match dci.allocation {
            ResourceAllocation::Type2 { riv, distributed } => (riv, distributed),
            _ => (0, false),
        };
        let tb1 = dci.tb[0];
        let tb2 = dci.tb[1];

        match self.format {
            DciFormat::Format0 => {
                bits.push(0);
                bits.push(dci.hopping as u8);
                if dci.hopping {
                    append_bits(&mut bits, 0, self.hopping_bits());
                    append_bits(&mut bits, riv, riv_len - self.hopping_bits());
                } else {
                    append_bits(&mut bits, riv, riv_len);
                }
                append_bits(&mut bits, tb1.mcs as u32, 5);
                bits.push(tb1.ndi as u8);
                append_bits(&mut bits, dci.tpc as u32, 2);
                append_bits(&mut bits, dci.dmrs_cshift as u32, 3);
                bits.push(dci.cqi_request as u8);
            }
            DciFormat::Format1A => {
                bits.push(1);
                bits.push(distributed as u8);
                if distributed && self.nof_prb >= 50 {
                    bits.push(0);
                    append_bits(&mut bits, riv, riv_len - 1);
                } else {
                    append_bits(&mut bits, riv, riv_len);
                }
                append_bits(&mut bits, tb1.mcs as u32, 5);
                append_bits(&mut bits, dci.harq_pid as u32, 3);
                bits.push(tb1.ndi as u8);
                append_bits(&mut bits, tb1.rv as u32, 2);
                append_bits(&mut bits, dci.tpc as u32, 2);
            }
            DciFormat::Format1 => {
                self.pack_rbg_allocation(&mut bits, &dci.allocation);
                append_bits(&mut bits, tb1.mcs as u32, 5);
                append_bits(&mut bits, dci.harq_pid as u32, 3);
                bits.push(tb1.ndi as u8);
                append_bits(&mut bits, tb1.rv as u32, 2);
                append_bits(&mut bits, dci.tpc as u32, 2);
            }
            DciFormat::Format2 | DciFormat::Format2A => {
                self.pack_rbg_allocation(&mut bits, &dci.allocation);
                append_bits(&mut bits, dci.tpc as u32, 2);
                append_bits(&mut bits, dci.harq_pid as u32, 3);
                bits.push(dci.swap as u8);
                for tb in [tb1, tb2] {
                    let (mcs, rv) = if tb.enabled { (tb.mcs, tb.rv) } else { (0, 1) };
                    append_bits(&mut bits, mcs as u32, 5);
                    bits.push(tb.ndi as u8);
                    append_bits(&mut bits, rv as u32, 2);
                }
                let width = precoding_bits(self.format, self.nof_ports);
                append_bits(&mut bits, dci.precoding as u32, width);
            }
        }

        bits.resize(self.payload_bits, 0);
        bits
    }

    /// Parse a payload; `None` if the fields do not describe a usable grant
    pub fn unpack(&self, bits: &[u8]) -> Option<Dci> {
        if bits.len() != self.payload_bits {
            return None;
        }

        let mut offset = 0;
        let riv_len = riv_bits(self.nof_prb);
        let mut tb1 = TransportBlockFields {
            enabled: true,
            ..Default::default()
        };
        let mut tb2 = TransportBlockFields::default();

        let mut dci = match self.format {
            DciFormat::Format0 => {
                if read_bits(bits, &mut offset, 1) != 0 {
                    return None;
                }
                let hopping = read_bits(bits, &mut offset, 1) == 1;
                let riv = if hopping {
                    read_bits(bits, &mut offset, self.hopping_bits());
                    read_bits(bits, &mut offset, riv_len - self.hopping_bits())
                } else {
                    read_bits(bits, &mut offset, riv_len)
                };
                tb1.mcs = read_bits(bits, &mut offset, 5) as u8;
                tb1.ndi = read_bits(bits, &mut offset, 1) == 1;
                let allocation = ResourceAllocation::Type2 {
                    riv,
                    distributed: false,
                };
                let mut dci = Dci::new(self.format, allocation, tb1);
                dci.hopping = hopping;
                dci.tpc = read_bits(bits, &mut offset, 2) as u8;
                dci.dmrs_cshift = read_bits(bits, &mut offset, 3) as u8;
                dci.cqi_request = read_bits(bits, &mut offset, 1) == 1;
                dci
            }
            DciFormat::Format1A => {
                if read_bits(bits, &mut offset, 1) != 1 {
                    return None;
                }
                let distributed = read_bits(bits, &mut offset, 1) == 1;
                let riv = if distributed && self.nof_prb >= 50 {
                    read_bits(bits, &mut offset, 1);
                    read_bits(bits, &mut offset, riv_len - 1)
                } else {
                    read_bits(bits, &mut offset, riv_len)
                };
                // All-ones localized RIV is a PDCCH order for random access
                if !distributed && riv == (1 << riv_len) - 1 {
                    return None;
                }
                tb1.mcs = read_bits(bits, &mut offset, 5) as u8;
                let harq_pid = read_bits(bits, &mut offset, 3) as u8;
                tb1.ndi = read_bits(bits, &mut offset, 1) == 1;
                tb1.rv = read_bits(bits, &mut offset, 2) as u8;
                let allocation = ResourceAllocation::Type2 { riv, distributed };
                let mut dci = Dci::new(self.format, allocation, tb1);
                dci.harq_pid = harq_pid;
                dci.tpc = read_bits(bits, &mut offset, 2) as u8;
                dci
            }
            DciFormat::Format1 => {
                let allocation = self.unpack_rbg_allocation(bits, &mut offset);
                tb1.mcs = read_bits(bits, &mut offset, 5) as u8;
                let harq_pid = read_bits(bits, &mut offset, 3) as u8;
                tb1.ndi = read_bits(bits, &mut offset, 1) == 1;
                tb1.rv = read_bits(bits, &mut offset, 2) as u8;
                let mut dci = Dci::new(self.format, allocation, tb1);
                dci.harq_pid = harq_pid;
                dci.tpc = read_bits(bits, &mut offset, 2) as u8;
                dci
            }
            DciFormat::Format2 | DciFormat::Format2A => {
                let allocation = self.unpack_rbg_allocation(bits, &mut offset);
                let tpc = read_bits(bits, &mut offset, 2) as u8;
                let harq_pid = read_bits(bits, &mut offset, 3) as u8;
                let swap = read_bits(bits, &mut offset, 1) == 1;
                for tb in [&mut tb1, &mut tb2] {
                    tb.mcs = read_bits(bits, &mut offset, 5) as u8;
                    tb.ndi = read_bits(bits, &mut offset, 1) == 1;
                    tb.rv = read_bits(bits, &mut offset, 2) as u8;
                    tb.enabled = !(tb.mcs == 0 && tb.rv == 1);
                }
                if !tb1.enabled && !tb2.enabled {
                    return None;
                }
                let mut dci = Dci::new(self.format, allocation, tb1);
                dci.tb[1] = tb2;
                dci.tpc = tpc;
                dci.harq_pid = harq_pid;
                dci.swap = swap;
                let width = precoding_bits(self.format, self.nof_ports);
                dci.precoding = read_bits(bits, &mut offset, width) as u8;
                dci
            }
        };

        dci.nof_prb = self.allocated_prbs(&dci.allocation)?;
        Some(dci)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(format: DciFormat, nof_prb: u16, ports: u8) -> usize {
        DciLayout::new(format, nof_prb, ports).unwrap().payload_bits
    }

    #[test]
    fn test_payload_sizes_10mhz() {
        assert_eq!(size(DciFormat::Format0, 50, 2), 27);
        assert_eq!(size(DciFormat::Format1A, 50, 2), 27);
        assert_eq!(size(DciFormat::Format1, 50, 2), 31);
        assert_eq!(size(DciFormat::Format2, 50, 2), 43);
        assert_eq!(size(DciFormat::Format2A, 50, 2), 41);
    }

    #[test]
    fn test_payload_sizes_other_bandwidths() {
        assert_eq!(size(DciFormat::Format1A, 6, 1), 21);
        assert_eq!(size(DciFormat::Format1, 6, 1), 19);
        assert_eq!(size(DciFormat::Format1A, 25, 1), 25);
        assert_eq!(size(DciFormat::Format1, 25, 1), 27);
        assert_eq!(size(DciFormat::Format1A, 100, 2), 28);
        assert!(DciLayout::new(DciFormat::Format2, 50, 1).is_none());
    }

    #[test]
    fn test_riv() {
        for n in [6u16, 25, 50, 100] {
            for start in 0..n {
                for len in 1..=(n - start) {
                    let riv = riv_encode(start, len, n);
                    let decoded = riv_decode(riv, n);
                    assert_eq!(decoded, Some((start, len)), "n={} s={} l={}", n, start, len);
                }
            }
        }
        assert_eq!(riv_decode(50 * 51 / 2, 50), None);
    }

    #[test]
    fn test_format1a_fields() {
        let layout = DciLayout::new(DciFormat::Format1A, 50, 2).unwrap();
        let tb = TransportBlockFields { mcs: 12, ndi: true, rv: 2, enabled: true };
        let mut dci = Dci::new(
            DciFormat::Format1A,
            ResourceAllocation::Type2 { riv: riv_encode(10, 8, 50), distributed: false },
            tb,
        );
        dci.harq_pid = 5;
        dci.tpc = 1;

        let bits = layout.pack(&dci);
        assert_eq!(bits.len(), 27);
        assert_eq!(bits[0], 1);

        let parsed = layout.unpack(&bits).unwrap();
        assert_eq!(parsed.nof_prb, 8);
        assert_eq!(parsed.tb[0], tb);
        assert_eq!(parsed.harq_pid, 5);

        // The same bits never parse as format 0
        let f0 = DciLayout::new(DciFormat::Format0, 50, 2).unwrap();
        assert!(f0.unpack(&bits).is_none());
    }

    #[test]
    fn test_format1a_pdcch_order_rejected() {
        let layout = DciLayout::new(DciFormat::Format1A, 25, 1).unwrap();
        let mut bits = vec![0u8; layout.payload_bits];
        bits[0] = 1;
        for bit in bits.iter_mut().skip(2).take(riv_bits(25)) {
            *bit = 1;
        }
        assert!(layout.unpack(&bits).is_none());
    }

    #[test]
    fn test_type0_allocation_prbs() {
        // 50 PRB: P = 3, 17 RBGs, the last one holds 2 PRBs
        let layout = DciLayout::new(DciFormat::Format1, 50, 2).unwrap();
        let first_and_last = (1 << 16) | 1;
        let allocation = ResourceAllocation::Type0 {
            bitmap: first_and_last,
        };
        assert_eq!(layout.allocated_prbs(&allocation), Some(5));
        assert_eq!(layout.allocated_prbs(&ResourceAllocation::Type0 { bitmap: 0 }), None);
    }

    #[test]
    fn test_format2_second_codeword_disabled() {
        let layout = DciLayout::new(DciFormat::Format2, 50, 2).unwrap();
        let tb1 = TransportBlockFields { mcs: 20, ndi: false, rv: 0, enabled: true };
        let allocation = ResourceAllocation::Type0 { bitmap: 0b111 };
        let mut dci = Dci::new(DciFormat::Format2, allocation, tb1);
        dci.precoding = 2;

        let parsed = layout.unpack(&layout.pack(&dci)).unwrap();
        assert!(parsed.tb[0].enabled);
        assert!(!parsed.tb[1].enabled);
        assert_eq!(parsed.nof_prb, 8);
        assert_eq!(parsed.precoding, 2);
    }

    #[test]
    fn test_type1_allocation_counts_bitmap() {
        let layout = DciLayout::new(DciFormat::Format1, 50, 2).unwrap();
        let tb1 = TransportBlockFields { mcs: 5, ndi: true, rv: 0, enabled: true };
        let dci = Dci::new(
            DciFormat::Format1,
            ResourceAllocation::Type1 { subset: 1, shift: false, bitmap: 0b1011 },
            tb1,
        );
        let parsed = layout.unpack(&layout.pack(&dci)).unwrap();
        assert_eq!(parsed.nof_prb, 3);
        assert!(matches!(parsed.allocation, ResourceAllocation::Type1 { subset: 1, .. }));
    }
}
