//! Common Utilities
//!
//! Bit-level helpers shared by the control channel decoder and its collaborators

use tracing::trace;

use crate::types::TTI_MODULO;

/// Calculate the LTE CRC-16 (polynomial 0x1021, zero init) over unpacked bits
pub fn crc16_bits(bits: &[u8]) -> u16 {
    const CRC16_POLY: u16 = 0x1021;
    let mut crc: u16 = 0;

    for &bit in bits {
        let feedback = ((crc >> 15) as u8 ^ (bit & 1)) & 1;
        crc <<= 1;
        if feedback != 0 {
            crc ^= CRC16_POLY;
        }
    }

    crc
}

/// Append the `num_bits` least significant bits of `value`, MSB first
pub fn append_bits(bits: &mut Vec<u8>, value: u32, num_bits: usize) {
    for i in (0..num_bits).rev() {
        bits.push(((value >> i) & 1) as u8);
    }
}

/// Read `num_bits` bits (MSB first) starting at `*offset`, advancing the offset
///
/// Reads past the end of the slice yield zeros.
pub fn read_bits(bits: &[u8], offset: &mut usize, num_bits: usize) -> u32 {
    let mut value = 0u32;
    for _ in 0..num_bits {
        let bit = bits.get(*offset).copied().unwrap_or(0) & 1;
        value = (value << 1) | bit as u32;
        *offset += 1;
    }
    value
}

/// Smallest `b` such that `2^b >= n`
pub fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        return 0;
    }
    32 - (n - 1).leading_zeros()
}

/// Map a wrapped TTI onto the unwrapped timeline closest to `reference`
pub fn unwrap_tti(tti: u32, reference: u64) -> u64 {
    let modulo = TTI_MODULO as u64;
    let tti = (tti % TTI_MODULO) as u64;
    let base = reference - reference % modulo;

    let mut best = base + tti;
    for candidate in [base.checked_sub(modulo).map(|b| b + tti), Some(base + modulo + tti)]
        .into_iter()
        .flatten()
    {
        if candidate.abs_diff(reference) < best.abs_diff(reference) {
            best = candidate;
        }
    }

    trace!("Unwrapped TTI {} around {} to {}", tti, reference, best);
    best
}

/// Wrap an unwrapped timeline index back onto the radio TTI counter
pub fn wrap_tti(index: u64) -> u32 {
    (index % TTI_MODULO as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_known_value() {
        // "123456789" with the XMODEM variant (poly 0x1021, init 0)
        let mut bits = Vec::new();
        for &byte in b"123456789" {
            append_bits(&mut bits, byte as u32, 8);
        }
        assert_eq!(crc16_bits(&bits), 0x31C3);
    }

    #[test]
    fn test_append_and_read_bits() {
        let mut bits = Vec::new();
        append_bits(&mut bits, 0b101, 3);
        append_bits(&mut bits, 0x3F, 6);
        let mut offset = 0;
        assert_eq!(read_bits(&bits, &mut offset, 3), 0b101);
        assert_eq!(read_bits(&bits, &mut offset, 6), 0x3F);
        assert_eq!(offset, 9);
        assert_eq!(read_bits(&bits, &mut offset, 2), 0);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(1275), 11);
        assert_eq!(ceil_log2(1024), 10);
    }

    #[test]
    fn test_unwrap_tti() {
        assert_eq!(unwrap_tti(5, 3), 5);
        // Just after a wrap the small TTI belongs to the next epoch
        assert_eq!(unwrap_tti(2, 10238), 10242);
        // A late TTI from the previous epoch stays behind
        assert_eq!(unwrap_tti(10239, 10241), 10239);
        assert_eq!(wrap_tti(10242), 2);
    }
}
