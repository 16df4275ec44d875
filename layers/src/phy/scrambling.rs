/// Pseudo-random sequence generation for PDCCH scrambling
/// Based on 3GPP TS 36.211 Sections 6.8.2 and 7.2

/// Length-31 Gold sequence generator
pub struct GoldSequence {
    /// Gold sequence LFSR state
    x1: u32,
    x2: u32,
}

impl GoldSequence {
    /// Create new sequence generator with initialization value
    pub fn new(c_init: u32) -> Self {
        // Initialize x1 with x1(0) = 1, remaining zero
        let mut x1 = 1;
        // Initialize x2 with c_init
        let mut x2 = c_init & 0x7FFFFFFF;

        // Advance LFSR by Nc=1600 iterations
        for _ in 0..1600 {
            let x1_new = ((x1 >> 3) ^ x1) & 1;
            x1 = ((x1 >> 1) | (x1_new << 30)) & 0x7FFFFFFF;

            let x2_new = ((x2 >> 3) ^ (x2 >> 2) ^ (x2 >> 1) ^ x2) & 1;
            x2 = ((x2 >> 1) | (x2_new << 30)) & 0x7FFFFFFF;
        }

        Self { x1, x2 }
    }

    /// Advance LFSR state
    fn advance(&mut self) {
        // x1(n+31) = (x1(n+3) + x1(n)) mod 2
        let x1_new = ((self.x1 >> 3) ^ self.x1) & 1;
        self.x1 = ((self.x1 >> 1) | (x1_new << 30)) & 0x7FFFFFFF;

        // x2(n+31) = (x2(n+3) + x2(n+2) + x2(n+1) + x2(n)) mod 2
        let x2_new = ((self.x2 >> 3) ^ (self.x2 >> 2) ^ (self.x2 >> 1) ^ self.x2) & 1;
        self.x2 = ((self.x2 >> 1) | (x2_new << 30)) & 0x7FFFFFFF;
    }

    /// Generate next bit from the sequence
    pub fn next_bit(&mut self) -> u8 {
        let c = (self.x1 ^ self.x2) & 1;
        self.advance();
        c as u8
    }

    /// Generate the first `len` bits
    pub fn bits(c_init: u32, len: usize) -> Vec<u8> {
        let mut generator = Self::new(c_init);
        (0..len).map(|_| generator.next_bit()).collect()
    }
}

/// PDCCH scrambling initialization
/// c_init = floor(n_s / 2) * 2^9 + N_ID^cell, with floor(n_s / 2) equal to the subframe index
pub fn pdcch_cinit(sf_idx: u8, pci: u16) -> u32 {
    ((sf_idx as u32) << 9) + pci as u32
}

/// Flip the sign of soft bits where the scrambling sequence is one
pub fn descramble_soft(llrs: &mut [f32], c_init: u32) {
    let mut generator = GoldSequence::new(c_init);
    for llr in llrs.iter_mut() {
        if generator.next_bit() == 1 {
            *llr = -*llr;
        }
    }
}

/// XOR hard bits with the scrambling sequence
pub fn scramble_bits(bits: &mut [u8], c_init: u32) {
    let mut generator = GoldSequence::new(c_init);
    for bit in bits.iter_mut() {
        *bit ^= generator.next_bit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdcch_cinit() {
        assert_eq!(pdcch_cinit(0, 1), 1);
        assert_eq!(pdcch_cinit(9, 503), 9 * 512 + 503);
    }

    #[test]
    fn test_sequence_is_deterministic_and_balanced() {
        let a = GoldSequence::bits(0x1234, 4096);
        let b = GoldSequence::bits(0x1234, 4096);
        assert_eq!(a, b);

        let ones = a.iter().filter(|&&bit| bit == 1).count();
        assert!(ones > 1800 && ones < 2300, "unbalanced sequence: {} ones", ones);
    }

    #[test]
    fn test_soft_descrambling_matches_hard_scrambling() {
        let mut bits = vec![0u8; 144];
        scramble_bits(&mut bits, 777);
        let mut llrs: Vec<f32> = bits.iter().map(|&b| if b == 0 { 1.0 } else { -1.0 }).collect();
        descramble_soft(&mut llrs, 777);
        assert!(llrs.iter().all(|&l| l > 0.0));
    }
}
