//! Rate Matching for Convolutionally Coded Channels
//!
//! Sub-block interleaving, bit collection and circular buffer selection
//! (3GPP TS 36.212 Section 5.1.4.2)

/// Columns of the sub-block interleaver
const SUBBLOCK_COLUMNS: usize = 32;

/// Inter-column permutation for convolutional codes
const COLUMN_PERMUTATION: [usize; SUBBLOCK_COLUMNS] = [
    1, 17, 9, 25, 5, 21, 13, 29, 3, 19, 11, 27, 7, 23, 15, 31,
    0, 16, 8, 24, 4, 20, 12, 28, 2, 18, 10, 26, 6, 22, 14, 30,
];

/// Precomputed mapping from rate-matched bit positions to coded bit positions
///
/// Coded bits are addressed as `stream * d + k` for stream `0..3` and bit `k < d`.
#[derive(Debug, Clone)]
pub struct RateMatcher {
    d: usize,
    e: usize,
    map: Vec<usize>,
}

impl RateMatcher {
    /// Build the mapping for `d` bits per stream and `e` output bits
    pub fn new(d: usize, e: usize) -> Self {
        let rows = (d + SUBBLOCK_COLUMNS - 1) / SUBBLOCK_COLUMNS;
        let dummies = rows * SUBBLOCK_COLUMNS - d;

        // Sub-block interleaver output, None for dummy bits
        let mut interleaved = Vec::with_capacity(rows * SUBBLOCK_COLUMNS);
        for &column in COLUMN_PERMUTATION.iter() {
            for row in 0..rows {
                let y = row * SUBBLOCK_COLUMNS + column;
                interleaved.push(if y < dummies { None } else { Some(y - dummies) });
            }
        }

        // Bit collection w = v0 | v1 | v2, with NULLs skipped
        let mut collected = Vec::with_capacity(3 * d);
        for stream in 0..3 {
            collected.extend(interleaved.iter().flatten().map(|&k| stream * d + k));
        }

        let map = if collected.is_empty() {
            Vec::new()
        } else {
            (0..e).map(|j| collected[j % collected.len()]).collect()
        };

        Self { d, e, map }
    }

    /// Bits per coded stream
    pub fn input_len(&self) -> usize {
        self.d
    }

    /// Rate-matched output length
    pub fn output_len(&self) -> usize {
        self.e
    }

    /// Select `e` bits from the three coded streams
    pub fn rate_match(&self, streams: &[Vec<u8>; 3]) -> Vec<u8> {
        self.map
            .iter()
            .map(|&idx| streams[idx / self.d][idx % self.d])
            .collect()
    }

    /// Recover soft streams, combining repeated bits
    pub fn rate_recover(&self, soft: &[f32]) -> [Vec<f32>; 3] {
        let mut streams = [vec![0.0; self.d], vec![0.0; self.d], vec![0.0; self.d]];
        for (&idx, &value) in self.map.iter().zip(soft.iter()) {
            streams[idx / self.d][idx % self.d] += value;
        }
        streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_coded_bit_is_sent_when_e_covers_it() {
        let d = 43;
        let matcher = RateMatcher::new(d, 3 * d);
        let mut seen = matcher.map.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 3 * d);
    }

    #[test]
    fn test_repetition_accumulates_soft_values() {
        let d = 27;
        // L = 8: 576 bits carry each coded bit several times
        let matcher = RateMatcher::new(d, 576);
        let soft = vec![1.0f32; 576];
        let streams = matcher.rate_recover(&soft);
        let total: f32 = streams.iter().flat_map(|s| s.iter()).sum();
        assert!((total - 576.0).abs() < 1e-3);
        assert!(streams.iter().all(|s| s.iter().all(|&v| v >= 7.0)));
    }

    #[test]
    fn test_puncturing_keeps_prefix_of_circular_buffer() {
        let d = 43;
        let streams = [vec![0u8; d], vec![1u8; d], vec![0u8; d]];
        // L = 1: 72 bits, all taken from the first stream
        let matched = RateMatcher::new(d, 72);
        let out = matched.rate_match(&streams);
        assert_eq!(out.len(), 72);
        assert_eq!(out.iter().filter(|&&b| b == 1).count(), 72 - d);
    }
}
