//! Tail-Biting Convolutional Code
//!
//! Rate 1/3, constraint length 7 code used for DCI (3GPP TS 36.212 Section 5.1.3.1),
//! with a wrap-around Viterbi decoder.

/// Constraint length
pub const CONSTRAINT_LENGTH: usize = 7;

/// Generator polynomials (octal 133, 171, 165)
pub const GENERATORS: [u8; 3] = [0o133, 0o171, 0o165];

const NUM_STATES: usize = 1 << (CONSTRAINT_LENGTH - 1);

/// Passes over the circular input; the middle pass is kept
const WRAP_PASSES: usize = 3;

/// Output triplet for a 7-bit register `(input << 6) | state`
fn branch_output(register: usize) -> [u8; 3] {
    let mut out = [0u8; 3];
    for (i, g) in GENERATORS.iter().enumerate() {
        out[i] = ((register as u8 & g).count_ones() & 1) as u8;
    }
    out
}

/// Tail-biting encoder; returns the three output streams d(0), d(1), d(2)
pub fn encode(bits: &[u8]) -> [Vec<u8>; 3] {
    let n = bits.len();
    let mut streams = [
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    ];
    if n == 0 {
        return streams;
    }

    // Preload the shift register with the last six input bits
    let mut state = 0usize;
    for j in 1..CONSTRAINT_LENGTH {
        let bit = bits[(n * CONSTRAINT_LENGTH - j) % n] as usize & 1;
        state |= bit << (CONSTRAINT_LENGTH - 1 - j);
    }

    for &bit in bits {
        let register = ((bit as usize & 1) << (CONSTRAINT_LENGTH - 1)) | state;
        let out = branch_output(register);
        for i in 0..3 {
            streams[i].push(out[i]);
        }
        state = register >> 1;
    }

    streams
}

/// Soft-input Viterbi decoder for the tail-biting code
///
/// Soft values follow the LLR convention: positive means bit 0.
pub struct ViterbiDecoder {
    /// Expected outputs per 7-bit register value, as +1/-1
    branch_signs: Vec<[f32; 3]>,
    metrics: Vec<f32>,
    next_metrics: Vec<f32>,
    decisions: Vec<u64>,
}

impl ViterbiDecoder {
    /// Create a decoder with precomputed branch tables
    pub fn new() -> Self {
        let branch_signs = (0..2 * NUM_STATES)
            .map(|register| {
                let out = branch_output(register);
                [
                    1.0 - 2.0 * out[0] as f32,
                    1.0 - 2.0 * out[1] as f32,
                    1.0 - 2.0 * out[2] as f32,
                ]
            })
            .collect();

        Self {
            branch_signs,
            metrics: vec![0.0; NUM_STATES],
            next_metrics: vec![0.0; NUM_STATES],
            decisions: Vec::new(),
        }
    }

    /// Decode `n` bits from three soft streams of length `n`
    ///
    /// Returns `None` if the streams are empty or of unequal length.
    pub fn decode(&mut self, streams: &[Vec<f32>; 3]) -> Option<Vec<u8>> {
        let n = streams[0].len();
        if n == 0 || streams[1].len() != n || streams[2].len() != n {
            return None;
        }

        let steps = WRAP_PASSES * n;
        self.metrics.fill(0.0);
        self.decisions.clear();
        self.decisions.reserve(steps);

        for t in 0..steps {
            let k = t % n;
            let soft = [streams[0][k], streams[1][k], streams[2][k]];
            let mut decision = 0u64;

            for next in 0..NUM_STATES {
                let input = next >> (CONSTRAINT_LENGTH - 2);
                let base = (next & (NUM_STATES / 2 - 1)) << 1;

                let mut best = f32::NEG_INFINITY;
                let mut chosen = 0;
                for x in 0..2 {
                    let prev = base | x;
                    let register = (input << (CONSTRAINT_LENGTH - 1)) | prev;
                    let signs = &self.branch_signs[register];
                    let metric = self.metrics[prev]
                        + signs[0] * soft[0]
                        + signs[1] * soft[1]
                        + signs[2] * soft[2];
                    if metric > best {
                        best = metric;
                        chosen = x;
                    }
                }

                self.next_metrics[next] = best;
                decision |= (chosen as u64) << next;
            }

            self.decisions.push(decision);
            std::mem::swap(&mut self.metrics, &mut self.next_metrics);

            // Keep metrics bounded
            let max = self.metrics.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            for m in self.metrics.iter_mut() {
                *m -= max;
            }
        }

        let mut state = self
            .metrics
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (s, &m)| {
                if m > best.1 {
                    (s, m)
                } else {
                    best
                }
            })
            .0;

        let mut decoded = vec![0u8; steps];
        for t in (0..steps).rev() {
            decoded[t] = (state >> (CONSTRAINT_LENGTH - 2)) as u8 & 1;
            let x = ((self.decisions[t] >> state) & 1) as usize;
            state = ((state & (NUM_STATES / 2 - 1)) << 1) | x;
        }

        Some(decoded[n..2 * n].to_vec())
    }
}

impl Default for ViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn to_soft(streams: &[Vec<u8>; 3]) -> [Vec<f32>; 3] {
        let map = |s: &Vec<u8>| s.iter().map(|&b| if b == 0 { 1.0 } else { -1.0 }).collect();
        [map(&streams[0]), map(&streams[1]), map(&streams[2])]
    }

    #[test]
    fn test_all_zero_input_encodes_to_zero() {
        let streams = encode(&[0u8; 40]);
        assert!(streams.iter().all(|s| s.len() == 40 && s.iter().all(|&b| b == 0)));
    }

    #[test]
    fn test_encoder_is_tail_biting() {
        // A rotated input yields rotated outputs
        let bits: Vec<u8> = (0..43).map(|i| ((i * 7 + 3) % 5 == 0) as u8).collect();
        let mut rotated = bits.clone();
        rotated.rotate_left(5);

        let a = encode(&bits);
        let b = encode(&rotated);
        for i in 0..3 {
            let mut expected = a[i].clone();
            expected.rotate_left(5);
            assert_eq!(b[i], expected);
        }
    }

    #[test]
    fn test_viterbi_clean_channel() {
        let mut rng = rand::thread_rng();
        let mut decoder = ViterbiDecoder::new();

        for _ in 0..20 {
            let bits: Vec<u8> = (0..43).map(|_| rng.gen_range(0..2)).collect();
            let decoded = decoder.decode(&to_soft(&encode(&bits))).unwrap();
            assert_eq!(decoded, bits);
        }
    }

    #[test]
    fn test_viterbi_corrects_sparse_errors() {
        let bits: Vec<u8> = (0..59).map(|i| ((i * 13) % 7 < 3) as u8).collect();
        let mut soft = to_soft(&encode(&bits));
        // Flip a handful of well separated coded bits
        for &k in &[3usize, 21, 40] {
            soft[1][k] = -soft[1][k];
        }

        let decoded = ViterbiDecoder::new().decode(&soft).unwrap();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn test_viterbi_rejects_mismatched_streams() {
        let mut decoder = ViterbiDecoder::new();
        let streams = [vec![1.0; 10], vec![1.0; 9], vec![1.0; 10]];
        assert!(decoder.decode(&streams).is_none());
    }
}
