//! Perceptual Hash (pHash) implementation.
//!
//! pHash uses the Discrete Cosine Transform (DCT) to extract the
//! low-frequency structure of an image. That structure survives:
//! - Scaling
//! - Re-encoding into another format
//! - Compression artifacts
//! - Mild brightness/contrast changes
//!
//! The input is a 32x32 grayscale buffer. A 2-D orthonormal DCT-II is
//! applied (rows, then columns), the top-left 8x8 block is compared to
//! its median and packed into 64 bits, most significant bit first.

use crate::error::HashError;

/// Side length of the input buffer
pub const PHASH_INPUT_SIZE: usize = 32;

/// Side length of the low-frequency block that forms the hash
const LOW_FREQ_SIZE: usize = 8;

/// Number of differing bits between two perceptual hashes (0-64)
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// DCT-based perceptual hasher over 32x32 grayscale buffers
pub struct PerceptualHasher {
    /// `cosines[k * N + i] = scale(k) * cos((2i + 1) k pi / 2N)`
    cosines: Vec<f64>,
}

impl PerceptualHasher {
    /// Create a hasher with a precomputed cosine table
    pub fn new() -> Self {
        let n = PHASH_INPUT_SIZE;
        let factor = std::f64::consts::PI / (2.0 * n as f64);
        let mut cosines = Vec::with_capacity(n * n);

        for k in 0..n {
            let scale = if k == 0 {
                (1.0 / n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
            };
            for i in 0..n {
                cosines.push(scale * (((2 * i + 1) * k) as f64 * factor).cos());
            }
        }

        Self { cosines }
    }

    /// Compute the 64-bit hash of a 32x32 row-major buffer
    pub fn hash(&self, pixels: &[f32]) -> Result<u64, HashError> {
        let n = PHASH_INPUT_SIZE;
        if pixels.len() != n * n {
            return Err(HashError::InvalidBufferLength {
                expected: n * n,
                actual: pixels.len(),
            });
        }

        let input: Vec<f64> = pixels.iter().map(|&p| f64::from(p)).collect();

        // Row-wise DCT
        let mut rows = vec![0.0; n * n];
        for row in 0..n {
            self.dct_1d(&input[row * n..(row + 1) * n], &mut rows[row * n..(row + 1) * n]);
        }

        // Column-wise DCT over the row-transformed matrix
        let mut dct = vec![0.0; n * n];
        let mut column = vec![0.0; n];
        let mut transformed = vec![0.0; n];
        for col in 0..n {
            for row in 0..n {
                column[row] = rows[row * n + col];
            }
            self.dct_1d(&column, &mut transformed);
            for row in 0..n {
                dct[row * n + col] = transformed[row];
            }
        }

        let mut low = Vec::with_capacity(LOW_FREQ_SIZE * LOW_FREQ_SIZE);
        for y in 0..LOW_FREQ_SIZE {
            low.extend_from_slice(&dct[y * n..y * n + LOW_FREQ_SIZE]);
        }

        let median = median(&low);
        let hash = low
            .iter()
            .fold(0u64, |acc, &c| (acc << 1) | u64::from(c > median));

        Ok(hash)
    }

    fn dct_1d(&self, input: &[f64], output: &mut [f64]) {
        let n = input.len();
        for (k, out) in output.iter_mut().enumerate() {
            let basis = &self.cosines[k * n..(k + 1) * n];
            *out = input.iter().zip(basis).map(|(x, c)| x * c).sum();
        }
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(f: impl Fn(f64, f64) -> f64) -> Vec<f32> {
        (0..PHASH_INPUT_SIZE * PHASH_INPUT_SIZE)
            .map(|i| {
                let x = (i % PHASH_INPUT_SIZE) as f64;
                let y = (i / PHASH_INPUT_SIZE) as f64;
                f(x, y) as f32
            })
            .collect()
    }

    fn waves(offset: f64) -> Vec<f32> {
        pattern(|x, y| {
            120.0 + 40.0 * (0.31 * x + 0.17 * y).sin() + 25.0 * (0.03 * x * y + 0.7).cos() + offset
        })
    }

    fn ripples() -> Vec<f32> {
        pattern(|x, y| 128.0 + 60.0 * (0.21 * x).cos() * (0.27 * y + 1.0).sin())
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let hasher = PerceptualHasher::new();
        let result = hasher.hash(&[0.0; 100]);
        assert!(matches!(
            result,
            Err(HashError::InvalidBufferLength {
                expected: 1024,
                actual: 100
            })
        ));
    }

    #[test]
    fn hashing_is_deterministic() {
        let hasher = PerceptualHasher::new();
        let pixels = ripples();
        assert_eq!(hasher.hash(&pixels).unwrap(), hasher.hash(&pixels).unwrap());
    }

    #[test]
    fn distance_to_self_is_zero() {
        let hasher = PerceptualHasher::new();
        let hash = hasher.hash(&waves(0.0)).unwrap();
        assert_eq!(hamming_distance(hash, hash), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let hasher = PerceptualHasher::new();
        let a = hasher.hash(&waves(0.0)).unwrap();
        let b = hasher.hash(&ripples()).unwrap();
        assert_eq!(hamming_distance(a, b), hamming_distance(b, a));
    }

    #[test]
    fn distance_counts_differing_bits() {
        assert_eq!(hamming_distance(0, u64::MAX), 64);
        assert_eq!(hamming_distance(0b1011, 0b0001), 2);
    }

    #[test]
    fn bright_flat_image_sets_the_dc_bit() {
        // All energy sits in the DC term, which is scanned first
        let hasher = PerceptualHasher::new();
        let flat = vec![128.0; PHASH_INPUT_SIZE * PHASH_INPUT_SIZE];
        assert_ne!(hasher.hash(&flat).unwrap() & (1 << 63), 0);
    }

    #[test]
    fn brightness_shift_keeps_hash_close() {
        let hasher = PerceptualHasher::new();
        let a = hasher.hash(&waves(0.0)).unwrap();
        let b = hasher.hash(&waves(10.0)).unwrap();
        assert!(hamming_distance(a, b) <= 2);
    }

    #[test]
    fn different_structure_produces_different_hash() {
        let hasher = PerceptualHasher::new();
        let a = hasher.hash(&waves(0.0)).unwrap();
        let b = hasher.hash(&ripples()).unwrap();
        assert!(hamming_distance(a, b) > 0);
    }
}
