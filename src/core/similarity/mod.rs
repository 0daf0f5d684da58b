//! # Similarity Module
//!
//! Global structural similarity (SSIM) between two grayscale buffers.
//!
//! Unlike windowed SSIM, the means, variances and covariance are taken
//! over the whole buffer at once. It is a coarse proxy, but it is cheap
//! enough to run on every candidate pair that survives the pHash filter.

use crate::error::HashError;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DYNAMIC_RANGE: f64 = 255.0;
const C1: f64 = (K1 * DYNAMIC_RANGE) * (K1 * DYNAMIC_RANGE);
const C2: f64 = (K2 * DYNAMIC_RANGE) * (K2 * DYNAMIC_RANGE);

/// Compute the global SSIM score of two equal-length buffers.
///
/// The result is clamped to [-1, 1]. Identical buffers score 1.0.
pub fn global_ssim(a: &[f32], b: &[f32]) -> Result<f64, HashError> {
    if a.len() != b.len() {
        return Err(HashError::BufferLengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }

    let (mut sum_a, mut sum_b, mut sum_a2, mut sum_b2, mut sum_ab) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&va, &vb) in a.iter().zip(b) {
        let (va, vb) = (f64::from(va), f64::from(vb));
        sum_a += va;
        sum_b += vb;
        sum_a2 += va * va;
        sum_b2 += vb * vb;
        sum_ab += va * vb;
    }

    let len = a.len() as f64;
    let mean_a = sum_a / len;
    let mean_b = sum_b / len;
    let var_a = sum_a2 / len - mean_a * mean_a;
    let var_b = sum_b2 / len - mean_b * mean_b;
    let cov = sum_ab / len - mean_a * mean_b;

    let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * cov + C2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);

    if denominator == 0.0 {
        return Ok(0.0);
    }

    Ok((numerator / denominator).clamp(-1.0, 1.0))
}
