//! # Hasher Module
//!
//! Fingerprints used to decide whether two images are duplicates.
//!
//! ## Fingerprints
//! - **Content digest (SHA-1)** - byte-identical copies, compared for equality
//! - **pHash** - DCT-based 64-bit perceptual hash, compared with Hamming distance
//!
//! ## How pHash Works
//! 1. Resize the image to 32x32 grayscale (done by the feature extractor)
//! 2. Apply a 2-D DCT and keep the 8x8 lowest frequencies
//! 3. Emit one bit per coefficient: above the block median or not
//! 4. Compare hashes using Hamming distance
//!
//! ## Example
//! ```rust,ignore
//! use image_deduper::core::hasher::{hamming_distance, PerceptualHasher};
//!
//! let hasher = PerceptualHasher::new();
//! let a = hasher.hash(&pixels_a)?;
//! let b = hasher.hash(&pixels_b)?;
//! let distance = hamming_distance(a, b);
//! ```

mod content;
mod perceptual;

pub use content::{content_digest, digests_match};
pub use perceptual::{hamming_distance, PerceptualHasher, PHASH_INPUT_SIZE};
