//! # Imaging Module
//!
//! Everything between a file on disk and an [`ImageRecord`].
//!
//! ## Components
//! - **Normalizer** - HEIC conversion, `.jfif` rename, content-based extension fix
//! - **Decoder** - file to 8-bit grayscale ([`GrayDecoder`], default [`FastDecoder`])
//! - **Resizer** - centre-cropped Lanczos3 resampling to 32x32 and 224x224
//! - **Extractor** - assembles the record: pHash, SHA-1, size, similarity buffer
//!
//! The decoder, sniffer and converter are traits so exotic codecs can be
//! plugged in without touching the pipeline.

mod convert;
mod decode;
mod extractor;
mod normalizer;
mod record;
mod resize;
mod sniff;

pub use convert::{FormatConverter, SipsConverter, CONVERSION_QUALITY};
pub use decode::{FastDecoder, GrayDecoder};
pub use extractor::FeatureExtractor;
pub use normalizer::ImageNormalizer;
pub use record::{ImageRecord, SIMILARITY_SIZE};
pub use resize::FastResizer;
pub use sniff::{FormatSniffer, MagicSniffer};
