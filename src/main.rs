//! # image-dedup CLI
//!
//! Command-line interface for the image deduper.
//!
//! ## Usage
//! ```bash
//! image-dedup run ~/Pictures
//! image-dedup run ~/Pictures --ssim-threshold 0.9 --phash-threshold 30
//! image-dedup run ~/Pictures --output json
//! ```

mod cli;

use image_deduper::Result;

fn main() -> Result<()> {
    image_deduper::init_tracing();
    cli::run()
}
