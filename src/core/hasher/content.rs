//! Content digest for byte-identical duplicate detection.

use crate::error::HashError;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 8192;

/// Compute the SHA-1 digest of a file's bytes as lowercase hex.
///
/// The file is streamed in fixed-size chunks, so memory use does not
/// depend on the file size.
pub fn content_digest(path: &Path) -> Result<String, HashError> {
    let io_error = |source| HashError::IoError {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Whether two digests denote the same content.
///
/// Empty digests never match, and case is ignored so digests written
/// by other tools in upper case still compare equal.
pub fn digests_match(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && a.eq_ignore_ascii_case(b)
}
