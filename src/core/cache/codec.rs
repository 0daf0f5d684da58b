//! Binary layout of the image cache.
//!
//! ```text
//! header:  u32 magic 0x49434143 | i32 version 1
//! record:  str path | i32 width | i32 height | i64 length | u64 phash
//!          | str digest | i32 count | count x u8 pixels
//! str:     7-bit varint byte length | UTF-8 bytes
//! ```
//! All integers are little-endian.

use crate::core::imaging::ImageRecord;
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;

pub const CACHE_MAGIC: u32 = 0x4943_4143;
pub const CACHE_VERSION: i32 = 1;
pub const HEADER_LEN: u64 = 8;

const MAX_STRING_LEN: usize = 1 << 16;
const MAX_PIXEL_COUNT: usize = 1 << 24;

pub fn write_header(out: &mut impl Write) -> io::Result<()> {
    out.write_all(&CACHE_MAGIC.to_le_bytes())?;
    out.write_all(&CACHE_VERSION.to_le_bytes())
}

/// Whether the first eight bytes carry the expected magic and version
pub fn header_matches(header: &[u8; 8]) -> bool {
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let version = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    magic == CACHE_MAGIC && version == CACHE_VERSION
}

/// Serialize one record. Pixels are rounded and clamped to a byte each.
pub fn encode_record(record: &ImageRecord) -> Vec<u8> {
    let path = record.path.to_string_lossy();
    let mut out = Vec::with_capacity(path.len() + record.digest.len() + record.pixels.len() + 48);

    write_string(&mut out, &path);
    out.extend_from_slice(&clamp_i32(record.width).to_le_bytes());
    out.extend_from_slice(&clamp_i32(record.height).to_le_bytes());
    out.extend_from_slice(&(record.length.min(i64::MAX as u64) as i64).to_le_bytes());
    out.extend_from_slice(&record.phash.to_le_bytes());
    write_string(&mut out, &record.digest);
    out.extend_from_slice(&(record.pixels.len() as i32).to_le_bytes());
    out.extend(record.pixels.iter().map(|&p| quantize(p)));

    out
}

/// Read one record.
///
/// A record cut short by the end of the stream yields `UnexpectedEof`;
/// impossible field values yield `InvalidData`.
pub fn read_record(input: &mut impl Read) -> io::Result<ImageRecord> {
    let path = PathBuf::from(read_string(input)?);
    let width = read_non_negative(input, "width")?;
    let height = read_non_negative(input, "height")?;
    let length = i64::from_le_bytes(read_array(input)?);
    let phash = u64::from_le_bytes(read_array(input)?);
    let digest = read_string(input)?;

    let count = read_non_negative(input, "pixel count")? as usize;
    if count > MAX_PIXEL_COUNT {
        return Err(invalid(format!("pixel count {count} is too large")));
    }
    let mut bytes = vec![0u8; count];
    input.read_exact(&mut bytes)?;

    Ok(ImageRecord {
        path,
        width,
        height,
        length: length.max(0) as u64,
        phash,
        digest,
        pixels: bytes.into_iter().map(f32::from).collect(),
    })
}

fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn clamp_i32(value: u32) -> i32 {
    value.min(i32::MAX as u32) as i32
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    let mut len = value.len() as u32;
    while len >= 0x80 {
        out.push((len as u8 & 0x7F) | 0x80);
        len >>= 7;
    }
    out.push(len as u8);
    out.extend_from_slice(value.as_bytes());
}

fn read_string(input: &mut impl Read) -> io::Result<String> {
    let mut len: u32 = 0;
    let mut shift = 0;
    loop {
        let [byte] = read_array::<1>(input)?;
        len |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return Err(invalid("string length prefix is too long".to_string()));
        }
    }

    let len = len as usize;
    if len > MAX_STRING_LEN {
        return Err(invalid(format!("string length {len} is too large")));
    }

    let mut bytes = vec![0u8; len];
    input.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))
}

fn read_non_negative(input: &mut impl Read, field: &str) -> io::Result<u32> {
    let value = i32::from_le_bytes(read_array(input)?);
    u32::try_from(value).map_err(|_| invalid(format!("negative {field} {value}")))
}

fn read_array<const N: usize>(input: &mut impl Read) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

fn invalid(reason: String) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, reason)
}
