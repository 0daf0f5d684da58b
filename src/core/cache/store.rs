//! Append-only cache file, one per target folder.

use super::codec::{encode_record, header_matches, read_record, write_header, HEADER_LEN};
use super::snapshot::CacheSnapshot;
use crate::core::imaging::ImageRecord;
use crate::core::logging::RunLogger;
use crate::error::CacheError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, ErrorKind, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default file name of the cache
pub const CACHE_FILE_NAME: &str = ".imagecache.bin";

/// How far a replay got before it stopped
enum Replay {
    /// Every byte was consumed
    Complete,
    /// The last record was cut short; everything before `valid_len` is intact
    Truncated { valid_len: u64 },
}

/// Reads and appends the binary image cache
pub struct ImageCacheStore {
    file_name: String,
    logger: Arc<RunLogger>,
}

impl ImageCacheStore {
    pub fn new(file_name: impl Into<String>, logger: Arc<RunLogger>) -> Self {
        Self {
            file_name: file_name.into(),
            logger,
        }
    }

    /// Location of the cache file for `folder`
    pub fn path(&self, folder: &Path) -> PathBuf {
        folder.join(&self.file_name)
    }

    /// Replay the cache file into a snapshot.
    ///
    /// Never fails: an unusable file is deleted and an empty snapshot returned.
    pub fn load(&self, folder: &Path) -> CacheSnapshot {
        let path = self.path(folder);
        let mut snapshot = CacheSnapshot::new();

        match self.replay(&path, &mut snapshot) {
            Ok(Replay::Complete) => {
                tracing::debug!(path = %path.display(), records = snapshot.len(), "Loaded image cache");
                snapshot
            }
            Ok(Replay::Truncated { valid_len }) => {
                self.logger
                    .warn("log.image_cache_truncated", &[("count", &snapshot.len())]);
                if let Err(e) = truncate(&path, valid_len) {
                    self.logger.warn_with(
                        "log.image_cache_load_failed",
                        &[("path", &path.display())],
                        &e,
                    );
                    self.delete_quietly(folder);
                    return CacheSnapshot::new();
                }
                snapshot
            }
            Err(CacheError::BadHeader { .. }) => {
                self.logger.warn("log.image_cache_signature_mismatch", &[]);
                self.delete_quietly(folder);
                CacheSnapshot::new()
            }
            Err(e) => {
                self.logger
                    .warn_with("log.image_cache_load_failed", &[("path", &path.display())], &e);
                self.delete_quietly(folder);
                CacheSnapshot::new()
            }
        }
    }

    /// Append one record, writing the header first when the file is new
    pub fn append(&self, folder: &Path, record: &ImageRecord) -> Result<(), CacheError> {
        let path = self.path(folder);
        let io_error = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(folder).map_err(io_error)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;

        let mut bytes = Vec::new();
        if file.metadata().map_err(io_error)?.len() == 0 {
            write_header(&mut bytes).map_err(io_error)?;
        }
        bytes.extend_from_slice(&encode_record(record));

        file.write_all(&bytes).map_err(io_error)?;
        file.flush().map_err(io_error)
    }

    /// Remove the cache file if present
    pub fn delete(&self, folder: &Path) -> Result<(), CacheError> {
        let path = self.path(folder);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    fn delete_quietly(&self, folder: &Path) {
        if let Err(e) = self.delete(folder) {
            tracing::warn!(error = %e, "Cannot delete image cache");
        }
    }

    fn replay(&self, path: &Path, snapshot: &mut CacheSnapshot) -> Result<Replay, CacheError> {
        let io_error = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Replay::Complete),
            Err(e) => return Err(io_error(e)),
        };

        let len = file.metadata().map_err(io_error)?.len();
        if len == 0 {
            return Ok(Replay::Complete);
        }
        if len < HEADER_LEN {
            return Err(CacheError::BadHeader {
                path: path.to_path_buf(),
            });
        }

        let mut reader = BufReader::new(file);
        let mut header = [0u8; 8];
        reader.read_exact(&mut header).map_err(io_error)?;
        if !header_matches(&header) {
            return Err(CacheError::BadHeader {
                path: path.to_path_buf(),
            });
        }

        let mut valid_len = HEADER_LEN;
        while valid_len < len {
            match read_record(&mut reader) {
                Ok(record) => {
                    snapshot.insert(record);
                    valid_len = reader.stream_position().map_err(io_error)?;
                }
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(Replay::Truncated { valid_len });
                }
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    return Err(CacheError::Malformed {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(io_error(e)),
            }
        }

        Ok(Replay::Complete)
    }
}

fn truncate(path: &Path, len: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::codec::CACHE_MAGIC;
    use tempfile::TempDir;

    fn store() -> ImageCacheStore {
        ImageCacheStore::new(CACHE_FILE_NAME, Arc::new(RunLogger::default()))
    }

    fn record(name: &str, seed: u64) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from("/photos").join(name),
            width: 100 + seed as u32,
            height: 50,
            length: 4096 * seed,
            phash: seed.wrapping_mul(0x9E37_79B9_7F4A_7C15),
            digest: format!("{:040x}", seed),
            pixels: (0..16).map(|i| (i * 16) as f32 + 0.3).collect(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store().load(dir.path()).is_empty());
    }

    #[test]
    fn appended_records_reload() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let records: Vec<_> = (1..=5).map(|i| record(&format!("{i}.png"), i)).collect();
        for r in &records {
            store.append(dir.path(), r).unwrap();
        }

        let snapshot = store.load(dir.path());

        assert_eq!(snapshot.len(), 5);
        for original in &records {
            let loaded = snapshot.get(&original.path).unwrap();
            assert_eq!(loaded.width, original.width);
            assert_eq!(loaded.height, original.height);
            assert_eq!(loaded.length, original.length);
            assert_eq!(loaded.phash, original.phash);
            assert_eq!(loaded.digest, original.digest);
            for (a, b) in loaded.pixels.iter().zip(&original.pixels) {
                assert!((a - b).abs() <= 0.5);
            }
        }
    }

    #[test]
    fn header_is_written_once() {
        let dir = TempDir::new().unwrap();
        let store = store();
        store.append(dir.path(), &record("a.png", 1)).unwrap();
        store.append(dir.path(), &record("b.png", 2)).unwrap();

        let bytes = fs::read(store.path(dir.path())).unwrap();
        let magic = CACHE_MAGIC.to_le_bytes();
        assert_eq!(&bytes[..4], &magic);
        assert_eq!(bytes.windows(4).filter(|w| *w == magic).count(), 1);
    }

    #[test]
    fn bad_header_deletes_the_file() {
        let dir = TempDir::new().unwrap();
        let store = store();
        fs::write(store.path(dir.path()), b"NOTACACHEFILE").unwrap();

        assert!(store.load(dir.path()).is_empty());
        assert!(!store.path(dir.path()).exists());
    }

    #[test]
    fn short_header_deletes_the_file() {
        let dir = TempDir::new().unwrap();
        let store = store();
        fs::write(store.path(dir.path()), [0x43, 0x41]).unwrap();

        assert!(store.load(dir.path()).is_empty());
        assert!(!store.path(dir.path()).exists());
    }

    #[test]
    fn truncated_tail_keeps_earlier_records() {
        let dir = TempDir::new().unwrap();
        let store = store();
        store.append(dir.path(), &record("a.png", 1)).unwrap();
        store.append(dir.path(), &record("b.png", 2)).unwrap();
        let intact_len = fs::metadata(store.path(dir.path())).unwrap().len();
        store.append(dir.path(), &record("c.png", 3)).unwrap();

        // Simulate a crash halfway through the last append
        let full_len = fs::metadata(store.path(dir.path())).unwrap().len();
        truncate(&store.path(dir.path()), full_len - 7).unwrap();

        let snapshot = store.load(dir.path());
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get(Path::new("/photos/c.png")).is_none());
        assert_eq!(fs::metadata(store.path(dir.path())).unwrap().len(), intact_len);

        // Later appends stay readable
        store.append(dir.path(), &record("d.png", 4)).unwrap();
        assert_eq!(store.load(dir.path()).len(), 3);
    }

    #[test]
    fn malformed_record_deletes_the_file() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let mut bytes = Vec::new();
        write_header(&mut bytes).unwrap();
        bytes.extend_from_slice(&[0x05, b'a', b'.', b'p', b'n', b'g']);
        bytes.extend_from_slice(&(-7i32).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 40]);
        fs::write(store.path(dir.path()), bytes).unwrap();

        assert!(store.load(dir.path()).is_empty());
        assert!(!store.path(dir.path()).exists());
    }

    #[test]
    fn later_records_replace_earlier_ones() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let mut first = record("a.png", 1);
        store.append(dir.path(), &first).unwrap();
        first.phash = 42;
        store.append(dir.path(), &first).unwrap();

        let snapshot = store.load(dir.path());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&first.path).unwrap().phash, 42);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store();
        store.append(dir.path(), &record("a.png", 1)).unwrap();

        store.delete(dir.path()).unwrap();
        store.delete(dir.path()).unwrap();

        assert!(!store.path(dir.path()).exists());
    }
}
