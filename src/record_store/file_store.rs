//! File-backed record store.
//!
//! Each key maps to one sealed file under the store root:
//! - 8-byte magic, 4-byte little-endian CRC32 of the payload, payload
//! - Atomic writes via temp file + rename
//! - Cross-process exclusion via an fs2 lock file

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::{SecureRecordStore, StoreError};

/// Magic prefix identifying a sealed record file, including a format version.
const MAGIC: &[u8; 8] = b"WSREC\x00\x00\x01";

/// File-backed [`SecureRecordStore`] rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    /// Creates a store rooted at `root`. The directory is created on first
    /// write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store at the default location under the workshop home
    /// (`~/.workshop/records/`, honoring `WORKSHOP_HOME`).
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::storage_paths::records_dir()?))
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.rec", key))
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    /// Opens (creating if needed) the store-wide lock file.
    fn lock_file(&self) -> Result<File, StoreError> {
        fs::create_dir_all(&self.root).map_err(io_err)?;
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())
            .map_err(io_err)
    }

    fn seal(payload: &[u8]) -> Vec<u8> {
        let checksum = crc32fast::hash(payload);
        let mut sealed = Vec::with_capacity(MAGIC.len() + 4 + payload.len());
        sealed.extend_from_slice(MAGIC);
        sealed.extend_from_slice(&checksum.to_le_bytes());
        sealed.extend_from_slice(payload);
        sealed
    }

    fn unseal(sealed: &[u8], path: &Path) -> Result<Vec<u8>, StoreError> {
        if sealed.len() < MAGIC.len() + 4 || &sealed[..MAGIC.len()] != MAGIC {
            return Err(StoreError::Corrupt {
                message: format!("bad header in {}", path.display()),
            });
        }
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&sealed[MAGIC.len()..MAGIC.len() + 4]);
        let expected = u32::from_le_bytes(crc_bytes);
        let payload = &sealed[MAGIC.len() + 4..];
        if crc32fast::hash(payload) != expected {
            return Err(StoreError::Corrupt {
                message: format!("checksum mismatch in {}", path.display()),
            });
        }
        Ok(payload.to_vec())
    }
}

impl SecureRecordStore for FileRecordStore {
    fn save(&self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        let lock = self.lock_file()?;
        lock.lock_exclusive().map_err(io_err)?;

        // Lock released when `lock` drops.
        let path = self.record_path(key);
        let tmp_path = path.with_extension("rec.tmp");
        fs::write(&tmp_path, Self::seal(payload))
            .and_then(|_| fs::rename(&tmp_path, &path))
            .map_err(io_err)
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.record_path(key);
        let sealed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        Self::unseal(&sealed, &path).map(Some)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let lock = self.lock_file()?;
        lock.lock_exclusive().map_err(io_err)?;

        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Io {
        message: e.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/file_store_tests.rs"]
mod tests;
