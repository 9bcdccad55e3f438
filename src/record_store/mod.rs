//! Durable record storage behind a substitutable trait.
//!
//! Only the save/load/delete-by-key contract is load-bearing: the platform's
//! secure (encrypted) store and the file-backed implementation shipped here
//! are interchangeable behind [`SecureRecordStore`]. The controller uses
//! exactly one key.

mod file_store;

pub use file_store::FileRecordStore;

use std::fmt::{Display, Formatter};

/// Errors from the durable record store.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// The stored payload failed its integrity check or could not be decoded.
    Corrupt { message: String },
    /// Filesystem or platform-store failure.
    Io { message: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corrupt { message } => write!(f, "corrupt record: {}", message),
            Self::Io { message } => write!(f, "store i/o failure: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable, single-process key-value storage of opaque byte payloads.
///
/// `save` fully overwrites any prior payload under the key. `load` returns
/// `Ok(None)` for a missing key; it fails only on unreadable payloads or
/// store-level I/O errors. `delete` of a missing key is a no-op.
pub trait SecureRecordStore: Send + Sync {
    fn save(&self, key: &str, payload: &[u8]) -> Result<(), StoreError>;
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}
