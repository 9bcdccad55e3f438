//! Pending tenant provisioning: the single-slot durable record.
//!
//! The record is persisted *before* the remote sign-up call so that a crash
//! after sign-up but before tenant creation can still resume on the next
//! launch. At most one record exists; a new save fully overwrites any prior
//! one. The record is destroyed only after the tenant store confirms creation
//! or on deliberate abandonment.
//!
//! Corruption on read is degraded to "no record" with a warning: a damaged
//! payload must never block the app from reaching `Unauthenticated` and
//! letting the owner retry signup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AuthFlowError;
use crate::record_store::{SecureRecordStore, StoreError};

/// Current persisted record format version.
/// Increment when making breaking changes to the envelope.
pub const RECORD_VERSION: u32 = 1;

/// The single store key used for the pending record.
const PENDING_KEY: &str = "pending-tenant";

/// Signup details captured before the remote sign-up call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTenantRecord {
    pub tenant_name: String,
    pub tenant_phone: Option<String>,
    pub owner_full_name: String,
    pub email: String,
}

impl PendingTenantRecord {
    /// True if this record belongs to the given account email.
    ///
    /// The record predates the user id (it is written before sign-up returns
    /// one), so ownership is decided by case-insensitive email comparison.
    pub fn is_for_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }
}

/// Versioned envelope around the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingEnvelope {
    version: u32,
    /// RFC3339 timestamp of the save.
    saved_at: String,
    record: PendingTenantRecord,
}

/// Single-slot facade over the record store.
///
/// `save` overwrites, `load` never fails for "not found", `clear` is
/// idempotent.
#[derive(Clone)]
pub struct PendingTenantSlot {
    store: Arc<dyn SecureRecordStore>,
}

impl PendingTenantSlot {
    pub fn new(store: Arc<dyn SecureRecordStore>) -> Self {
        Self { store }
    }

    /// Persists the record, overwriting any prior one.
    pub fn save(&self, record: &PendingTenantRecord) -> Result<(), AuthFlowError> {
        let envelope = PendingEnvelope {
            version: RECORD_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            record: record.clone(),
        };
        let payload = serde_json::to_vec(&envelope).map_err(|e| AuthFlowError::Store {
            message: format!("failed to serialize pending record: {}", e),
        })?;
        self.store
            .save(PENDING_KEY, &payload)
            .map_err(store_write_err)
    }

    /// Loads the record, if one exists.
    ///
    /// A corrupt or unparseable payload (including one written by a newer
    /// version of the app) is logged and reported as absent.
    pub fn load(&self) -> Result<Option<PendingTenantRecord>, AuthFlowError> {
        let payload = match self.store.load(PENDING_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(StoreError::Corrupt { message }) => {
                warn!(error = %message, "pending record unreadable, treating as absent");
                return Ok(None);
            }
            Err(e @ StoreError::Io { .. }) => return Err(store_write_err(e)),
        };

        let envelope: PendingEnvelope = match serde_json::from_slice(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "pending record undecodable, treating as absent");
                return Ok(None);
            }
        };

        if envelope.version > RECORD_VERSION {
            warn!(
                version = envelope.version,
                supported = RECORD_VERSION,
                "pending record from a newer version, treating as absent"
            );
            return Ok(None);
        }

        Ok(Some(envelope.record))
    }

    /// Deletes the record. A missing record is not an error.
    pub fn clear(&self) -> Result<(), AuthFlowError> {
        self.store.delete(PENDING_KEY).map_err(store_write_err)
    }
}

fn store_write_err(e: StoreError) -> AuthFlowError {
    AuthFlowError::Store {
        message: e.to_string(),
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
