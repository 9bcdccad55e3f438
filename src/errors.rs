//! Error taxonomy for the session and provisioning flows.

use std::fmt::{Display, Formatter};

use crate::types::TenantId;

/// Errors that can occur during authentication and tenant provisioning.
///
/// The variants encode retry semantics, not just causes: `TransientNetwork`
/// failures are retried by the next trigger (relaunch or auth event) with no
/// state change, while `ProvisioningConflict` is fatal to the deferred flow
/// and clears the pending record.
#[derive(Debug, Clone)]
pub enum AuthFlowError {
    /// A remote call failed in a way that is safe to retry later.
    TransientNetwork { message: String },
    /// The identity provider rejected the credentials.
    InvalidCredentials { message: String },
    /// A deep-link URL was malformed, unrelated, or carried a bad token.
    InvalidLink { message: String },
    /// The remote store reports this user already owns a different tenant.
    ProvisioningConflict { existing: TenantId },
    /// The durable record store returned an unreadable payload.
    StoreCorruption { message: String },
    /// The durable record store failed to persist or delete a record.
    Store { message: String },
    /// Controller plumbing failure (actor stopped, reply dropped).
    Internal { message: String },
}

impl Display for AuthFlowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransientNetwork { message } => write!(f, "transient network failure: {}", message),
            Self::InvalidCredentials { message } => write!(f, "invalid credentials: {}", message),
            Self::InvalidLink { message } => write!(f, "invalid deep link: {}", message),
            Self::ProvisioningConflict { existing } => {
                write!(f, "user already owns a different tenant: {}", existing)
            }
            Self::StoreCorruption { message } => write!(f, "record store corruption: {}", message),
            Self::Store { message } => write!(f, "record store failure: {}", message),
            Self::Internal { message } => write!(f, "session controller failure: {}", message),
        }
    }
}

impl std::error::Error for AuthFlowError {}

impl AuthFlowError {
    /// True if the next trigger (relaunch or auth event) should retry the
    /// operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }
}
