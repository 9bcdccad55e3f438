//! Observable session state.

use serde::{Deserialize, Serialize};

use crate::types::{AuthUser, Profile, Tenant};

/// The four mutually exclusive states of the application session.
///
/// `Loading` is only the initial value. Transitions are unidirectional
/// except `Authenticated -> Unauthenticated` (sign-out) and
/// `PendingEmailVerification -> Authenticated` (verification completes).
/// All transitions are funnelled through the controller actor and published
/// on its watch channel; observers never mutate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    /// Startup has not resolved yet.
    Loading,
    /// No session and no pending provisioning.
    Unauthenticated,
    /// Signup initiated; the pending record exists and the email is
    /// unconfirmed.
    PendingEmailVerification { email: String },
    /// Verified session. Profile and tenant may be briefly absent while they
    /// are fetched, or after a transient fetch failure (retried on the next
    /// trigger).
    Authenticated {
        user: AuthUser,
        profile: Option<Profile>,
        tenant: Option<Tenant>,
    },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Unauthenticated => "unauthenticated",
            Self::PendingEmailVerification { .. } => "pending_email_verification",
            Self::Authenticated { .. } => "authenticated",
        }
    }
}
