//! Messages consumed by the session actor.
//!
//! Three independent producers feed this mailbox: the one-shot startup
//! sequence, the process-lifetime auth-event pump, and OS-triggered deep
//! links. The actor consumes them one at a time, which is the mutual
//! exclusion the completion routine relies on.

use tokio::sync::oneshot;

use crate::controller::state::SessionState;
use crate::errors::AuthFlowError;
use crate::gateway::AuthEvent;
use crate::pending::PendingTenantRecord;
use crate::types::{SignUpMetadata, UserId};

/// Messages that can be sent to the session actor.
pub enum SessionMsg {
    /// Run the startup sequence and open the event subscription.
    Initialize(oneshot::Sender<Result<SessionState, AuthFlowError>>),
    /// An event pushed by the identity provider.
    AuthEvent(AuthEvent),
    /// An inbound URL routed from the OS. Failures are log-only.
    DeepLink(String),
    /// Sign in with email and password.
    SignIn {
        email: String,
        password: String,
        reply: oneshot::Sender<Result<(), AuthFlowError>>,
    },
    /// Plain sign-up pass-through (no tenant provisioning).
    SignUp {
        email: String,
        password: String,
        metadata: SignUpMetadata,
        reply: oneshot::Sender<Result<UserId, AuthFlowError>>,
    },
    /// Persist the pending record, then sign up; tenant creation is deferred
    /// until the owner's email is verified.
    SignUpWithPendingTenant {
        record: PendingTenantRecord,
        password: String,
        reply: oneshot::Sender<Result<(), AuthFlowError>>,
    },
    /// Sign out and clear cached identity.
    SignOut {
        reply: oneshot::Sender<Result<(), AuthFlowError>>,
    },
}
