//! Identity provider boundary.
//!
//! The gateway is consumed as an injected capability trait so tests can
//! substitute a scripted fake. The provider pushes auth events over one
//! long-lived subscription per process; the controller forwards them into its
//! own mailbox.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::AuthFlowError;
use crate::types::{AuthSession, SignUpMetadata, UserId};

/// An event pushed by the identity provider.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A session became valid (sign-in, or a completed email verification).
    SignedIn(AuthSession),
    /// The current session ended.
    SignedOut,
    /// Any other provider event (token refresh, password recovery, ...).
    /// Ignored by the controller.
    Other(String),
}

/// Remote identity provider operations.
///
/// No arrival-order or multiplicity guarantee exists between a successful
/// deep-link exchange and the `SignedIn` event for the same verification;
/// both may fire, in either order.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Registers a new account. The account is unusable until the owner
    /// confirms the verification email.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<UserId, AuthFlowError>;

    /// Signs in with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthFlowError>;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), AuthFlowError>;

    /// Returns the existing session, if the provider still holds one.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthFlowError>;

    /// Exchanges an inbound verification URL for a session.
    ///
    /// Fails with [`AuthFlowError::InvalidLink`] for malformed or unrelated
    /// URLs and for expired tokens.
    async fn exchange_deep_link(&self, url: &str) -> Result<AuthSession, AuthFlowError>;

    /// Opens the provider's push stream of auth events.
    ///
    /// One subscription per process; the receiver yields events for the
    /// process lifetime and closes only when the provider connection is torn
    /// down.
    fn events(&self) -> mpsc::UnboundedReceiver<AuthEvent>;
}
