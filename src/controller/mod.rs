//! The session controller: the single owner of session state.
//!
//! All mutations to in-memory state and the pending record run inside one
//! actor. The startup sequence, the auth-event pump, and deep links are
//! producers into its mailbox; messages are consumed one at a time, so the
//! completion routine can never overlap itself. Observers read the state
//! through a watch channel and never mutate.

mod commands;
mod state;

pub use commands::SessionMsg;
pub use state::SessionState;

use std::sync::Arc;

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::AuthFlowError;
use crate::gateway::{AuthEvent, IdentityGateway};
use crate::pending::{PendingTenantRecord, PendingTenantSlot};
use crate::provisioner::TenantProvisioner;
use crate::record_store::SecureRecordStore;
use crate::types::{AuthSession, AuthUser, Profile, SignUpMetadata, Tenant, TenantId, TenantRequest, UserId};

/// Arguments for spawning the session actor.
pub struct SessionActorArgs {
    pub gateway: Arc<dyn IdentityGateway>,
    pub provisioner: Arc<dyn TenantProvisioner>,
    pub slot: PendingTenantSlot,
    pub state_tx: watch::Sender<SessionState>,
    pub first_run_tx: broadcast::Sender<TenantId>,
}

/// State owned by the session actor.
pub struct SessionActorState {
    gateway: Arc<dyn IdentityGateway>,
    provisioner: Arc<dyn TenantProvisioner>,
    slot: PendingTenantSlot,
    state_tx: watch::Sender<SessionState>,
    first_run_tx: broadcast::Sender<TenantId>,
    user: Option<AuthUser>,
    profile: Option<Profile>,
    tenant: Option<Tenant>,
    /// Set once the process-lifetime event subscription is open.
    pump_started: bool,
}

impl SessionActorState {
    /// Publishes a state transition. The single funnel for all transitions.
    fn publish(&self, next: SessionState) {
        debug!(state = next.label(), "session state transition");
        let _ = self.state_tx.send(next);
    }

    fn publish_authenticated(&self) {
        if let Some(user) = &self.user {
            self.publish(SessionState::Authenticated {
                user: user.clone(),
                profile: self.profile.clone(),
                tenant: self.tenant.clone(),
            });
        }
    }

    fn current(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Startup resolution: session fetch and pending-record load in parallel,
    /// then one of the three resolved states.
    async fn resolve_startup(&mut self) -> Result<SessionState, AuthFlowError> {
        let (session_result, record_result) =
            tokio::join!(self.gateway.current_session(), async { self.slot.load() });

        // A store read failure is degraded here: the app must never be stuck
        // in Loading because local storage is unreadable.
        let record = match record_result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "pending record unreadable at startup, treating as absent");
                None
            }
        };

        let session = match session_result {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "session fetch failed at startup, treating as signed out");
                None
            }
        };

        match (session, record) {
            (Some(session), _) => {
                // A leftover record for this user means a prior run created
                // the account but died before provisioning; finish that
                // before declaring the session usable.
                self.on_signed_in(session).await;
            }
            (None, Some(record)) => {
                self.user = None;
                self.profile = None;
                self.tenant = None;
                self.publish(SessionState::PendingEmailVerification {
                    email: record.email,
                });
            }
            (None, None) => {
                self.publish(SessionState::Unauthenticated);
            }
        }

        Ok(self.current())
    }

    /// Shared signed-in path for startup, auth events, sign-in, and deep
    /// links: cache the user, finish any deferred provisioning, fetch
    /// profile/tenant, then declare `Authenticated`.
    async fn on_signed_in(&mut self, session: AuthSession) {
        let user = session.user;
        if self.user.as_ref().map(|u| &u.id) != Some(&user.id) {
            self.profile = None;
            self.tenant = None;
        }
        self.user = Some(user.clone());

        match self.slot.load() {
            Ok(Some(record)) if record.is_for_email(&user.email) => {
                if let Err(e) = self.complete_pending(&user).await {
                    warn!(error = %e, "deferred provisioning incomplete, will retry on next trigger");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not read pending record"),
        }

        self.load_profile_and_tenant(&user).await;
        self.publish_authenticated();
    }

    /// Completion of deferred tenant provisioning.
    ///
    /// Safe under duplicate triggers: the slot is re-checked immediately
    /// before the remote call, and the remote call itself is idempotent per
    /// user id. Failures leave the record in place so the next trigger
    /// retries, except a conflict, which can never succeed.
    async fn complete_pending(&mut self, user: &AuthUser) -> Result<(), AuthFlowError> {
        let live = self.gateway.current_session().await?;
        let Some(session) = live else {
            warn!("no live session, deferring tenant provisioning");
            return Ok(());
        };
        if session.user.id != user.id {
            warn!("session changed identity, deferring tenant provisioning");
            return Ok(());
        }

        // Re-check: another trigger may have completed and cleared already.
        let Some(record) = self.slot.load()? else {
            debug!("pending record already cleared, nothing to provision");
            return Ok(());
        };
        if !record.is_for_email(&user.email) {
            return Ok(());
        }

        let request = TenantRequest {
            name: record.tenant_name.clone(),
            phone: record.tenant_phone.clone(),
            owner_full_name: Some(record.owner_full_name.clone()),
        };
        let tenant_id = match self.provisioner.provision_tenant(&user.id, request).await {
            Ok(id) => id,
            Err(e @ AuthFlowError::ProvisioningConflict { .. }) => {
                // Retrying cannot help; abandon the record.
                if let Err(clear_err) = self.slot.clear() {
                    warn!(error = %clear_err, "failed to clear conflicting pending record");
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        // The record survives until the tenant fetch also succeeds; the
        // retry path re-runs the idempotent create and fetches again.
        let tenant = self.provisioner.fetch_tenant(&tenant_id).await?;
        self.tenant = Some(tenant);
        self.slot.clear()?;
        info!(tenant = %tenant_id, "tenant provisioned and bound to owner");
        let _ = self.first_run_tx.send(tenant_id);
        Ok(())
    }

    /// Best-effort profile and tenant fetch. Transient failures are logged
    /// and retried by the next trigger; the session stays usable.
    async fn load_profile_and_tenant(&mut self, user: &AuthUser) {
        match self.provisioner.fetch_profile(&user.id).await {
            Ok(profile) => {
                if self.tenant.is_none() {
                    if let Some(tenant_id) = profile.tenant_id.clone() {
                        match self.provisioner.fetch_tenant(&tenant_id).await {
                            Ok(tenant) => self.tenant = Some(tenant),
                            Err(e) => warn!(error = %e, tenant = %tenant_id, "tenant fetch failed"),
                        }
                    }
                }
                self.profile = Some(profile);
            }
            Err(e) => warn!(error = %e, "profile fetch failed"),
        }
    }

    async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), AuthFlowError> {
        let session = self.gateway.sign_in(email, password).await?;
        self.on_signed_in(session).await;
        Ok(())
    }

    async fn sign_up_with_pending_tenant(
        &mut self,
        record: PendingTenantRecord,
        password: &str,
    ) -> Result<(), AuthFlowError> {
        // Persisted before any remote call so a crash between sign-up and
        // provisioning can resume on the next launch.
        self.slot.save(&record)?;

        let metadata = SignUpMetadata {
            full_name: Some(record.owner_full_name.clone()),
            tenant_name: Some(record.tenant_name.clone()),
        };
        match self
            .gateway
            .sign_up(&record.email, password, metadata)
            .await
        {
            Ok(user_id) => {
                info!(user = %user_id, "sign-up issued, awaiting email verification");
                self.publish(SessionState::PendingEmailVerification {
                    email: record.email,
                });
                Ok(())
            }
            Err(e) => {
                if let Err(clear_err) = self.slot.clear() {
                    warn!(error = %clear_err, "failed to clear pending record after sign-up failure");
                }
                Err(e)
            }
        }
    }

    async fn sign_out(&mut self) -> Result<(), AuthFlowError> {
        self.gateway.sign_out().await?;
        self.clear_identity();
        Ok(())
    }

    /// Clears cached identity and drops to `Unauthenticated`. A pending
    /// record for an unrelated identity is left untouched.
    fn clear_identity(&mut self) {
        self.user = None;
        self.profile = None;
        self.tenant = None;
        self.publish(SessionState::Unauthenticated);
    }

    async fn on_auth_event(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => self.on_signed_in(session).await,
            AuthEvent::SignedOut => self.clear_identity(),
            AuthEvent::Other(kind) => debug!(kind, "ignoring auth event"),
        }
    }

    async fn on_deep_link(&mut self, url: &str) {
        match self.gateway.exchange_deep_link(url).await {
            Ok(session) => self.on_signed_in(session).await,
            // Log-only: deep links have no direct caller to surface to.
            Err(e) => warn!(url, error = %e, "deep link rejected"),
        }
    }
}

/// The session actor.
pub struct SessionActor;

#[async_trait]
impl Actor for SessionActor {
    type Msg = SessionMsg;
    type State = SessionActorState;
    type Arguments = SessionActorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(SessionActorState {
            gateway: args.gateway,
            provisioner: args.provisioner,
            slot: args.slot,
            state_tx: args.state_tx,
            first_run_tx: args.first_run_tx,
            user: None,
            profile: None,
            tenant: None,
            pump_started: false,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionMsg::Initialize(reply) => {
                let result = state.resolve_startup().await;

                // One event subscription for the process lifetime. Repeated
                // initialize calls must not open a second one.
                if !state.pump_started {
                    state.pump_started = true;
                    let mut events = state.gateway.events();
                    let actor = myself.clone();
                    tokio::spawn(async move {
                        while let Some(event) = events.recv().await {
                            if actor.send_message(SessionMsg::AuthEvent(event)).is_err() {
                                break;
                            }
                        }
                    });
                }

                let _ = reply.send(result);
            }
            SessionMsg::AuthEvent(event) => state.on_auth_event(event).await,
            SessionMsg::DeepLink(url) => state.on_deep_link(&url).await,
            SessionMsg::SignIn {
                email,
                password,
                reply,
            } => {
                let _ = reply.send(state.sign_in(&email, &password).await);
            }
            SessionMsg::SignUp {
                email,
                password,
                metadata,
                reply,
            } => {
                let _ = reply.send(state.gateway.sign_up(&email, &password, metadata).await);
            }
            SessionMsg::SignUpWithPendingTenant {
                record,
                password,
                reply,
            } => {
                let _ = reply.send(state.sign_up_with_pending_tenant(record, &password).await);
            }
            SessionMsg::SignOut { reply } => {
                let _ = reply.send(state.sign_out().await);
            }
        }
        Ok(())
    }
}

/// Cheap-to-clone handle over the session actor.
///
/// Presentation code observes [`SessionState`] through [`watch_state`] and
/// issues operations through the async methods; everything funnels into the
/// actor mailbox.
///
/// [`watch_state`]: SessionController::watch_state
#[derive(Clone)]
pub struct SessionController {
    actor: ActorRef<SessionMsg>,
    state_rx: watch::Receiver<SessionState>,
    first_run_tx: broadcast::Sender<TenantId>,
}

impl SessionController {
    /// Spawns the controller actor over the injected capabilities.
    ///
    /// The returned controller starts in [`SessionState::Loading`]; call
    /// [`initialize`](Self::initialize) to run the startup sequence.
    pub async fn spawn(
        gateway: Arc<dyn IdentityGateway>,
        provisioner: Arc<dyn TenantProvisioner>,
        store: Arc<dyn SecureRecordStore>,
    ) -> anyhow::Result<Self> {
        let (state_tx, state_rx) = watch::channel(SessionState::Loading);
        let (first_run_tx, _) = broadcast::channel(8);

        let args = SessionActorArgs {
            gateway,
            provisioner,
            slot: PendingTenantSlot::new(store),
            state_tx,
            first_run_tx: first_run_tx.clone(),
        };

        let (actor, _handle) = SessionActor::spawn(None, SessionActor, args)
            .await
            .map_err(|e| anyhow::anyhow!("failed to spawn session actor: {}", e))?;

        Ok(Self {
            actor,
            state_rx,
            first_run_tx,
        })
    }

    /// Runs the startup sequence and opens the auth-event subscription.
    pub async fn initialize(&self) -> Result<SessionState, AuthFlowError> {
        self.call(SessionMsg::Initialize).await
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Subscription to state transitions for passive observers.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Subscription to the "first run of this tenant" signal, fired exactly
    /// when deferred provisioning creates and binds the tenant.
    pub fn first_run_events(&self) -> broadcast::Receiver<TenantId> {
        self.first_run_tx.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthFlowError> {
        let email = email.to_string();
        let password = password.to_string();
        self.call(move |reply| SessionMsg::SignIn {
            email,
            password,
            reply,
        })
        .await
    }

    /// Plain sign-up pass-through; no tenant is provisioned.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<UserId, AuthFlowError> {
        let email = email.to_string();
        let password = password.to_string();
        self.call(move |reply| SessionMsg::SignUp {
            email,
            password,
            metadata,
            reply,
        })
        .await
    }

    /// Persists the pending record, then signs up. Tenant creation is
    /// deferred until the owner's email is verified via auth event or deep
    /// link.
    pub async fn sign_up_with_pending_tenant(
        &self,
        tenant_name: &str,
        tenant_phone: Option<&str>,
        owner_full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthFlowError> {
        let record = PendingTenantRecord {
            tenant_name: tenant_name.to_string(),
            tenant_phone: tenant_phone.map(str::to_string),
            owner_full_name: owner_full_name.to_string(),
            email: email.to_string(),
        };
        let password = password.to_string();
        self.call(move |reply| SessionMsg::SignUpWithPendingTenant {
            record,
            password,
            reply,
        })
        .await
    }

    pub async fn sign_out(&self) -> Result<(), AuthFlowError> {
        self.call(|reply| SessionMsg::SignOut { reply }).await
    }

    /// Routes an inbound URL to the controller. Fire-and-forget: exchange
    /// failures are logged inside the actor, never surfaced.
    pub fn handle_deep_link(&self, url: &str) {
        if self
            .actor
            .send_message(SessionMsg::DeepLink(url.to_string()))
            .is_err()
        {
            warn!(url, "controller unavailable, deep link dropped");
        }
    }

    /// Stops the actor; the event pump ends when its next forward fails.
    pub fn shutdown(&self) {
        self.actor.stop(None);
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, AuthFlowError>>) -> SessionMsg,
    ) -> Result<T, AuthFlowError> {
        let (tx, rx) = oneshot::channel();
        self.actor
            .send_message(build(tx))
            .map_err(|e| AuthFlowError::Internal {
                message: format!("controller unavailable: {:?}", e),
            })?;
        rx.await.map_err(|_| AuthFlowError::Internal {
            message: "controller dropped the reply".to_string(),
        })?
    }
}

#[cfg(test)]
#[path = "tests/fakes.rs"]
pub(crate) mod fakes;

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
