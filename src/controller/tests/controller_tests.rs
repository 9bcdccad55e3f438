//! Tests for the session controller actor.
//!
//! Everything runs against in-memory fakes; the store is shared across
//! controller instances to simulate process restarts.

use std::sync::Arc;
use std::time::Duration;

use super::fakes::{session_for, FakeGateway, FakeProvisioner, MemoryRecordStore};
use super::*;
use crate::gateway::AuthEvent;
use crate::types::{AuthSession, AuthUser};

const PENDING_KEY: &str = "pending-tenant";
const VERIFY_URL: &str = "workshop://auth/verify?token=abc123";

struct Harness {
    gateway: Arc<FakeGateway>,
    provisioner: Arc<FakeProvisioner>,
    store: Arc<MemoryRecordStore>,
    controller: SessionController,
}

impl Harness {
    async fn new() -> Self {
        let gateway = Arc::new(FakeGateway::new());
        let provisioner = Arc::new(FakeProvisioner::new());
        let store = Arc::new(MemoryRecordStore::new());
        let controller = SessionController::spawn(
            gateway.clone(),
            provisioner.clone(),
            store.clone(),
        )
        .await
        .expect("spawn failed");
        Self {
            gateway,
            provisioner,
            store,
            controller,
        }
    }

    /// Spawns a fresh controller and gateway over the same store, as after a
    /// process restart.
    async fn restart(&self) -> Harness {
        let gateway = Arc::new(FakeGateway::new());
        let provisioner = Arc::new(FakeProvisioner::new());
        let controller = SessionController::spawn(
            gateway.clone(),
            provisioner.clone(),
            self.store.clone(),
        )
        .await
        .expect("spawn failed");
        Harness {
            gateway,
            provisioner,
            store: self.store.clone(),
            controller,
        }
    }

    fn slot(&self) -> PendingTenantSlot {
        PendingTenantSlot::new(self.store.clone())
    }

    /// Runs the standard owner signup: record saved, remote sign-up issued.
    async fn joe_signs_up(&self) {
        self.controller
            .sign_up_with_pending_tenant(
                "Joe's Repairs",
                None,
                "Joe Smith",
                "joe@x.com",
                "secret1",
            )
            .await
            .expect("signup failed");
    }

    /// The verified session for the account created by `joe_signs_up`.
    fn joe_session(&self) -> AuthSession {
        let (user_id, email) = self.gateway.last_sign_up().expect("no sign-up happened");
        AuthSession {
            user: AuthUser { id: user_id, email },
            access_token: "verified-token".to_string(),
        }
    }
}

async fn wait_for_state(
    controller: &SessionController,
    pred: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    let mut rx = controller.watch_state();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed")
        .clone();
    state
}

fn tenant_name(state: &SessionState) -> Option<&str> {
    match state {
        SessionState::Authenticated {
            tenant: Some(tenant),
            ..
        } => Some(tenant.name.as_str()),
        _ => None,
    }
}

#[tokio::test]
async fn test_initialize_fresh_install_is_unauthenticated() {
    let h = Harness::new().await;
    let state = h.controller.initialize().await.expect("initialize failed");
    assert_eq!(state, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_signup_saves_record_and_enters_pending() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    h.joe_signs_up().await;

    assert_eq!(h.gateway.sign_up_count(), 1);
    assert_eq!(
        h.controller.state(),
        SessionState::PendingEmailVerification {
            email: "joe@x.com".to_string()
        }
    );

    let record = h.slot().load().expect("load failed").expect("no record");
    assert_eq!(record.tenant_name, "Joe's Repairs");
    assert_eq!(record.owner_full_name, "Joe Smith");
    assert_eq!(record.email, "joe@x.com");
    // No tenant yet: creation waits for email verification.
    assert_eq!(h.provisioner.provision_count(), 0);
}

#[tokio::test]
async fn test_deep_link_completes_provisioning() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");
    h.joe_signs_up().await;

    let mut first_run = h.controller.first_run_events();
    h.gateway.add_link(VERIFY_URL, h.joe_session());
    h.controller.handle_deep_link(VERIFY_URL);

    let state = wait_for_state(&h.controller, |s| tenant_name(s).is_some()).await;
    assert_eq!(tenant_name(&state), Some("Joe's Repairs"));
    assert_eq!(h.provisioner.provision_count(), 1);
    assert!(h.slot().load().expect("load failed").is_none());

    let tenant_id = tokio::time::timeout(Duration::from_secs(5), first_run.recv())
        .await
        .expect("timed out waiting for first-run signal")
        .expect("first-run channel closed");
    match state {
        SessionState::Authenticated {
            tenant: Some(tenant),
            ..
        } => assert_eq!(tenant.id, tenant_id),
        other => panic!("unexpected state: {:?}", other),
    }
}

#[tokio::test]
async fn test_restart_before_verification_resolves_pending() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");
    h.joe_signs_up().await;

    // New process: same store, no remote session.
    let restarted = h.restart().await;
    let state = restarted
        .controller
        .initialize()
        .await
        .expect("initialize failed");
    assert_eq!(
        state,
        SessionState::PendingEmailVerification {
            email: "joe@x.com".to_string()
        }
    );
    assert_eq!(restarted.provisioner.provision_count(), 0);
}

#[tokio::test]
async fn test_duplicate_triggers_create_one_tenant() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");
    h.joe_signs_up().await;

    let session = h.joe_session();
    h.gateway.set_session(Some(session.clone()));
    h.gateway.add_link(VERIFY_URL, session.clone());

    // Deep-link success and the SignedIn notification both fire for the same
    // verification; no ordering guarantee.
    h.controller.handle_deep_link(VERIFY_URL);
    h.gateway.push_event(AuthEvent::SignedIn(session));

    let state = wait_for_state(&h.controller, |s| tenant_name(s).is_some()).await;
    assert_eq!(tenant_name(&state), Some("Joe's Repairs"));

    // Let the second trigger drain through the mailbox before asserting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.controller.initialize().await.expect("initialize failed");

    assert_eq!(h.provisioner.tenant_count(), 1);
    assert_eq!(h.provisioner.provision_count(), 1);
    assert!(h.slot().load().expect("load failed").is_none());
}

#[tokio::test]
async fn test_crash_after_signup_resumes_on_initialize() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");
    h.joe_signs_up().await;
    let session = h.joe_session();

    // Process died after remote sign-up succeeded; next launch restores the
    // verified session from the provider.
    let restarted = h.restart().await;
    restarted.gateway.set_session(Some(session));

    let state = restarted
        .controller
        .initialize()
        .await
        .expect("initialize failed");
    assert_eq!(tenant_name(&state), Some("Joe's Repairs"));
    assert_eq!(restarted.provisioner.provision_count(), 1);
    assert!(restarted.slot().load().expect("load failed").is_none());
}

#[tokio::test]
async fn test_transient_provisioning_failure_keeps_record() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");
    h.joe_signs_up().await;

    h.provisioner.fail_next_provision(AuthFlowError::TransientNetwork {
        message: "connection reset".to_string(),
    });
    h.gateway.add_link(VERIFY_URL, h.joe_session());
    h.controller.handle_deep_link(VERIFY_URL);

    // Session established, tenant still unbound.
    let state = wait_for_state(&h.controller, |s| s.is_authenticated()).await;
    assert_eq!(tenant_name(&state), None);
    assert!(h.slot().load().expect("load failed").is_some());

    // The next auth event retries and succeeds.
    h.gateway.push_event(AuthEvent::SignedIn(h.joe_session()));
    let state = wait_for_state(&h.controller, |s| tenant_name(s).is_some()).await;
    assert_eq!(tenant_name(&state), Some("Joe's Repairs"));
    assert!(h.slot().load().expect("load failed").is_none());
    assert_eq!(h.provisioner.tenant_count(), 1);
}

#[tokio::test]
async fn test_sign_out_leaves_unrelated_record_untouched() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    // A record for an identity that never verified.
    h.slot()
        .save(&PendingTenantRecord {
            tenant_name: "Dormant Repairs".to_string(),
            tenant_phone: None,
            owner_full_name: "Someone Else".to_string(),
            email: "other@x.com".to_string(),
        })
        .expect("save failed");

    h.gateway.set_sign_in_session(session_for("joe@x.com"));
    h.controller
        .sign_in("joe@x.com", "secret1")
        .await
        .expect("sign-in failed");
    let state = wait_for_state(&h.controller, |s| s.is_authenticated()).await;
    // The unrelated record must not be completed for this user.
    assert_eq!(tenant_name(&state), None);
    assert_eq!(h.provisioner.provision_count(), 0);

    h.controller.sign_out().await.expect("sign-out failed");
    assert_eq!(h.controller.state(), SessionState::Unauthenticated);

    let record = h.slot().load().expect("load failed").expect("record gone");
    assert_eq!(record.email, "other@x.com");
}

#[tokio::test]
async fn test_provisioning_conflict_abandons_record() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");
    h.joe_signs_up().await;

    h.provisioner
        .fail_next_provision(AuthFlowError::ProvisioningConflict {
            existing: crate::types::TenantId::new(),
        });
    h.gateway.add_link(VERIFY_URL, h.joe_session());
    h.controller.handle_deep_link(VERIFY_URL);

    let state = wait_for_state(&h.controller, |s| s.is_authenticated()).await;
    assert_eq!(tenant_name(&state), None);
    // Retrying cannot help, so the record is gone.
    assert!(h.slot().load().expect("load failed").is_none());
    assert_eq!(h.provisioner.provision_count(), 1);
}

#[tokio::test]
async fn test_tenant_fetch_failure_retains_record_for_retry() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");
    h.joe_signs_up().await;

    h.provisioner
        .fail_next_fetch_tenant(AuthFlowError::TransientNetwork {
            message: "timeout".to_string(),
        });
    h.gateway.add_link(VERIFY_URL, h.joe_session());
    h.controller.handle_deep_link(VERIFY_URL);

    let state = wait_for_state(&h.controller, |s| s.is_authenticated()).await;
    assert_eq!(tenant_name(&state), None);
    // Cleared only after the tenant fetch also succeeds.
    assert!(h.slot().load().expect("load failed").is_some());

    // Retry re-runs the idempotent create and fetches again.
    h.gateway.push_event(AuthEvent::SignedIn(h.joe_session()));
    let state = wait_for_state(&h.controller, |s| tenant_name(s).is_some()).await;
    assert_eq!(tenant_name(&state), Some("Joe's Repairs"));
    assert_eq!(h.provisioner.tenant_count(), 1);
    assert!(h.slot().load().expect("load failed").is_none());
}

#[tokio::test]
async fn test_invalid_deep_link_is_log_only() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    h.controller.handle_deep_link("https://unrelated.example/page");

    // Drain the mailbox, then confirm nothing changed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = h.controller.initialize().await.expect("initialize failed");
    assert_eq!(state, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_sign_up_failure_deletes_record_and_surfaces() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    h.gateway.fail_next_sign_up(AuthFlowError::TransientNetwork {
        message: "dns failure".to_string(),
    });
    let result = h
        .controller
        .sign_up_with_pending_tenant("Joe's Repairs", None, "Joe Smith", "joe@x.com", "secret1")
        .await;

    assert!(matches!(
        result,
        Err(AuthFlowError::TransientNetwork { .. })
    ));
    assert!(h.slot().load().expect("load failed").is_none());
    assert_eq!(h.controller.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_store_write_failure_aborts_signup_before_remote_call() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    h.store.fail_writes(true);
    let result = h
        .controller
        .sign_up_with_pending_tenant("Joe's Repairs", None, "Joe Smith", "joe@x.com", "secret1")
        .await;

    assert!(matches!(result, Err(AuthFlowError::Store { .. })));
    assert_eq!(h.gateway.sign_up_count(), 0);
    assert_eq!(h.controller.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_signed_out_event_clears_identity() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    h.gateway.set_sign_in_session(session_for("joe@x.com"));
    h.controller
        .sign_in("joe@x.com", "secret1")
        .await
        .expect("sign-in failed");
    wait_for_state(&h.controller, |s| s.is_authenticated()).await;

    h.gateway.push_event(AuthEvent::SignedOut);
    let state = wait_for_state(&h.controller, |s| *s == SessionState::Unauthenticated).await;
    assert_eq!(state, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_sign_in_with_bad_credentials_surfaces_and_keeps_state() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    let result = h.controller.sign_in("joe@x.com", "wrong").await;
    assert!(matches!(
        result,
        Err(AuthFlowError::InvalidCredentials { .. })
    ));
    assert_eq!(h.controller.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_initialize_loads_existing_tenant_binding() {
    let h = Harness::new().await;

    let session = session_for("owner@x.com");
    h.gateway.set_session(Some(session.clone()));
    h.provisioner.seed_owner(
        &session.user,
        crate::types::Tenant {
            id: crate::types::TenantId::new(),
            name: "Established Repairs".to_string(),
            phone: Some("+1 555 0100".to_string()),
            created_at: chrono::Utc::now().to_rfc3339(),
        },
    );

    let state = h.controller.initialize().await.expect("initialize failed");
    assert_eq!(tenant_name(&state), Some("Established Repairs"));
    // Nothing was pending, so nothing was provisioned.
    assert_eq!(h.provisioner.provision_count(), 0);
}

#[tokio::test]
async fn test_corrupt_pending_record_resolves_unauthenticated() {
    let h = Harness::new().await;
    h.store
        .insert_raw(PENDING_KEY, b"not json at all".to_vec());

    let state = h.controller.initialize().await.expect("initialize failed");
    assert_eq!(state, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_ignored_auth_events_do_not_change_state() {
    let h = Harness::new().await;
    h.controller.initialize().await.expect("initialize failed");

    h.gateway
        .push_event(AuthEvent::Other("token_refreshed".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.controller.state(), SessionState::Unauthenticated);
}
