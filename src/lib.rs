//! Session and tenant-provisioning controller for the workshop field-service
//! app.
//!
//! This crate owns the client-resident identity state: which of four mutually
//! exclusive session states the app is in on every cold start, auth event,
//! and deep link, and the crash-resilient two-phase "create tenant after the
//! owner's email is verified" workflow. The remote identity provider, tenant
//! store, and secure key-value store are consumed through injected traits so
//! every flow is testable against fakes.

pub mod controller;
pub mod errors;
pub mod gateway;
pub mod pending;
pub mod provisioner;
pub mod record_store;
pub mod storage_paths;
pub mod types;

pub use controller::{SessionController, SessionState};
pub use errors::AuthFlowError;
pub use gateway::{AuthEvent, IdentityGateway};
pub use pending::{PendingTenantRecord, PendingTenantSlot};
pub use provisioner::TenantProvisioner;
pub use record_store::{FileRecordStore, SecureRecordStore, StoreError};
pub use types::{AuthSession, AuthUser, Profile, SignUpMetadata, Tenant, TenantId, TenantRequest, UserId};
