//! Tenant store boundary.

use async_trait::async_trait;

use crate::errors::AuthFlowError;
use crate::types::{Profile, Tenant, TenantId, TenantRequest, UserId};

/// Remote tenant-store operations consumed by the controller.
#[async_trait]
pub trait TenantProvisioner: Send + Sync {
    /// Atomically creates a tenant and binds the caller as its owner.
    ///
    /// The remote procedure is idempotent per `user_id`: a second call for a
    /// user who already owns the tenant returns the existing tenant id. A
    /// user who owns a *different* tenant gets
    /// [`AuthFlowError::ProvisioningConflict`].
    async fn provision_tenant(
        &self,
        user_id: &UserId,
        request: TenantRequest,
    ) -> Result<TenantId, AuthFlowError>;

    /// Fetches the profile bound to a user.
    async fn fetch_profile(&self, user_id: &UserId) -> Result<Profile, AuthFlowError>;

    /// Fetches a tenant by id.
    async fn fetch_tenant(&self, tenant_id: &TenantId) -> Result<Tenant, AuthFlowError>;
}
