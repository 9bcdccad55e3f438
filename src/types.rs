//! Strongly typed domain primitives for the session controller.
//!
//! These newtypes give identifiers from the identity provider and the tenant
//! store distinct types so a user id can never be passed where a tenant id is
//! expected. Remote-owned value types (`Profile`, `Tenant`) are cached in
//! memory for the process lifetime and never persisted locally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a user at the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Creates a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a tenant ("workshop") in the tenant store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Creates a new random tenant ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user identity carried by a verified session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// A verified session returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    /// Opaque provider token; the controller never inspects it.
    pub access_token: String,
}

/// Free-form metadata attached to a remote sign-up.
///
/// The provider stores this alongside the account; the controller uses it to
/// carry the owner name and requested tenant name through the verification
/// round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub full_name: Option<String>,
    pub tenant_name: Option<String>,
}

/// Parameters for the tenant-creation procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRequest {
    pub name: String,
    pub phone: Option<String>,
    pub owner_full_name: Option<String>,
}

/// A user profile owned by the remote tenant store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub full_name: Option<String>,
    pub email: String,
    /// The tenant this user is bound to, if any.
    pub tenant_id: Option<TenantId>,
}

/// A tenant ("workshop") record owned by the remote tenant store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub phone: Option<String>,
    /// RFC3339 creation timestamp assigned by the remote store.
    pub created_at: String,
}
