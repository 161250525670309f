//! Identity backend: the Rancher (Cattle) API that knows which identities a token belongs to and
//! which of them are members of the current environment.
//!
//! The [`IdentityBackend`] trait is the seam between the decision logic in [`crate::auth`] and the
//! transport. [`rancher::RancherClient`] is the reqwest implementation used in production; tests
//! use the counting stub in `test_utils`.

pub mod rancher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::Result;

/// `externalIdType` of identities that live in the backend's own id space
pub const RANCHER_ID_TYPE: &str = "rancher_id";

/// Role of a project member that escalates to the Kubernetes administrators group
pub const OWNER_ROLE: &str = "owner";

/// A principal reported by the backend for a token: either the user itself or a group it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    pub id: String,
    pub login: String,
    pub name: String,
    /// true for users, false for groups (teams, orgs, LDAP groups, ...)
    pub user: bool,
    pub external_id_type: String,
}

impl Identity {
    pub fn is_rancher_identity(&self) -> bool {
        self.external_id_type == RANCHER_ID_TYPE
    }
}

/// A project member record. Only the role matters for decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MembershipRecord {
    pub id: String,
    pub external_id: String,
    pub external_id_type: String,
    pub role: String,
}

impl MembershipRecord {
    pub fn is_owner(&self) -> bool {
        self.role == OWNER_ROLE
    }
}

/// Roster of the current environment, keyed by member identifier
pub type EnvironmentMembership = HashMap<String, MembershipRecord>;

/// Generic `{"data": [...]}` envelope the backend wraps every listing in
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Read-only queries the provider needs from the identity backend.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Identities bound to `token`, using the (already decoded) token as the credential.
    async fn fetch_identities(&self, token: &str) -> Result<Vec<Identity>>;

    /// Members of the current environment. Only the first project the backend lists is considered.
    async fn fetch_environment_membership(&self) -> Result<EnvironmentMembership>;

    /// Whether access control is switched off at the backend. Failures read as `false`.
    async fn fetch_auth_disabled(&self) -> bool;
}
