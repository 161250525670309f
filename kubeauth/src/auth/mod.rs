//! Token authentication.
//!
//! A [`Provider`] turns the bearer token from a TokenReview into the Kubernetes user it stands for,
//! or into nothing when the caller is not authenticated.
//!
//! # Providers
//!
//! - [`provider::BackendProvider`]: the production provider. Handles the bootstrap token and the
//!   backend's "auth disabled" switch itself, then asks the identity backend who owns the token
//!   and hands the answer to [`resolver::resolve`].
//! - [`static_provider::StaticProvider`]: serves a fixed token table from configuration, for
//!   exercising a cluster without a backend (`--test-authentication`).
//!
//! # Outcomes
//!
//! `lookup` returns `Result<Option<UserInfo>>`:
//!
//! - `Ok(Some(user))`: authenticated as `user`
//! - `Ok(None)`: the token was evaluated and does not belong to a member of the environment
//! - `Err(_)`: the token could not be evaluated (malformed token, backend down, ...)

pub mod provider;
pub mod resolver;
pub mod static_provider;

use async_trait::async_trait;

use crate::errors::Result;

/// Group that grants cluster-admin in Kubernetes' default RBAC
pub const KUBERNETES_MASTER_GROUP: &str = "system:masters";

/// The authenticated Kubernetes user a token maps to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    /// Backend id of the user, empty for the built-in identities
    pub uid: String,
    pub groups: Vec<String>,
}

impl UserInfo {
    /// A user that belongs to the masters group and nothing else
    pub fn master(username: &str) -> Self {
        Self {
            username: username.to_string(),
            uid: String::new(),
            groups: vec![KUBERNETES_MASTER_GROUP.to_string()],
        }
    }

    pub fn is_master(&self) -> bool {
        self.groups.iter().any(|group| group == KUBERNETES_MASTER_GROUP)
    }
}

/// Resolves bearer tokens to users.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn lookup(&self, token: &str) -> Result<Option<UserInfo>>;
}
