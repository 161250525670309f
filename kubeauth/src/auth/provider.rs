//! Production provider backed by the identity backend.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{Provider, UserInfo, resolver};
use crate::backend::IdentityBackend;
use crate::errors::Result;

/// Username of the identity the bootstrap token maps to
pub const BOOTSTRAP_USERNAME: &str = "bootstrap";

/// Username every token maps to while access control is disabled at the backend
pub const AUTH_DISABLED_USERNAME: &str = "admin";

/// Provider that checks the bootstrap token and the backend's auth switch before resolving the
/// token against the identity backend.
pub struct BackendProvider {
    backend: Arc<dyn IdentityBackend>,
    bootstrap_token: String,
}

impl BackendProvider {
    /// `bootstrap_token` is compared verbatim to incoming tokens; empty disables it.
    pub fn new(backend: Arc<dyn IdentityBackend>, bootstrap_token: impl Into<String>) -> Self {
        Self {
            backend,
            bootstrap_token: bootstrap_token.into(),
        }
    }
}

#[async_trait]
impl Provider for BackendProvider {
    #[instrument(skip_all)]
    async fn lookup(&self, token: &str) -> Result<Option<UserInfo>> {
        if token.is_empty() {
            return Ok(None);
        }

        if token == self.bootstrap_token {
            debug!("Token matches the bootstrap token");
            return Ok(Some(UserInfo::master(BOOTSTRAP_USERNAME)));
        }

        if self.backend.fetch_auth_disabled().await {
            info!("Access control is disabled at the identity backend, authenticating as {}", AUTH_DISABLED_USERNAME);
            return Ok(Some(UserInfo::master(AUTH_DISABLED_USERNAME)));
        }

        let decoded = String::from_utf8(STANDARD.decode(token)?)?;

        let identities = self.backend.fetch_identities(&decoded).await?;
        let roster = self.backend.fetch_environment_membership().await?;

        let user = resolver::resolve(&identities, &roster);
        match &user {
            Some(user) => debug!(username = %user.username, groups = ?user.groups, "Token resolved"),
            None => debug!("No identity of the token is a member of the environment"),
        }
        Ok(user)
    }
}
