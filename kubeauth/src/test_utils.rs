//! Test utilities: a counting in-memory identity backend and app constructors.

use async_trait::async_trait;
use axum_test::TestServer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::auth::Provider;
use crate::auth::provider::BackendProvider;
use crate::backend::{EnvironmentMembership, Identity, IdentityBackend, MembershipRecord};
use crate::errors::{Error, Result};

/// reqwest is built without a bundled crypto provider; install one for every test binary
#[ctor::ctor]
unsafe fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// In-memory [`IdentityBackend`] that counts every call made to it.
#[derive(Debug, Default)]
pub struct StubBackend {
    identities: Vec<Identity>,
    membership: EnvironmentMembership,
    auth_disabled: bool,
    fail_identities: bool,
    no_environment: bool,
    identity_calls: AtomicUsize,
    membership_calls: AtomicUsize,
    auth_setting_calls: AtomicUsize,
    last_token: Mutex<Option<String>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(mut self, identities: Vec<Identity>) -> Self {
        self.identities = identities;
        self
    }

    pub fn with_membership(mut self, members: Vec<MembershipRecord>) -> Self {
        self.membership = members.into_iter().map(|member| (member.id.clone(), member)).collect();
        self
    }

    pub fn with_auth_disabled(mut self, disabled: bool) -> Self {
        self.auth_disabled = disabled;
        self
    }

    /// Make `fetch_identities` answer like a backend returning 500
    pub fn failing_identities(mut self) -> Self {
        self.fail_identities = true;
        self
    }

    /// Make `fetch_environment_membership` find no project
    pub fn without_environment(mut self) -> Self {
        self.no_environment = true;
        self
    }

    pub fn identity_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub fn membership_calls(&self) -> usize {
        self.membership_calls.load(Ordering::SeqCst)
    }

    pub fn auth_setting_calls(&self) -> usize {
        self.auth_setting_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.identity_calls() + self.membership_calls() + self.auth_setting_calls()
    }

    /// The decoded token of the most recent `fetch_identities` call
    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityBackend for StubBackend {
    async fn fetch_identities(&self, token: &str) -> Result<Vec<Identity>> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock().unwrap() = Some(token.to_string());
        if self.fail_identities {
            return Err(Error::BackendStatus {
                status: 500,
                url: "stub://identity".to_string(),
                body: "stub failure".to_string(),
            });
        }
        Ok(self.identities.clone())
    }

    async fn fetch_environment_membership(&self) -> Result<EnvironmentMembership> {
        self.membership_calls.fetch_add(1, Ordering::SeqCst);
        if self.no_environment {
            return Err(Error::NoEnvironment);
        }
        Ok(self.membership.clone())
    }

    async fn fetch_auth_disabled(&self) -> bool {
        self.auth_setting_calls.fetch_add(1, Ordering::SeqCst);
        self.auth_disabled
    }
}

/// Webhook router served by `provider`, wrapped in a test server
pub fn create_webhook_server(provider: Arc<dyn Provider>) -> TestServer {
    let state = crate::AppState::builder().provider(provider).build();
    TestServer::new(crate::build_webhook_router(state).into_make_service()).expect("Failed to create test server")
}

/// Webhook test server in front of a [`BackendProvider`] over `backend`
pub fn create_backend_webhook_server(backend: Arc<StubBackend>, bootstrap_token: &str) -> TestServer {
    create_webhook_server(Arc::new(BackendProvider::new(backend, bootstrap_token)))
}
