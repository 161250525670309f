//! # kubeauth: Kubernetes authentication webhook for Rancher environments
//!
//! The Kubernetes API server can delegate bearer token authentication to a webhook: it posts a
//! `TokenReview` document containing the token and expects back whether the token is valid and,
//! if so, which user and groups it stands for. `kubeauth` answers those reviews for clusters
//! running inside a Rancher environment, using Rancher's identity service as the source of truth.
//!
//! ## Request Flow
//!
//! 1. The API server posts a TokenReview to the webhook listener ([`api::handlers::token_review`]).
//! 2. The handler checks the `apiVersion`, trims the token and hands it to the configured
//!    [`auth::Provider`].
//! 3. The production provider ([`auth::provider::BackendProvider`]) short-circuits the bootstrap
//!    token and the backend's "auth disabled" switch, otherwise base64-decodes the token and asks
//!    the identity backend ([`backend`]) for the token's identities and the environment roster.
//! 4. [`auth::resolver::resolve`] decides: members of the environment are authenticated, owners
//!    additionally get `system:masters`.
//! 5. The handler renders the decision as a TokenReview status, or a plain-text 500 if the token
//!    could not be evaluated at all.
//!
//! A second listener serves `/healthcheck` for liveness probes. Whichever listener stops first
//! stops the process.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use kubeauth::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = kubeauth::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     kubeauth::telemetry::init_telemetry(args.debug, config.enable_otel_export)?;
//!
//!     let app = Application::new(config, "")?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod errors;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;

use anyhow::Context;
use axum::{
    Router,
    routing::{any, get},
};
use bon::Builder;
use std::future::IntoFuture;
use std::io::Read;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub use config::Config;

use crate::auth::{Provider, UserInfo, provider::BackendProvider, static_provider::StaticProvider};
use crate::backend::rancher::RancherClient;

/// Shared state of the webhook router. Nothing in it changes after construction.
#[derive(Clone, Builder)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
}

/// Build the provider selected by the configuration.
///
/// With `test_authentication` the static token table is served and the bootstrap token is not
/// used; otherwise tokens are resolved against the identity backend.
pub fn build_provider(config: &Config, bootstrap_token: &str) -> anyhow::Result<Arc<dyn Provider>> {
    if config.test_authentication {
        let provider = StaticProvider::new(&config.static_identities);
        if provider.is_empty() {
            warn!("Static test authentication has no tokens configured, every review will be unauthenticated");
        } else {
            info!("Using static test authentication with {} tokens", provider.len());
        }
        return Ok(Arc::new(provider));
    }

    let client = RancherClient::new(&config.backend).context("Failed to create identity backend client")?;
    info!("Resolving tokens against identity backend at {}", client.base_url());
    Ok(Arc::new(BackendProvider::new(Arc::new(client), bootstrap_token)))
}

/// Read the bootstrap token from `reader` until EOF. Surrounding whitespace is dropped.
pub fn read_bootstrap_token(mut reader: impl Read) -> std::io::Result<String> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;
    Ok(raw.trim().to_string())
}

/// Resolve a single token, failing if it does not authenticate.
pub async fn evaluate_token(provider: &dyn Provider, token: &str) -> anyhow::Result<UserInfo> {
    provider
        .lookup(token)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Failed to evaluate token {token}"))
}

/// Router of the authentication webhook listener
pub fn build_webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(api::handlers::token_review::review_token))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Router of the health check listener
pub fn build_health_router() -> Router {
    Router::new()
        .route("/healthcheck", get(api::handlers::health::healthcheck))
        .layer(TraceLayer::new_for_http())
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// The webhook and health check listeners with everything they need.
pub struct Application {
    config: Config,
    app_state: AppState,
}

impl Application {
    /// Create a new application. `bootstrap_token` may be empty to disable the bootstrap credential.
    pub fn new(config: Config, bootstrap_token: &str) -> anyhow::Result<Self> {
        debug!(
            "Starting with webhook on {}, health check on {}",
            config.webhook_address(),
            config.health_check_address()
        );

        let provider = build_provider(&config, bootstrap_token)?;
        let app_state = AppState::builder().provider(provider).build();

        Ok(Self { config, app_state })
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.app_state.provider.clone()
    }

    /// Serve both listeners until one of them stops or `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let webhook_listener = TcpListener::bind(self.config.webhook_address())
            .await
            .with_context(|| format!("Failed to bind authentication webhook to {}", self.config.webhook_address()))?;
        let health_listener = TcpListener::bind(self.config.health_check_address())
            .await
            .with_context(|| format!("Failed to bind health check to {}", self.config.health_check_address()))?;

        info!("Listening for TokenReviews on http://{}/", self.config.webhook_address());
        info!("Listening for health checks on http://{}/healthcheck", self.config.health_check_address());

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown.await;
            let _ = stop_tx.send(true);
        });

        let webhook = axum::serve(webhook_listener, build_webhook_router(self.app_state).into_make_service())
            .with_graceful_shutdown(stopped(stop_rx.clone()))
            .into_future();
        let health = axum::serve(health_listener, build_health_router().into_make_service())
            .with_graceful_shutdown(stopped(stop_rx))
            .into_future();

        // First listener to stop decides the outcome
        let result = tokio::select! {
            result = webhook => result.context("Authentication webhook listener failed"),
            result = health => result.context("Health check listener failed"),
        };

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        result
    }
}
