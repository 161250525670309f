//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides, then
//! command line flags. The configuration file path defaults to `config.yaml` but can be specified
//! via `-f` flag or `KUBEAUTH_CONFIG` environment variable. A missing file is not an error.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `KUBEAUTH_` override YAML values
//! 3. **Cattle variables** - `CATTLE_URL`, `CATTLE_ACCESS_KEY` and `CATTLE_SECRET_KEY` set the
//!    identity backend connection, as they are injected into Rancher-managed containers
//! 4. **CLI flags** - `--authentication-webhook-port`, `--health-check-port` (also read from
//!    `AUTHENTICATION_WEBHOOK_PORT` / `HEALTH_CHECK_PORT`) and `--test-authentication`
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `KUBEAUTH_BACKEND__REQUEST_TIMEOUT=10s` sets the `backend.request_timeout` field.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use url::Url;

/// CLI args
#[derive(Parser, Debug, Default)]
#[command(name = "kubernetes-auth", author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "KUBEAUTH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Serve canned identities from the `static_identities` table instead of the identity backend
    #[arg(long)]
    pub test_authentication: bool,

    /// Resolve a single token, print the result and exit
    #[arg(long)]
    pub evaluate_token: Option<String>,

    /// Port to handle Kubernetes authentication webhook
    #[arg(long, env = "AUTHENTICATION_WEBHOOK_PORT")]
    pub authentication_webhook_port: Option<u16>,

    /// Port to configure an HTTP health check listener on
    #[arg(long, env = "HEALTH_CHECK_PORT")]
    pub health_check_port: Option<u16>,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Interface both listeners bind to
    pub host: String,
    /// Port of the TokenReview webhook listener
    pub webhook_port: u16,
    /// Port of the health check listener
    pub health_check_port: u16,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Use the static provider instead of the identity backend
    pub test_authentication: bool,
    /// Identity backend connection
    pub backend: BackendConfig,
    /// Token -> user table served by the static provider
    pub static_identities: BTreeMap<String, StaticIdentity>,
}

/// Connection settings for the Rancher identity backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the Cattle API (`CATTLE_URL`)
    pub url: Option<Url>,
    /// Service account access key (`CATTLE_ACCESS_KEY`)
    pub access_key: Option<String>,
    /// Service account secret key (`CATTLE_SECRET_KEY`)
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    /// Timeout for each individual backend call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Name of the setting that reports whether access control is enabled
    pub auth_setting: String,
}

/// A canned user for the static provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticIdentity {
    pub username: String,
    pub uid: String,
    pub groups: Vec<String>,
}

impl StaticIdentity {
    fn named(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            webhook_port: 80,
            health_check_port: 10240,
            enable_otel_export: false,
            test_authentication: false,
            backend: BackendConfig::default(),
            static_identities: ["test1", "test2", "test3", "admin"]
                .into_iter()
                .map(|name| (name.to_string(), StaticIdentity::named(name)))
                .collect(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            access_key: None,
            secret_key: None,
            request_timeout: Duration::from_secs(30),
            auth_setting: "api.security.enabled".to_string(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(port) = args.authentication_webhook_port {
            config.webhook_port = port;
        }
        if let Some(port) = args.health_check_port {
            config.health_check_port = port;
        }
        if args.test_authentication {
            config.test_authentication = true;
        }

        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), String> {
        if self.webhook_port == 0 {
            return Err(format!("Invalid authentication webhook port number: {}", self.webhook_port));
        }
        if self.health_check_port == 0 {
            return Err(format!("Invalid health check port number: {}", self.health_check_port));
        }
        if !self.test_authentication && self.backend.url.is_none() {
            return Err("Identity backend URL is not configured: set CATTLE_URL or backend.url".to_string());
        }
        if self.backend.request_timeout.is_zero() {
            return Err("backend.request_timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        let mut figment = Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("KUBEAUTH_").ignore(&["config"]).split("__"))
            // Variables Rancher injects into agent containers
            .merge(Env::raw().only(&["CATTLE_URL"]).map(|_| "backend.url".into()));

        // Credentials are opaque: `Env` would turn an all-digit key into a number
        for (var, key) in [
            ("CATTLE_ACCESS_KEY", "backend.access_key"),
            ("CATTLE_SECRET_KEY", "backend.secret_key"),
        ] {
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        figment
    }

    pub fn webhook_address(&self) -> String {
        format!("{}:{}", self.host, self.webhook_port)
    }

    pub fn health_check_address(&self) -> String {
        format!("{}:{}", self.host, self.health_check_port)
    }
}
