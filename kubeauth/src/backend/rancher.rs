//! reqwest implementation of [`IdentityBackend`] against the Rancher v2-beta API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Collection, EnvironmentMembership, Identity, IdentityBackend, MembershipRecord};
use crate::config::BackendConfig;
use crate::errors::{Error, Result};

/// API path appended to bare backend URLs
const API_PATH: &str = "/v2-beta";

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Setting {
    #[serde(default)]
    value: Option<String>,
}

/// Client for the identity backend. Holds only fixed configuration, so it is cheap to share.
#[derive(Debug, Clone)]
pub struct RancherClient {
    client: Client,
    base_url: Url,
    access_key: Option<String>,
    secret_key: Option<String>,
    auth_setting: String,
}

impl RancherClient {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Identity backend URL is not configured (set CATTLE_URL)"))?;

        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: normalize_url(url),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            auth_setting: config.auth_setting.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        ensure_slash(&self.base_url)
            .join(path)
            .map_err(|e| Error::Other(anyhow::anyhow!("Failed to construct backend URL for {path}: {e}")))
    }

    /// Attach the service account credentials, if configured
    fn with_service_credentials(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_key {
            Some(access_key) => request.basic_auth(access_key, self.secret_key.as_deref()),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: &Url, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|source| Error::BackendTransport {
            operation: operation.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BackendStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let body_text = response.text().await.map_err(|source| Error::BackendTransport {
            operation: operation.to_string(),
            source,
        })?;
        tracing::trace!("Identity backend response from {}: {}", url, body_text);

        serde_json::from_str(&body_text).map_err(|e| Error::BackendDecode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_first_project(&self) -> Result<Project> {
        let url = self.endpoint("projects")?;
        let request = self.with_service_credentials(self.client.get(url.clone()));
        let projects: Collection<Project> = self.get_json("list projects", &url, request).await?;

        // Single tenant: the first project is the environment
        let count = projects.data.len();
        let project = projects.data.into_iter().next().ok_or(Error::NoEnvironment)?;
        if count > 1 {
            debug!("Backend lists {} projects, checking membership against {}", count, project.id);
        }
        Ok(project)
    }

    async fn fetch_setting(&self) -> Result<bool> {
        let url = self.endpoint(&format!("settings/{}", self.auth_setting))?;
        let request = self.with_service_credentials(self.client.get(url.clone()));
        let setting: Setting = self.get_json("read auth setting", &url, request).await?;

        let value = setting.value.unwrap_or_default();
        let enabled = value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| Error::BackendDecode {
            url: url.to_string(),
            message: format!("setting {} has non-boolean value {value:?}", self.auth_setting),
        })?;
        Ok(!enabled)
    }
}

#[async_trait]
impl IdentityBackend for RancherClient {
    #[instrument(skip_all)]
    async fn fetch_identities(&self, token: &str) -> Result<Vec<Identity>> {
        let url = self.endpoint("identity")?;
        let request = self.client.get(url.clone()).header(reqwest::header::AUTHORIZATION, token);
        let identities: Collection<Identity> = self.get_json("fetch identities", &url, request).await?;
        debug!("Backend returned {} identities for token", identities.data.len());
        Ok(identities.data)
    }

    #[instrument(skip_all)]
    async fn fetch_environment_membership(&self) -> Result<EnvironmentMembership> {
        let project = self.fetch_first_project().await?;

        let mut url = self.endpoint("projectmembers")?;
        url.query_pairs_mut().append_pair("projectId", &project.id);
        let request = self.with_service_credentials(self.client.get(url.clone()));
        let members: Collection<MembershipRecord> = self.get_json("list project members", &url, request).await?;

        Ok(members.data.into_iter().map(|member| (member.id.clone(), member)).collect())
    }

    #[instrument(skip_all)]
    async fn fetch_auth_disabled(&self) -> bool {
        match self.fetch_setting().await {
            Ok(disabled) => disabled,
            Err(e) => {
                warn!("Could not read {} setting, keeping authentication enabled: {}", self.auth_setting, e);
                false
            }
        }
    }
}

fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Point a configured backend URL at the v2-beta API.
///
/// An empty path gets the API path, a `/v1` prefix is rewritten to it and anything else is kept.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    let path = url.path().trim_end_matches('/');

    if path.is_empty() {
        normalized.set_path(API_PATH);
    } else if path == "/v1" || path.starts_with("/v1/") {
        normalized.set_path(&path.replacen("/v1", API_PATH, 1));
    } else {
        normalized.set_path(path);
    }
    normalized
}

/// Makes sure a url has a trailing slash, so `join` appends rather than replaces the last segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}
