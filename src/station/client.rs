//! Container Station HTTP client.
//!
//! [`StationApi`] is the seam between the reconciliation logic and the wire:
//! reads come back decoded, mutations come back as raw bodies because each
//! flow decodes its own reply shape. [`StationClient`] is the reqwest
//! implementation.

use crate::auth::Credential;
use crate::env;
use crate::station::models::{
    AppInfo, ContainerInfo, ContainerList, ContainerRef, Overview, TaskList, VolumeInfo,
    VolumeList,
};
use crate::station::{Result, StationError};
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// A mutating request: verb, endpoint below the API prefix, JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub method: Method,
    /// Slash separated path below `container-station/api/v3`
    pub endpoint: String,
    pub body: serde_json::Value,
}

impl Mutation {
    pub fn new(method: Method, endpoint: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body,
        }
    }
}

/// Operations the reconcilers need from the remote station.
///
/// Every call fetches fresh data; implementations must not hand out shared
/// buffers between calls.
#[async_trait]
pub trait StationApi: Send + Sync {
    /// `GET overview`: apps and containers with their status
    async fn overview(&self) -> Result<Overview>;

    /// `GET tasks`
    async fn tasks(&self) -> Result<TaskList>;

    /// `GET containers`
    async fn containers(&self) -> Result<ContainerList>;

    /// `GET containers/{type}?id={id}`
    async fn inspect_container(&self, container: &ContainerRef) -> Result<ContainerInfo>;

    /// `GET apps/{name}/inspect`
    async fn inspect_application(&self, name: &str) -> Result<AppInfo>;

    /// `GET volumes`
    async fn volumes(&self) -> Result<VolumeList>;

    /// `GET volumes/{name}/inspect`
    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo>;

    /// Send a mutation and return the undecoded success body.
    async fn submit(&self, mutation: Mutation) -> Result<Vec<u8>>;
}

/// Decode a JSON body, tagging failures with what was being read.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8], context: &str) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| StationError::decode(context, e))
}

/// Builder for [`StationClient`].
#[derive(Debug, Clone)]
pub struct StationClientBuilder {
    host_url: String,
    credential: Option<Credential>,
    timeout: Duration,
}

impl StationClientBuilder {
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns error if the host URL does not parse or cannot carry a path.
    pub fn build(self) -> Result<StationClient> {
        let mut host = self.host_url.trim().to_string();
        if !host.ends_with('/') {
            host.push('/');
        }
        let base = Url::parse(&host)?;
        if base.cannot_be_a_base() {
            return Err(StationError::Config(format!(
                "host URL '{}' cannot carry an API path",
                self.host_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        Ok(StationClient {
            http,
            base,
            credential: Arc::new(RwLock::new(self.credential)),
        })
    }
}

/// reqwest based [`StationApi`] implementation.
#[derive(Clone)]
pub struct StationClient {
    http: reqwest::Client,
    base: Url,
    credential: Arc<RwLock<Option<Credential>>>,
}

impl StationClient {
    pub fn builder(host_url: impl Into<String>) -> StationClientBuilder {
        StationClientBuilder {
            host_url: host_url.into(),
            credential: None,
            timeout: env::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Replace the session credential, e.g. after the auth provider refreshed it.
    ///
    /// Requests already in flight keep the credential they started with.
    pub async fn set_credential(&self, credential: Option<Credential>) {
        *self.credential.write().await = credential;
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for an endpoint below the API prefix.
    ///
    /// Each segment is percent-encoded on its own, so names may contain
    /// characters that are special in paths.
    pub fn endpoint_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                StationError::Config(format!("host URL '{}' cannot carry a path", self.base))
            })?;
            path.pop_if_empty();
            path.extend(env::api::PREFIX.split('/'));
            path.extend(segments.iter().filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>> {
        debug!("{} {}", method, url.path());

        let mut request = self.http.request(method, url);
        if let Some(credential) = self.credential.read().await.as_ref() {
            request = request
                .bearer_auth(credential.bearer())
                .header(COOKIE, credential.cookie())
                .header(CONTENT_TYPE, "application/json");
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(StationError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], context: &str) -> Result<T> {
        let url = self.endpoint_url(segments)?;
        let body = self.execute(Method::GET, url, None).await?;
        decode(&body, context)
    }
}

#[async_trait]
impl StationApi for StationClient {
    async fn overview(&self) -> Result<Overview> {
        self.get_json(&[env::api::OVERVIEW], "overview").await
    }

    async fn tasks(&self) -> Result<TaskList> {
        self.get_json(&[env::api::TASKS], "task list").await
    }

    async fn containers(&self) -> Result<ContainerList> {
        self.get_json(&[env::api::CONTAINERS], "container list").await
    }

    async fn inspect_container(&self, container: &ContainerRef) -> Result<ContainerInfo> {
        let mut url = self.endpoint_url(&[env::api::CONTAINERS, &container.ctype])?;
        url.query_pairs_mut().append_pair("id", &container.id);
        let body = self.execute(Method::GET, url, None).await?;
        decode(&body, "container inspection")
    }

    async fn inspect_application(&self, name: &str) -> Result<AppInfo> {
        self.get_json(&[env::api::APPS, name, "inspect"], "application inspection")
            .await
    }

    async fn volumes(&self) -> Result<VolumeList> {
        self.get_json(&[env::api::VOLUMES], "volume list").await
    }

    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo> {
        self.get_json(&[env::api::VOLUMES, name, "inspect"], "volume inspection")
            .await
    }

    async fn submit(&self, mutation: Mutation) -> Result<Vec<u8>> {
        let segments: Vec<&str> = mutation.endpoint.split('/').collect();
        let url = self.endpoint_url(&segments)?;
        self.execute(mutation.method, url, Some(&mutation.body)).await
    }
}
