use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::model::{GatewayInstance, Group};

pub mod model;

pub use model::{ConnectResponse, ParticipantAction};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request timeout after {secs}s")]
    Timeout { secs: u64 },
    #[error("failed to reach gateway: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("gateway error {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("invalid JSON response from gateway: {0}")]
    Decode(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Result of `fetch_instances`. `malformed` is set when the gateway answered
/// with something other than an array; `instances` is then empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceListing {
    pub instances: Vec<GatewayInstance>,
    pub malformed: bool,
}

/// The slice of the gateway the reconciler and resolver depend on.
#[async_trait]
pub trait GatewayService: Send + Sync {
    async fn fetch_instances(&self) -> Result<InstanceListing, GatewayError>;

    async fn fetch_groups(
        &self,
        instance: &str,
        get_participants: bool,
    ) -> Result<Vec<Group>, GatewayError>;
}

#[derive(Clone)]
pub struct EvolutionClient {
    http: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
    integration: String,
}

impl fmt::Debug for EvolutionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvolutionClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn require_non_empty(value: &str, what: &'static str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::InvalidArgument(what));
    }
    Ok(())
}

/// Pull a human message out of an error body: `message`, then `error`, then raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                if !msg.trim().is_empty() {
                    return msg.to_string();
                }
            }
        }
    }
    if body.trim().is_empty() {
        format!("request failed with status {}", status.as_u16())
    } else {
        body.to_string()
    }
}

impl EvolutionClient {
    pub fn new(base_url: Url, api_key: String, timeout: Duration, integration: String) -> Self {
        let http = Client::builder()
            .user_agent("evo-sync/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url,
            api_key,
            timeout,
            integration,
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let base_url = Url::parse(cfg.gateway.base_url.trim())?;
        Ok(Self::new(
            base_url,
            cfg.gateway.api_key.clone(),
            Duration::from_secs(cfg.gateway.timeout_seconds),
            cfg.gateway.integration.clone(),
        ))
    }

    /// Append percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidArgument("gateway.base_url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn build_request(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<reqwest::Request, GatewayError> {
        let mut builder = self
            .http
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(self.timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().map_err(GatewayError::Transport)
    }

    fn map_transport(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            GatewayError::Transport(err)
        }
    }

    async fn execute(&self, request: reqwest::Request) -> Result<Value, GatewayError> {
        let method = request.method().clone();
        let path = request.url().path().to_string();
        info!(%method, %path, "gateway request");

        let res = self
            .http
            .execute(request)
            .await
            .map_err(|err| self.map_transport(err))?;
        let status = res.status();
        debug!(%method, %path, %status, "gateway response");

        let text = res.text().await.map_err(|err| self.map_transport(err))?;
        if !status.is_success() {
            let message = error_message(status, &text);
            warn!(%method, %path, %status, %message, "gateway error response");
            return Err(GatewayError::Status { status, message });
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&text).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.endpoint(segments)?;
        let request = self.build_request(method, url, body)?;
        self.execute(request).await
    }

    pub async fn create_instance(
        &self,
        instance: &str,
        token: Option<&str>,
        qrcode: bool,
    ) -> Result<Value, GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        let body = json!({
            "instanceName": instance,
            "token": token.unwrap_or(""),
            "qrcode": qrcode,
            "integration": self.integration,
        });
        self.call(Method::POST, &["instance", "create"], Some(&body))
            .await
    }

    pub async fn delete_instance(&self, instance: &str) -> Result<(), GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        self.call(Method::DELETE, &["instance", "delete", instance], None)
            .await?;
        Ok(())
    }

    pub async fn connect_instance(&self, instance: &str) -> Result<ConnectResponse, GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        let value = self
            .call(Method::GET, &["instance", "connect", instance], None)
            .await?;
        serde_json::from_value(value).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    pub async fn logout_instance(&self, instance: &str) -> Result<(), GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        self.call(Method::DELETE, &["instance", "logout", instance], None)
            .await?;
        Ok(())
    }

    pub async fn restart_instance(&self, instance: &str) -> Result<(), GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        self.call(Method::PUT, &["instance", "restart", instance], None)
            .await?;
        Ok(())
    }

    pub async fn connection_state(&self, instance: &str) -> Result<Option<String>, GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        let value = self
            .call(Method::GET, &["instance", "connectionState", instance], None)
            .await?;
        Ok(model::connection_state(&value))
    }

    pub fn participants_request(
        &self,
        instance: &str,
        group_jid: &str,
        action: ParticipantAction,
        participants: &[String],
    ) -> Result<reqwest::Request, GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        require_non_empty(group_jid, "groupJid must be non-empty")?;
        if participants.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "participants must be a non-empty array",
            ));
        }
        let url = self.endpoint(&["group", action.endpoint(), instance])?;
        let body = json!({
            "groupJid": group_jid,
            "action": action.as_str(),
            "participants": participants,
        });
        self.build_request(Method::POST, url, Some(&body))
    }

    /// Add, remove, promote or demote `participants` in `group_jid`.
    pub async fn update_participants(
        &self,
        instance: &str,
        group_jid: &str,
        action: ParticipantAction,
        participants: &[String],
    ) -> Result<(), GatewayError> {
        let request = self.participants_request(instance, group_jid, action, participants)?;
        self.execute(request).await.map_err(|err| {
            warn!(instance, group_jid, action = action.as_str(), %err, "participant update failed");
            err
        })?;
        Ok(())
    }

    pub fn groups_url(&self, instance: &str, get_participants: bool) -> Result<Url, GatewayError> {
        require_non_empty(instance, "instanceName must be non-empty")?;
        let mut url = self.endpoint(&["group", "fetchAllGroups", instance])?;
        url.query_pairs_mut()
            .append_pair("getParticipants", if get_participants { "true" } else { "false" });
        Ok(url)
    }
}

#[async_trait]
impl GatewayService for EvolutionClient {
    async fn fetch_instances(&self) -> Result<InstanceListing, GatewayError> {
        let value = self
            .call(Method::GET, &["instance", "fetchInstances"], None)
            .await?;
        match model::normalize_instances(&value) {
            Some(instances) => Ok(InstanceListing {
                instances,
                malformed: false,
            }),
            None => {
                warn!("fetchInstances: expected an array; treating as zero instances");
                Ok(InstanceListing {
                    instances: Vec::new(),
                    malformed: true,
                })
            }
        }
    }

    async fn fetch_groups(
        &self,
        instance: &str,
        get_participants: bool,
    ) -> Result<Vec<Group>, GatewayError> {
        let url = self.groups_url(instance, get_participants)?;
        let request = self.build_request(Method::GET, url, None)?;
        let value = self.execute(request).await?;
        match model::normalize_groups(&value) {
            Some(groups) => Ok(groups),
            None => {
                warn!(instance, "fetchAllGroups: expected an array; treating as zero groups");
                Ok(Vec::new())
            }
        }
    }
}
