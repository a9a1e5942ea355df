//! Dialogflow agent-configuration client
//!
//! Talks to the Dialogflow v2 REST API: `agent:export`, `agent:import` and
//! the `operations` endpoint used to poll long-running work. Authentication
//! is a bearer token handed in by the caller; acquiring it is someone
//! else's job.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{AgentService, Operation, RemoteError, POLL_INTERVAL_MS};

const DEFAULT_BASE_URL: &str = "https://dialogflow.googleapis.com";

/// HTTP client for the Dialogflow v2 API
pub struct DialogflowClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

/// Wire shape of a long-running operation resource
#[derive(Debug, Deserialize)]
struct OperationResource {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationStatus>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    message: String,
}

impl DialogflowClient {
    /// Create a client using the public API endpoint
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    /// Create a client against a different endpoint (emulators, tests)
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("agentpromote/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn start_operation(
        &self,
        context: &str,
        url: String,
        body: serde_json::Value,
    ) -> Result<Box<dyn Operation>, RemoteError> {
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                context: context.to_string(),
                status: status.as_u16(),
            });
        }

        let resource: OperationResource = response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;

        tracing::debug!(operation = %resource.name, context, "operation started");

        Ok(Box::new(PolledOperation {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            name: resource.name,
        }))
    }
}

#[async_trait]
impl AgentService for DialogflowClient {
    async fn export_agent(
        &self,
        project_id: &str,
        destination_uri: &str,
    ) -> Result<Box<dyn Operation>, RemoteError> {
        let url = format!("{}/v2/projects/{}/agent:export", self.base_url, project_id);
        self.start_operation("agent export", url, json!({ "agentUri": destination_uri }))
            .await
    }

    async fn import_agent(
        &self,
        project_id: &str,
        agent_content: &str,
    ) -> Result<Box<dyn Operation>, RemoteError> {
        let url = format!("{}/v2/projects/{}/agent:import", self.base_url, project_id);
        self.start_operation("agent import", url, json!({ "agentContent": agent_content }))
            .await
    }
}

/// Operation handle that polls the `operations` endpoint until done
struct PolledOperation {
    http: reqwest::Client,
    base_url: String,
    token: String,
    name: String,
}

#[async_trait]
impl Operation for PolledOperation {
    async fn wait(self: Box<Self>) -> Result<(), RemoteError> {
        loop {
            let url = format!("{}/v2/{}", self.base_url, self.name);
            let response = self.http.get(&url).bearer_auth(&self.token).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(RemoteError::Status {
                    context: format!("operation poll for {}", self.name),
                    status: status.as_u16(),
                });
            }

            let resource: OperationResource = response
                .json()
                .await
                .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;

            if resource.done {
                return match resource.error {
                    None => Ok(()),
                    Some(status) => Err(RemoteError::OperationFailed {
                        name: self.name.clone(),
                        message: status.message,
                    }),
                };
            }

            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}
