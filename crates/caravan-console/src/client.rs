use reqwest::{RequestBuilder, StatusCode};
use uuid::Uuid;

use crate::error::ConsoleError;
use crate::types::{AgentStatusUpdate, SourceStatusUpdate};

pub struct ConsoleClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ConsoleClient {
    /// Creates a client for the given console base URL.
    ///
    /// An empty token omits the `Authorization` header entirely, which keeps
    /// test consoles simple.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ConsoleError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            http,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the agent status to the console.
    ///
    /// `PUT /api/v1/agents/{agent_id}/status`
    pub async fn update_agent_status(
        &self,
        agent_id: Uuid,
        source_id: Uuid,
        version: &str,
        status: &str,
        credential_url: &str,
    ) -> Result<(), ConsoleError> {
        let url = format!("{}/api/v1/agents/{}/status", self.base_url, agent_id);
        let body = AgentStatusUpdate {
            credential_url: credential_url.to_string(),
            status: status.to_string(),
            status_info: status.to_string(),
            source_id,
            version: version.to_string(),
        };

        tracing::debug!(agent_id = %agent_id, status = %status, "updating agent status");

        let response = self.authorized(self.http.put(&url)).json(&body).send().await?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::GONE => Err(ConsoleError::SourceGone { source_id }),
            StatusCode::UNAUTHORIZED => Err(ConsoleError::Unauthorized),
            status => Err(ConsoleError::Unexpected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Sends the source inventory to the console.
    ///
    /// `PUT /api/v1/sources/{source_id}/status`
    pub async fn update_source_status(
        &self,
        source_id: Uuid,
        agent_id: Uuid,
        inventory: serde_json::Value,
    ) -> Result<(), ConsoleError> {
        let url = format!("{}/api/v1/sources/{}/status", self.base_url, source_id);
        let body = SourceStatusUpdate {
            agent_id,
            inventory,
        };

        tracing::debug!(source_id = %source_id, "updating source inventory");

        let response = self.authorized(self.http.put(&url)).json(&body).send().await?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ConsoleError::Unauthorized),
            status => Err(ConsoleError::Unexpected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
