use caravan_common::types::AgentMode;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Identity assigned by the console when the agent image was provisioned.
    pub agent_id: String,
    /// The console's identifier for this agent/inventory pair.
    pub source_id: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
    /// Applies only while the configuration table is empty; after the first
    /// mode change the persisted value wins.
    #[serde(default = "default_mode")]
    pub default_mode: String,
    /// Report collector states in the v1 console vocabulary.
    #[serde(default)]
    pub legacy_status_enabled: bool,

    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub vcenter: VCenterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_console_url")]
    pub base_url: String,
    /// Signed bearer token for console requests. Inline value wins over the
    /// file variant.
    pub auth_token: Option<String>,
    pub auth_token_file: Option<String>,
    /// URL reported to the console where users reach this agent's UI.
    #[serde(default = "default_credential_url")]
    pub credential_url: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: default_console_url(),
            auth_token: None,
            auth_token_file: None,
            credential_url: default_credential_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VCenterConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// On-prem vCenters commonly run self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for VCenterConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

fn default_http_port() -> u16 {
    3333
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_update_interval_secs() -> u64 {
    5
}

fn default_mode() -> String {
    "disconnected".to_string()
}

fn default_console_url() -> String {
    "https://console.example.com".to_string()
}

fn default_credential_url() -> String {
    "http://localhost:3333".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn agent_uuid(&self) -> anyhow::Result<Uuid> {
        self.agent_id
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid agent_id '{}': {err}", self.agent_id))
    }

    pub fn source_uuid(&self) -> anyhow::Result<Uuid> {
        self.source_id
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid source_id '{}': {err}", self.source_id))
    }

    /// Mode used when nothing has been persisted yet. An unparseable value
    /// falls back to disconnected.
    pub fn default_agent_mode(&self) -> AgentMode {
        self.default_mode
            .parse()
            .unwrap_or(AgentMode::Disconnected)
    }

    pub fn resolve_auth_token(&self) -> anyhow::Result<Option<String>> {
        if let Some(token) = &self.console.auth_token {
            return Ok(Some(token.clone()));
        }
        if let Some(path) = &self.console.auth_token_file {
            let token = std::fs::read_to_string(path)
                .map_err(|err| anyhow::anyhow!("failed to read auth token file '{path}': {err}"))?;
            return Ok(Some(token.trim().to_string()));
        }
        Ok(None)
    }
}
