use serde::Serialize;
use uuid::Uuid;

/// Body of `PUT /api/v1/agents/{agent_id}/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusUpdate {
    pub credential_url: String,
    pub status: String,
    pub status_info: String,
    pub source_id: Uuid,
    pub version: String,
}

/// Body of `PUT /api/v1/sources/{source_id}/status`. The inventory is carried
/// as-is; the producer owns its shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatusUpdate {
    pub agent_id: Uuid,
    pub inventory: serde_json::Value,
}
