use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::error::SourceError;
use crate::source::{InventorySource, VCenterCredentials};

const SESSION_HEADER: &str = "vmware-api-session-id";

/// Inventory source backed by the vCenter Automation REST API.
///
/// Credential validation is a session login; collection lists VMs, hosts,
/// clusters, datastores and networks through the same session and serializes
/// the result into the inventory blob.
pub struct VSphereSource {
    http: reqwest::Client,
}

impl VSphereSource {
    pub fn new(connect_timeout: Duration, accept_invalid_certs: bool) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(connect_timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { http })
    }

    fn base_url(credentials: &VCenterCredentials) -> Result<String, SourceError> {
        let url = Url::parse(credentials.url.trim_end_matches('/'))
            .map_err(|err| SourceError::InvalidUrl(format!("{}: {err}", credentials.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url.as_str().trim_end_matches('/').to_string()),
            scheme => Err(SourceError::InvalidUrl(format!(
                "unsupported scheme '{scheme}'"
            ))),
        }
    }

    async fn login(&self, credentials: &VCenterCredentials) -> Result<(String, String), SourceError> {
        let base = Self::base_url(credentials)?;
        let response = self
            .http
            .post(format!("{base}/api/session"))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let session: String = response.json().await?;
                Ok((base, session))
            }
            StatusCode::UNAUTHORIZED => Err(SourceError::InvalidCredentials),
            status => Err(SourceError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn logout(&self, base: &str, session: &str) {
        // Best effort; an expired session is cleaned up server-side anyway.
        let _ = self
            .http
            .delete(format!("{base}/api/session"))
            .header(SESSION_HEADER, session)
            .send()
            .await;
    }

    async fn list(
        &self,
        base: &str,
        session: &str,
        resource: &str,
    ) -> Result<serde_json::Value, SourceError> {
        let response = self
            .http
            .get(format!("{base}/api/vcenter/{resource}"))
            .header(SESSION_HEADER, session)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => Err(SourceError::InvalidCredentials),
            status => Err(SourceError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

fn count(value: &serde_json::Value) -> usize {
    value.as_array().map(|items| items.len()).unwrap_or(0)
}

#[async_trait]
impl InventorySource for VSphereSource {
    async fn check_credentials(&self, credentials: &VCenterCredentials) -> Result<(), SourceError> {
        let (base, session) = self.login(credentials).await?;
        tracing::info!(url = %credentials.url, "vCenter credentials validated");
        self.logout(&base, &session).await;
        Ok(())
    }

    async fn fetch_inventory(
        &self,
        credentials: &VCenterCredentials,
    ) -> Result<Vec<u8>, SourceError> {
        let (base, session) = self.login(credentials).await?;

        let vms = self.list(&base, &session, "vm").await?;
        let hosts = self.list(&base, &session, "host").await?;
        let clusters = self.list(&base, &session, "cluster").await?;
        let datastores = self.list(&base, &session, "datastore").await?;
        let networks = self.list(&base, &session, "network").await?;

        self.logout(&base, &session).await;

        tracing::info!(
            vms = count(&vms),
            hosts = count(&hosts),
            clusters = count(&clusters),
            "vCenter inventory captured"
        );

        let snapshot = serde_json::json!({
            "infra": {
                "totalHosts": count(&hosts),
                "totalClusters": count(&clusters),
                "hosts": hosts,
                "clusters": clusters,
                "datastores": datastores,
                "networks": networks,
            },
            "vms": {
                "total": count(&vms),
                "items": vms,
            },
        });

        Ok(serde_json::to_vec(&snapshot)?)
    }
}
