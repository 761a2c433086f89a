use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{RecipientFields, RecipientId, RecipientRecord, RevisionMarker},
    error::ApiError,
    protocol::{
        CreateRecipientResponse, MutationResponse, RecipientListResponse, RevisionResponse,
    },
};
use tracing::debug;

use crate::config::ClientSettings;

/// Canonical owner of the recipient list. Every successful mutation advances
/// the revision marker.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RecipientRecord>>;
    async fn create(&self, fields: &RecipientFields) -> Result<RecipientId>;
    async fn update(&self, recipient_id: RecipientId, fields: &RecipientFields) -> Result<()>;
    async fn delete(&self, recipient_id: RecipientId) -> Result<()>;
    async fn current_revision(&self) -> Result<RevisionMarker>;
}

pub struct HttpRemoteStore {
    http: Client,
    server_url: String,
}

impl HttpRemoteStore {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            server_url: settings.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

/// Turns a non-success response into an error carrying the server's message.
async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => Err(anyhow::Error::new(api_error).context(format!("HTTP {status}"))),
        Err(_) if body.trim().is_empty() => Err(anyhow!("HTTP {status}")),
        Err(_) => Err(anyhow!("HTTP {status}: {}", body.trim())),
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_all(&self) -> Result<Vec<RecipientRecord>> {
        let response = self
            .http
            .get(format!("{}/recipients", self.server_url))
            .send()
            .await
            .context("recipient list request failed")?;
        let list: RecipientListResponse = checked(response).await?.json().await?;
        debug!(revision = %list.revision, count = list.recipients.len(), "fetched recipients");
        Ok(list.recipients)
    }

    async fn create(&self, fields: &RecipientFields) -> Result<RecipientId> {
        let response = self
            .http
            .post(format!("{}/recipients", self.server_url))
            .json(fields)
            .send()
            .await
            .context("create recipient request failed")?;
        let created: CreateRecipientResponse = checked(response).await?.json().await?;
        Ok(created.recipient_id)
    }

    async fn update(&self, recipient_id: RecipientId, fields: &RecipientFields) -> Result<()> {
        let response = self
            .http
            .put(format!("{}/recipients/{}", self.server_url, recipient_id.0))
            .json(fields)
            .send()
            .await
            .with_context(|| format!("update request for recipient {recipient_id} failed"))?;
        let _: MutationResponse = checked(response).await?.json().await?;
        Ok(())
    }

    async fn delete(&self, recipient_id: RecipientId) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/recipients/{}", self.server_url, recipient_id.0))
            .send()
            .await
            .with_context(|| format!("delete request for recipient {recipient_id} failed"))?;
        let _: MutationResponse = checked(response).await?.json().await?;
        Ok(())
    }

    async fn current_revision(&self) -> Result<RevisionMarker> {
        let response = self
            .http
            .get(format!("{}/revision", self.server_url))
            .send()
            .await
            .context("revision request failed")?;
        let body: RevisionResponse = checked(response).await?.json().await?;
        Ok(body.revision)
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
