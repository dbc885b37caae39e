use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde_json::Value;

use crate::models::{AlertRecord, EventPayload, PendingAlert, RecentEvent};

use super::CollaboratorService;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// reqwest-backed client for the alerting service's JSON API.
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: Client,
    base_url: String,
}

impl HttpCollaborator {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("fallwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: normalize_base(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

pub(crate) fn normalize_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

#[async_trait]
impl CollaboratorService for HttpCollaborator {
    async fn post_event(&self, payload: &EventPayload) -> Result<Option<PendingAlert>> {
        let url = self.endpoint("events");
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?
            .error_for_status()
            .with_context(|| format!("POST {url} rejected"))?;

        // A body we cannot read just means no alert was signalled.
        match response.json::<Value>().await {
            Ok(body) => Ok(PendingAlert::from_event_response(&body)),
            Err(err) => {
                warn!("unreadable response from {url}: {err}");
                Ok(None)
            }
        }
    }

    async fn confirm_alert(&self, alert_id: &str, ok: bool) -> Result<()> {
        let url = self.endpoint(&format!("alerts/{alert_id}/confirm"));
        self.client
            .post(&url)
            .query(&[("ok", ok)])
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?
            .error_for_status()
            .with_context(|| format!("POST {url} rejected"))?;
        Ok(())
    }

    async fn recent_alerts(&self) -> Result<Vec<AlertRecord>> {
        let url = self.endpoint("alerts");
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("GET {url} returned unexpected body"))
    }

    async fn recent_events(&self) -> Result<Vec<RecentEvent>> {
        let url = self.endpoint("events/recent");
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("GET {url} returned unexpected body"))
    }

    async fn health(&self) -> Result<bool> {
        let url = self.endpoint("health");
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("GET {url} returned unexpected body"))?;
        Ok(body.get("status").and_then(Value::as_str) == Some("ok"))
    }
}
