use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{AlertRecord, EventPayload, PendingAlert, RecentEvent};

use super::CollaboratorService;

/// In-memory stand-in for the alerting service.
#[derive(Default)]
pub struct RecordingCollaborator {
    posted: Mutex<Vec<EventPayload>>,
    confirmations: Mutex<Vec<(String, bool)>>,
    reply: Mutex<Option<PendingAlert>>,
    fail_posts: Mutex<bool>,
}

impl RecordingCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent post answers with this alert.
    pub fn reply_with(&self, alert: Option<PendingAlert>) {
        *self.reply.lock().unwrap() = alert;
    }

    pub fn fail_posts(&self, fail: bool) {
        *self.fail_posts.lock().unwrap() = fail;
    }

    pub fn posted(&self) -> Vec<EventPayload> {
        self.posted.lock().unwrap().clone()
    }

    pub fn confirmations(&self) -> Vec<(String, bool)> {
        self.confirmations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CollaboratorService for RecordingCollaborator {
    async fn post_event(&self, payload: &EventPayload) -> Result<Option<PendingAlert>> {
        self.posted.lock().unwrap().push(payload.clone());
        if *self.fail_posts.lock().unwrap() {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn confirm_alert(&self, alert_id: &str, ok: bool) -> Result<()> {
        self.confirmations
            .lock()
            .unwrap()
            .push((alert_id.to_string(), ok));
        Ok(())
    }

    async fn recent_alerts(&self) -> Result<Vec<AlertRecord>> {
        Ok(Vec::new())
    }

    async fn recent_events(&self) -> Result<Vec<RecentEvent>> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}
