//! Contract with the alerting service.
//!
//! The core only talks to [`CollaboratorService`]. [`HttpCollaborator`] is the
//! production transport.

mod http;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AlertRecord, EventPayload, PendingAlert, RecentEvent};

pub use http::HttpCollaborator;

#[async_trait]
pub trait CollaboratorService: Send + Sync {
    /// `POST /events`. Returns the candidate alert when the service flags the
    /// event. Malformed or alert-less responses are `Ok(None)`.
    async fn post_event(&self, payload: &EventPayload) -> Result<Option<PendingAlert>>;

    /// `POST /alerts/{id}/confirm?ok=`. Best-effort: callers fire it from a
    /// detached task, never retry, and never wait on it before committing
    /// local state.
    async fn confirm_alert(&self, alert_id: &str, ok: bool) -> Result<()>;

    /// `GET /alerts`
    async fn recent_alerts(&self) -> Result<Vec<AlertRecord>>;

    /// `GET /events/recent`
    async fn recent_events(&self) -> Result<Vec<RecentEvent>>;

    /// `GET /health`
    async fn health(&self) -> Result<bool>;
}
