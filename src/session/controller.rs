use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use log::info;
use tokio::sync::{broadcast, watch, Mutex};
use uuid::Uuid;

use crate::{
    alerts::{AlertConfirmationController, AlertNotice, ConfirmationConfig, ConfirmationSnapshot},
    api::CollaboratorService,
    models::{AlertOutcome, Position},
    sensing::{
        ClassifierConfig, SensingController, SensorSource, StreamContext, StreamStatus,
        StreamerConfig,
    },
    utils::Clock,
};

use super::{SessionSnapshot, SessionStatus};

/// Knobs applied to every session this controller starts.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub streamer: StreamerConfig,
    pub classifier: ClassifierConfig,
    pub confirmation: ConfirmationConfig,
    pub location_override: Option<Position>,
    pub seed: Option<u64>,
}

struct ActiveSession {
    id: String,
    started_at: DateTime<Utc>,
    sensing: SensingController,
    alerts: AlertConfirmationController,
    simulate_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<StreamStatus>,
}

/// Starts and stops streaming sessions.
///
/// Each session gets fresh signal state (gravity, history, streaks) and a fresh
/// confirmation controller; nothing carries over a restart.
#[derive(Clone)]
pub struct SessionController {
    api: Arc<dyn CollaboratorService>,
    source: Arc<dyn SensorSource>,
    options: SessionOptions,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl SessionController {
    pub fn new(
        api: Arc<dyn CollaboratorService>,
        source: Arc<dyn SensorSource>,
        options: SessionOptions,
    ) -> Self {
        Self {
            api,
            source,
            options,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn start(&self, simulate_fall: bool) -> Result<SessionSnapshot> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            bail!("session already streaming");
        }

        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Clock::new();

        let alerts = AlertConfirmationController::new(
            self.api.clone(),
            clock,
            self.options.confirmation.clone(),
        );
        let (simulate_tx, simulate_rx) = watch::channel(simulate_fall);
        let (status_tx, status_rx) = watch::channel(StreamStatus::default());

        let mut sensing = SensingController::new();
        sensing.start_sensing(StreamContext {
            session_id: session_id.clone(),
            source: self.source.clone(),
            api: self.api.clone(),
            alerts: alerts.clone(),
            simulate_fall: simulate_rx,
            status: Arc::new(status_tx),
            location_override: self.options.location_override,
            clock,
            streamer: self.options.streamer.clone(),
            classifier: self.options.classifier.clone(),
            seed: self.options.seed,
        })?;

        info!("session {session_id} streaming");

        *active = Some(ActiveSession {
            id: session_id,
            started_at,
            sensing,
            alerts,
            simulate_tx,
            status_rx,
        });

        Ok(snapshot_of((*active).as_ref()))
    }

    /// Stop sampling and cancel every alert timer. Idle sessions are left alone.
    pub async fn stop(&self) -> Result<()> {
        let Some(mut session) = self.active.lock().await.take() else {
            return Ok(());
        };

        // Alerts first, so an in-flight response cannot surface anything.
        session.alerts.stop().await;
        session.sensing.stop_sensing().await?;

        info!("session {} stopped", session.id);
        Ok(())
    }

    pub async fn set_simulate_fall(&self, on: bool) -> Result<()> {
        let active = self.active.lock().await;
        let session = (*active)
            .as_ref()
            .ok_or_else(|| anyhow!("no active session"))?;
        session.simulate_tx.send_replace(on);
        info!("fall simulation {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// Answer the prompt on screen. `false` when nothing is displayed.
    pub async fn respond(&self, ok: bool) -> Result<bool> {
        let alerts = self.alerts().await?;
        let outcome = if ok {
            AlertOutcome::Okay
        } else {
            AlertOutcome::HelpRequested
        };
        Ok(alerts.resolve_current(outcome).await)
    }

    pub async fn subscribe_alerts(&self) -> Result<broadcast::Receiver<AlertNotice>> {
        Ok(self.alerts().await?.subscribe())
    }

    pub async fn stream_status(&self) -> Result<watch::Receiver<StreamStatus>> {
        let active = self.active.lock().await;
        (*active)
            .as_ref()
            .map(|s| s.status_rx.clone())
            .ok_or_else(|| anyhow!("no active session"))
    }

    pub async fn confirmation_snapshot(&self) -> Result<ConfirmationSnapshot> {
        Ok(self.alerts().await?.snapshot().await)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let active = self.active.lock().await;
        snapshot_of((*active).as_ref())
    }

    async fn alerts(&self) -> Result<AlertConfirmationController> {
        let active = self.active.lock().await;
        (*active)
            .as_ref()
            .map(|s| s.alerts.clone())
            .ok_or_else(|| anyhow!("no active session"))
    }
}

fn snapshot_of(session: Option<&ActiveSession>) -> SessionSnapshot {
    match session {
        None => SessionSnapshot::default(),
        Some(session) => {
            let status = session.status_rx.borrow();
            SessionSnapshot {
                status: if session.sensing.is_active() {
                    SessionStatus::Streaming
                } else {
                    SessionStatus::Idle
                },
                session_id: Some(session.id.clone()),
                started_at: Some(session.started_at),
                ticks: status.ticks,
                context: Some(status.context),
                simulate_fall: *session.simulate_tx.borrow(),
            }
        }
    }
}
