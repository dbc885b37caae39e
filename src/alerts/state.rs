use std::time::Duration;

use serde::Serialize;

use crate::models::{AlertOutcome, PendingAlert};

#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Countdown refresh period while a prompt is displayed.
    pub countdown_tick: Duration,
    /// Capacity of the notice broadcast channel.
    pub notice_capacity: usize,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            countdown_tick: Duration::from_millis(250),
            notice_capacity: 64,
        }
    }
}

/// Lifecycle of one alert on this client.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertPhase {
    Scheduled,
    AwaitingConfirmation,
    Resolved(AlertOutcome),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedAlert {
    pub alert: PendingAlert,
    pub remaining_secs: u64,
}

/// State changes pushed to whatever renders the confirmation prompt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AlertNotice {
    Scheduled { alert_id: String, delay_ms: u64 },
    Surfaced { alert: PendingAlert, remaining_secs: u64 },
    Preempted { alert_id: String, by: String },
    Countdown { alert_id: String, remaining_secs: u64 },
    Resolved { alert_id: String, outcome: AlertOutcome },
    Stopped,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAlert {
    pub alert_id: String,
    pub outcome: AlertOutcome,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationSnapshot {
    pub displayed: Option<DisplayedAlert>,
    pub scheduled: Vec<String>,
    pub dismissed: Vec<ResolvedAlert>,
    pub stopped: bool,
}

impl ConfirmationSnapshot {
    pub fn phase_of(&self, alert_id: &str) -> Option<AlertPhase> {
        if let Some(resolved) = self.dismissed.iter().find(|r| r.alert_id == alert_id) {
            return Some(AlertPhase::Resolved(resolved.outcome));
        }
        if self
            .displayed
            .as_ref()
            .map_or(false, |d| d.alert.alert_id == alert_id)
        {
            return Some(AlertPhase::AwaitingConfirmation);
        }
        if self.scheduled.iter().any(|id| id == alert_id) {
            return Some(AlertPhase::Scheduled);
        }
        None
    }
}

/// Whole seconds left before `expiry_at`, rounded up, never negative.
pub fn remaining_secs(expiry_at: i64, now_ms: i64) -> u64 {
    let left_ms = expiry_at.saturating_sub(now_ms);
    if left_ms <= 0 {
        0
    } else {
        u64::try_from(left_ms).unwrap_or(u64::MAX).div_ceil(1000)
    }
}

/// Time to wait before surfacing a prompt that opens at `confirm_starts_at`.
pub fn surface_delay(confirm_starts_at: i64, now_ms: i64) -> Duration {
    let wait_ms = confirm_starts_at.saturating_sub(now_ms).max(0);
    Duration::from_millis(u64::try_from(wait_ms).unwrap_or(0))
}
