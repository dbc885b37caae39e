use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    api::CollaboratorService,
    models::{AlertOutcome, PendingAlert},
    utils::Clock,
};

use super::state::{
    remaining_secs, surface_delay, AlertNotice, ConfirmationConfig, ConfirmationSnapshot,
    DisplayedAlert, ResolvedAlert,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

struct ScheduledEntry {
    alert: PendingAlert,
    handle: JoinHandle<()>,
}

struct ActivePrompt {
    alert: PendingAlert,
    remaining_secs: u64,
    countdown: JoinHandle<()>,
}

#[derive(Default)]
struct ConfirmationState {
    scheduled: HashMap<String, ScheduledEntry>,
    displayed: Option<ActivePrompt>,
    dismissed: HashSet<String>,
    resolved: Vec<ResolvedAlert>,
    stopped: bool,
}

impl ConfirmationState {
    fn is_displayed(&self, alert_id: &str) -> bool {
        self.displayed
            .as_ref()
            .map_or(false, |p| p.alert.alert_id == alert_id)
    }
}

/// Drives candidate alerts from "scheduled" through the on-screen countdown
/// to a single resolution.
///
/// An alert id is in at most one of {scheduled, displayed}. Once resolved it
/// is remembered for the lifetime of the controller and never comes back,
/// however late or often the service repeats it.
#[derive(Clone)]
pub struct AlertConfirmationController {
    state: Arc<Mutex<ConfirmationState>>,
    api: Arc<dyn CollaboratorService>,
    notices: broadcast::Sender<AlertNotice>,
    clock: Clock,
    config: ConfirmationConfig,
}

impl AlertConfirmationController {
    pub fn new(api: Arc<dyn CollaboratorService>, clock: Clock, config: ConfirmationConfig) -> Self {
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            state: Arc::new(Mutex::new(ConfirmationState::default())),
            api,
            notices,
            clock,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertNotice> {
        self.notices.subscribe()
    }

    /// Arm the surfacing timer for a signalled alert.
    ///
    /// Returns `false` when the alert is already known (scheduled, displayed or
    /// resolved) or the controller has been stopped.
    pub async fn schedule(&self, alert: PendingAlert) -> bool {
        let mut state = self.state.lock().await;
        let alert_id = alert.alert_id.clone();

        if state.stopped {
            log_debug!("ignoring alert {alert_id}: confirmation stopped");
            return false;
        }
        if state.dismissed.contains(&alert_id)
            || state.scheduled.contains_key(&alert_id)
            || state.is_displayed(&alert_id)
        {
            log_debug!("ignoring duplicate signal for alert {alert_id}");
            return false;
        }

        let delay = surface_delay(alert.confirm_starts_at, self.clock.now_ms());
        let controller = self.clone();
        let timer_id = alert_id.clone();
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            controller.surface(&timer_id).await;
        });

        state
            .scheduled
            .insert(alert_id.clone(), ScheduledEntry { alert, handle });
        drop(state);

        log_info!(
            "alert {alert_id} scheduled, confirmation in {}ms",
            delay.as_millis()
        );
        self.notify(AlertNotice::Scheduled {
            alert_id,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        });
        true
    }

    /// Resolve a specific alert, displayed or still waiting to surface.
    pub async fn resolve(&self, alert_id: &str, outcome: AlertOutcome) -> bool {
        let mut state = self.state.lock().await;
        self.resolve_locked(&mut state, alert_id, outcome, true)
    }

    /// Resolve whatever prompt is on screen. No-op when nothing is displayed.
    pub async fn resolve_current(&self, outcome: AlertOutcome) -> bool {
        let mut state = self.state.lock().await;
        let Some(alert_id) = state.displayed.as_ref().map(|p| p.alert.alert_id.clone()) else {
            log_debug!("resolve requested with no alert displayed");
            return false;
        };
        self.resolve_locked(&mut state, &alert_id, outcome, true)
    }

    /// Cancel every timer. Nothing surfaces or resolves afterwards.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if state.stopped {
            return;
        }
        state.stopped = true;

        for (_, entry) in state.scheduled.drain() {
            entry.handle.abort();
        }
        if let Some(prompt) = state.displayed.take() {
            prompt.countdown.abort();
        }
        drop(state);

        log_info!("alert confirmation stopped");
        self.notify(AlertNotice::Stopped);
    }

    pub async fn snapshot(&self) -> ConfirmationSnapshot {
        let state = self.state.lock().await;
        let mut scheduled: Vec<String> = state.scheduled.keys().cloned().collect();
        scheduled.sort();

        ConfirmationSnapshot {
            displayed: state.displayed.as_ref().map(|p| DisplayedAlert {
                alert: p.alert.clone(),
                remaining_secs: p.remaining_secs,
            }),
            scheduled,
            dismissed: state.resolved.clone(),
            stopped: state.stopped,
        }
    }

    async fn surface(&self, alert_id: &str) {
        let mut state = self.state.lock().await;

        // Gone from the map means it was resolved early or the controller stopped.
        let Some(entry) = state.scheduled.remove(alert_id) else {
            return;
        };
        if state.stopped || state.dismissed.contains(alert_id) || state.is_displayed(alert_id) {
            return;
        }

        let alert = entry.alert;
        let remaining = remaining_secs(alert.expiry_at, self.clock.now_ms());

        if let Some(previous) = state.displayed.take() {
            previous.countdown.abort();
            log_info!(
                "alert {} hidden in favour of {alert_id}",
                previous.alert.alert_id
            );
            self.notify(AlertNotice::Preempted {
                alert_id: previous.alert.alert_id,
                by: alert_id.to_string(),
            });
        }

        let countdown = tokio::spawn(
            self.clone()
                .run_countdown(alert_id.to_string(), alert.expiry_at),
        );
        state.displayed = Some(ActivePrompt {
            alert: alert.clone(),
            remaining_secs: remaining,
            countdown,
        });
        drop(state);

        log_info!("alert {alert_id} awaiting confirmation ({remaining}s left)");
        self.notify(AlertNotice::Surfaced {
            alert,
            remaining_secs: remaining,
        });
    }

    async fn run_countdown(self, alert_id: String, expiry_at: i64) {
        let mut interval = time::interval(self.config.countdown_tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let remaining = remaining_secs(expiry_at, self.clock.now_ms());

            let mut state = self.state.lock().await;
            let changed = match state.displayed.as_mut() {
                Some(prompt) if prompt.alert.alert_id == alert_id => {
                    let changed = prompt.remaining_secs != remaining;
                    prompt.remaining_secs = remaining;
                    changed
                }
                _ => return,
            };

            if remaining == 0 {
                // Silence counts as needing help.
                self.resolve_locked(&mut state, &alert_id, AlertOutcome::Expired, false);
                return;
            }
            drop(state);

            if changed {
                self.notify(AlertNotice::Countdown {
                    alert_id: alert_id.clone(),
                    remaining_secs: remaining,
                });
            }
        }
    }

    fn resolve_locked(
        &self,
        state: &mut ConfirmationState,
        alert_id: &str,
        outcome: AlertOutcome,
        abort_countdown: bool,
    ) -> bool {
        if state.stopped || state.dismissed.contains(alert_id) {
            return false;
        }

        let displayed = state.is_displayed(alert_id);
        let scheduled = state.scheduled.remove(alert_id);
        if !displayed && scheduled.is_none() {
            return false;
        }

        if let Some(entry) = scheduled {
            entry.handle.abort();
        }
        if displayed {
            if let Some(prompt) = state.displayed.take() {
                if abort_countdown {
                    prompt.countdown.abort();
                }
            }
        }

        state.dismissed.insert(alert_id.to_string());
        state.resolved.push(ResolvedAlert {
            alert_id: alert_id.to_string(),
            outcome,
        });

        log_info!("alert {alert_id} resolved: {outcome:?}");
        self.notify(AlertNotice::Resolved {
            alert_id: alert_id.to_string(),
            outcome,
        });
        self.send_outcome(alert_id.to_string(), outcome.is_ok());
        true
    }

    fn send_outcome(&self, alert_id: String, ok: bool) {
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(err) = api.confirm_alert(&alert_id, ok).await {
                log_warn!("confirmation for alert {alert_id} not delivered: {err:#}");
            }
        });
    }

    fn notify(&self, notice: AlertNotice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertPhase;
    use crate::api::testing::RecordingCollaborator;
    use std::time::Duration;

    fn setup() -> (AlertConfirmationController, Arc<RecordingCollaborator>, Clock) {
        let api = Arc::new(RecordingCollaborator::new());
        let clock = Clock::starting_at(1_700_000_000_000);
        let controller =
            AlertConfirmationController::new(api.clone(), clock, ConfirmationConfig::default());
        (controller, api, clock)
    }

    async fn sleep_ms(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    fn drain(rx: &mut broadcast::Receiver<AlertNotice>) -> Vec<AlertNotice> {
        let mut out = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            out.push(notice);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_signal_arms_one_timer() {
        let (controller, _api, clock) = setup();
        let now = clock.now_ms();
        let alert = PendingAlert::new("a1", now + 15_000, now + 5_000);

        assert!(controller.schedule(alert.clone()).await);
        assert!(!controller.schedule(alert.clone()).await);
        assert_eq!(controller.snapshot().await.scheduled, vec!["a1".to_string()]);

        sleep_ms(5_100).await;
        let snapshot = controller.snapshot().await;
        assert!(snapshot.scheduled.is_empty());
        assert_eq!(snapshot.phase_of("a1"), Some(AlertPhase::AwaitingConfirmation));
        assert_eq!(snapshot.displayed.map(|d| d.remaining_secs), Some(10));

        // Displayed alerts are not re-armed either.
        assert!(!controller.schedule(alert).await);
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_alert_never_resurfaces() {
        let (controller, api, clock) = setup();
        let now = clock.now_ms();
        let alert = PendingAlert::new("a1", now + 15_000, now + 5_000);

        assert!(controller.schedule(alert.clone()).await);
        assert!(controller.resolve("a1", AlertOutcome::Okay).await);

        sleep_ms(6_000).await;
        assert!(controller.snapshot().await.displayed.is_none());
        assert!(!controller.schedule(alert).await);

        sleep_ms(20_000).await;
        assert_eq!(api.confirmations(), vec![("a1".to_string(), true)]);
        assert_eq!(
            controller.snapshot().await.phase_of("a1"),
            Some(AlertPhase::Resolved(AlertOutcome::Okay))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_requests_help_once() {
        let (controller, api, clock) = setup();
        let mut notices = controller.subscribe();
        let now = clock.now_ms();

        assert!(controller.schedule(PendingAlert::new("a1", now + 3_000, now)).await);
        sleep_ms(10_000).await;

        assert_eq!(api.confirmations(), vec![("a1".to_string(), false)]);
        let snapshot = controller.snapshot().await;
        assert!(snapshot.displayed.is_none());
        assert_eq!(
            snapshot.phase_of("a1"),
            Some(AlertPhase::Resolved(AlertOutcome::Expired))
        );

        let notices = drain(&mut notices);
        let resolved = notices
            .iter()
            .filter(|n| matches!(n, AlertNotice::Resolved { .. }))
            .count();
        assert_eq!(resolved, 1);
        assert!(notices.contains(&AlertNotice::Countdown {
            alert_id: "a1".into(),
            remaining_secs: 1
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_is_idempotent() {
        let (controller, api, clock) = setup();
        let now = clock.now_ms();
        controller
            .schedule(PendingAlert::new("a1", now + 15_000, now))
            .await;
        sleep_ms(100).await;

        assert!(controller.resolve_current(AlertOutcome::HelpRequested).await);
        assert!(!controller.resolve_current(AlertOutcome::HelpRequested).await);
        assert!(!controller.resolve("a1", AlertOutcome::Okay).await);

        sleep_ms(30_000).await;
        assert_eq!(api.confirmations(), vec![("a1".to_string(), false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_alert_preempts_display() {
        let (controller, api, clock) = setup();
        let mut notices = controller.subscribe();
        let now = clock.now_ms();

        controller
            .schedule(PendingAlert::new("a1", now + 10_000, now))
            .await;
        controller
            .schedule(PendingAlert::new("a2", now + 20_000, now + 2_000))
            .await;

        sleep_ms(2_100).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.phase_of("a2"), Some(AlertPhase::AwaitingConfirmation));
        assert_eq!(snapshot.phase_of("a1"), None);
        assert!(drain(&mut notices).contains(&AlertNotice::Preempted {
            alert_id: "a1".into(),
            by: "a2".into()
        }));

        // a1's countdown was cancelled with its display, so its expiry passes quietly.
        sleep_ms(10_000).await;
        assert!(api.confirmations().is_empty());

        assert!(controller.resolve_current(AlertOutcome::Okay).await);
        sleep_ms(10).await;
        assert_eq!(api.confirmations(), vec![("a2".to_string(), true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_everything() {
        let (controller, api, clock) = setup();
        let now = clock.now_ms();
        controller
            .schedule(PendingAlert::new("a1", now + 10_000, now + 1_000))
            .await;
        controller
            .schedule(PendingAlert::new("a2", now + 5_000, now))
            .await;
        sleep_ms(100).await;
        assert!(controller.snapshot().await.displayed.is_some());

        controller.stop().await;
        sleep_ms(60_000).await;

        let snapshot = controller.snapshot().await;
        assert!(snapshot.stopped);
        assert!(snapshot.displayed.is_none());
        assert!(snapshot.scheduled.is_empty());
        assert!(snapshot.dismissed.is_empty());
        assert!(api.confirmations().is_empty());

        assert!(!controller.schedule(PendingAlert::new("a3", now, now)).await);
        assert!(!controller.resolve_current(AlertOutcome::Okay).await);
    }

    #[tokio::test(start_paused = true)]
    async fn resolving_nothing_is_noop() {
        let (controller, api, _clock) = setup();
        assert!(!controller.resolve_current(AlertOutcome::Okay).await);
        assert!(!controller.resolve("missing", AlertOutcome::HelpRequested).await);
        sleep_ms(10).await;
        assert!(api.confirmations().is_empty());
        assert!(controller.snapshot().await.dismissed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn past_start_surfaces_immediately() {
        let (controller, _api, clock) = setup();
        let now = clock.now_ms();
        controller
            .schedule(PendingAlert::new("late", now + 4_000, now - 30_000))
            .await;
        sleep_ms(1).await;
        let displayed = controller.snapshot().await.displayed.unwrap();
        assert_eq!(displayed.alert.alert_id, "late");
        assert_eq!(displayed.remaining_secs, 4);
    }
}
