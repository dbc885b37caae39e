use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    alerts::AlertConfirmationController,
    api::CollaboratorService,
    models::{ContextState, EventPayload, MotionOrigin, Position, SensorSample},
    utils::Clock,
};

use super::{
    classifier::{ClassifierConfig, ContextClassifier},
    config::StreamerConfig,
    gravity::GravityEstimator,
    source::{FallbackGenerator, SensorSource},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Result of the most recent event post.
#[derive(Debug, Clone, PartialEq)]
pub enum PostStatus {
    Idle,
    Delivered { alert_id: Option<String> },
    Failed(String),
    TimedOut,
}

/// What the loop last did, for display.
#[derive(Debug, Clone)]
pub struct StreamStatus {
    pub ticks: u64,
    pub context: ContextState,
    pub last_sample: Option<SensorSample>,
    pub last_post: PostStatus,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self {
            ticks: 0,
            context: ContextState::Unknown,
            last_sample: None,
            last_post: PostStatus::Idle,
        }
    }
}

/// Everything one streaming session's loop needs.
pub struct StreamContext {
    pub session_id: String,
    pub source: Arc<dyn SensorSource>,
    pub api: Arc<dyn CollaboratorService>,
    pub alerts: AlertConfirmationController,
    /// Manual fall simulation. Takes precedence over live and fallback input.
    pub simulate_fall: watch::Receiver<bool>,
    pub status: Arc<watch::Sender<StreamStatus>>,
    pub location_override: Option<Position>,
    pub clock: Clock,
    pub streamer: StreamerConfig,
    pub classifier: ClassifierConfig,
    /// Fixed seed for the synthetic generator.
    pub seed: Option<u64>,
}

/// Session-scoped signal state. Dropped and rebuilt on every restart.
struct Pipeline {
    gravity: GravityEstimator,
    classifier: ContextClassifier,
    generator: FallbackGenerator,
}

impl Pipeline {
    fn new(ctx: &StreamContext) -> Self {
        let generator = match ctx.seed {
            Some(seed) => FallbackGenerator::seeded(&ctx.streamer, seed),
            None => FallbackGenerator::new(&ctx.streamer),
        };
        Self {
            gravity: GravityEstimator::new(),
            classifier: ContextClassifier::new(ctx.classifier.clone()),
            generator,
        }
    }

    fn next_sample(&mut self, ctx: &StreamContext) -> SensorSample {
        let simulate = *ctx.simulate_fall.borrow();
        let (reading, origin) = if simulate {
            (self.generator.spike(), MotionOrigin::Simulated)
        } else if let Some(live) = ctx.source.motion() {
            (live, MotionOrigin::Live)
        } else {
            (self.generator.next_reading(), MotionOrigin::Fallback)
        };

        SensorSample::new(ctx.clock.now_ms(), reading.accel, reading.gyro, origin)
            .with_orientation(ctx.source.orientation())
            .with_light(ctx.source.light_lux())
            .with_proximity(ctx.source.proximity_near())
    }

    fn classify(&mut self, sample: &SensorSample) -> ContextState {
        let gravity = self.gravity.update(sample.accel);
        self.classifier.classify(sample, gravity)
    }
}

pub async fn sensing_loop(ctx: StreamContext, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(ctx.streamer.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pipeline = Pipeline::new(&ctx);
    let mut ticks: u64 = 0;
    let mut last_context = ContextState::Unknown;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks = ticks.wrapping_add(1);

                let sample = pipeline.next_sample(&ctx);
                let context = pipeline.classify(&sample);
                if context != last_context {
                    log_info!("session {} context {} -> {}", ctx.session_id, last_context, context);
                    last_context = context;
                }
                if let Some(stats) = pipeline.classifier.last_stats() {
                    log_debug!(
                        "tick {} origin={:?} |a|={:.2} varA={:.3} varG={:.2} ctx={}",
                        ticks,
                        sample.origin,
                        sample.accel.magnitude(),
                        stats.accel_variance,
                        stats.gyro_variance,
                        context
                    );
                }

                let position = ctx.location_override.or_else(|| ctx.source.position());
                let payload = EventPayload::compose(&sample, context, position);

                ctx.status.send_modify(|status| {
                    status.ticks = ticks;
                    status.context = context;
                    status.last_sample = Some(sample);
                });

                dispatch_event(&ctx, payload, cancel_token.child_token());
            }
            _ = cancel_token.cancelled() => {
                log_info!("sensing loop for session {} shutting down after {} ticks", ctx.session_id, ticks);
                break;
            }
        }
    }
}

/// Post without blocking the tick. Failures are logged and superseded by the
/// next tick; nothing is retried.
fn dispatch_event(ctx: &StreamContext, payload: EventPayload, cancel_token: CancellationToken) {
    let api = ctx.api.clone();
    let alerts = ctx.alerts.clone();
    let status = ctx.status.clone();
    let session_id = ctx.session_id.clone();
    let post_timeout = ctx.streamer.post_timeout;

    tokio::spawn(async move {
        let result = tokio::select! {
            _ = cancel_token.cancelled() => return,
            result = tokio::time::timeout(post_timeout, api.post_event(&payload)) => result,
        };

        let post_status = match result {
            Ok(Ok(Some(alert))) => {
                let alert_id = alert.alert_id.clone();
                if alerts.schedule(alert).await {
                    log_info!("session {session_id}: candidate fall {alert_id} signalled");
                }
                PostStatus::Delivered {
                    alert_id: Some(alert_id),
                }
            }
            Ok(Ok(None)) => PostStatus::Delivered { alert_id: None },
            Ok(Err(err)) => {
                log_warn!("session {session_id}: event post failed: {err:#}");
                PostStatus::Failed(format!("{err:#}"))
            }
            Err(_) => {
                log_warn!(
                    "session {session_id}: event post timed out after {}ms",
                    post_timeout.as_millis()
                );
                PostStatus::TimedOut
            }
        };

        status.send_modify(|status| status.last_post = post_status);
    });
}
