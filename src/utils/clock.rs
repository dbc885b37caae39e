use chrono::Utc;
use tokio::time::Instant;

/// Wall-clock epoch milliseconds that advance with tokio's clock.
///
/// Server deadlines (`expiryAt`, `confirmStartsAt`) are absolute epoch ms, while
/// timers run on tokio's monotonic clock. Anchoring one to the other once keeps
/// both views consistent, including under paused test time.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    anchor_wall_ms: i64,
    anchor: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    pub fn starting_at(wall_ms: i64) -> Self {
        Self {
            anchor_wall_ms: wall_ms,
            anchor: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_wall_ms.saturating_add(elapsed)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
