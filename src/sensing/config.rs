use std::time::Duration;

/// Tunables for the sampling loop and its synthetic inputs.
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Sampling period (4 Hz by default).
    pub tick_interval: Duration,
    /// Upper bound on a single event post before it is abandoned.
    pub post_timeout: Duration,
    /// Fallback acceleration stays within this distance (m/s²) of rest per axis.
    pub fallback_accel_bound: f64,
    /// Fallback angular rate stays within this bound (deg/s) per axis.
    pub fallback_gyro_bound: f64,
    /// Simulated-fall acceleration magnitude range per axis (m/s²).
    pub spike_accel_range: (f64, f64),
    /// Simulated-fall angular rate bound per axis (deg/s).
    pub spike_gyro_bound: f64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            post_timeout: Duration::from_secs(5),
            fallback_accel_bound: 0.3,
            fallback_gyro_bound: 3.0,
            spike_accel_range: (15.0, 25.0),
            spike_gyro_bound: 100.0,
        }
    }
}
