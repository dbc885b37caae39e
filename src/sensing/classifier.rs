//! Hysteresis state machine turning streaming samples into a stable
//! [`ContextState`].
//!
//! Each tick produces a raw "looks moving" verdict from the variance of recent
//! linear-acceleration and angular-rate magnitudes. The published state only
//! changes once the same verdict has held for `streak_threshold` consecutive
//! ticks, so a single spike never flips the context.

use std::collections::VecDeque;

use crate::models::{ContextState, SensorSample, Vec3};

/// Tunable thresholds for context classification.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Samples kept for variance computation (~10s at 2 Hz).
    pub history_len: usize,
    /// Below this many buffered samples the previous state is kept.
    pub min_samples: usize,
    /// Linear-acceleration variance below which the device may be still.
    pub still_accel_variance: f64,
    /// Angular-rate variance below which the device may be still.
    pub still_gyro_variance: f64,
    /// Linear-acceleration variance above which motion is forced.
    pub moving_accel_variance: f64,
    /// Angular-rate variance above which motion is forced.
    pub moving_gyro_variance: f64,
    /// Consecutive matching verdicts needed before the state flips.
    pub streak_threshold: u32,
    /// Tilt samples kept when live motion input is missing.
    pub orientation_window: usize,
    /// Tilt swing (degrees) across the window that counts as motion.
    pub orientation_moving_deg: f64,
    /// Mean gravity-axis reading that alone means "flat".
    pub flat_gravity: f64,
    /// Gravity-axis reading accepted as flat when tilt agrees.
    pub tilted_flat_gravity: f64,
    /// Tilt (degrees) from horizontal still counted as lying flat.
    pub flat_tilt_deg: f64,
    /// Ambient light (lux) below which a covered sensor means "in pocket".
    pub pocket_light_lux: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            history_len: 20,
            min_samples: 6,
            still_accel_variance: 0.25,
            still_gyro_variance: 18.0,
            moving_accel_variance: 0.6,
            moving_gyro_variance: 22.0,
            streak_threshold: 3,
            orientation_window: 10,
            orientation_moving_deg: 25.0,
            flat_gravity: 8.8,
            tilted_flat_gravity: 7.8,
            flat_tilt_deg: 25.0,
            pocket_light_lux: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HistoryEntry {
    linear_mag: f64,
    gyro_mag: f64,
    gravity_axis: f64,
}

/// Window statistics behind the last verdict. Useful for debug logging.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionStats {
    pub accel_variance: f64,
    pub gyro_variance: f64,
    pub mean_gravity_axis: f64,
    pub orientation_suggests_moving: bool,
}

pub struct ContextClassifier {
    config: ClassifierConfig,
    history: VecDeque<HistoryEntry>,
    tilt_window: VecDeque<f64>,
    motion_streak: u32,
    still_streak: u32,
    state: ContextState,
    last_stats: Option<MotionStats>,
}

impl ContextClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let history_len = config.history_len.max(1);
        let orientation_window = config.orientation_window.max(1);
        Self {
            history: VecDeque::with_capacity(history_len),
            tilt_window: VecDeque::with_capacity(orientation_window),
            config,
            motion_streak: 0,
            still_streak: 0,
            state: ContextState::Unknown,
            last_stats: None,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// `(motion_streak, still_streak)`
    pub fn streaks(&self) -> (u32, u32) {
        (self.motion_streak, self.still_streak)
    }

    pub fn last_stats(&self) -> Option<MotionStats> {
        self.last_stats
    }

    /// Feed one sample together with the updated gravity estimate.
    pub fn classify(&mut self, sample: &SensorSample, gravity: Vec3) -> ContextState {
        self.push_history(HistoryEntry {
            linear_mag: sample.accel.distance(&gravity),
            gyro_mag: sample.gyro.magnitude(),
            gravity_axis: gravity.z,
        });
        self.track_orientation(sample);

        if self.history.len() < self.config.min_samples {
            return self.state;
        }

        let stats = self.window_stats(sample);
        self.last_stats = Some(stats);

        let still = stats.accel_variance < self.config.still_accel_variance
            && stats.gyro_variance < self.config.still_gyro_variance;
        let looks_moving = !still
            || stats.orientation_suggests_moving
            || stats.accel_variance > self.config.moving_accel_variance
            || stats.gyro_variance > self.config.moving_gyro_variance;

        self.apply_hysteresis(looks_moving, sample, stats.mean_gravity_axis)
    }

    /// Clear history, streaks, orientation window and state together.
    pub fn reset(&mut self) {
        self.history.clear();
        self.tilt_window.clear();
        self.motion_streak = 0;
        self.still_streak = 0;
        self.state = ContextState::Unknown;
        self.last_stats = None;
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        if self.history.len() >= self.config.history_len.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    fn track_orientation(&mut self, sample: &SensorSample) {
        if sample.origin.is_live() {
            self.tilt_window.clear();
            return;
        }
        let Some(orientation) = sample.orientation else {
            return;
        };
        if self.tilt_window.len() >= self.config.orientation_window.max(1) {
            self.tilt_window.pop_front();
        }
        self.tilt_window.push_back(orientation.tilt_deg());
    }

    fn window_stats(&self, sample: &SensorSample) -> MotionStats {
        let accel = variance(self.history.iter().map(|e| e.linear_mag));
        let gyro = variance(self.history.iter().map(|e| e.gyro_mag));
        let mean_gravity_axis = mean(self.history.iter().map(|e| e.gravity_axis));

        let orientation_suggests_moving = !sample.origin.is_live()
            && self.tilt_window.len() >= 2
            && tilt_span(&self.tilt_window) > self.config.orientation_moving_deg;

        MotionStats {
            accel_variance: accel,
            gyro_variance: gyro,
            mean_gravity_axis,
            orientation_suggests_moving,
        }
    }

    fn apply_hysteresis(
        &mut self,
        looks_moving: bool,
        sample: &SensorSample,
        mean_gravity_axis: f64,
    ) -> ContextState {
        if looks_moving {
            self.motion_streak = self.motion_streak.saturating_add(1);
            self.still_streak = 0;
        } else {
            self.still_streak = self.still_streak.saturating_add(1);
            self.motion_streak = 0;
        }

        let threshold = self.config.streak_threshold.max(1);
        if self.still_streak >= threshold {
            self.state = self.resolve_still(sample, mean_gravity_axis);
        } else if self.motion_streak >= threshold {
            self.state = if sample.proximity_near == Some(true) {
                ContextState::InHand
            } else {
                ContextState::Moving
            };
        }
        self.state
    }

    fn resolve_still(&self, sample: &SensorSample, mean_gravity_axis: f64) -> ContextState {
        let covered = sample.proximity_near == Some(true)
            && sample
                .light_lux
                .map_or(false, |lux| lux < self.config.pocket_light_lux);
        if covered {
            return ContextState::InPocket;
        }

        // Absent orientation never counts as flat.
        let tilt = sample.orientation.map(|o| o.tilt_deg());
        let face_up_tilt = tilt.map_or(false, |t| t < self.config.flat_tilt_deg);
        let face_down_tilt = tilt.map_or(false, |t| t > 180.0 - self.config.flat_tilt_deg);

        if mean_gravity_axis > self.config.flat_gravity
            || (face_up_tilt && mean_gravity_axis > self.config.tilted_flat_gravity)
        {
            ContextState::StillFaceUp
        } else if mean_gravity_axis < -self.config.flat_gravity
            || (face_down_tilt && mean_gravity_axis < -self.config.tilted_flat_gravity)
        {
            ContextState::StillFaceDown
        } else {
            ContextState::StillSide
        }
    }
}

impl Default for ContextClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Population variance.
fn variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count < 2 {
        return 0.0;
    }
    let m = mean(values.clone());
    values.map(|v| (v - m) * (v - m)).sum::<f64>() / count as f64
}

fn tilt_span(window: &VecDeque<f64>) -> f64 {
    let (min, max) = window
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
            (lo.min(t), hi.max(t))
        });
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MotionOrigin, Orientation};
    use crate::sensing::GravityEstimator;

    const REST_UP: Vec3 = Vec3::new(0.0, 0.0, 9.8);

    struct Harness {
        gravity: GravityEstimator,
        classifier: ContextClassifier,
        t: i64,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                gravity: GravityEstimator::new(),
                classifier: ContextClassifier::default(),
                t: 0,
            }
        }

        fn feed(&mut self, sample: SensorSample) -> ContextState {
            let g = self.gravity.update(sample.accel);
            self.classifier.classify(&sample, g)
        }

        fn sample(&mut self, accel: Vec3, gyro: Vec3, origin: MotionOrigin) -> SensorSample {
            self.t += 250;
            SensorSample::new(self.t, accel, gyro, origin)
        }

        fn still(&mut self, accel: Vec3, n: usize) -> ContextState {
            let mut state = self.classifier.state();
            for _ in 0..n {
                let s = self.sample(accel, Vec3::default(), MotionOrigin::Live);
                state = self.feed(s);
            }
            state
        }

        fn shake(&mut self, i: usize) -> ContextState {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let s = self.sample(
                Vec3::new(6.0 * sign, 4.0, 9.8 + 5.0 * sign),
                Vec3::new(40.0 * sign, 0.0, 0.0),
                MotionOrigin::Live,
            );
            self.feed(s)
        }
    }

    #[test]
    fn insufficient_history_keeps_previous_state() {
        let mut h = Harness::new();
        for i in 0..5 {
            assert_eq!(h.shake(i), ContextState::Unknown);
        }
        assert_eq!(h.classifier.streaks(), (0, 0));
    }

    #[test]
    fn still_samples_settle_face_up() {
        let mut h = Harness::new();
        assert_eq!(h.still(REST_UP, 7), ContextState::Unknown);
        assert_eq!(h.still(REST_UP, 1), ContextState::StillFaceUp);
        assert_eq!(h.still(REST_UP, 12), ContextState::StillFaceUp);
        assert_eq!(h.classifier.streaks(), (0, 15));
    }

    #[test]
    fn face_down_and_side() {
        let mut h = Harness::new();
        assert_eq!(
            h.still(Vec3::new(0.0, 0.0, -9.8), 20),
            ContextState::StillFaceDown
        );

        let mut h = Harness::new();
        assert_eq!(h.still(Vec3::new(9.8, 0.0, 0.3), 20), ContextState::StillSide);
    }

    #[test]
    fn tilt_confirms_flat_with_weaker_gravity_axis() {
        let mut h = Harness::new();
        let accel = Vec3::new(4.5, 0.0, 8.2);
        let flat = Orientation {
            alpha: 0.0,
            beta: 10.0,
            gamma: 5.0,
        };
        let mut state = ContextState::Unknown;
        for _ in 0..20 {
            let s = h
                .sample(accel, Vec3::default(), MotionOrigin::Live)
                .with_orientation(Some(flat));
            state = h.feed(s);
        }
        assert_eq!(state, ContextState::StillFaceUp);

        // Same reading without orientation is not assumed flat.
        let mut h = Harness::new();
        assert_eq!(h.still(accel, 20), ContextState::StillSide);
    }

    #[test]
    fn covered_and_dark_is_in_pocket() {
        let mut h = Harness::new();
        let mut state = ContextState::Unknown;
        for _ in 0..20 {
            let s = h
                .sample(REST_UP, Vec3::default(), MotionOrigin::Live)
                .with_proximity(Some(true))
                .with_light(Some(2.0));
            state = h.feed(s);
        }
        assert_eq!(state, ContextState::InPocket);
    }

    #[test]
    fn near_without_light_reading_is_not_pocket() {
        let mut h = Harness::new();
        let mut state = ContextState::Unknown;
        for _ in 0..20 {
            let s = h
                .sample(REST_UP, Vec3::default(), MotionOrigin::Live)
                .with_proximity(Some(true));
            state = h.feed(s);
        }
        assert_eq!(state, ContextState::StillFaceUp);
    }

    #[test]
    fn sustained_motion_flips_after_three_ticks() {
        let mut h = Harness::new();
        assert_eq!(h.still(REST_UP, 20), ContextState::StillFaceUp);

        assert_eq!(h.shake(0), ContextState::StillFaceUp);
        assert_eq!(h.shake(1), ContextState::StillFaceUp);
        assert_eq!(h.shake(2), ContextState::Moving);
    }

    #[test]
    fn motion_while_near_is_in_hand() {
        let mut h = Harness::new();
        let mut state = ContextState::Unknown;
        for i in 0..10 {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let s = h
                .sample(
                    Vec3::new(6.0 * sign, 0.0, 9.8),
                    Vec3::new(30.0 * sign, 0.0, 0.0),
                    MotionOrigin::Live,
                )
                .with_proximity(Some(true));
            state = h.feed(s);
        }
        assert_eq!(state, ContextState::InHand);
    }

    #[test]
    fn fewer_than_three_verdicts_never_flip() {
        let mut h = Harness::new();
        h.still(REST_UP, 20);
        let sample = SensorSample::new(0, REST_UP, Vec3::default(), MotionOrigin::Live);

        for _ in 0..5 {
            assert_eq!(h.classifier.apply_hysteresis(true, &sample, 9.8), ContextState::StillFaceUp);
            assert_eq!(h.classifier.apply_hysteresis(true, &sample, 9.8), ContextState::StillFaceUp);
            assert_eq!(h.classifier.apply_hysteresis(false, &sample, 9.8), ContextState::StillFaceUp);
        }
        assert_eq!(h.classifier.streaks(), (0, 1));

        h.classifier.apply_hysteresis(true, &sample, 9.8);
        h.classifier.apply_hysteresis(true, &sample, 9.8);
        assert_eq!(h.classifier.apply_hysteresis(true, &sample, 9.8), ContextState::Moving);
    }

    #[test]
    fn orientation_swing_substitutes_for_missing_motion() {
        let mut h = Harness::new();
        let mut state = ContextState::Unknown;
        for i in 0..12 {
            let beta = if i % 2 == 0 { 0.0 } else { 40.0 };
            let s = h
                .sample(REST_UP, Vec3::default(), MotionOrigin::Fallback)
                .with_orientation(Some(Orientation {
                    alpha: 0.0,
                    beta,
                    gamma: 0.0,
                }));
            state = h.feed(s);
        }
        assert_eq!(state, ContextState::Moving);
        assert!(h.classifier.last_stats().unwrap().orientation_suggests_moving);
    }

    #[test]
    fn orientation_swing_ignored_with_live_motion() {
        let mut h = Harness::new();
        let mut state = ContextState::Unknown;
        for i in 0..12 {
            let beta = if i % 2 == 0 { 0.0 } else { 40.0 };
            let s = h
                .sample(REST_UP, Vec3::default(), MotionOrigin::Live)
                .with_orientation(Some(Orientation {
                    alpha: 0.0,
                    beta,
                    gamma: 0.0,
                }));
            state = h.feed(s);
        }
        assert_eq!(state, ContextState::StillFaceUp);
    }

    #[test]
    fn reset_returns_to_unknown() {
        let mut h = Harness::new();
        h.still(REST_UP, 20);
        h.classifier.reset();
        assert_eq!(h.classifier.state(), ContextState::Unknown);
        assert_eq!(h.classifier.streaks(), (0, 0));
        assert_eq!(h.classifier.last_stats(), None);
    }

    #[test]
    fn variance_is_population_variance() {
        let v = variance([1.0, 2.0, 3.0, 4.0].into_iter());
        assert!((v - 1.25).abs() < 1e-12);
        assert_eq!(variance([7.0].into_iter()), 0.0);
    }
}
