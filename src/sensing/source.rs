//! Sensor inputs for the sampling loop.
//!
//! Optional sensors are capabilities: every accessor defaults to `None`, and
//! `None` means "signal unavailable", never zero.

use std::sync::{Arc, PoisonError, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{Orientation, Position, Vec3};

use super::config::StreamerConfig;

/// Device at rest, screen up.
pub const REST_ACCEL: Vec3 = Vec3::new(0.0, 0.0, 9.81);

/// One accelerometer (m/s², gravity included) plus gyroscope (deg/s) reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReading {
    pub accel: Vec3,
    pub gyro: Vec3,
}

pub trait SensorSource: Send + Sync {
    fn motion(&self) -> Option<MotionReading> {
        None
    }

    fn orientation(&self) -> Option<Orientation> {
        None
    }

    fn light_lux(&self) -> Option<f64> {
        None
    }

    fn proximity_near(&self) -> Option<bool> {
        None
    }

    fn position(&self) -> Option<Position> {
        None
    }
}

/// Host without any sensors. Everything comes from the fallback generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSensors;

impl SensorSource for NoSensors {}

#[derive(Debug, Clone, Default)]
struct LiveReadings {
    motion: Option<MotionReading>,
    orientation: Option<Orientation>,
    light_lux: Option<f64>,
    proximity_near: Option<bool>,
    position: Option<Position>,
}

/// Latest-value cache that platform callbacks push into and the sampling loop
/// reads from on each tick.
#[derive(Debug, Clone, Default)]
pub struct LiveSensorFeed {
    inner: Arc<RwLock<LiveReadings>>,
}

impl LiveSensorFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_motion(&self, accel: Vec3, gyro: Vec3) {
        self.write(|r| r.motion = Some(MotionReading { accel, gyro }));
    }

    pub fn push_orientation(&self, orientation: Orientation) {
        self.write(|r| r.orientation = Some(orientation));
    }

    pub fn push_light(&self, lux: f64) {
        self.write(|r| r.light_lux = Some(lux));
    }

    pub fn push_proximity(&self, near: bool) {
        self.write(|r| r.proximity_near = Some(near));
    }

    pub fn push_position(&self, position: Position) {
        self.write(|r| r.position = Some(position));
    }

    /// Forget every reading, e.g. after the platform revokes sensor access.
    pub fn clear(&self) {
        self.write(|r| *r = LiveReadings::default());
    }

    fn write(&self, f: impl FnOnce(&mut LiveReadings)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    fn read<T>(&self, f: impl FnOnce(&LiveReadings) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl SensorSource for LiveSensorFeed {
    fn motion(&self) -> Option<MotionReading> {
        self.read(|r| r.motion)
    }

    fn orientation(&self) -> Option<Orientation> {
        self.read(|r| r.orientation)
    }

    fn light_lux(&self) -> Option<f64> {
        self.read(|r| r.light_lux)
    }

    fn proximity_near(&self) -> Option<bool> {
        self.read(|r| r.proximity_near)
    }

    fn position(&self) -> Option<Position> {
        self.read(|r| r.position)
    }
}

/// Synthetic motion used when no live reading exists, plus the manual
/// fall-simulation spike.
pub struct FallbackGenerator {
    rng: StdRng,
    accel_bound: f64,
    gyro_bound: f64,
    spike_accel_range: (f64, f64),
    spike_gyro_bound: f64,
    accel_offset: Vec3,
    gyro: Vec3,
}

impl FallbackGenerator {
    pub fn new(config: &StreamerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: &StreamerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &StreamerConfig, rng: StdRng) -> Self {
        let (lo, hi) = config.spike_accel_range;
        Self {
            rng,
            accel_bound: config.fallback_accel_bound.abs(),
            gyro_bound: config.fallback_gyro_bound.abs(),
            spike_accel_range: (lo.min(hi), lo.max(hi)),
            spike_gyro_bound: config.spike_gyro_bound.abs(),
            accel_offset: Vec3::default(),
            gyro: Vec3::default(),
        }
    }

    /// Next step of a bounded random walk around rest.
    pub fn next_reading(&mut self) -> MotionReading {
        let (ab, gb) = (self.accel_bound, self.gyro_bound);
        self.accel_offset = Vec3::new(
            self.walk(self.accel_offset.x, ab),
            self.walk(self.accel_offset.y, ab),
            self.walk(self.accel_offset.z, ab),
        );
        self.gyro = Vec3::new(
            self.walk(self.gyro.x, gb),
            self.walk(self.gyro.y, gb),
            self.walk(self.gyro.z, gb),
        );

        MotionReading {
            accel: Vec3::new(
                REST_ACCEL.x + self.accel_offset.x,
                REST_ACCEL.y + self.accel_offset.y,
                REST_ACCEL.z + self.accel_offset.z,
            ),
            gyro: self.gyro,
        }
    }

    /// Large-magnitude reading resembling an impact.
    pub fn spike(&mut self) -> MotionReading {
        let ax = self.spike_component() * self.random_sign();
        let ay = self.spike_component() * self.random_sign();
        let az = self.spike_component();
        let g = self.spike_gyro_bound;
        let gyro = if g > 0.0 {
            Vec3::new(
                self.rng.gen_range(-g..=g),
                self.rng.gen_range(-g..=g),
                self.rng.gen_range(-g..=g),
            )
        } else {
            Vec3::default()
        };

        MotionReading {
            accel: Vec3::new(ax, ay, az),
            gyro,
        }
    }

    fn walk(&mut self, current: f64, bound: f64) -> f64 {
        if bound <= 0.0 {
            return 0.0;
        }
        let step = bound / 2.0;
        (current + self.rng.gen_range(-step..=step)).clamp(-bound, bound)
    }

    fn spike_component(&mut self) -> f64 {
        let (lo, hi) = self.spike_accel_range;
        if hi > lo {
            self.rng.gen_range(lo..hi)
        } else {
            lo
        }
    }

    fn random_sign(&mut self) -> f64 {
        if self.rng.gen_bool(0.5) {
            1.0
        } else {
            -1.0
        }
    }
}
