use serde::{Deserialize, Serialize};

/// Three-axis reading. Acceleration is in m/s², angular rate in deg/s.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        self.sub(other).magnitude()
    }
}

/// Device orientation in degrees, W3C DeviceOrientation convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Orientation {
    /// Angle away from lying flat, face up. 0° flat, ~180° flat face down.
    pub fn tilt_deg(&self) -> f64 {
        (self.beta * self.beta + self.gamma * self.gamma).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

/// Where the motion values of a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MotionOrigin {
    Live,
    Fallback,
    Simulated,
}

impl MotionOrigin {
    pub fn is_live(&self) -> bool {
        matches!(self, MotionOrigin::Live)
    }
}

/// One tick's worth of sensor input. Built once per tick and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub timestamp_ms: i64,
    pub accel: Vec3,
    pub gyro: Vec3,
    pub orientation: Option<Orientation>,
    pub light_lux: Option<f64>,
    pub proximity_near: Option<bool>,
    pub origin: MotionOrigin,
}

impl SensorSample {
    pub fn new(timestamp_ms: i64, accel: Vec3, gyro: Vec3, origin: MotionOrigin) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
            orientation: None,
            light_lux: None,
            proximity_near: None,
            origin,
        }
    }

    pub fn with_orientation(mut self, orientation: Option<Orientation>) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_light(mut self, light_lux: Option<f64>) -> Self {
        self.light_lux = light_lux;
        self
    }

    pub fn with_proximity(mut self, proximity_near: Option<bool>) -> Self {
        self.proximity_near = proximity_near;
        self
    }
}
