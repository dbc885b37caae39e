use serde::{Deserialize, Serialize};

use super::{ContextState, Orientation, Position, SensorSample, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3Payload {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vec3> for Vec3Payload {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventExtra {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity: Option<bool>,
}

/// Body of `POST /events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub timestamp: i64,
    pub accel: Vec3Payload,
    pub gyro: Vec3Payload,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub context: ContextState,
    pub extra: EventExtra,
}

impl EventPayload {
    pub fn compose(
        sample: &SensorSample,
        context: ContextState,
        position: Option<Position>,
    ) -> Self {
        Self {
            timestamp: sample.timestamp_ms,
            accel: sample.accel.into(),
            gyro: sample.gyro.into(),
            lat: position.map(|p| p.lat),
            lng: position.map(|p| p.lng),
            context,
            extra: EventExtra {
                orientation: sample.orientation,
                light: sample.light_lux,
                proximity: sample.proximity_near,
            },
        }
    }
}

/// Row of `GET /alerts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: i64,
    pub reason: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Row of `GET /events/recent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEvent {
    pub timestamp: i64,
    #[serde(default)]
    pub ax: f64,
    #[serde(default)]
    pub ay: f64,
    #[serde(default)]
    pub az: f64,
    #[serde(default)]
    pub gx: f64,
    #[serde(default)]
    pub gy: f64,
    #[serde(default)]
    pub gz: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub context: Option<String>,
}

impl RecentEvent {
    pub fn accel_magnitude(&self) -> f64 {
        Vec3::new(self.ax, self.ay, self.az).magnitude()
    }
}
