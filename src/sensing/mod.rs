pub mod classifier;
pub mod config;
pub mod controller;
pub mod gravity;
pub mod loop_worker;
pub mod source;

pub use classifier::{ClassifierConfig, ContextClassifier, MotionStats};
pub use config::StreamerConfig;
pub use controller::SensingController;
pub use gravity::{GravityEstimator, GRAVITY_ALPHA};
pub use loop_worker::{PostStatus, StreamContext, StreamStatus};
pub use source::{FallbackGenerator, LiveSensorFeed, MotionReading, NoSensors, SensorSource};
