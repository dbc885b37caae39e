mod alert;
mod context;
mod event;
mod sample;

pub use alert::{AlertOutcome, PendingAlert};
pub use context::ContextState;
pub use event::{AlertRecord, EventExtra, EventPayload, RecentEvent, Vec3Payload};
pub use sample::{MotionOrigin, Orientation, Position, SensorSample, Vec3};
