pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionOptions};
pub use state::{SessionSnapshot, SessionStatus};
