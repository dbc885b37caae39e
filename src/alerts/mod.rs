pub mod controller;
pub mod state;

pub use controller::AlertConfirmationController;
pub use state::{
    AlertNotice, AlertPhase, ConfirmationConfig, ConfirmationSnapshot, DisplayedAlert, ResolvedAlert,
};
