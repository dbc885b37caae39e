use serde::{Deserialize, Serialize};
use std::fmt;

/// Inferred carrying/activity context of the device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    Unknown,
    Moving,
    StillFaceUp,
    StillFaceDown,
    StillSide,
    InPocket,
    InHand,
}

impl Default for ContextState {
    fn default() -> Self {
        ContextState::Unknown
    }
}

impl ContextState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextState::Unknown => "unknown",
            ContextState::Moving => "moving",
            ContextState::StillFaceUp => "still_face_up",
            ContextState::StillFaceDown => "still_face_down",
            ContextState::StillSide => "still_side",
            ContextState::InPocket => "in_pocket",
            ContextState::InHand => "in_hand",
        }
    }

    pub fn is_still(&self) -> bool {
        matches!(
            self,
            ContextState::StillFaceUp
                | ContextState::StillFaceDown
                | ContextState::StillSide
                | ContextState::InPocket
        )
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
