//! Confirmation method selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the user confirms a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    /// Both eyes closed for the deep-blink duration.
    SustainedBlink,
    /// Mouth opened and closed twice within the sequence window.
    DoubleMouthOpen,
    /// Gaze held still for the dwell-confirm duration.
    #[default]
    Dwell,
}

impl DecisionMethod {
    pub const ALL: [DecisionMethod; 3] = [
        DecisionMethod::SustainedBlink,
        DecisionMethod::DoubleMouthOpen,
        DecisionMethod::Dwell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SustainedBlink => "sustained_blink",
            Self::DoubleMouthOpen => "double_mouth_open",
            Self::Dwell => "dwell",
        }
    }
}

impl fmt::Display for DecisionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown decision method '{0}' (expected dwell, sustained_blink, or double_mouth_open)")]
pub struct UnknownDecisionMethod(pub String);

impl FromStr for DecisionMethod {
    type Err = UnknownDecisionMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dwell" => Ok(Self::Dwell),
            "sustained_blink" | "blink" => Ok(Self::SustainedBlink),
            "double_mouth_open" | "mouth" => Ok(Self::DoubleMouthOpen),
            _ => Err(UnknownDecisionMethod(s.to_string())),
        }
    }
}
