use std::fmt;

use serde::Serialize;

/// Capture line lifecycle.
///
/// State transitions:
/// ```text
/// closed --acquire ok--> open --release--> closed
///   |
///   +--acquire fails--> failed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineState {
    Closed,
    Open,
    Failed,
}

impl LineState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Failed => "failed",
        })
    }
}
