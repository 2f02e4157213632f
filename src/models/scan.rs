use serde::{Deserialize, Serialize};

/// Snapshot of the server-side scan job. Only `running` matters to the
/// client; the rest of the status document is ignored.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanStatus {
    #[serde(default)]
    pub running: bool,
}

impl ScanStatus {
    pub fn running() -> Self {
        Self { running: true }
    }

    pub fn finished() -> Self {
        Self { running: false }
    }
}

/// Acknowledgement of an accepted scan trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanAccepted {
    #[serde(default)]
    pub message: Option<String>,
}

/// Error document returned by the backend alongside non-success statuses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
