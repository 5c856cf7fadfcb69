use serde::{Deserialize, Serialize};

/// Exit status recorded for a client that was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = 255;

/// Final result for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum HostOutcome {
    /// The client process ran and exited.
    ///
    /// A remote command failure and a client that could not reach the host
    /// both land here; only the code tells them apart.
    Exited { code: i32 },
    /// The client process could not be started at all.
    SpawnFailed { reason: String },
}

impl HostOutcome {
    /// Build an outcome from a raw wait status code.
    ///
    /// `None` means the process was killed by a signal.
    pub fn from_code(code: Option<i32>) -> Self {
        HostOutcome::Exited {
            code: code.unwrap_or(SIGNALED_EXIT_CODE),
        }
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            HostOutcome::Exited { code } => Some(*code),
            HostOutcome::SpawnFailed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HostOutcome::Exited { code: 0 })
    }
}
