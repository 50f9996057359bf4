use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of one account row's download task.
///
/// `Queued` and `Running` are *locked* states: while a row is locked its
/// handle and filter configuration are frozen, and destructive actions
/// require explicit confirmation. Every other status is unlocked and the
/// row can be reconfigured or restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Idle,
    Queued,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// A run that has finished one way or another. Terminal only for the
    /// run itself — the row can always be restarted once unlocked.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
