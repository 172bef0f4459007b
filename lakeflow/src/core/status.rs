//! Run status, stage outcome and stage name enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two stages of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Fetches source records into the landing layer.
    Ingest,
    /// Refines landing data into the bronze layer.
    Transform,
}

impl StageName {
    /// The fixed stage order of every pipeline run.
    pub const ORDER: [Self; 2] = [Self::Ingest, Self::Transform];

    /// Returns the stage that follows this one, if any.
    #[must_use]
    pub fn downstream(&self) -> Option<Self> {
        match self {
            Self::Ingest => Some(Self::Transform),
            Self::Transform => None,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest => write!(f, "ingest"),
            Self::Transform => write!(f, "transform"),
        }
    }
}

/// The lifecycle status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run created, no stage started yet.
    Pending,
    /// Run is executing stages.
    Running,
    /// All stages completed successfully.
    Succeeded,
    /// A stage exhausted its retry budget.
    Failed,
    /// The run exceeded its wall-clock bound.
    TimedOut,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

/// The outcome of a single stage attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Attempt started but no outcome reported yet.
    Pending,
    /// The worker reported success.
    Success,
    /// The worker failed or could not be invoked.
    Failure,
}

impl Default for StageOutcome {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl StageOutcome {
    /// Returns true if the outcome has been resolved.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}
