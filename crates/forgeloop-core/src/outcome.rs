use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::bundle::Bundle;
use crate::context::RoundRecord;

/// The terminal result of one task. Terminal states are absorbing; the
/// controller produces exactly one of these per task.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The judge declared the acceptance criteria satisfied
    Success {
        bundle: Bundle,
        rounds: usize,
        history: Vec<RoundRecord>,
        total_duration_secs: f64,
    },
    /// The round budget ran out; carries the last merged bundle for
    /// inspection
    Exhausted {
        bundle: Bundle,
        rounds: usize,
        history: Vec<RoundRecord>,
        total_duration_secs: f64,
    },
    /// The initial proposal errored, timed out or returned an incomplete
    /// bundle. Execute and judge were never invoked.
    ProposalFailed {
        error: String,
        total_duration_secs: f64,
    },
    /// Operator cancelled the task at a round boundary
    Interrupted {
        bundle: Bundle,
        rounds: usize,
        history: Vec<RoundRecord>,
        total_duration_secs: f64,
    },
}

impl TaskOutcome {
    pub fn success(
        bundle: Bundle,
        rounds: usize,
        history: Vec<RoundRecord>,
        duration: Duration,
    ) -> Self {
        Self::Success {
            bundle,
            rounds,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn exhausted(
        bundle: Bundle,
        rounds: usize,
        history: Vec<RoundRecord>,
        duration: Duration,
    ) -> Self {
        Self::Exhausted {
            bundle,
            rounds,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn proposal_failed(error: String, duration: Duration) -> Self {
        Self::ProposalFailed {
            error,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn interrupted(
        bundle: Bundle,
        rounds: usize,
        history: Vec<RoundRecord>,
        duration: Duration,
    ) -> Self {
        Self::Interrupted {
            bundle,
            rounds,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn rounds(&self) -> usize {
        match self {
            Self::Success { rounds, .. } => *rounds,
            Self::Exhausted { rounds, .. } => *rounds,
            Self::ProposalFailed { .. } => 0,
            Self::Interrupted { rounds, .. } => *rounds,
        }
    }

    /// The last known bundle, when one exists
    pub fn final_bundle(&self) -> Option<&Bundle> {
        match self {
            Self::Success { bundle, .. } => Some(bundle),
            Self::Exhausted { bundle, .. } => Some(bundle),
            Self::ProposalFailed { .. } => None,
            Self::Interrupted { bundle, .. } => Some(bundle),
        }
    }

    pub fn history(&self) -> &[RoundRecord] {
        match self {
            Self::Success { history, .. } => history,
            Self::Exhausted { history, .. } => history,
            Self::ProposalFailed { .. } => &[],
            Self::Interrupted { history, .. } => history,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { .. } => 0,
            Self::Exhausted { .. } => 1,
            Self::ProposalFailed { .. } => 2,
            Self::Interrupted { .. } => 130,
        }
    }
}
