use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Round budget used when the caller does not override it
pub const DEFAULT_MAX_ROUNDS: usize = 20;

/// Per-step deadline for propose, execute and judge calls
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

/// State carried by the controller for one task: the inputs, the round
/// counter, and the append-only round history.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Natural-language task description
    pub task: String,
    /// Acceptance criteria the execution output must meet
    pub criteria: String,
    /// Current round number (0 until the first round begins)
    pub round: usize,
    /// History of all completed rounds
    pub history: Vec<RoundRecord>,
    /// When the task started
    started_at: Instant,
    /// Round budget
    pub max_rounds: usize,
    /// Deadline applied to each external call
    pub step_timeout: Duration,
}

/// Record of a single execute + judge round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub execution_output: String,
    pub execution_secs: f64,
    pub verdict: String,
    pub descriptor_replaced: bool,
    pub files_replaced: Option<usize>,
    /// Transient failure absorbed during this round, if any
    pub failure: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TaskContext {
    pub fn new(task: String, criteria: String) -> Self {
        Self {
            task,
            criteria,
            round: 0,
            history: Vec::new(),
            started_at: Instant::now(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn begin_round(&mut self) {
        self.round += 1;
    }

    pub fn push_record(&mut self, record: RoundRecord) {
        self.history.push(record);
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn should_continue(&self) -> bool {
        self.round < self.max_rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_budget() {
        let mut ctx = TaskContext::new("task".into(), "criteria".into()).with_max_rounds(2);
        assert!(ctx.should_continue());
        ctx.begin_round();
        assert!(ctx.should_continue());
        ctx.begin_round();
        assert!(!ctx.should_continue());
    }

    #[test]
    fn test_defaults() {
        let ctx = TaskContext::new("task".into(), "criteria".into());
        assert_eq!(ctx.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(ctx.step_timeout, DEFAULT_STEP_TIMEOUT);
        assert_eq!(ctx.round, 0);
    }
}
