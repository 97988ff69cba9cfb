use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use forgeloop_logging::{LogEvent, Logger, RoundStage};

use crate::bundle::Bundle;
use crate::context::{RoundRecord, TaskContext};
use crate::error::{OracleError, SandboxError};
use crate::exec::{ExecutionBackend, ExecutionOutput};
use crate::oracle::{JudgeOracle, ProposeOracle, Verdict};
use crate::outcome::TaskOutcome;

/// Orchestrates one task: a single proposal followed by bounded
/// execute/judge/merge rounds until the judge is satisfied or the round
/// budget runs out.
pub struct Controller<'a> {
    proposer: &'a dyn ProposeOracle,
    judge: &'a dyn JudgeOracle,
    backend: &'a dyn ExecutionBackend,
    logger: Arc<Logger>,
    interrupted: Arc<AtomicBool>,
}

/// Whether the loop stops after a round or moves on
enum RoundDisposition {
    Satisfied,
    Continue,
}

impl<'a> Controller<'a> {
    pub fn new(
        proposer: &'a dyn ProposeOracle,
        judge: &'a dyn JudgeOracle,
        backend: &'a dyn ExecutionBackend,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            proposer,
            judge,
            backend,
            logger,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle to signal cancellation. Cancellation is observed at
    /// round boundaries, so a half-applied merge is never visible.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Run the task to its terminal outcome. Every fatal condition becomes a
    /// typed outcome; transient oracle and backend failures consume a round
    /// and keep the loop live.
    pub async fn run(&self, mut ctx: TaskContext) -> TaskOutcome {
        self.logger.log(&LogEvent::TaskStarted {
            task_preview: preview(&ctx.task),
            max_rounds: ctx.max_rounds,
        });

        self.logger.log(&LogEvent::ProposeStarted);
        let propose_started = Instant::now();
        let mut bundle = match self.call_propose(&ctx).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "proposal failed, task is fatal");
                self.logger.log(&LogEvent::ProposeFailed {
                    error: e.to_string(),
                });
                return TaskOutcome::proposal_failed(e.to_string(), ctx.total_duration());
            }
        };
        self.logger.log(&LogEvent::ProposeCompleted {
            files: bundle.files.len(),
            duration_secs: propose_started.elapsed().as_secs_f64(),
        });

        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!(round = ctx.round, "task interrupted by operator");
                self.logger.log(&LogEvent::TaskInterrupted { rounds: ctx.round });
                let duration = ctx.total_duration();
                return TaskOutcome::interrupted(bundle, ctx.round, ctx.history, duration);
            }

            if !ctx.should_continue() {
                self.logger.log(&LogEvent::RoundBudgetExhausted { rounds: ctx.round });
                let duration = ctx.total_duration();
                return TaskOutcome::exhausted(bundle, ctx.round, ctx.history, duration);
            }

            ctx.begin_round();
            match self.run_round(&mut ctx, &mut bundle).await {
                RoundDisposition::Satisfied => {
                    let duration = ctx.total_duration();
                    self.logger.log(&LogEvent::TaskCompleted {
                        rounds: ctx.round,
                        duration_secs: duration.as_secs_f64(),
                    });
                    return TaskOutcome::success(bundle, ctx.round, ctx.history, duration);
                }
                RoundDisposition::Continue => {}
            }
        }
    }

    /// Run one execute + judge round against the current bundle. Transient
    /// failures are recorded and absorbed: the round counts, the bundle is
    /// left untouched.
    async fn run_round(&self, ctx: &mut TaskContext, bundle: &mut Bundle) -> RoundDisposition {
        let round = ctx.round;
        self.logger.log(&LogEvent::RoundStarted {
            round,
            max_rounds: ctx.max_rounds,
        });

        debug!(round, "executing bundle");
        let output = match self.call_execute(ctx, bundle).await {
            Ok(output) => output,
            Err(e) => {
                warn!(round, error = %e, "execution backend failed, round counts as not satisfied");
                self.absorb_failure(ctx, RoundStage::Execute, e.to_string(), None);
                return RoundDisposition::Continue;
            }
        };
        self.logger.log(&LogEvent::ExecutionCompleted {
            round,
            output_lines: output.line_count(),
            duration_secs: output.duration.as_secs_f64(),
        });

        debug!(round, "judging execution output");
        let verdict = match self.call_judge(ctx, bundle, &output).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(round, error = %e, "judge failed, round counts as not satisfied");
                self.absorb_failure(ctx, RoundStage::Judge, e.to_string(), Some(&output));
                return RoundDisposition::Continue;
            }
        };
        self.logger.log(&LogEvent::JudgeCompleted {
            round,
            verdict: verdict.short_description(),
        });

        if verdict.satisfied {
            // The bundle as judged is final; any patch fields alongside a
            // satisfied verdict are ignored.
            ctx.push_record(RoundRecord {
                round,
                execution_output: output.text,
                execution_secs: output.duration.as_secs_f64(),
                verdict: verdict.short_description(),
                descriptor_replaced: false,
                files_replaced: None,
                failure: None,
                timestamp: Utc::now(),
            });
            return RoundDisposition::Satisfied;
        }

        // A structurally invalid patch must never reach merge
        if let Err(e) = verdict.patch.validate() {
            warn!(round, error = %e, "rejecting structurally invalid patch");
            self.absorb_failure(ctx, RoundStage::Merge, e.to_string(), Some(&output));
            return RoundDisposition::Continue;
        }

        let descriptor_replaced = verdict.patch.build_descriptor.is_some();
        let files_replaced = verdict.patch.files.as_ref().map(Vec::len);
        *bundle = bundle.merge(&verdict.patch);

        if !verdict.patch.is_noop() {
            self.logger.log(&LogEvent::PatchApplied {
                round,
                descriptor_replaced,
                files_replaced,
            });
        }

        ctx.push_record(RoundRecord {
            round,
            execution_output: output.text,
            execution_secs: output.duration.as_secs_f64(),
            verdict: verdict.short_description(),
            descriptor_replaced,
            files_replaced,
            failure: None,
            timestamp: Utc::now(),
        });
        RoundDisposition::Continue
    }

    async fn call_propose(&self, ctx: &TaskContext) -> Result<Bundle, OracleError> {
        let bundle = match timeout(
            ctx.step_timeout,
            self.proposer.propose(&ctx.task, &ctx.criteria),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(OracleError::Timeout(ctx.step_timeout)),
        };
        bundle.validate()?;
        Ok(bundle)
    }

    async fn call_execute(
        &self,
        ctx: &TaskContext,
        bundle: &Bundle,
    ) -> Result<ExecutionOutput, SandboxError> {
        match timeout(ctx.step_timeout, self.backend.execute(bundle)).await {
            Ok(result) => result,
            Err(_) => Err(SandboxError::Timeout(ctx.step_timeout)),
        }
    }

    async fn call_judge(
        &self,
        ctx: &TaskContext,
        bundle: &Bundle,
        output: &ExecutionOutput,
    ) -> Result<Verdict, OracleError> {
        match timeout(
            ctx.step_timeout,
            self.judge.judge(bundle, output, &ctx.criteria),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(ctx.step_timeout)),
        }
    }

    /// Record a transient round failure as "not satisfied, no patch"
    fn absorb_failure(
        &self,
        ctx: &mut TaskContext,
        stage: RoundStage,
        error: String,
        output: Option<&ExecutionOutput>,
    ) {
        self.logger.log(&LogEvent::RoundFailure {
            round: ctx.round,
            stage,
            error: error.clone(),
        });
        ctx.push_record(RoundRecord {
            round: ctx.round,
            execution_output: output.map(|o| o.text.clone()).unwrap_or_default(),
            execution_secs: output.map(|o| o.duration.as_secs_f64()).unwrap_or(0.0),
            verdict: "NOT SATISFIED (no patch)".to_string(),
            descriptor_replaced: false,
            files_replaced: None,
            failure: Some(error),
            timestamp: Utc::now(),
        });
    }
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}
