use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use forgeloop_core::{
    Bundle, BundleFile, Controller, ExecutionBackend, ExecutionOutput, JudgeOracle, OracleError,
    Patch, ProposeOracle, SandboxError, TaskContext, TaskOutcome, Verdict,
};
use forgeloop_logging::{LogFormat, Logger};

fn b0() -> Bundle {
    Bundle::new(
        "FROM python:3.10-slim",
        vec![
            BundleFile::new("readme.md", "# plan"),
            BundleFile::new("main.py", "print('hi')"),
        ],
    )
}

fn logger() -> Arc<Logger> {
    Arc::new(Logger::new(LogFormat::Compact))
}

fn ctx(max_rounds: usize) -> TaskContext {
    TaskContext::new("print hi".into(), "stdout contains hi".into())
        .with_max_rounds(max_rounds)
        .with_step_timeout(Duration::from_millis(100))
}

// ============================================================
// Fakes
// ============================================================

enum ProposeBehavior {
    Return(Bundle),
    Fail,
    Hang,
}

struct ScriptedProposer {
    behavior: ProposeBehavior,
    calls: AtomicUsize,
}

impl ScriptedProposer {
    fn returning(bundle: Bundle) -> Self {
        Self {
            behavior: ProposeBehavior::Return(bundle),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            behavior: ProposeBehavior::Fail,
            calls: AtomicUsize::new(0),
        }
    }

    fn hanging() -> Self {
        Self {
            behavior: ProposeBehavior::Hang,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProposeOracle for ScriptedProposer {
    async fn propose(&self, _task: &str, _criteria: &str) -> Result<Bundle, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ProposeBehavior::Return(bundle) => Ok(bundle.clone()),
            ProposeBehavior::Fail => Err(OracleError::Refused("model declined".into())),
            ProposeBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!("the controller deadline fires first")
            }
        }
    }
}

struct ScriptedBackend {
    /// 1-based call number that hangs past the step deadline
    hang_on: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self {
            hang_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn hanging_on(call: usize) -> Self {
        Self {
            hang_on: Some(call),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn execute(&self, _bundle: &Bundle) -> Result<ExecutionOutput, SandboxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang_on == Some(call) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(ExecutionOutput::new(
            "fail".to_string(),
            Duration::from_millis(5),
        ))
    }
}

struct ScriptedJudge {
    script: Mutex<VecDeque<Result<Verdict, OracleError>>>,
    calls: AtomicUsize,
}

impl ScriptedJudge {
    fn new(script: Vec<Result<Verdict, OracleError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn always_unsatisfied() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl JudgeOracle for ScriptedJudge {
    async fn judge(
        &self,
        _bundle: &Bundle,
        _output: &ExecutionOutput,
        _criteria: &str,
    ) -> Result<Verdict, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            // An exhausted script keeps answering "not satisfied, no patch"
            .unwrap_or_else(|| Ok(Verdict::default()))
    }
}

fn satisfied() -> Result<Verdict, OracleError> {
    Ok(Verdict {
        satisfied: true,
        patch: Patch::default(),
    })
}

fn unsatisfied_with(patch: Patch) -> Result<Verdict, OracleError> {
    Ok(Verdict {
        satisfied: false,
        patch,
    })
}

// ============================================================
// Scenarios
// ============================================================

#[tokio::test]
async fn test_satisfaction_short_circuits() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::new(vec![satisfied()]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    match outcome {
        TaskOutcome::Success { bundle, rounds, .. } => {
            assert_eq!(bundle, b0());
            assert_eq!(rounds, 1);
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_patch_accompanying_satisfied_verdict_is_ignored() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::new(vec![Ok(Verdict {
        satisfied: true,
        patch: Patch {
            build_descriptor: Some("MUST NOT APPLY".into()),
            files: Some(vec![]),
        },
    })]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    // The bundle at the moment of satisfaction is authoritative
    match outcome {
        TaskOutcome::Success { bundle, .. } => assert_eq!(bundle, b0()),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_descriptor_patch_then_exhausted() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::new(vec![unsatisfied_with(Patch {
        build_descriptor: Some("X".into()),
        files: None,
    })]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(1)).await;

    match outcome {
        TaskOutcome::Exhausted { bundle, rounds, .. } => {
            assert_eq!(rounds, 1);
            assert_eq!(bundle.build_descriptor, "X");
            assert_eq!(bundle.files, b0().files);
        }
        other => panic!("expected exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_proposal_failure_is_fatal_and_skips_rounds() {
    let proposer = ScriptedProposer::failing();
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::always_unsatisfied();
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    assert!(matches!(outcome, TaskOutcome::ProposalFailed { .. }));
    assert_eq!(proposer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_proposal_timeout_is_fatal() {
    let proposer = ScriptedProposer::hanging();
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::always_unsatisfied();
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    match outcome {
        TaskOutcome::ProposalFailed { error, .. } => {
            assert!(error.contains("timed out"), "unexpected error: {}", error);
        }
        other => panic!("expected proposal failure, got {:?}", other),
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_incomplete_proposal_is_fatal() {
    let proposer = ScriptedProposer::returning(Bundle::new("", vec![]));
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::always_unsatisfied();
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    assert!(matches!(outcome, TaskOutcome::ProposalFailed { .. }));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_execute_timeout_consumes_round_and_keeps_bundle() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::hanging_on(1);
    let judge = ScriptedJudge::new(vec![satisfied()]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    // Round 1 times out and is absorbed; round 2 runs normally
    match outcome {
        TaskOutcome::Success {
            bundle,
            rounds,
            history,
            ..
        } => {
            assert_eq!(rounds, 2);
            assert_eq!(bundle, b0());
            assert_eq!(history.len(), 2);
            assert!(history[0].failure.is_some());
            assert!(history[1].failure.is_none());
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    // The judge never saw the timed-out round
    assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_judge_failure_absorbed_as_unsatisfied_round() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::new(vec![
        Err(OracleError::Malformed("no verdict found".into())),
        satisfied(),
    ]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    match outcome {
        TaskOutcome::Success {
            bundle,
            rounds,
            history,
            ..
        } => {
            assert_eq!(rounds, 2);
            assert_eq!(bundle, b0());
            assert!(history[0].failure.is_some());
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_termination_bound_under_constant_refusal() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::always_unsatisfied();
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(4)).await;

    match outcome {
        TaskOutcome::Exhausted {
            bundle,
            rounds,
            history,
            ..
        } => {
            assert_eq!(rounds, 4);
            assert_eq!(history.len(), 4);
            assert_eq!(bundle, b0());
        }
        other => panic!("expected exhausted, got {:?}", other),
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_invalid_patch_is_rejected_before_merge() {
    let duplicate = Patch {
        build_descriptor: Some("SHOULD NOT APPLY".into()),
        files: Some(vec![
            BundleFile::new("a.txt", "1"),
            BundleFile::new("a.txt", "2"),
        ]),
    };
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::new(vec![unsatisfied_with(duplicate), satisfied()]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;

    match outcome {
        TaskOutcome::Success {
            bundle, history, ..
        } => {
            // Nothing from the invalid patch reached the bundle
            assert_eq!(bundle, b0());
            assert!(history[0]
                .failure
                .as_deref()
                .unwrap()
                .contains("duplicate file path"));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_files_cleared_by_empty_patch() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::new(vec![unsatisfied_with(Patch {
        build_descriptor: None,
        files: Some(vec![]),
    })]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(1)).await;

    match outcome {
        TaskOutcome::Exhausted { bundle, .. } => {
            assert_eq!(bundle.build_descriptor, b0().build_descriptor);
            assert!(bundle.files.is_empty());
        }
        other => panic!("expected exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_interrupt_observed_at_round_boundary() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::always_unsatisfied();
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    controller
        .interrupt_handle()
        .store(true, Ordering::SeqCst);
    let outcome = controller.run(ctx(5)).await;

    match outcome {
        TaskOutcome::Interrupted { bundle, rounds, .. } => {
            assert_eq!(bundle, b0());
            assert_eq!(rounds, 0);
        }
        other => panic!("expected interrupted, got {:?}", other),
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exit_codes() {
    let proposer = ScriptedProposer::returning(b0());
    let backend = ScriptedBackend::new();
    let judge = ScriptedJudge::new(vec![satisfied()]);
    let controller = Controller::new(&proposer, &judge, &backend, logger());

    let outcome = controller.run(ctx(5)).await;
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.is_success());

    let proposer = ScriptedProposer::failing();
    let judge = ScriptedJudge::always_unsatisfied();
    let backend = ScriptedBackend::new();
    let controller = Controller::new(&proposer, &judge, &backend, logger());
    let outcome = controller.run(ctx(5)).await;
    assert_eq!(outcome.exit_code(), 2);
    assert!(outcome.final_bundle().is_none());
}
