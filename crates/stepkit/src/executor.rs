//! Pipeline executor - runs steps strictly in order
//!
//! Later steps depend on the side effects of earlier ones (a repository must
//! be registered before its packages install, a proxy must exist before its
//! config is patched), so there is no reordering and no parallelism.

use crate::context::{ApplyContext, NoProgress, ProgressCallback};
use crate::error::{PipelineError, chain_message};
use crate::lock::LockArbiter;
use crate::oracle::{self, Oracle};
use crate::step::Step;
use crate::summary::RunSummary;
use crate::types::{Attempt, StepOutcome, StepReport};
use anyhow::bail;
use log::{error, info, warn};
use serde::Serialize;

/// Result of a completed pipeline run
#[derive(Debug, Default)]
pub struct RunReport {
    /// One entry per step, in execution order
    pub steps: Vec<StepReport>,
    /// Facts accumulated during the run
    pub summary: RunSummary,
}

impl RunReport {
    /// Number of steps that changed the system
    pub fn changed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_change()).count()
    }

    /// Number of steps skipped because they were already satisfied
    pub fn skipped(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Skipped { .. }))
            .count()
    }

    /// Non-critical failures
    pub fn warnings(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Warned { .. }))
            .collect()
    }

    /// Whether every step was a no-op
    pub fn is_noop(&self) -> bool {
        self.skipped() == self.steps.len()
    }
}

/// Read-only view of one step's precondition
#[derive(Debug, Clone, Serialize)]
pub struct StepStatus {
    pub name: String,
    pub check: String,
    pub satisfied: bool,
    pub critical: bool,
}

/// Run a pipeline to completion or to its first unrecoverable failure
///
/// # Arguments
/// * `steps` - Steps in dependency order
/// * `oracle` - Idempotency oracle for pre- and postconditions
/// * `lock` - Arbiter for the shared package lock
/// * `progress` - Progress callback
///
/// # Returns
/// The run report, or the error of the step that aborted the run
pub fn run<P: ProgressCallback>(
    steps: &[Step],
    oracle: &dyn Oracle,
    lock: &LockArbiter,
    progress: &mut P,
) -> Result<RunReport, PipelineError> {
    let mut report = RunReport::default();
    let total = steps.len();

    for (index, step) in steps.iter().enumerate() {
        progress.on_step_start(index + 1, total, step.name());

        let outcome = match run_step(step, oracle, lock, &mut report.summary, progress) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{e}");
                progress.on_step_failed(step.name(), &e.to_string());
                return Err(e);
            }
        };

        if outcome.is_satisfied() {
            step.action().record(&mut report.summary);
        }

        progress.on_step_complete(step.name(), &outcome);
        report.steps.push(StepReport {
            name: step.name().to_string(),
            outcome,
        });
    }

    info!(
        "Pipeline finished: {} changed, {} skipped, {} warnings",
        report.changed(),
        report.skipped(),
        report.warnings().len()
    );
    Ok(report)
}

/// Run without progress reporting
pub fn run_simple(
    steps: &[Step],
    oracle: &dyn Oracle,
    lock: &LockArbiter,
) -> Result<RunReport, PipelineError> {
    run(steps, oracle, lock, &mut NoProgress)
}

/// Evaluate every precondition without applying anything
pub fn status(steps: &[Step], oracle: &dyn Oracle) -> Vec<StepStatus> {
    steps
        .iter()
        .map(|step| StepStatus {
            name: step.name().to_string(),
            check: step.precondition().to_string(),
            satisfied: oracle::check(oracle, step.precondition()),
            critical: step.is_critical(),
        })
        .collect()
}

fn run_step<P: ProgressCallback>(
    step: &Step,
    oracle: &dyn Oracle,
    lock: &LockArbiter,
    summary: &mut RunSummary,
    progress: &mut P,
) -> Result<StepOutcome, PipelineError> {
    if oracle::check(oracle, step.precondition()) {
        info!("{}: already satisfied ({})", step.name(), step.precondition());
        return Ok(StepOutcome::Skipped {
            reason: step.precondition().to_string(),
        });
    }

    let lock = step.mutates_packages().then_some(lock);

    let err = match attempt(step, Attempt::First, oracle, lock, summary) {
        Ok(()) => return Ok(StepOutcome::Applied),
        Err(e) => e,
    };
    if let Some(abort) = PipelineError::from_abort(step.name(), &err) {
        return Err(abort);
    }
    let message = chain_message(&err);

    if !step.is_critical() {
        warn!("{}: optional step failed, continuing: {message}", step.name());
        return Ok(StepOutcome::Warned { error: message });
    }

    let Some(recovery) = step.recovery() else {
        return Err(PipelineError::FatalStepFailure {
            step: step.name().to_string(),
            message,
        });
    };

    warn!(
        "{}: attempt 1 failed ({message}); remediating: {}",
        step.name(),
        recovery.description()
    );
    progress.on_remediation(step.name(), &message);

    let mut ctx = ApplyContext::new(step.name(), Attempt::AfterRemediation, summary, lock);
    if let Err(e) = recovery.remediate(&mut ctx) {
        return Err(
            PipelineError::from_abort(step.name(), &e).unwrap_or_else(|| {
                PipelineError::RecoveryExhausted {
                    step: step.name().to_string(),
                    attempts: Attempt::First.number(),
                    message: format!("remediation failed: {}", chain_message(&e)),
                }
            }),
        );
    }

    match attempt(step, Attempt::AfterRemediation, oracle, lock, summary) {
        Ok(()) => Ok(StepOutcome::Recovered {
            attempts: Attempt::AfterRemediation.number(),
        }),
        Err(e) => Err(PipelineError::from_abort(step.name(), &e).unwrap_or_else(|| {
            PipelineError::RecoveryExhausted {
                step: step.name().to_string(),
                attempts: Attempt::AfterRemediation.number(),
                message: chain_message(&e),
            }
        })),
    }
}

/// Apply once and verify the postcondition
fn attempt(
    step: &Step,
    attempt: Attempt,
    oracle: &dyn Oracle,
    lock: Option<&LockArbiter>,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    let mut ctx = ApplyContext::new(step.name(), attempt, summary, lock);
    step.action().apply(&mut ctx)?;

    if !oracle::check(oracle, step.postcondition()) {
        bail!("postcondition not met after apply: {}", step.postcondition());
    }
    Ok(())
}
