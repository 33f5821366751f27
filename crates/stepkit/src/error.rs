//! Error types for pipeline execution
//!
//! Actions return `anyhow::Result`. Two typed errors carry special meaning
//! when they appear anywhere in an action's error chain:
//!
//! - [`LockTimeout`]: the shared package lock stayed held past its budget
//! - [`ValidationFailed`]: a generated configuration was rejected by its
//!   consumer's validator
//!
//! Both abort the pipeline regardless of whether the step is critical.

use std::time::Duration;
use thiserror::Error;

/// The shared resource stayed held by another process for too long
#[derive(Debug, Clone, Error)]
#[error("{resource} still held after waiting {waited:?}")]
pub struct LockTimeout {
    /// Lock identifier that was observed held last
    pub resource: String,
    /// Cumulative time spent waiting
    pub waited: Duration,
}

/// The package tool ran but found the lock held by another process
///
/// Returned from inside [`ApplyContext::package_op`](crate::ApplyContext::package_op)
/// so the arbiter waits again instead of the step failing.
#[derive(Debug, Clone, Error)]
#[error("lock held by another process: {resource}")]
pub struct LockContended {
    /// What the package tool reported as held
    pub resource: String,
}

/// A configuration artifact failed validation
#[derive(Debug, Clone, Error)]
#[error("{target} failed validation: {message}")]
pub struct ValidationFailed {
    /// The artifact that was validated
    pub target: String,
    /// Validator output
    pub message: String,
}

/// Errors that end a pipeline run
///
/// Every variant names the step that was running.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Waiting for the package lock exceeded its budget
    #[error("step '{step}': timed out waiting for {resource} ({waited:?})")]
    LockTimeout {
        step: String,
        resource: String,
        waited: Duration,
    },

    /// A critical step without a recovery policy failed
    #[error("step '{step}' failed: {message}")]
    FatalStepFailure { step: String, message: String },

    /// A critical step failed again after its single remediation
    #[error("step '{step}' failed after {attempts} attempts: {message}")]
    RecoveryExhausted {
        step: String,
        attempts: u32,
        message: String,
    },

    /// A generated configuration was rejected, nothing was reloaded
    #[error("step '{step}': configuration validation failed: {message}")]
    ConfigValidationFailed { step: String, message: String },
}

impl PipelineError {
    /// Name of the step that ended the run
    pub fn step(&self) -> &str {
        match self {
            Self::LockTimeout { step, .. }
            | Self::FatalStepFailure { step, .. }
            | Self::RecoveryExhausted { step, .. }
            | Self::ConfigValidationFailed { step, .. } => step,
        }
    }

    /// Classify an action error that always aborts, if it is one
    pub(crate) fn from_abort(step: &str, err: &anyhow::Error) -> Option<Self> {
        if let Some(timeout) = err.downcast_ref::<LockTimeout>() {
            return Some(Self::LockTimeout {
                step: step.to_string(),
                resource: timeout.resource.clone(),
                waited: timeout.waited,
            });
        }
        if let Some(invalid) = err.downcast_ref::<ValidationFailed>() {
            return Some(Self::ConfigValidationFailed {
                step: step.to_string(),
                message: invalid.to_string(),
            });
        }
        None
    }
}

/// Render an error with its full context chain on one line
pub fn chain_message(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
