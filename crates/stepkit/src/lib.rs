//! # stepkit
//!
//! Idempotent step orchestration for one-shot host provisioning.
//!
//! A pipeline is an ordered list of [`Step`]s. Each step is guarded by a
//! [`Precondition`] that an [`Oracle`] evaluates against live system state;
//! a step whose precondition already holds is skipped, so every run is safe
//! to repeat after a partial failure.
//!
//! ## Core Concepts
//!
//! - **Step**: a named [`Action`] with a precondition and a postcondition
//! - **Oracle**: answers "is this already done?" without side effects
//! - **LockArbiter**: waits for a shared package lock before each mutating call
//! - **Recovery**: one destructive remediation followed by exactly one retry
//! - **Patch**: at-most-once insertion of a block into a config file
//! - **RunSummary**: facts collected during the run, returned to the caller
//!
//! ## Example
//!
//! ```ignore
//! use stepkit::{Action, ApplyContext, Precondition, Step, run_simple};
//!
//! #[derive(Debug)]
//! struct InstallNginx;
//!
//! impl Action for InstallNginx {
//!     fn apply(&self, ctx: &mut ApplyContext) -> anyhow::Result<()> {
//!         ctx.package_op(|| apt_install("nginx"))
//!     }
//! }
//!
//! let steps = vec![
//!     Step::new("install-web-server", Precondition::package("nginx"), InstallNginx)
//!         .mutating_packages(),
//! ];
//! let report = run_simple(&steps, &oracle, &arbiter)?;
//! ```
//!
//! ## Failure handling
//!
//! - Non-critical step fails: logged, the run continues
//! - Critical step fails: the run aborts with [`PipelineError::FatalStepFailure`]
//! - Critical step with a [`Recovery`] fails: remediate, retry once, then
//!   [`PipelineError::RecoveryExhausted`]
//! - [`LockTimeout`] or [`ValidationFailed`] anywhere: the run aborts
//! - [`LockContended`] inside a package operation: wait on the arbiter again,
//!   sharing the same budget, then run the operation again

pub mod context;
pub mod error;
pub mod executor;
pub mod lock;
pub mod oracle;
pub mod patch;
pub mod step;
pub mod summary;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use error::{LockContended, LockTimeout, PipelineError, ValidationFailed};
pub use executor::{RunReport, StepStatus, run, run_simple, status};
pub use lock::{LockArbiter, LockConfig, LockGrant, LockProbe};
pub use oracle::Oracle;
pub use patch::{Anchor, PatchOutcome, patch};
pub use step::{Action, Recovery, Step};
pub use summary::{Credential, RunSummary, Secret};
pub use types::{Attempt, CommandOutput, Precondition, StepOutcome, StepReport};
