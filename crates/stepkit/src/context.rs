//! Apply context and callback traits
//!
//! These traits keep the engine free of any particular UI or host
//! implementation.

use crate::error::LockContended;
use crate::lock::LockArbiter;
use crate::summary::RunSummary;
use crate::types::{Attempt, StepOutcome};
use anyhow::{Result, bail};
use log::debug;

/// Progress callback for pipeline execution
///
/// Implement this trait to receive progress updates during a run.
pub trait ProgressCallback {
    /// Called before a step's precondition is evaluated
    fn on_step_start(&mut self, index: usize, total: usize, name: &str);

    /// Called when a step finishes without aborting the run
    fn on_step_complete(&mut self, name: &str, outcome: &StepOutcome);

    /// Called when a critical step fails and its remediation starts
    fn on_remediation(&mut self, _name: &str, _error: &str) {}

    /// Called when a step aborts the run
    fn on_step_failed(&mut self, _name: &str, _error: &str) {}
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_step_start(&mut self, _index: usize, _total: usize, _name: &str) {}
    fn on_step_complete(&mut self, _name: &str, _outcome: &StepOutcome) {}
}

/// Context passed to step actions
pub struct ApplyContext<'a> {
    /// Name of the running step
    pub step: &'a str,
    /// Which attempt this is
    pub attempt: Attempt,
    /// Facts collected so far
    pub summary: &'a mut RunSummary,
    /// Present only for steps declared as package-mutating
    lock: Option<&'a LockArbiter>,
}

impl<'a> ApplyContext<'a> {
    pub fn new(
        step: &'a str,
        attempt: Attempt,
        summary: &'a mut RunSummary,
        lock: Option<&'a LockArbiter>,
    ) -> Self {
        Self {
            step,
            attempt,
            summary,
            lock,
        }
    }

    /// Run one mutating package operation once the package lock is free
    ///
    /// Each call waits on the arbiter separately; a grant covers one launch
    /// of `op`. If `op` fails with [`LockContended`] the arbiter is asked
    /// again, within the same budget, before the next launch.
    pub fn package_op<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let Some(lock) = self.lock else {
            bail!(
                "step '{}' performed a package operation but is not declared as mutating packages",
                self.step
            );
        };
        let mut grant = lock.acquire_or_wait()?;
        loop {
            debug!("{}: package lock free (waited {:?})", self.step, grant.waited);
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            match err.downcast_ref::<LockContended>() {
                Some(contended) => grant = lock.reacquire(contended, grant.waited)?,
                None => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockConfig, LockProbe};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    struct Held;

    impl LockProbe for Held {
        fn is_held(&self, _path: &Path) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_package_op_requires_declared_lock() {
        let mut summary = RunSummary::new();
        let ctx = ApplyContext::new("enable-web", Attempt::First, &mut summary, None);
        let err = ctx.package_op(|| Ok(())).unwrap_err();
        assert!(err.to_string().contains("not declared as mutating"));
    }

    struct Free;

    impl LockProbe for Free {
        fn is_held(&self, _path: &Path) -> Result<bool> {
            Ok(false)
        }
    }

    fn free_arbiter() -> LockArbiter {
        LockArbiter::new(
            LockConfig::new(
                vec![PathBuf::from("/var/lib/dpkg/lock-frontend")],
                Duration::from_millis(10),
                Duration::from_millis(30),
            ),
            Free,
        )
        .with_sleeper(|_| {})
    }

    fn contended() -> anyhow::Error {
        anyhow::Error::new(LockContended {
            resource: "Could not get lock /var/lib/dpkg/lock-frontend".to_string(),
        })
    }

    #[test]
    fn test_package_op_waits_again_after_contention() {
        let arbiter = free_arbiter();
        let mut summary = RunSummary::new();
        let ctx = ApplyContext::new("install", Attempt::First, &mut summary, Some(&arbiter));

        let mut launches = 0;
        let value = ctx
            .package_op(|| {
                launches += 1;
                if launches == 1 { Err(contended()) } else { Ok("done") }
            })
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(launches, 2);
    }

    #[test]
    fn test_package_op_contention_ends_in_lock_timeout() {
        let arbiter = free_arbiter();
        let mut summary = RunSummary::new();
        let ctx = ApplyContext::new("install", Attempt::First, &mut summary, Some(&arbiter));

        let mut launches = 0;
        let err = ctx
            .package_op(|| -> Result<()> {
                launches += 1;
                Err(contended())
            })
            .unwrap_err();
        let timeout = err.downcast_ref::<crate::error::LockTimeout>().unwrap();
        assert!(timeout.resource.contains("lock-frontend"));
        assert_eq!(timeout.waited, Duration::from_millis(30));
        // One launch per grant: at 0ms, 10ms, 20ms and 30ms
        assert_eq!(launches, 4);
    }

    #[test]
    fn test_package_op_other_errors_are_not_retried() {
        let arbiter = free_arbiter();
        let mut summary = RunSummary::new();
        let ctx = ApplyContext::new("install", Attempt::First, &mut summary, Some(&arbiter));

        let mut launches = 0;
        let err = ctx
            .package_op(|| -> Result<()> {
                launches += 1;
                anyhow::bail!("E: Unable to locate package php9.9-fpm")
            })
            .unwrap_err();
        assert!(err.to_string().contains("Unable to locate"));
        assert_eq!(launches, 1);
    }

    #[test]
    fn test_package_op_does_not_run_when_lock_times_out() {
        let arbiter = LockArbiter::new(
            LockConfig::new(
                vec![PathBuf::from("/var/lib/dpkg/lock")],
                Duration::from_millis(1),
                Duration::from_millis(3),
            ),
            Held,
        )
        .with_sleeper(|_| {});
        let mut summary = RunSummary::new();
        let ctx = ApplyContext::new("install", Attempt::First, &mut summary, Some(&arbiter));

        let mut ran = false;
        let err = ctx
            .package_op(|| {
                ran = true;
                Ok(())
            })
            .unwrap_err();
        assert!(!ran);
        assert!(err.downcast_ref::<crate::error::LockTimeout>().is_some());
    }
}
