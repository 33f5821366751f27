//! Resource lock arbiter
//!
//! Package managers serialize internally, so the arbiter only has to avoid
//! launching a mutating call while an unrelated process (unattended upgrades,
//! another admin session) holds the package database lock. It polls, sleeps a
//! fixed interval, and gives up after a hard budget.
//!
//! There is no release call: the underlying lock is taken and dropped by the
//! package tool itself for the duration of the single operation that follows.

use crate::error::{LockContended, LockTimeout};
use anyhow::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Smallest poll interval honoured, so a zero interval cannot spin forever
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Probe for whether another process holds a lock file
pub trait LockProbe: Send + Sync {
    fn is_held(&self, path: &Path) -> Result<bool>;
}

/// Where the lock lives and how long to wait for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// Lock identifiers; the resource is busy if any of them is held
    pub paths: Vec<PathBuf>,
    /// Sleep between polls
    pub poll_interval: Duration,
    /// Cumulative wait after which acquisition fails
    pub max_wait: Duration,
}

impl LockConfig {
    pub fn new(paths: Vec<PathBuf>, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            paths,
            poll_interval,
            max_wait,
        }
    }
}

/// Permission to launch exactly one mutating operation
#[must_use = "a grant covers the operation launched right after acquiring it"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockGrant {
    /// How long the caller waited before the resource was free
    pub waited: Duration,
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Poll-wait arbiter for a system-wide lock
pub struct LockArbiter {
    config: LockConfig,
    probe: Box<dyn LockProbe>,
    sleep: Sleeper,
}

impl LockArbiter {
    pub fn new(config: LockConfig, probe: impl LockProbe + 'static) -> Self {
        Self {
            config,
            probe: Box::new(probe),
            sleep: Box::new(thread::sleep),
        }
    }

    /// Replace the sleep function (tests use this to avoid real waiting)
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Wait until no configured lock is held, or fail after `max_wait`
    ///
    /// Returns immediately when the resource is free. The cumulative wait is
    /// the sum of poll intervals slept, so a permanently held lock fails after
    /// between `max_wait` and `max_wait + poll_interval`.
    pub fn acquire_or_wait(&self) -> std::result::Result<LockGrant, LockTimeout> {
        self.poll_from(Duration::ZERO)
    }

    /// Wait again after the package tool itself found the lock held
    ///
    /// `waited` is what the current operation has already spent; the budget
    /// is shared, so repeated contention still ends in [`LockTimeout`].
    /// Sleeps at least one interval, since the probe may not see the holder.
    pub fn reacquire(
        &self,
        contended: &LockContended,
        waited: Duration,
    ) -> std::result::Result<LockGrant, LockTimeout> {
        if waited >= self.config.max_wait {
            return Err(LockTimeout {
                resource: contended.resource.clone(),
                waited,
            });
        }
        info!("Package tool reported a held lock, backing off: {}", contended.resource);
        let interval = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        (self.sleep)(interval);
        self.poll_from(waited + interval)
    }

    fn poll_from(&self, start: Duration) -> std::result::Result<LockGrant, LockTimeout> {
        let interval = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        let mut waited = start;
        let mut announced = false;

        loop {
            let Some(holder) = self.held_path() else {
                if waited > start {
                    info!("Lock released after {waited:?}");
                }
                return Ok(LockGrant { waited });
            };

            if waited >= self.config.max_wait {
                return Err(LockTimeout {
                    resource: holder.display().to_string(),
                    waited,
                });
            }

            if !announced {
                info!(
                    "Waiting for {} (held by another process, up to {:?})",
                    holder.display(),
                    self.config.max_wait
                );
                announced = true;
            } else {
                debug!("{} still held after {waited:?}", holder.display());
            }

            (self.sleep)(interval);
            waited += interval;
        }
    }

    /// First configured path currently held, if any
    ///
    /// A probe that cannot answer is treated as free: the package tool refuses
    /// to run on a held lock anyway, so this never allows concurrent mutation.
    fn held_path(&self) -> Option<&Path> {
        self.config.paths.iter().map(PathBuf::as_path).find(|path| {
            match self.probe.is_held(path) {
                Ok(held) => held,
                Err(e) => {
                    warn!("Could not probe {}: {e:#}", path.display());
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::time::Instant;

    /// Held for the first `busy_polls` probes, then free
    struct CountdownProbe {
        busy_polls: u32,
        polls: Arc<AtomicU32>,
    }

    impl LockProbe for CountdownProbe {
        fn is_held(&self, _path: &Path) -> Result<bool> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(n < self.busy_polls)
        }
    }

    struct AlwaysHeld;

    impl LockProbe for AlwaysHeld {
        fn is_held(&self, _path: &Path) -> Result<bool> {
            Ok(true)
        }
    }

    struct BrokenProbe;

    impl LockProbe for BrokenProbe {
        fn is_held(&self, _path: &Path) -> Result<bool> {
            anyhow::bail!("permission denied")
        }
    }

    fn config(poll_ms: u64, max_ms: u64) -> LockConfig {
        LockConfig::new(
            vec![PathBuf::from("/var/lib/dpkg/lock-frontend")],
            Duration::from_millis(poll_ms),
            Duration::from_millis(max_ms),
        )
    }

    /// Sleeper that records the total time "slept" without sleeping
    fn recording_sleeper(total: Arc<AtomicU64>) -> impl Fn(Duration) + Send + Sync {
        move |d: Duration| {
            total.fetch_add(d.as_millis() as u64, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_free_lock_returns_immediately() {
        let slept = Arc::new(AtomicU64::new(0));
        let arbiter = LockArbiter::new(
            config(100, 1000),
            CountdownProbe {
                busy_polls: 0,
                polls: Arc::new(AtomicU32::new(0)),
            },
        )
        .with_sleeper(recording_sleeper(slept.clone()));

        let grant = arbiter.acquire_or_wait().unwrap();
        assert_eq!(grant.waited, Duration::ZERO);
        assert_eq!(slept.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_waits_until_released() {
        let slept = Arc::new(AtomicU64::new(0));
        let polls = Arc::new(AtomicU32::new(0));
        let arbiter = LockArbiter::new(
            config(100, 1000),
            CountdownProbe {
                busy_polls: 3,
                polls: polls.clone(),
            },
        )
        .with_sleeper(recording_sleeper(slept.clone()));

        let grant = arbiter.acquire_or_wait().unwrap();
        assert_eq!(grant.waited, Duration::from_millis(300));
        assert_eq!(slept.load(Ordering::SeqCst), 300);
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_permanently_held_times_out_within_one_interval() {
        let slept = Arc::new(AtomicU64::new(0));
        let arbiter = LockArbiter::new(config(100, 1000), AlwaysHeld)
            .with_sleeper(recording_sleeper(slept.clone()));

        let err = arbiter.acquire_or_wait().unwrap_err();
        let timeout = Duration::from_millis(1000);
        let poll = Duration::from_millis(100);
        assert!(err.waited >= timeout - poll);
        assert!(err.waited <= timeout + poll);
        assert_eq!(err.resource, "/var/lib/dpkg/lock-frontend");
    }

    #[test]
    fn test_timeout_with_uneven_interval_stays_in_bound() {
        let arbiter = LockArbiter::new(config(300, 1000), AlwaysHeld).with_sleeper(|_| {});

        let err = arbiter.acquire_or_wait().unwrap_err();
        assert!(err.waited >= Duration::from_millis(700));
        assert!(err.waited <= Duration::from_millis(1300));
    }

    #[test]
    fn test_real_sleep_waits_at_least_budget_minus_interval() {
        let arbiter = LockArbiter::new(config(5, 50), AlwaysHeld);

        let start = Instant::now();
        let err = arbiter.acquire_or_wait().unwrap_err();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(45));
        assert!(err.waited >= Duration::from_millis(45));
        assert!(err.waited <= Duration::from_millis(55));
    }

    #[test]
    fn test_any_held_path_blocks() {
        struct SecondHeld;
        impl LockProbe for SecondHeld {
            fn is_held(&self, path: &Path) -> Result<bool> {
                Ok(path.ends_with("lock"))
            }
        }

        let cfg = LockConfig::new(
            vec![
                PathBuf::from("/var/lib/dpkg/lock-frontend"),
                PathBuf::from("/var/lib/dpkg/lock"),
            ],
            Duration::from_millis(10),
            Duration::from_millis(20),
        );
        let err = LockArbiter::new(cfg, SecondHeld)
            .with_sleeper(|_| {})
            .acquire_or_wait()
            .unwrap_err();
        assert_eq!(err.resource, "/var/lib/dpkg/lock");
    }

    #[test]
    fn test_probe_error_counts_as_free() {
        let grant = LockArbiter::new(config(10, 20), BrokenProbe)
            .with_sleeper(|_| {})
            .acquire_or_wait()
            .unwrap();
        assert_eq!(grant.waited, Duration::ZERO);
    }

    #[test]
    fn test_reacquire_backs_off_even_when_probe_sees_nothing() {
        let slept = Arc::new(AtomicU64::new(0));
        let arbiter = LockArbiter::new(
            config(100, 1000),
            CountdownProbe {
                busy_polls: 0,
                polls: Arc::new(AtomicU32::new(0)),
            },
        )
        .with_sleeper(recording_sleeper(slept.clone()));
        let contended = LockContended {
            resource: "Could not get lock /var/lib/dpkg/lock-frontend".to_string(),
        };

        let grant = arbiter.reacquire(&contended, Duration::from_millis(200)).unwrap();
        assert_eq!(slept.load(Ordering::SeqCst), 100);
        assert_eq!(grant.waited, Duration::from_millis(300));
    }

    #[test]
    fn test_reacquire_shares_the_budget() {
        let arbiter = LockArbiter::new(
            config(100, 1000),
            CountdownProbe {
                busy_polls: 0,
                polls: Arc::new(AtomicU32::new(0)),
            },
        )
        .with_sleeper(|_| {});
        let contended = LockContended {
            resource: "Could not get lock /var/lib/dpkg/lock".to_string(),
        };

        let err = arbiter.reacquire(&contended, Duration::from_millis(1000)).unwrap_err();
        assert_eq!(err.resource, contended.resource);
        assert_eq!(err.waited, Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_interval_does_not_spin_forever() {
        let err = LockArbiter::new(config(0, 5), AlwaysHeld)
            .with_sleeper(|_| {})
            .acquire_or_wait()
            .unwrap_err();
        assert!(err.waited >= Duration::from_millis(5));
    }
}
