//! Readiness prober - bounded polling of a freshly provisioned target
//!
//! The prober never blocks longer than `interval × max_attempts`. Running out
//! of attempts is reported, not raised: the sequencer turns it into a warning
//! and lets the configuration engine's own connection retries decide.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

use crate::types::Target;

/// Fixed-interval retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 30,
        }
    }
}

impl RetryPolicy {
    /// Create a policy; at least one attempt is always made.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_secs(interval_seconds: u64, max_attempts: u32) -> Self {
        Self::new(Duration::from_secs(interval_seconds), max_attempts)
    }

    /// Upper bound on how long a wait may block
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// State of one readiness wait; lives only as long as its stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessCheck {
    pub target: Target,
    pub policy: RetryPolicy,
    pub attempts_made: u32,
}

impl ReadinessCheck {
    pub fn new(target: Target, policy: RetryPolicy) -> Self {
        Self {
            target,
            policy,
            attempts_made: 0,
        }
    }
}

/// Result of a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessOutcome {
    pub ready: bool,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// A lightweight liveness check against a target
pub trait Probe {
    /// Return true when the target answers within `timeout`
    fn probe(&self, target: &Target, timeout: Duration) -> bool;
}

/// Time source for the poll loop
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

/// Wall clock
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Clock that only advances when slept on
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Polls a target until a probe succeeds or the policy is exhausted
pub struct ReadinessProber<'a> {
    probe: &'a dyn Probe,
    clock: &'a dyn Clock,
}

impl<'a> ReadinessProber<'a> {
    pub fn new(probe: &'a dyn Probe, clock: &'a dyn Clock) -> Self {
        Self { probe, clock }
    }

    /// Probe until ready or out of attempts, calling `on_attempt` after each probe
    pub fn wait(
        &self,
        check: &mut ReadinessCheck,
        on_attempt: &mut dyn FnMut(&ReadinessCheck, bool),
    ) -> ReadinessOutcome {
        let budget = check.policy.budget();
        let started = self.clock.now();
        let spent = || self.clock.now().saturating_sub(started);

        loop {
            let remaining = budget.saturating_sub(spent());
            if check.attempts_made > 0 && remaining.is_zero() {
                break;
            }
            check.attempts_made += 1;
            let ready = self.probe.probe(&check.target, remaining);
            log::debug!(
                "probe {}/{} against {}: {}",
                check.attempts_made,
                check.policy.max_attempts,
                check.target,
                if ready { "ready" } else { "not ready" }
            );
            on_attempt(check, ready);

            if ready {
                return ReadinessOutcome {
                    ready: true,
                    attempts: check.attempts_made,
                    elapsed: spent(),
                };
            }

            if check.attempts_made >= check.policy.max_attempts {
                break;
            }

            self.clock
                .sleep(check.policy.interval.min(budget.saturating_sub(spent())));
        }

        ReadinessOutcome {
            ready: false,
            attempts: check.attempts_made,
            elapsed: spent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProbe;

    fn target() -> Target {
        Target {
            host: "203.0.113.10".into(),
            principal: "ops".into(),
        }
    }

    #[test]
    fn test_exhaustion_after_exact_attempts() {
        let probe = ScriptedProbe::always(false);
        let clock = ManualClock::new();
        let prober = ReadinessProber::new(&probe, &clock);
        let mut check = ReadinessCheck::new(target(), RetryPolicy::from_secs(5, 3));

        let outcome = prober.wait(&mut check, &mut |_, _| {});

        assert!(!outcome.ready);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(probe.calls(), 3);
        assert!(outcome.elapsed >= Duration::from_secs(10));
        assert!(outcome.elapsed <= Duration::from_secs(15));
    }

    #[test]
    fn test_returns_immediately_when_ready() {
        let probe = ScriptedProbe::sequence(&[false, true]);
        let clock = ManualClock::new();
        let prober = ReadinessProber::new(&probe, &clock);
        let mut check = ReadinessCheck::new(target(), RetryPolicy::from_secs(5, 10));

        let outcome = prober.wait(&mut check, &mut |_, _| {});

        assert!(outcome.ready);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.elapsed, Duration::from_secs(5));
    }

    /// Probe that burns clock time, bounded by the timeout it is given
    struct SlowProbe<'a> {
        clock: &'a ManualClock,
        cost: Duration,
    }

    impl Probe for SlowProbe<'_> {
        fn probe(&self, _target: &Target, timeout: Duration) -> bool {
            self.clock.advance(self.cost.min(timeout));
            false
        }
    }

    #[test]
    fn test_slow_probes_count_against_budget() {
        let clock = ManualClock::new();
        let probe = SlowProbe {
            clock: &clock,
            cost: Duration::from_secs(4),
        };
        let prober = ReadinessProber::new(&probe, &clock);
        let mut check = ReadinessCheck::new(target(), RetryPolicy::from_secs(5, 3));

        let outcome = prober.wait(&mut check, &mut |_, _| {});

        assert!(!outcome.ready);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.elapsed, check.policy.budget());
    }

    #[test]
    fn test_probe_timeout_never_exceeds_remaining_budget() {
        let probe = ScriptedProbe::always(false);
        let clock = ManualClock::new();
        let prober = ReadinessProber::new(&probe, &clock);
        let mut check = ReadinessCheck::new(target(), RetryPolicy::from_secs(5, 3));

        prober.wait(&mut check, &mut |_, _| {});

        let timeouts = probe.timeouts();
        assert_eq!(
            timeouts,
            vec![
                Duration::from_secs(15),
                Duration::from_secs(10),
                Duration::from_secs(5)
            ]
        );
    }

    #[test]
    fn test_callback_sees_every_attempt() {
        let probe = ScriptedProbe::always(false);
        let clock = ManualClock::new();
        let prober = ReadinessProber::new(&probe, &clock);
        let mut check = ReadinessCheck::new(target(), RetryPolicy::from_secs(1, 4));

        let mut seen = Vec::new();
        prober.wait(&mut check, &mut |c, ready| seen.push((c.attempts_made, ready)));

        assert_eq!(seen, vec![(1, false), (2, false), (3, false), (4, false)]);
    }

    #[test]
    fn test_zero_attempts_still_probes_once() {
        let policy = RetryPolicy::from_secs(5, 0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.budget(), Duration::from_secs(5));
    }
}
