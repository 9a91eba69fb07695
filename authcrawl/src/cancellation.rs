//! Cooperative cancellation for long-running fetch loops.
//!
//! The bridge turns an externally owned liveness check into a uniform,
//! pollable break signal. Control flow is explicit: every poll returns a
//! status value the loop can inspect, and the original failure detail is
//! latched so the caller can re-surface it after unwinding.

use std::time::Duration;

use tracing::debug;

use crate::errors::{CrawlError, ServiceInterruption};

/// Suggested interval between liveness polls.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_millis(1000);

/// What the external liveness source reports when consulted.
#[derive(Debug)]
pub enum ProbeStatus {
    /// The controlling job still wants this work.
    Active,
    /// The job is inactive for a transient reason; the work should be
    /// rescheduled.
    Interrupted(ServiceInterruption),
    /// The liveness source failed in a way that is not worth retrying.
    Failed(CrawlError),
    /// The controlling thread should stop immediately.
    Stop,
}

/// The external liveness check consumed by the bridge.
///
/// Must only ever be consulted from the single controller thread driving
/// the loop; consulting it concurrently is undefined by contract.
#[cfg_attr(test, mockall::automock)]
pub trait ActivityProbe {
    /// Asks whether the controlling job still wants this work.
    fn check_still_active(&mut self) -> ProbeStatus;
}

/// What one poll tells the loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keep working; poll again no sooner than the suggested interval.
    Continue {
        /// Suggested re-poll interval.
        recheck_after: Duration,
    },
    /// Unwind the loop, then call [`CancellationBridge::rethrow`] to
    /// surface the latched cause.
    BreakRequested,
    /// Stop immediately; nothing is latched.
    Cancelled,
}

/// The latched reason behind a break request.
#[derive(Debug)]
enum BreakCause {
    Transient(ServiceInterruption),
    Fatal(CrawlError),
}

/// State of the loop a bridge serves, as the loop tracks it.
///
/// Transitions are forward-only: once the state leaves `Running` it never
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancellationState {
    /// The loop is making progress.
    #[default]
    Running,
    /// A break was requested; the loop is unwinding.
    BreakRequested,
    /// A transient interruption was surfaced.
    Interrupted,
    /// A fatal failure was surfaced.
    Failed,
    /// A thread-level stop was surfaced.
    Cancelled,
}

impl CancellationState {
    /// Moves to a later state; backward transitions are ignored.
    pub fn advance(&mut self, next: CancellationState) {
        if (next as u8) > (*self as u8) {
            *self = next;
        }
    }

    /// Returns true once the loop may no longer continue.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Wraps an [`ActivityProbe`] into a pollable break signal with a latch
/// for the original cause.
#[derive(Debug)]
pub struct CancellationBridge<P> {
    probe: P,
    latched: Option<BreakCause>,
    recheck_after: Duration,
}

impl<P: ActivityProbe> CancellationBridge<P> {
    /// Creates a bridge over the given probe.
    #[must_use]
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            latched: None,
            recheck_after: DEFAULT_RECHECK_INTERVAL,
        }
    }

    /// Overrides the suggested re-poll interval.
    #[must_use]
    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_after = interval;
        self
    }

    /// Consults the liveness source.
    ///
    /// On a transient or fatal external condition the original cause is
    /// latched and a generic break is returned; the caller unwinds and
    /// then calls [`rethrow`]. A thread-stop condition returns
    /// [`PollOutcome::Cancelled`] directly, with nothing latched.
    ///
    /// [`rethrow`]: CancellationBridge::rethrow
    pub fn poll(&mut self) -> PollOutcome {
        match self.probe.check_still_active() {
            ProbeStatus::Active => PollOutcome::Continue {
                recheck_after: self.recheck_after,
            },
            ProbeStatus::Interrupted(cause) => {
                debug!(%cause, "break requested by transient interruption");
                self.latched = Some(BreakCause::Transient(cause));
                PollOutcome::BreakRequested
            }
            ProbeStatus::Failed(cause) => {
                debug!(%cause, "break requested by fatal failure");
                self.latched = Some(BreakCause::Fatal(cause));
                PollOutcome::BreakRequested
            }
            ProbeStatus::Stop => PollOutcome::Cancelled,
        }
    }

    /// Re-raises whichever cause was latched by the poll that requested
    /// the break. Ok when nothing is latched.
    ///
    /// # Errors
    ///
    /// The latched transient interruption or fatal failure, exactly as the
    /// liveness source reported it.
    pub fn rethrow(&mut self) -> Result<(), CrawlError> {
        match self.latched.take() {
            Some(BreakCause::Transient(cause)) => Err(CrawlError::Interrupted(cause)),
            Some(BreakCause::Fatal(cause)) => Err(cause),
            None => Ok(()),
        }
    }

    /// Returns true while a latched cause is waiting to be rethrown.
    #[must_use]
    pub fn has_latched_cause(&self) -> bool {
        self.latched.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_active_probe_continues() {
        let mut probe = MockActivityProbe::new();
        probe
            .expect_check_still_active()
            .times(1)
            .returning(|| ProbeStatus::Active);
        let mut bridge = CancellationBridge::new(probe);
        assert_eq!(
            bridge.poll(),
            PollOutcome::Continue {
                recheck_after: DEFAULT_RECHECK_INTERVAL
            }
        );
        assert!(!bridge.has_latched_cause());
        assert!(bridge.rethrow().is_ok());
    }

    #[test]
    fn test_transient_cause_latched_and_rethrown() {
        let mut probe = MockActivityProbe::new();
        probe.expect_check_still_active().times(1).returning(|| {
            ProbeStatus::Interrupted(ServiceInterruption::retry_after(
                "job paused",
                ChronoDuration::minutes(5),
            ))
        });
        let mut bridge = CancellationBridge::new(probe);
        assert_eq!(bridge.poll(), PollOutcome::BreakRequested);
        assert!(bridge.has_latched_cause());
        let err = bridge.rethrow().unwrap_err();
        match err {
            CrawlError::Interrupted(si) => assert_eq!(si.message, "job paused"),
            other => panic!("expected transient interruption, got {other}"),
        }
        // The latch is consumed by the rethrow.
        assert!(bridge.rethrow().is_ok());
    }

    #[test]
    fn test_fatal_cause_latched_and_rethrown() {
        let mut probe = MockActivityProbe::new();
        probe
            .expect_check_still_active()
            .times(1)
            .returning(|| ProbeStatus::Failed(CrawlError::Internal("db down".to_string())));
        let mut bridge = CancellationBridge::new(probe);
        assert_eq!(bridge.poll(), PollOutcome::BreakRequested);
        let err = bridge.rethrow().unwrap_err();
        assert!(matches!(err, CrawlError::Internal(msg) if msg == "db down"));
    }

    #[test]
    fn test_stop_bypasses_latch() {
        let mut probe = MockActivityProbe::new();
        probe
            .expect_check_still_active()
            .times(1)
            .returning(|| ProbeStatus::Stop);
        let mut bridge = CancellationBridge::new(probe);
        assert_eq!(bridge.poll(), PollOutcome::Cancelled);
        assert!(!bridge.has_latched_cause());
    }

    #[test]
    fn test_custom_recheck_interval() {
        let mut probe = MockActivityProbe::new();
        probe
            .expect_check_still_active()
            .returning(|| ProbeStatus::Active);
        let mut bridge =
            CancellationBridge::new(probe).with_recheck_interval(Duration::from_millis(250));
        assert_eq!(
            bridge.poll(),
            PollOutcome::Continue {
                recheck_after: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn test_state_transitions_forward_only() {
        let mut state = CancellationState::Running;
        state.advance(CancellationState::BreakRequested);
        assert_eq!(state, CancellationState::BreakRequested);
        state.advance(CancellationState::Running);
        assert_eq!(state, CancellationState::BreakRequested);
        state.advance(CancellationState::Failed);
        assert!(state.is_terminal());
    }
}
