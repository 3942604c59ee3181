//! Periodic re-evaluation
//!
//! `poll_until` runs a fallible async predicate on a fixed-rate schedule for a
//! bounded duration. It backs both the filter debounce and the price-exit loop.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, trace};

use crate::error::Result;

/// How a polling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub matched: bool,
    pub attempts_run: u32,
}

impl PollOutcome {
    const SKIPPED: PollOutcome = PollOutcome {
        matched: false,
        attempts_run: 0,
    };
}

/// Number of predicate runs a schedule allows: `ceil(duration / interval)`.
/// Zero when either side is zero.
pub fn planned_attempts(interval: Duration, duration: Duration) -> u32 {
    if interval.is_zero() || duration.is_zero() {
        return 0;
    }

    let interval = interval.as_nanos();
    let attempts = duration.as_nanos().div_ceil(interval);
    u32::try_from(attempts).unwrap_or(u32::MAX)
}

/// Poll `predicate` every `interval` until it returns `Ok(true)`, or until
/// `ceil(duration / interval)` runs have happened.
///
/// A zero interval or duration opts out: the predicate is never called.
/// Predicate errors count as a non-match for that run. A predicate still pending
/// when `duration` elapses is dropped and the run ends.
///
/// The predicate receives the 1-based attempt number.
pub async fn poll_until<F, Fut>(interval: Duration, duration: Duration, mut predicate: F) -> PollOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let max_attempts = planned_attempts(interval, duration);
    if max_attempts == 0 {
        return PollOutcome::SKIPPED;
    }

    let start = Instant::now();
    let deadline = start + duration;
    let mut attempts_run = 0;

    while attempts_run < max_attempts {
        attempts_run += 1;

        match timeout_at(deadline, predicate(attempts_run)).await {
            Ok(Ok(true)) => {
                return PollOutcome {
                    matched: true,
                    attempts_run,
                }
            }
            Ok(Ok(false)) => {
                trace!(attempt = attempts_run, max_attempts, "Poll predicate did not match");
            }
            Ok(Err(e)) => {
                debug!(attempt = attempts_run, error = %e, "Poll predicate failed");
            }
            Err(_) => {
                debug!(attempt = attempts_run, "Poll predicate still pending at deadline");
                break;
            }
        }

        if attempts_run >= max_attempts {
            break;
        }

        let next_run = start + interval * attempts_run;
        if next_run >= deadline {
            break;
        }
        sleep_until(next_run).await;
    }

    PollOutcome {
        matched: false,
        attempts_run,
    }
}
