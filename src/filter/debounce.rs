//! Debounced acceptance
//!
//! Account state read by filters can lag the chain right after a pool opens.
//! A candidate is only accepted once the pipeline passes on `required`
//! consecutive runs inside the check window; any failing run resets the streak.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::error::Error;
use crate::filter::pipeline::{EligibilityPipeline, EligibilityVerdict};
use crate::scheduler::{planned_attempts, poll_until};
use crate::types::Candidate;

/// Check window for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceSettings {
    pub interval: Duration,
    pub duration: Duration,
    /// Consecutive passing runs needed
    pub required: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceOutcome {
    pub accepted: bool,
    pub runs: u32,
    /// Verdict of the last completed run
    pub last_verdict: Option<EligibilityVerdict>,
}

/// Re-run `pipeline` until `settings.required` consecutive passes, or the window ends.
///
/// With a zero interval or duration there is no window: one run decides.
pub async fn debounced_accept(
    pipeline: &EligibilityPipeline,
    candidate: &Candidate,
    settings: DebounceSettings,
) -> DebounceOutcome {
    if planned_attempts(settings.interval, settings.duration) == 0 {
        let verdict = pipeline.evaluate(candidate).await;
        return DebounceOutcome {
            accepted: verdict.passed,
            runs: 1,
            last_verdict: Some(verdict),
        };
    }

    let required = settings.required.max(1);
    let streak = AtomicU32::new(0);
    let last_verdict: Mutex<Option<EligibilityVerdict>> = Mutex::new(None);

    let outcome = poll_until(settings.interval, settings.duration, |run| {
        let streak = &streak;
        let last_verdict = &last_verdict;
        async move {
            let verdict = pipeline.evaluate(candidate).await;
            let passed = verdict.passed;
            if let Ok(mut slot) = last_verdict.lock() {
                *slot = Some(verdict);
            }

            if !passed {
                streak.store(0, Ordering::SeqCst);
                debug!(mint = %candidate.mint, run, "Filter run failed, streak reset");
                return Ok::<_, Error>(false);
            }

            let count = streak.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(mint = %candidate.mint, run, count, required, "Filter match");
            Ok(count >= required)
        }
    })
    .await;

    DebounceOutcome {
        accepted: outcome.matched,
        runs: outcome.attempts_run,
        last_verdict: last_verdict.into_inner().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candidate, ScriptedFilter};
    use solana_sdk::pubkey::Pubkey;
    use std::sync::Arc;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn settings(required: u32) -> DebounceSettings {
        DebounceSettings {
            interval: ms(100),
            duration: ms(1_000),
            required,
        }
    }

    fn pipeline_of(filter: Arc<ScriptedFilter>) -> EligibilityPipeline {
        EligibilityPipeline::new(ms(50)).with_filter(filter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_resets_streak() {
        // pass, fail, pass, pass: the fail wipes the first pass
        let filter = Arc::new(ScriptedFilter::sequence(
            "seq",
            vec![true, false, true, true, true],
        ));
        let pipeline = pipeline_of(filter.clone());

        let candidate = candidate(Pubkey::new_unique());
        let outcome = debounced_accept(&pipeline, &candidate, settings(3)).await;

        assert!(outcome.accepted);
        assert_eq!(outcome.runs, 5);
        assert_eq!(filter.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streak_cut_short_is_rejected() {
        let filter = Arc::new(ScriptedFilter::sequence("seq", vec![true, false, true, true]));
        let pipeline = pipeline_of(filter.clone());
        let window = DebounceSettings {
            interval: ms(100),
            duration: ms(400),
            required: 3,
        };

        let candidate = candidate(Pubkey::new_unique());
        let outcome = debounced_accept(&pipeline, &candidate, window).await;

        assert!(!outcome.accepted);
        assert_eq!(outcome.runs, 4);
        assert!(outcome.last_verdict.unwrap().passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_consecutive_after_reset() {
        let filter = Arc::new(ScriptedFilter::sequence("seq", vec![true, false, true, true]));
        let pipeline = pipeline_of(filter);

        let candidate = candidate(Pubkey::new_unique());
        let outcome = debounced_accept(&pipeline, &candidate, settings(2)).await;

        assert!(outcome.accepted);
        assert_eq!(outcome.runs, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires_without_streak() {
        let filter = Arc::new(ScriptedFilter::failing("never", "nope"));
        let pipeline = pipeline_of(filter.clone());

        let candidate = candidate(Pubkey::new_unique());
        let outcome = debounced_accept(&pipeline, &candidate, settings(1)).await;

        assert!(!outcome.accepted);
        assert_eq!(outcome.runs, 10);
        assert_eq!(filter.calls(), 10);
    }

    #[tokio::test]
    async fn test_no_window_means_single_run() {
        let no_window = DebounceSettings {
            interval: Duration::ZERO,
            duration: ms(1_000),
            required: 3,
        };
        let candidate = candidate(Pubkey::new_unique());

        let filter = Arc::new(ScriptedFilter::passing("once"));
        let outcome = debounced_accept(&pipeline_of(filter.clone()), &candidate, no_window).await;
        assert!(outcome.accepted);
        assert_eq!(outcome.runs, 1);
        assert_eq!(filter.calls(), 1);

        // Filters still apply without a window
        let filter = Arc::new(ScriptedFilter::failing("too_small", "pool too small"));
        let outcome = debounced_accept(&pipeline_of(filter.clone()), &candidate, no_window).await;
        assert!(!outcome.accepted);
        assert_eq!(outcome.runs, 1);
        assert_eq!(filter.calls(), 1);
        assert!(!outcome.last_verdict.unwrap().passed);
    }
}
