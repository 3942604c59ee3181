//! Concurrent filter evaluation

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::filter::{FilterCheck, PoolFilter};
use crate::types::Candidate;

/// Outcome of one filter within a verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReason {
    pub filter: String,
    pub passed: bool,
    pub detail: String,
}

/// AND of every filter. Reasons follow filter declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityVerdict {
    pub passed: bool,
    pub reasons: Vec<FilterReason>,
}

impl EligibilityVerdict {
    /// Reasons of the filters that failed
    pub fn failures(&self) -> impl Iterator<Item = &FilterReason> {
        self.reasons.iter().filter(|r| !r.passed)
    }
}

/// Ordered set of filters sharing one per-filter timeout
pub struct EligibilityPipeline {
    filters: Vec<Arc<dyn PoolFilter>>,
    filter_timeout: Duration,
}

impl EligibilityPipeline {
    pub fn new(filter_timeout: Duration) -> Self {
        Self {
            filters: Vec::new(),
            filter_timeout,
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn PoolFilter>) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: Arc<dyn PoolFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every filter concurrently and wait for all of them.
    /// An empty pipeline passes.
    pub async fn evaluate(&self, candidate: &Candidate) -> EligibilityVerdict {
        let reasons = join_all(
            self.filters
                .iter()
                .map(|filter| self.run_filter(filter.as_ref(), candidate)),
        )
        .await;

        let passed = reasons.iter().all(|r| r.passed);

        if !passed {
            trace!(
                mint = %candidate.mint,
                pool = %candidate.pool_id,
                open_time = candidate.state.open_time,
                "Filter report"
            );
            for reason in &reasons {
                trace!(
                    mint = %candidate.mint,
                    filter = %reason.filter,
                    passed = reason.passed,
                    "{}",
                    reason.detail
                );
            }
        } else {
            trace!(mint = %candidate.mint, filters = reasons.len(), "All filters passed");
        }

        EligibilityVerdict { passed, reasons }
    }

    async fn run_filter(&self, filter: &dyn PoolFilter, candidate: &Candidate) -> FilterReason {
        let check = match tokio::time::timeout(self.filter_timeout, filter.check(candidate)).await {
            Ok(Ok(check)) => check,
            Ok(Err(e)) if e.is_unsupported_query() && filter.fails_open_on_unsupported() => {
                FilterCheck::pass(format!("query unsupported by node, passing: {}", e))
            }
            Ok(Err(e)) => FilterCheck::fail(format!("check failed: {}", e)),
            Err(_) => FilterCheck::fail(format!(
                "timed out after {}ms",
                self.filter_timeout.as_millis()
            )),
        };

        FilterReason {
            filter: filter.name().to_string(),
            passed: check.ok,
            detail: check.detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, UNSUPPORTED_QUERY_CODE};
    use crate::testing::{candidate, ScriptedFilter};
    use solana_sdk::pubkey::Pubkey;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[tokio::test]
    async fn test_empty_pipeline_passes() {
        let pipeline = EligibilityPipeline::new(ms(100));
        let verdict = pipeline.evaluate(&candidate(Pubkey::new_unique())).await;
        assert!(verdict.passed);
        assert!(verdict.reasons.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasons_follow_declaration_order() {
        let pipeline = EligibilityPipeline::new(ms(1_000))
            .with_filter(Arc::new(ScriptedFilter::passing("slow").with_delay(ms(300))))
            .with_filter(Arc::new(ScriptedFilter::failing("fast", "too small")))
            .with_filter(Arc::new(ScriptedFilter::passing("medium").with_delay(ms(100))));

        let verdict = pipeline.evaluate(&candidate(Pubkey::new_unique())).await;

        assert!(!verdict.passed);
        let names: Vec<&str> = verdict.reasons.iter().map(|r| r.filter.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "medium"]);
        assert_eq!(verdict.failures().count(), 1);
        assert_eq!(verdict.reasons[1].detail, "too small");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_filter_times_out_without_hiding_others() {
        let pipeline = EligibilityPipeline::new(ms(500))
            .with_filter(Arc::new(ScriptedFilter::hanging("stuck")))
            .with_filter(Arc::new(ScriptedFilter::passing("ok")));

        let started = tokio::time::Instant::now();
        let verdict = pipeline.evaluate(&candidate(Pubkey::new_unique())).await;

        assert!(!verdict.passed);
        assert!(!verdict.reasons[0].passed);
        assert!(verdict.reasons[0].detail.contains("timed out"));
        assert!(verdict.reasons[1].passed);
        assert_eq!(started.elapsed(), ms(500));
    }

    #[tokio::test]
    async fn test_fail_open_on_unsupported_query() {
        let unsupported = || Error::RpcQuery {
            code: UNSUPPORTED_QUERY_CODE,
            message: "Invalid param".into(),
        };

        let pipeline = EligibilityPipeline::new(ms(500))
            .with_filter(Arc::new(
                ScriptedFilter::erroring("lenient", unsupported).fail_open(),
            ));
        assert!(pipeline.evaluate(&candidate(Pubkey::new_unique())).await.passed);

        let strict = EligibilityPipeline::new(ms(500))
            .with_filter(Arc::new(ScriptedFilter::erroring("strict", unsupported)));
        assert!(!strict.evaluate(&candidate(Pubkey::new_unique())).await.passed);
    }

    #[tokio::test]
    async fn test_other_errors_fail_even_when_lenient() {
        let pipeline = EligibilityPipeline::new(ms(500)).with_filter(Arc::new(
            ScriptedFilter::erroring("lenient", || Error::Rpc("reset".into())).fail_open(),
        ));

        let verdict = pipeline.evaluate(&candidate(Pubkey::new_unique())).await;
        assert!(!verdict.passed);
        assert!(verdict.reasons[0].detail.contains("reset"));
    }
}
