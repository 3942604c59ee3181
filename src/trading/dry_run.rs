//! Dry-run execution
//!
//! Confirms every swap with a synthetic signature and reports the quoted output
//! as filled. Nothing is signed or sent.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::error::Result;
use crate::trading::{SwapExecutor, SwapOutcome, SwapRequest};

#[derive(Debug, Default)]
pub struct DryRunExecutor {
    submitted: AtomicU64,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of swaps "submitted" so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SwapExecutor for DryRunExecutor {
    async fn build_and_submit_swap(&self, request: &SwapRequest) -> Result<SwapOutcome> {
        let n = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        let signature = format!("dry-run-{}", n);

        info!(
            mint = %request.pool.base_mint,
            direction = ?request.direction,
            amount_in = %request.amount_in,
            expected_out = %request.expected_amount_out,
            steps = request.plan.steps().len(),
            "[DRY RUN] Would submit swap"
        );

        Ok(SwapOutcome::confirmed(
            signature,
            Some(request.expected_amount_out),
        ))
    }
}
