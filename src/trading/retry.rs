//! Bounded submission retries
//!
//! The only timeout on a submission is its attempt budget. Transport failures
//! and unconfirmed attempts use up one attempt each; errors that are fatal for
//! the instrument stop the loop and propagate.

use solana_sdk::pubkey::Pubkey;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::trading::SwapOutcome;

/// Attempt budget of a single submission call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    attempts_used: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts_used: 0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_used)
    }

    /// Take one attempt; false once the budget is spent
    pub fn try_consume(&mut self) -> bool {
        if self.attempts_used >= self.max_attempts {
            return false;
        }
        self.attempts_used += 1;
        true
    }
}

/// How a budgeted submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Confirmed { outcome: SwapOutcome, attempts: u32 },
    Exhausted { attempts: u32, last_error: Option<String> },
}

/// Run `attempt` until it confirms or the budget is spent.
///
/// `attempt` receives the 1-based attempt number.
pub async fn submit_with_budget<F, Fut>(
    mut budget: RetryBudget,
    mint: &Pubkey,
    action: &str,
    mut attempt: F,
) -> Result<SubmitResult>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<SwapOutcome>>,
{
    let mut last_error = None;

    while budget.try_consume() {
        let n = budget.attempts_used();
        debug!(mint = %mint, attempt = n, max = budget.max_attempts(), "{} attempt", action);

        match attempt(n).await {
            Ok(outcome) if outcome.confirmed => {
                info!(
                    mint = %mint,
                    signature = outcome.signature.as_deref().unwrap_or_default(),
                    attempt = n,
                    "Confirmed {} transaction",
                    action
                );
                return Ok(SubmitResult::Confirmed {
                    outcome,
                    attempts: n,
                });
            }
            Ok(outcome) => {
                info!(
                    mint = %mint,
                    signature = outcome.signature.as_deref().unwrap_or_default(),
                    error = outcome.error.as_deref().unwrap_or_default(),
                    attempt = n,
                    "Error confirming {} transaction",
                    action
                );
                last_error = outcome.error;
            }
            Err(e) if e.is_fatal_for_instrument() => {
                warn!(mint = %mint, error = %e, "{} aborted", action);
                return Err(e);
            }
            Err(e) => {
                debug!(mint = %mint, error = %e, attempt = n, "Error {}ing token", action);
                last_error = Some(e.to_string());
            }
        }
    }

    Ok(SubmitResult::Exhausted {
        attempts: budget.attempts_used(),
        last_error,
    })
}
