//! Trading module - swap quoting and submission
//!
//! The controller never talks to the chain directly. It asks a [`SwapQuoter`]
//! for prices and hands a [`SwapRequest`] to a [`SwapExecutor`], which owns the
//! signer and the submission backend (plain RPC, Warp, Jito, or dry-run).

pub mod dry_run;
pub mod plan;
pub mod retry;

use async_trait::async_trait;

use crate::amount::{Percent, TokenAmount};
use crate::config::ExecutorKind;
use crate::error::Result;
use crate::types::PoolKeys;

pub use dry_run::DryRunExecutor;
pub use plan::{PriorityFees, SwapPlan, SwapStep};
pub use retry::{submit_with_budget, RetryBudget, SubmitResult};

/// Swap direction relative to the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    /// Quote in, base out
    Buy,
    /// Base in, quote out
    Sell,
}

/// Price of a prospective swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    /// Lowest output accepted under the slippage tolerance
    pub min_amount_out: TokenAmount,
    /// Expected output at the current price
    pub price_amount_out: TokenAmount,
}

/// Everything an executor needs for one submission
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub pool: PoolKeys,
    pub direction: SwapDirection,
    pub amount_in: TokenAmount,
    pub min_amount_out: TokenAmount,
    pub expected_amount_out: TokenAmount,
    pub slippage: Percent,
    pub plan: SwapPlan,
}

/// Result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub confirmed: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
    /// Output actually received, when the backend reports it
    pub amount_out: Option<TokenAmount>,
}

impl SwapOutcome {
    pub fn confirmed(signature: impl Into<String>, amount_out: Option<TokenAmount>) -> Self {
        Self {
            confirmed: true,
            signature: Some(signature.into()),
            error: None,
            amount_out,
        }
    }

    pub fn unconfirmed(signature: Option<String>, error: impl Into<String>) -> Self {
        Self {
            confirmed: false,
            signature,
            error: Some(error.into()),
            amount_out: None,
        }
    }
}

/// Pure price computation. Must not submit anything.
#[async_trait]
pub trait SwapQuoter: Send + Sync {
    async fn quote_swap(
        &self,
        pool: &PoolKeys,
        amount_in: TokenAmount,
        direction: SwapDirection,
        slippage: Percent,
    ) -> Result<SwapQuote>;
}

/// Builds, signs, submits and confirms a swap.
///
/// Implementations must be safe to call again after an unconfirmed attempt.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn build_and_submit_swap(&self, request: &SwapRequest) -> Result<SwapOutcome>;
}

/// Capabilities of the configured submission backend, resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStrategy {
    pub kind: ExecutorKind,
    /// Whether swaps carry their own compute-unit price and limit instructions
    pub uses_priority_fee_instructions: bool,
}

impl ExecutionStrategy {
    pub fn from_kind(kind: ExecutorKind) -> Self {
        Self {
            kind,
            // Warp and Jito charge their own fee and reject compute budget instructions
            uses_priority_fee_instructions: matches!(kind, ExecutorKind::Default),
        }
    }
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self::from_kind(ExecutorKind::Default)
    }
}
