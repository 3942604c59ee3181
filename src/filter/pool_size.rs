//! Pool size bounds on quote-side liquidity

use async_trait::async_trait;

use crate::amount::TokenAmount;
use crate::error::{Error, Result};
use crate::filter::{FilterCheck, PoolFilter};
use crate::types::Candidate;

/// Passes when the quote reserve lies within `[min, max]`. A zero bound is off.
pub struct PoolSizeFilter {
    min: TokenAmount,
    max: TokenAmount,
}

impl PoolSizeFilter {
    pub fn new(min: TokenAmount, max: TokenAmount) -> Self {
        Self { min, max }
    }

    /// Whether either bound is set
    pub fn is_active(&self) -> bool {
        !self.min.is_zero() || !self.max.is_zero()
    }
}

#[async_trait]
impl PoolFilter for PoolSizeFilter {
    fn name(&self) -> &str {
        "pool_size"
    }

    async fn check(&self, candidate: &Candidate) -> Result<FilterCheck> {
        let size = candidate.state.quote_reserve;
        if size.decimals() != self.min.decimals() {
            return Err(Error::DecimalsMismatch {
                left: size.decimals(),
                right: self.min.decimals(),
            });
        }

        if !self.max.is_zero() && size.raw() > self.max.raw() {
            return Ok(FilterCheck::fail(format!(
                "pool size {} > {}",
                size, self.max
            )));
        }

        if !self.min.is_zero() && size.raw() < self.min.raw() {
            return Ok(FilterCheck::fail(format!(
                "pool size {} < {}",
                size, self.min
            )));
        }

        Ok(FilterCheck::pass(format!("pool size {}", size)))
    }
}
