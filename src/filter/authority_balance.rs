//! Pool authority native balance check

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::amount::TokenAmount;
use crate::error::Result;
use crate::filter::{FilterCheck, PoolFilter};
use crate::types::Candidate;

/// Native (lamport) balance lookup
#[async_trait]
pub trait NativeBalanceReader: Send + Sync {
    async fn native_balance(&self, account: &Pubkey) -> Result<TokenAmount>;
}

/// Passes when the pool authority holds at least `min_balance` SOL.
///
/// Nodes that reject the balance query as unsupported let the pool through.
pub struct AuthorityBalanceFilter {
    reader: Arc<dyn NativeBalanceReader>,
    min_balance: TokenAmount,
}

impl AuthorityBalanceFilter {
    pub fn new(reader: Arc<dyn NativeBalanceReader>, min_balance: TokenAmount) -> Self {
        Self {
            reader,
            min_balance,
        }
    }
}

#[async_trait]
impl PoolFilter for AuthorityBalanceFilter {
    fn name(&self) -> &str {
        "authority_balance"
    }

    fn fails_open_on_unsupported(&self) -> bool {
        true
    }

    async fn check(&self, candidate: &Candidate) -> Result<FilterCheck> {
        let balance = self.reader.native_balance(&candidate.state.authority).await?;

        if balance.raw() < self.min_balance.raw() {
            return Ok(FilterCheck::fail(format!(
                "pool authority balance too low: {} < {} SOL",
                balance, self.min_balance
            )));
        }

        Ok(FilterCheck::pass(format!(
            "pool authority balance: {} SOL",
            balance
        )))
    }
}
