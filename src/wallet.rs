//! Wallet balance access
//!
//! The signer lives with the swap executor. The controller only needs to read
//! what the wallet holds.

use async_trait::async_trait;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::amount::TokenAmount;
use crate::error::Result;

/// Read-only view of the trading wallet
#[async_trait]
pub trait WalletReader: Send + Sync {
    /// Wallet public key
    fn owner(&self) -> Pubkey;

    /// Balance of the wallet's token account for `mint`.
    /// `Ok(None)` when the account does not exist.
    async fn token_balance(&self, mint: &Pubkey) -> Result<Option<TokenAmount>>;
}

/// Balances last reported by the wallet feed.
///
/// Mints the feed has not reported yet are looked up in the backing wallet,
/// if there is one.
pub struct TrackedBalances {
    owner: Pubkey,
    balances: DashMap<Pubkey, TokenAmount>,
    backing: Option<Arc<dyn WalletReader>>,
}

impl TrackedBalances {
    pub fn new(owner: Pubkey) -> Self {
        Self {
            owner,
            balances: DashMap::new(),
            backing: None,
        }
    }

    pub fn backed_by(wallet: Arc<dyn WalletReader>) -> Self {
        Self {
            owner: wallet.owner(),
            balances: DashMap::new(),
            backing: Some(wallet),
        }
    }

    pub fn update(&self, mint: Pubkey, balance: TokenAmount) {
        self.balances.insert(mint, balance);
    }
}

#[async_trait]
impl WalletReader for TrackedBalances {
    fn owner(&self) -> Pubkey {
        self.owner
    }

    async fn token_balance(&self, mint: &Pubkey) -> Result<Option<TokenAmount>> {
        let tracked = self.balances.get(mint).map(|b| *b.value());
        match (tracked, &self.backing) {
            (Some(balance), _) => Ok(Some(balance)),
            (None, Some(wallet)) => wallet.token_balance(mint).await,
            (None, None) => Ok(None),
        }
    }
}
