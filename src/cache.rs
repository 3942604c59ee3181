//! Pool and market metadata lookups
//!
//! The controller only reads through [`PoolSource`] and [`MarketSource`]; the
//! in-memory caches here are the default implementations fed by the event bus.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use tracing::trace;

use crate::error::Result;
use crate::types::{MarketInfo, PoolState};

/// A cached pool snapshot together with its pool id
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPool {
    pub id: Pubkey,
    pub state: PoolState,
}

/// Lookup of the pool trading an instrument
#[async_trait]
pub trait PoolSource: Send + Sync {
    /// `Ok(None)` when the instrument's pool is unknown
    async fn fetch_pool_state(&self, mint: &Pubkey) -> Result<Option<CachedPool>>;
}

/// Lookup of order book market metadata
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// `Ok(None)` when the market is unknown
    async fn fetch_market_metadata(&self, market_id: &Pubkey) -> Result<Option<MarketInfo>>;
}

/// Pools keyed by base mint. The first snapshot seen for a mint is kept.
#[derive(Default)]
pub struct PoolCache {
    pools: DashMap<Pubkey, CachedPool>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a pool. Later snapshots for an already cached mint are ignored.
    /// Returns whether the pool was new.
    pub fn save(&self, id: Pubkey, state: PoolState) -> bool {
        let mint = state.base_mint;
        match self.pools.entry(mint) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                trace!(mint = %mint, "Caching new pool");
                slot.insert(CachedPool { id, state });
                true
            }
        }
    }

    pub fn get(&self, mint: &Pubkey) -> Option<CachedPool> {
        self.pools.get(mint).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[async_trait]
impl PoolSource for PoolCache {
    async fn fetch_pool_state(&self, mint: &Pubkey) -> Result<Option<CachedPool>> {
        Ok(self.get(mint))
    }
}

/// Markets keyed by market id. Updates overwrite.
#[derive(Default)]
pub struct MarketCache {
    markets: DashMap<Pubkey, MarketInfo>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, market: MarketInfo) {
        self.markets.insert(market.market_id, market);
    }

    pub fn get(&self, market_id: &Pubkey) -> Option<MarketInfo> {
        self.markets.get(market_id).map(|m| m.value().clone())
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

#[async_trait]
impl MarketSource for MarketCache {
    async fn fetch_market_metadata(&self, market_id: &Pubkey) -> Result<Option<MarketInfo>> {
        Ok(self.get(market_id))
    }
}
