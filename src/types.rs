//! Core data types shared across the pipeline and controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::amount::TokenAmount;

/// Decoded liquidity pool state as delivered by the feed.
///
/// A snapshot never changes; re-fetched state is a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub market_id: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    /// Pool authority
    pub authority: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    /// Quote-side liquidity at snapshot time
    pub quote_reserve: TokenAmount,
    /// Unix seconds
    pub open_time: i64,
}

/// Order book market metadata referenced by a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub market_id: Pubkey,
    pub program_id: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub event_queue: Pubkey,
}

/// Everything a swap against one pool needs
#[derive(Debug, Clone, PartialEq)]
pub struct PoolKeys {
    pub id: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub authority: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub market: MarketInfo,
}

impl PoolKeys {
    pub fn assemble(pool_id: Pubkey, state: &PoolState, market: MarketInfo) -> Self {
        Self {
            id: pool_id,
            base_mint: state.base_mint,
            quote_mint: state.quote_mint,
            lp_mint: state.lp_mint,
            base_vault: state.base_vault,
            quote_vault: state.quote_vault,
            authority: state.authority,
            base_decimals: state.base_decimals,
            quote_decimals: state.quote_decimals,
            market,
        }
    }
}

/// A newly observed pool, keyed by the instrument it trades
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Instrument (base mint)
    pub mint: Pubkey,
    pub pool_id: Pubkey,
    pub state: PoolState,
    pub observed_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(pool_id: Pubkey, state: PoolState) -> Self {
        Self {
            mint: state.base_mint,
            pool_id,
            state,
            observed_at: Utc::now(),
        }
    }
}

/// A wallet token balance observation
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceUpdate {
    pub mint: Pubkey,
    pub balance: TokenAmount,
    pub observed_at: DateTime<Utc>,
}

impl BalanceUpdate {
    pub fn new(mint: Pubkey, balance: TokenAmount) -> Self {
        Self {
            mint,
            balance,
            observed_at: Utc::now(),
        }
    }
}
