//! Position records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use crate::amount::TokenAmount;
use crate::position::ladder::ExitLadder;

/// Lifecycle of one trade on one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Entry decided, submission in progress
    PendingEntry,
    /// Holding units, watching for an exit
    Open,
    /// Exit submission in progress
    Exiting,
    /// Fully exited
    Closed,
}

/// One active trade lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: Uuid,
    /// Instrument (base mint)
    pub mint: Pubkey,
    /// Quote amount spent on entry
    pub entry_quote: TokenAmount,
    /// Base amount received on entry. Zero while pending.
    pub entry_base: TokenAmount,
    /// Computed once on entry, never rebuilt
    pub ladder: ExitLadder,
    /// Cumulative base amount already sold
    pub base_sold: TokenAmount,
    /// Cumulative quote proceeds of those sales
    pub quote_proceeds: TokenAmount,
    pub state: LifecycleState,
    pub entry_signature: Option<String>,
    /// True when the record was created from a balance with no recorded entry
    #[serde(default)]
    pub adopted: bool,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PositionRecord {
    /// A placeholder held while the entry is being submitted
    pub fn pending(mint: Pubkey, entry_quote: TokenAmount, base_decimals: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mint,
            entry_quote,
            entry_base: TokenAmount::zero(base_decimals),
            ladder: ExitLadder::default(),
            base_sold: TokenAmount::zero(base_decimals),
            quote_proceeds: TokenAmount::zero(entry_quote.decimals()),
            state: LifecycleState::PendingEntry,
            entry_signature: None,
            adopted: false,
            opened_at: now,
            updated_at: now,
        }
    }

    /// An open position for units already held
    pub fn adopted(
        mint: Pubkey,
        entry_quote: TokenAmount,
        held: TokenAmount,
        ladder: ExitLadder,
    ) -> Self {
        let mut record = Self::pending(mint, entry_quote, held.decimals());
        record.entry_base = held;
        record.ladder = ladder;
        record.state = LifecycleState::Open;
        record.adopted = true;
        record
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Notification emitted when a position is fully exited
#[derive(Debug, Clone, PartialEq)]
pub struct PositionClosed {
    pub position_id: Uuid,
    pub mint: Pubkey,
    /// Total quote received across all exits
    pub quote_proceeds: TokenAmount,
    /// Total base units sold across all exits
    pub base_sold: TokenAmount,
    pub closed_at: DateTime<Utc>,
}

impl From<&PositionRecord> for PositionClosed {
    fn from(record: &PositionRecord) -> Self {
        Self {
            position_id: record.id,
            mint: record.mint,
            quote_proceeds: record.quote_proceeds,
            base_sold: record.base_sold,
            closed_at: Utc::now(),
        }
    }
}
