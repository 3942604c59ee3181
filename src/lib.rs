//! New-pool sniper control loop
//!
//! Debounced eligibility checks on newly created pools, single-lane entries
//! with bounded retries, and laddered take-profit exits with a stop loss.

pub mod amount;
pub mod bot;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod position;
pub mod scheduler;
pub mod stream;
pub mod trading;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use amount::{Percent, TokenAmount};
pub use bot::{Bot, ExternalServices};
pub use config::Config;
pub use error::{Error, Result};
pub use position::{EntryOutcome, ExitOutcome, PositionController};
