//! Live position registry
//!
//! One record per instrument at any moment. Entry and exit both go through a
//! reservation that moves the record into a busy state; a second reservation for
//! the same instrument is rejected, never queued. Dropping a reservation without
//! settling it rolls the record back.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::amount::TokenAmount;
use crate::error::{Error, Result};
use crate::position::ladder::ExitLadder;
use crate::position::record::{LifecycleState, PositionClosed, PositionRecord};

/// Result of a settled exit
#[derive(Debug, Clone, PartialEq)]
pub enum SaleResult {
    /// Units remain held; the record is open again
    Partial(PositionRecord),
    /// Balance emptied; the record was removed
    Closed(PositionClosed),
}

/// Registry of live positions keyed by mint
pub struct PositionRegistry {
    records: DashMap<Pubkey, PositionRecord>,
    persistence_path: Option<PathBuf>,
}

impl PositionRegistry {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            records: DashMap::new(),
            persistence_path,
        }
    }

    /// Claim the instrument for an entry
    pub fn reserve_entry(
        &self,
        mint: Pubkey,
        entry_quote: TokenAmount,
        base_decimals: u8,
    ) -> Result<EntryReservation<'_>> {
        match self.records.entry(mint) {
            Entry::Occupied(existing) => Err(Error::PositionActive(format!(
                "{} ({:?})",
                mint,
                existing.get().state
            ))),
            Entry::Vacant(slot) => {
                slot.insert(PositionRecord::pending(mint, entry_quote, base_decimals));
                Ok(EntryReservation {
                    registry: self,
                    mint,
                    settled: false,
                })
            }
        }
    }

    /// Move an open record into `Exiting`
    pub fn begin_exit(&self, mint: &Pubkey) -> Result<ExitReservation<'_>> {
        let mut record = self
            .records
            .get_mut(mint)
            .ok_or_else(|| Error::PositionNotFound(mint.to_string()))?;

        if record.state != LifecycleState::Open {
            return Err(Error::PositionActive(format!("{} ({:?})", mint, record.state)));
        }

        record.state = LifecycleState::Exiting;
        record.touch();

        Ok(ExitReservation {
            registry: self,
            mint: *mint,
            settled: false,
        })
    }

    /// Insert an already open record unless the instrument is taken.
    /// Returns whether it was inserted.
    pub fn adopt(&self, record: PositionRecord) -> bool {
        match self.records.entry(record.mint) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                info!(mint = %record.mint, held = %record.entry_base, "Adopting held position");
                slot.insert(record);
                true
            }
        }
    }

    /// Drop an open record whose units are gone
    pub fn discard(&self, mint: &Pubkey) -> Option<PositionRecord> {
        self.records
            .remove_if(mint, |_, r| r.state == LifecycleState::Open)
            .map(|(_, record)| record)
    }

    pub fn get(&self, mint: &Pubkey) -> Option<PositionRecord> {
        self.records.get(mint).map(|r| r.value().clone())
    }

    pub fn contains(&self, mint: &Pubkey) -> bool {
        self.records.contains_key(mint)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of every live record
    pub fn snapshot(&self) -> Vec<PositionRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    /// Load open positions from disk
    pub async fn load(&self) -> Result<usize> {
        let Some(path) = &self.persistence_path else {
            return Ok(0);
        };
        if !Path::new(path).exists() {
            return Ok(0);
        }

        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::PositionPersistence(e.to_string()))?;
        let saved: HashMap<String, PositionRecord> = serde_json::from_str(&data)
            .map_err(|e| Error::PositionPersistence(e.to_string()))?;

        let mut loaded = 0;
        for (_, mut record) in saved {
            record.state = LifecycleState::Open;
            if self.adopt(record) {
                loaded += 1;
            }
        }

        info!("Loaded {} positions from {}", loaded, path.display());
        Ok(loaded)
    }

    /// Save open positions to disk. Pending entries are skipped.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let open: HashMap<String, PositionRecord> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.state != LifecycleState::PendingEntry)
            .map(|mut r| {
                r.state = LifecycleState::Open;
                (r.mint.to_string(), r)
            })
            .collect();

        let data = serde_json::to_string_pretty(&open)
            .map_err(|e| Error::PositionPersistence(e.to_string()))?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| Error::PositionPersistence(e.to_string()))?;

        debug!("Saved {} positions to {}", open.len(), path.display());
        Ok(())
    }
}

/// Entry claim on one instrument. Dropped unconfirmed, the pending record is removed.
pub struct EntryReservation<'a> {
    registry: &'a PositionRegistry,
    mint: Pubkey,
    settled: bool,
}

impl EntryReservation<'_> {
    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    /// Record the fill and open the position
    pub fn confirm(
        mut self,
        entry_base: TokenAmount,
        ladder: ExitLadder,
        signature: Option<String>,
    ) -> Result<PositionRecord> {
        let mut record = self
            .registry
            .records
            .get_mut(&self.mint)
            .ok_or_else(|| Error::Internal(format!("pending record vanished: {}", self.mint)))?;

        record.entry_base = entry_base;
        record.base_sold = TokenAmount::zero(entry_base.decimals());
        record.ladder = ladder;
        record.entry_signature = signature;
        record.state = LifecycleState::Open;
        record.touch();

        self.settled = true;
        Ok(record.value().clone())
    }
}

impl Drop for EntryReservation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let removed = self
            .registry
            .records
            .remove_if(&self.mint, |_, r| r.state == LifecycleState::PendingEntry);
        if removed.is_some() {
            debug!(mint = %self.mint, "Released unconfirmed entry");
        }
    }
}

/// Exit claim on one instrument. Dropped unsettled, the record returns to `Open`.
pub struct ExitReservation<'a> {
    registry: &'a PositionRegistry,
    mint: Pubkey,
    settled: bool,
}

impl ExitReservation<'_> {
    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    pub fn record(&self) -> Result<PositionRecord> {
        self.registry
            .get(&self.mint)
            .ok_or_else(|| Error::PositionNotFound(self.mint.to_string()))
    }

    /// Book a confirmed sale. `remaining` is the balance still held afterwards.
    pub fn record_sale(
        mut self,
        sold: TokenAmount,
        proceeds: TokenAmount,
        remaining: TokenAmount,
    ) -> Result<SaleResult> {
        let updated = {
            let mut record = self
                .registry
                .records
                .get_mut(&self.mint)
                .ok_or_else(|| Error::PositionNotFound(self.mint.to_string()))?;

            record.base_sold = record.base_sold.checked_add(sold)?;
            record.quote_proceeds = record.quote_proceeds.checked_add(proceeds)?;
            record.state = if remaining.is_zero() {
                LifecycleState::Closed
            } else {
                LifecycleState::Open
            };
            record.touch();
            record.value().clone()
        };

        self.settled = true;

        if updated.state == LifecycleState::Closed {
            self.registry.records.remove(&self.mint);
            Ok(SaleResult::Closed(PositionClosed::from(&updated)))
        } else {
            Ok(SaleResult::Partial(updated))
        }
    }
}

impl Drop for ExitReservation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(mut record) = self.registry.records.get_mut(&self.mint) {
            if record.state == LifecycleState::Exiting {
                record.state = LifecycleState::Open;
                record.touch();
            }
        } else {
            warn!(mint = %self.mint, "Exit released for a missing record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(raw: u128) -> TokenAmount {
        TokenAmount::new(raw, 9)
    }

    fn base(raw: u128) -> TokenAmount {
        TokenAmount::new(raw, 6)
    }

    fn open_position(registry: &PositionRegistry, mint: Pubkey) {
        let reservation = registry.reserve_entry(mint, quote(100), 6).unwrap();
        reservation
            .confirm(base(1_000), ExitLadder::default(), Some("sig".into()))
            .unwrap();
    }

    #[test]
    fn test_second_entry_rejected_while_pending() {
        let registry = PositionRegistry::new(None);
        let mint = Pubkey::new_unique();

        let first = registry.reserve_entry(mint, quote(100), 6).unwrap();
        assert!(matches!(
            registry.reserve_entry(mint, quote(100), 6),
            Err(Error::PositionActive(_))
        ));

        drop(first);
        assert!(!registry.contains(&mint));
        assert!(registry.reserve_entry(mint, quote(100), 6).is_ok());
    }

    #[test]
    fn test_entry_rejected_while_open_or_exiting() {
        let registry = PositionRegistry::new(None);
        let mint = Pubkey::new_unique();
        open_position(&registry, mint);

        assert!(registry.reserve_entry(mint, quote(100), 6).is_err());

        let exit = registry.begin_exit(&mint).unwrap();
        assert!(registry.reserve_entry(mint, quote(100), 6).is_err());
        assert!(matches!(
            registry.begin_exit(&mint),
            Err(Error::PositionActive(_))
        ));
        drop(exit);

        assert_eq!(registry.get(&mint).unwrap().state, LifecycleState::Open);
    }

    #[test]
    fn test_partial_then_full_exit() {
        let registry = PositionRegistry::new(None);
        let mint = Pubkey::new_unique();
        open_position(&registry, mint);

        let exit = registry.begin_exit(&mint).unwrap();
        let result = exit.record_sale(base(400), quote(44), base(600)).unwrap();
        match result {
            SaleResult::Partial(record) => {
                assert_eq!(record.base_sold, base(400));
                assert_eq!(record.state, LifecycleState::Open);
            }
            other => panic!("expected partial sale, got {:?}", other),
        }

        let exit = registry.begin_exit(&mint).unwrap();
        let result = exit.record_sale(base(600), quote(70), base(0)).unwrap();
        match result {
            SaleResult::Closed(closed) => {
                assert_eq!(closed.mint, mint);
                assert_eq!(closed.base_sold, base(1_000));
                assert_eq!(closed.quote_proceeds, quote(114));
            }
            other => panic!("expected close, got {:?}", other),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_exit_without_record() {
        let registry = PositionRegistry::new(None);
        assert!(matches!(
            registry.begin_exit(&Pubkey::new_unique()),
            Err(Error::PositionNotFound(_))
        ));
    }

    #[test]
    fn test_adopt_does_not_replace() {
        let registry = PositionRegistry::new(None);
        let mint = Pubkey::new_unique();
        open_position(&registry, mint);

        let adopted = PositionRecord::adopted(mint, quote(1), base(5), ExitLadder::default());
        assert!(!registry.adopt(adopted));
        assert_eq!(registry.get(&mint).unwrap().entry_base, base(1_000));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");

        let registry = PositionRegistry::new(Some(path.clone()));
        let open_mint = Pubkey::new_unique();
        open_position(&registry, open_mint);
        let _pending = registry
            .reserve_entry(Pubkey::new_unique(), quote(100), 6)
            .unwrap();
        registry.save().await.unwrap();

        let restored = PositionRegistry::new(Some(path));
        assert_eq!(restored.load().await.unwrap(), 1);
        let record = restored.get(&open_mint).unwrap();
        assert_eq!(record.state, LifecycleState::Open);
        assert_eq!(record.entry_base, base(1_000));
    }
}
