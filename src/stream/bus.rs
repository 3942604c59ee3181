//! Typed publish/subscribe over a bounded channel
//!
//! Events for different instruments carry no ordering guarantee relative to
//! each other. Subscribers share the stream: each event goes to one of them.

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::amount::TokenAmount;
use crate::error::{Error, Result};
use crate::types::{BalanceUpdate, MarketInfo, PoolState};

/// Event delivered by the feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A pool was created or its state changed
    NewPool { pool_id: Pubkey, state: PoolState },
    /// Order book market metadata seen
    Market(MarketInfo),
    /// A wallet token account balance changed
    WalletBalance(BalanceUpdate),
}

impl FeedEvent {
    /// Instrument the event is about, if any
    pub fn mint(&self) -> Option<Pubkey> {
        match self {
            FeedEvent::NewPool { state, .. } => Some(state.base_mint),
            FeedEvent::Market(_) => None,
            FeedEvent::WalletBalance(update) => Some(update.mint),
        }
    }
}

pub type EventStream = async_channel::Receiver<FeedEvent>;

/// Cheap, cloneable publishing side
#[derive(Clone)]
pub struct EventPublisher {
    tx: async_channel::Sender<FeedEvent>,
}

impl EventPublisher {
    pub async fn publish(&self, event: FeedEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::BusClosed)
    }

    pub async fn new_pool(&self, pool_id: Pubkey, state: PoolState) -> Result<()> {
        self.publish(FeedEvent::NewPool { pool_id, state }).await
    }

    pub async fn market(&self, market: MarketInfo) -> Result<()> {
        self.publish(FeedEvent::Market(market)).await
    }

    pub async fn wallet_balance(&self, mint: Pubkey, balance: TokenAmount) -> Result<()> {
        self.publish(FeedEvent::WalletBalance(BalanceUpdate::new(mint, balance)))
            .await
    }

    /// Publish without waiting; fails when the bus is full or closed
    pub fn try_publish(&self, event: FeedEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            async_channel::TrySendError::Full(_) => {
                Error::Internal("event bus is full".to_string())
            }
            async_channel::TrySendError::Closed(_) => Error::BusClosed,
        })
    }

    /// Close the bus for every publisher and subscriber
    pub fn close(&self) -> bool {
        debug!("Closing event bus");
        self.tx.close()
    }
}

/// Event bus owning both channel ends
pub struct EventBus {
    tx: async_channel::Sender<FeedEvent>,
    rx: async_channel::Receiver<FeedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> EventStream {
        self.rx.clone()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1_024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pool_state;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(8);
        let publisher = bus.publisher();
        let stream = bus.subscribe();

        let mint = Pubkey::new_unique();
        let pool_id = Pubkey::new_unique();
        publisher.new_pool(pool_id, pool_state(mint, 1)).await.unwrap();
        publisher
            .wallet_balance(mint, TokenAmount::new(42, 6))
            .await
            .unwrap();

        let first = stream.recv().await.unwrap();
        assert_eq!(first.mint(), Some(mint));
        assert!(matches!(first, FeedEvent::NewPool { pool_id: id, .. } if id == pool_id));

        match stream.recv().await.unwrap() {
            FeedEvent::WalletBalance(update) => assert_eq!(update.balance.raw(), 42),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_bus_rejects_publish() {
        let bus = EventBus::new(1);
        let publisher = bus.publisher();
        publisher.close();

        let err = publisher
            .wallet_balance(Pubkey::new_unique(), TokenAmount::zero(6))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BusClosed));
    }

    #[test]
    fn test_try_publish_when_full() {
        let bus = EventBus::new(1);
        let publisher = bus.publisher();
        let event = FeedEvent::WalletBalance(BalanceUpdate::new(
            Pubkey::new_unique(),
            TokenAmount::zero(6),
        ));

        publisher.try_publish(event.clone()).unwrap();
        assert!(publisher.try_publish(event).is_err());
        assert_eq!(bus.len(), 1);
    }
}
