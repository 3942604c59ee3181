//! Stream module - feed events into the control loop
//!
//! Whatever listens to the chain (websocket subscriptions, gRPC streams) publishes
//! decoded events here. The bot consumes them.

pub mod bus;

pub use bus::{EventBus, EventPublisher, EventStream, FeedEvent};
