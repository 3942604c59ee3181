//! Position lifecycle: entry, laddered exits and bookkeeping

pub mod controller;
pub mod exit;
pub mod ladder;
pub mod lane;
pub mod record;
pub mod registry;

pub use controller::{
    Collaborators, ControllerSettings, EntryOutcome, EntrySkip, ExitOutcome, ExitSkip,
    PositionController,
};
pub use exit::{ExitDecision, ExitRules, TriggerType};
pub use ladder::{ExitLadder, TakeProfitLevel, TakeProfitPoint};
pub use lane::{ExclusivityToken, SellInFlight};
pub use record::{LifecycleState, PositionClosed, PositionRecord};
pub use registry::{PositionRegistry, SaleResult};
