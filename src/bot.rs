//! Event loop driving the position controller
//!
//! New pools become entry attempts, wallet balance changes become exit
//! attempts. Every event is handled in its own task so a slow instrument never
//! holds up the others.

use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::amount::TokenAmount;
use crate::cache::{MarketCache, PoolCache};
use crate::config::Config;
use crate::error::Result;
use crate::filter::{build_pipeline, NativeBalanceReader, SnipeList};
use crate::position::{
    Collaborators, ControllerSettings, EntryOutcome, ExitOutcome, PositionController,
    PositionRegistry,
};
use crate::stream::{EventStream, FeedEvent};
use crate::trading::{DryRunExecutor, SwapExecutor, SwapQuoter};
use crate::types::Candidate;
use crate::wallet::{TrackedBalances, WalletReader};

/// Services the bot cannot provide itself
pub struct ExternalServices {
    pub quoter: Arc<dyn SwapQuoter>,
    /// Ignored in dry-run mode
    pub executor: Arc<dyn SwapExecutor>,
    /// Backs the authority balance filter when present
    pub native_balances: Option<Arc<dyn NativeBalanceReader>>,
    /// Trading wallet. Feed balance updates take precedence over it.
    pub wallet: Arc<dyn WalletReader>,
}

pub struct Bot {
    controller: Arc<PositionController>,
    pools: Arc<PoolCache>,
    markets: Arc<MarketCache>,
    balances: Arc<TrackedBalances>,
    events: EventStream,
    auto_sell: bool,
    snipe_list_refresh: Option<(Arc<SnipeList>, Duration)>,
}

impl Bot {
    pub fn new(
        controller: Arc<PositionController>,
        pools: Arc<PoolCache>,
        markets: Arc<MarketCache>,
        balances: Arc<TrackedBalances>,
        events: EventStream,
    ) -> Self {
        Self {
            controller,
            pools,
            markets,
            balances,
            events,
            auto_sell: true,
            snipe_list_refresh: None,
        }
    }

    /// React to wallet balance changes by selling. On by default.
    pub fn with_auto_sell(mut self, enabled: bool) -> Self {
        self.auto_sell = enabled;
        self
    }

    /// Reload `list` from disk every `every` while running
    pub fn with_snipe_list_refresh(mut self, list: Arc<SnipeList>, every: Duration) -> Self {
        self.snipe_list_refresh = Some((list, every));
        self
    }

    /// Wire a bot from configuration
    pub async fn assemble(
        config: &Config,
        external: ExternalServices,
        events: EventStream,
    ) -> Result<Self> {
        let settings = ControllerSettings::from_config(config)?;
        let pipeline = build_pipeline(config, external.native_balances)?;

        let snipe_list = if config.snipe_list.enabled {
            let list = Arc::new(SnipeList::load(&config.snipe_list.path).await?);
            info!(
                entries = list.len().await,
                path = %config.snipe_list.path,
                "Snipe list loaded"
            );
            Some(list)
        } else {
            None
        };

        let executor: Arc<dyn SwapExecutor> = if settings.dry_run {
            warn!("Running in DRY-RUN mode - no real trades will be executed");
            Arc::new(DryRunExecutor::new())
        } else {
            external.executor
        };

        let pools = Arc::new(PoolCache::new());
        let markets = Arc::new(MarketCache::new());
        let balances = Arc::new(TrackedBalances::backed_by(external.wallet));

        let registry = Arc::new(PositionRegistry::new(
            config.persistence.positions_path.as_ref().map(PathBuf::from),
        ));

        let services = Collaborators {
            pools: pools.clone(),
            markets: markets.clone(),
            quoter: external.quoter,
            executor,
            wallet: balances.clone(),
        };

        let controller = Arc::new(PositionController::new(
            settings,
            services,
            pipeline,
            snipe_list.clone(),
            registry,
        ));

        let mut bot = Bot::new(controller, pools, markets, balances, events)
            .with_auto_sell(config.exit.auto_sell);
        if let Some(list) = snipe_list {
            let every = Duration::from_millis(config.snipe_list.refresh_interval_ms);
            bot = bot.with_snipe_list_refresh(list, every);
        }
        Ok(bot)
    }

    pub fn controller(&self) -> &Arc<PositionController> {
        &self.controller
    }

    /// Consume events until the stream closes or `cancel` fires.
    ///
    /// Tasks still running at cancellation are aborted; their reservations
    /// are released on drop.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.controller.validate().await?;

        match self.controller.registry().load().await {
            Ok(n) if n > 0 => info!("Resumed {} open positions", n),
            Ok(_) => {}
            Err(e) => warn!("Could not load positions: {} (starting fresh)", e),
        }

        let refresher = self.snipe_list_refresh.as_ref().map(|(list, every)| {
            list.clone().spawn_refresh(*every, cancel.child_token())
        });

        info!(auto_sell = self.auto_sell, "Bot started, listening for pools");

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested");
                    tasks.abort_all();
                    break;
                }
                event = self.events.recv() => match event {
                    Ok(event) => self.dispatch(event, &mut tasks),
                    Err(_) => {
                        info!("Event stream closed");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        if let Some(handle) = refresher {
            handle.abort();
        }

        self.controller.registry().save().await?;
        info!("Bot stopped");
        Ok(())
    }

    fn dispatch(&self, event: FeedEvent, tasks: &mut JoinSet<()>) {
        match event {
            FeedEvent::NewPool { pool_id, state } => {
                if !self.pools.save(pool_id, state.clone()) {
                    trace!(mint = %state.base_mint, "Pool already seen");
                    return;
                }
                let worker = self.worker();
                tasks.spawn(worker.enter(Candidate::new(pool_id, state)));
            }
            FeedEvent::Market(market) => self.markets.save(market),
            FeedEvent::WalletBalance(update) => {
                self.balances.update(update.mint, update.balance);
                if update.mint == self.controller.settings().quote.mint {
                    trace!(balance = %update.balance, "Quote balance changed");
                    return;
                }
                if self.auto_sell {
                    let worker = self.worker();
                    tasks.spawn(worker.exit(update.mint, update.balance));
                }
            }
        }
    }

    fn worker(&self) -> Worker {
        Worker {
            controller: self.controller.clone(),
            balances: self.balances.clone(),
            auto_sell: self.auto_sell,
        }
    }
}

fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("Event task panicked: {}", e);
        }
    }
}

/// Per-event task state
struct Worker {
    controller: Arc<PositionController>,
    balances: Arc<TrackedBalances>,
    auto_sell: bool,
}

impl Worker {
    async fn enter(self, candidate: Candidate) {
        let mint = candidate.mint;

        let record = match self.controller.evaluate_and_enter(&candidate).await {
            Ok(EntryOutcome::Entered(record)) => record,
            Ok(EntryOutcome::Skipped(reason)) => {
                trace!(mint = %mint, reason = ?reason, "Entry skipped");
                return;
            }
            Ok(EntryOutcome::Failed { attempts, last_error }) => {
                warn!(
                    mint = %mint,
                    attempts,
                    error = last_error.as_deref().unwrap_or("unconfirmed"),
                    "Entry failed"
                );
                return;
            }
            Err(e) => {
                warn!(mint = %mint, error = %e, "Entry aborted");
                return;
            }
        };

        if !self.auto_sell {
            return;
        }

        // A balance event that raced the entry was skipped as busy
        let held = if self.controller.settings().dry_run {
            Some(record.entry_base)
        } else {
            match self.balances.token_balance(&mint).await {
                Ok(balance) => balance,
                Err(e) => {
                    debug!(mint = %mint, error = %e, "Balance lookup failed");
                    None
                }
            }
        };

        if let Some(held) = held {
            self.exit(mint, held).await;
        }
    }

    async fn exit(self, mint: Pubkey, balance: TokenAmount) {
        let mut held = balance;
        loop {
            match self.controller.evaluate_and_exit(mint, held).await {
                Ok(ExitOutcome::Sold {
                    remaining,
                    closed: None,
                    ..
                }) if !remaining.is_zero() => {
                    debug!(mint = %mint, remaining = %remaining, "Watching remaining balance");
                    held = remaining;
                }
                Ok(ExitOutcome::Sold { .. }) => return,
                Ok(ExitOutcome::Skipped(reason)) => {
                    debug!(mint = %mint, reason = ?reason, "Exit skipped");
                    return;
                }
                Ok(ExitOutcome::Failed { attempts, last_error }) => {
                    warn!(
                        mint = %mint,
                        attempts,
                        error = last_error.as_deref().unwrap_or("unconfirmed"),
                        "Exit failed"
                    );
                    return;
                }
                Err(e) => {
                    warn!(mint = %mint, error = %e, "Exit aborted");
                    return;
                }
            }
        }
    }
}
