//! Position controller
//!
//! Owns the entry and exit lifecycle of every instrument:
//!
//! ```text
//! IDLE -> ENTERING -> OPEN -> EXITING -> CLOSED
//!                      ^         |
//!                      +---------+  (partial exit)
//! ```
//!
//! Network calls to the execution backend only happen while entering or
//! exiting. Errors for one instrument are returned to the caller and never
//! affect other instruments.

use solana_sdk::pubkey::Pubkey;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

use crate::amount::{Percent, QuoteToken, TokenAmount};
use crate::cache::{MarketSource, PoolSource};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{
    debounced_accept, DebounceSettings, EligibilityPipeline, EligibilityVerdict, SnipeList,
};
use crate::position::exit::{ExitDecision, ExitRules, TriggerType};
use crate::position::ladder::{stop_loss_threshold, ExitLadder, TakeProfitLevel};
use crate::position::lane::{ExclusivityToken, SellInFlight};
use crate::position::record::{PositionClosed, PositionRecord};
use crate::position::registry::{PositionRegistry, SaleResult};
use crate::scheduler::poll_until;
use crate::trading::{
    submit_with_budget, ExecutionStrategy, PriorityFees, RetryBudget, SubmitResult,
    SwapDirection, SwapExecutor, SwapOutcome, SwapPlan, SwapQuoter, SwapRequest,
};
use crate::types::{Candidate, PoolKeys, PoolState};
use crate::wallet::WalletReader;

const CLOSED_CHANNEL_CAPACITY: usize = 64;

/// Controller settings, resolved once from [`Config`]
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub quote: QuoteToken,
    /// Quote amount spent per entry
    pub quote_amount: TokenAmount,
    pub one_token_at_a_time: bool,
    pub auto_buy_delay: Duration,
    pub max_buy_retries: u32,
    pub buy_slippage: Percent,
    pub auto_sell_delay: Duration,
    pub max_sell_retries: u32,
    pub sell_slippage: Percent,
    /// Zero disables the stop loss
    pub stop_loss: Percent,
    pub price_check_interval: Duration,
    pub price_check_duration: Duration,
    pub take_profit: Vec<TakeProfitLevel>,
    pub debounce: DebounceSettings,
    /// Listed mints are the only ones traded
    pub snipe_list_exclusive: bool,
    pub strategy: ExecutionStrategy,
    pub priority_fees: PriorityFees,
    pub dry_run: bool,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            quote: config.quote_token()?,
            quote_amount: config.quote_amount()?,
            one_token_at_a_time: config.trading.one_token_at_a_time,
            auto_buy_delay: Duration::from_millis(config.trading.auto_buy_delay_ms),
            max_buy_retries: config.trading.max_buy_retries,
            buy_slippage: config.trading.buy_slippage_pct,
            auto_sell_delay: Duration::from_millis(config.exit.auto_sell_delay_ms),
            max_sell_retries: config.exit.max_sell_retries,
            sell_slippage: config.exit.sell_slippage_pct,
            stop_loss: config.exit.stop_loss_pct,
            price_check_interval: config.price_check_interval(),
            price_check_duration: config.price_check_duration(),
            take_profit: config.exit.take_profit.clone(),
            debounce: DebounceSettings {
                interval: config.filter_check_interval(),
                duration: config.filter_check_duration(),
                required: config.filters.consecutive_matches,
            },
            snipe_list_exclusive: config.snipe_list.exclusive,
            strategy: config.execution_strategy(),
            priority_fees: PriorityFees {
                compute_unit_limit: config.trading.compute_unit_limit,
                compute_unit_price: config.trading.compute_unit_price,
            },
            dry_run: config.trading.dry_run,
        })
    }
}

/// External services the controller reads from and submits through
#[derive(Clone)]
pub struct Collaborators {
    pub pools: Arc<dyn PoolSource>,
    pub markets: Arc<dyn MarketSource>,
    pub quoter: Arc<dyn SwapQuoter>,
    pub executor: Arc<dyn SwapExecutor>,
    pub wallet: Arc<dyn WalletReader>,
}

/// Why an entry was not attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySkip {
    NotInSnipeList,
    /// Another entry holds the single lane
    LaneBusy,
    /// An exit is running in single-lane mode
    SellInProgress,
    /// The instrument already has a live position
    AlreadyActive,
    Ineligible(EligibilityVerdict),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Entered(PositionRecord),
    Skipped(EntrySkip),
    /// Retry budget spent without a confirmed fill
    Failed {
        attempts: u32,
        last_error: Option<String>,
    },
}

/// Why an exit was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSkip {
    EmptyBalance,
    /// Entry or exit already in progress for the instrument
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    Sold {
        trigger: TriggerType,
        sold: TokenAmount,
        proceeds: TokenAmount,
        /// Balance still held after the sale
        remaining: TokenAmount,
        closed: Option<PositionClosed>,
    },
    Skipped(ExitSkip),
    Failed {
        attempts: u32,
        last_error: Option<String>,
    },
}

pub struct PositionController {
    settings: ControllerSettings,
    services: Collaborators,
    pipeline: EligibilityPipeline,
    snipe_list: Option<Arc<SnipeList>>,
    registry: Arc<PositionRegistry>,
    lane: ExclusivityToken,
    sells: Arc<SellInFlight>,
    closed_tx: broadcast::Sender<PositionClosed>,
}

impl PositionController {
    pub fn new(
        settings: ControllerSettings,
        services: Collaborators,
        pipeline: EligibilityPipeline,
        snipe_list: Option<Arc<SnipeList>>,
        registry: Arc<PositionRegistry>,
    ) -> Self {
        let (closed_tx, _) = broadcast::channel(CLOSED_CHANNEL_CAPACITY);
        Self {
            settings,
            services,
            pipeline,
            snipe_list,
            registry,
            lane: ExclusivityToken::new(),
            sells: Arc::new(SellInFlight::new()),
            closed_tx,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<PositionRegistry> {
        &self.registry
    }

    pub fn lane(&self) -> &ExclusivityToken {
        &self.lane
    }

    pub fn sells_in_flight(&self) -> usize {
        self.sells.count()
    }

    /// Notifications for fully exited positions
    pub fn subscribe_closed(&self) -> broadcast::Receiver<PositionClosed> {
        self.closed_tx.subscribe()
    }

    /// Startup check: the wallet must hold a quote token account
    pub async fn validate(&self) -> Result<()> {
        if self.settings.dry_run {
            return Ok(());
        }

        let wallet = &self.services.wallet;
        match wallet.token_balance(&self.settings.quote.mint).await? {
            Some(_) => Ok(()),
            None => {
                error!(
                    "{} token account not found in wallet: {}",
                    self.settings.quote.symbol,
                    wallet.owner()
                );
                Err(Error::Config(format!(
                    "{} token account not found in wallet {}",
                    self.settings.quote.symbol,
                    wallet.owner()
                )))
            }
        }
    }

    /// Decide on a new pool and buy it when it qualifies
    pub async fn evaluate_and_enter(&self, candidate: &Candidate) -> Result<EntryOutcome> {
        let mint = candidate.mint;
        trace!(mint = %mint, "Processing new pool");

        let listed = match &self.snipe_list {
            Some(list) => list.contains(&mint).await,
            None => false,
        };
        if self.snipe_list.is_some() && self.settings.snipe_list_exclusive && !listed {
            debug!(mint = %mint, "Skipping buy because token is not in the snipe list");
            return Ok(EntryOutcome::Skipped(EntrySkip::NotInSnipeList));
        }

        if !self.settings.auto_buy_delay.is_zero() {
            debug!(
                mint = %mint,
                "Waiting for {}ms before buy",
                self.settings.auto_buy_delay.as_millis()
            );
            tokio::time::sleep(self.settings.auto_buy_delay).await;
        }

        let _lane = if self.settings.one_token_at_a_time {
            let Some(guard) = self.lane.try_acquire() else {
                debug!(mint = %mint, "Skipping buy because another token is being bought");
                return Ok(EntryOutcome::Skipped(EntrySkip::LaneBusy));
            };
            if self.sells.count() > 0 {
                debug!(mint = %mint, "Skipping buy because a sell is in progress");
                return Ok(EntryOutcome::Skipped(EntrySkip::SellInProgress));
            }
            Some(guard)
        } else {
            None
        };

        let reservation = match self.registry.reserve_entry(
            mint,
            self.settings.quote_amount,
            candidate.state.base_decimals,
        ) {
            Ok(r) => r,
            Err(Error::PositionActive(state)) => {
                debug!(mint = %mint, state = %state, "Skipping buy because position is already active");
                return Ok(EntryOutcome::Skipped(EntrySkip::AlreadyActive));
            }
            Err(e) => return Err(e),
        };

        let keys = self.pool_keys(candidate.pool_id, &candidate.state).await?;

        if !listed {
            let outcome = debounced_accept(&self.pipeline, candidate, self.settings.debounce).await;
            if !outcome.accepted {
                trace!(
                    mint = %mint,
                    runs = outcome.runs,
                    "Skipping buy because pool doesn't match filters"
                );
                let verdict = outcome.last_verdict.unwrap_or(EligibilityVerdict {
                    passed: false,
                    reasons: Vec::new(),
                });
                return Ok(EntryOutcome::Skipped(EntrySkip::Ineligible(verdict)));
            }
        }

        info!(mint = %mint, "Buying token");

        let amount_in = self.settings.quote_amount;
        let max = self.settings.max_buy_retries;
        let result = submit_with_budget(RetryBudget::new(max), &mint, "buy", |attempt| {
            let keys = &keys;
            async move {
                info!(mint = %mint, "Send buy transaction attempt: {}/{}", attempt, max);
                self.submit_swap(keys, SwapDirection::Buy, amount_in, false)
                    .await
            }
        })
        .await?;

        match result {
            SubmitResult::Confirmed { outcome, .. } => {
                let entry_base = outcome
                    .amount_out
                    .unwrap_or_else(|| TokenAmount::zero(keys.base_decimals));
                let ladder = ExitLadder::build(amount_in, entry_base, &self.settings.take_profit)?;
                let record = reservation.confirm(entry_base, ladder, outcome.signature)?;

                info!(
                    mint = %mint,
                    position = %record.id,
                    entry_quote = %record.entry_quote,
                    entry_base = %record.entry_base,
                    steps = record.ladder.len(),
                    "Position opened"
                );
                self.persist().await;
                Ok(EntryOutcome::Entered(record))
            }
            SubmitResult::Exhausted {
                attempts,
                last_error,
            } => {
                error!(mint = %mint, attempts, "Failed to buy token");
                Ok(EntryOutcome::Failed {
                    attempts,
                    last_error,
                })
            }
        }
    }

    /// React to an observed balance of `mint`: wait for an exit signal, then sell
    pub async fn evaluate_and_exit(
        &self,
        mint: Pubkey,
        observed_balance: TokenAmount,
    ) -> Result<ExitOutcome> {
        let _sell = self
            .settings
            .one_token_at_a_time
            .then(|| self.sells.enter());

        trace!(mint = %mint, balance = %observed_balance, "Processing new token");

        if observed_balance.is_zero() {
            if self.registry.discard(&mint).is_some() {
                self.persist().await;
            }
            info!(mint = %mint, "Empty balance, can't sell");
            return Ok(ExitOutcome::Skipped(ExitSkip::EmptyBalance));
        }

        let pool = self
            .services
            .pools
            .fetch_pool_state(&mint)
            .await?
            .ok_or_else(|| Error::PoolNotFound(mint.to_string()))?;

        if !self.registry.contains(&mint) {
            let ladder = ExitLadder::build(
                self.settings.quote_amount,
                observed_balance,
                &self.settings.take_profit,
            )?;
            let record = PositionRecord::adopted(
                mint,
                self.settings.quote_amount,
                observed_balance,
                ladder,
            );
            if self.registry.adopt(record) {
                self.persist().await;
            }
        }

        let reservation = match self.registry.begin_exit(&mint) {
            Ok(r) => r,
            Err(Error::PositionActive(state)) => {
                debug!(mint = %mint, state = %state, "Skipping sell because position is busy");
                return Ok(ExitOutcome::Skipped(ExitSkip::Busy));
            }
            Err(e) => return Err(e),
        };

        if !self.settings.auto_sell_delay.is_zero() {
            debug!(
                mint = %mint,
                "Waiting for {}ms before sell",
                self.settings.auto_sell_delay.as_millis()
            );
            tokio::time::sleep(self.settings.auto_sell_delay).await;
        }

        let record = reservation.record()?;
        let keys = self.pool_keys(pool.id, &pool.state).await?;

        let decision = self.price_match(&keys, &record, observed_balance).await?;
        let sell_amount = decision.sell_amount;
        let closes_account = sell_amount == observed_balance;

        info!(
            mint = %mint,
            trigger = ?decision.trigger,
            amount = %sell_amount,
            held = %observed_balance,
            "Selling token"
        );

        let max = self.settings.max_sell_retries;
        let result = submit_with_budget(RetryBudget::new(max), &mint, "sell", |attempt| {
            let keys = &keys;
            async move {
                info!(mint = %mint, "Send sell transaction attempt: {}/{}", attempt, max);
                self.submit_swap(keys, SwapDirection::Sell, sell_amount, closes_account)
                    .await
            }
        })
        .await?;

        let outcome = match result {
            SubmitResult::Confirmed { outcome, .. } => outcome,
            SubmitResult::Exhausted {
                attempts,
                last_error,
            } => {
                error!(mint = %mint, attempts, "Failed to sell token");
                return Ok(ExitOutcome::Failed {
                    attempts,
                    last_error,
                });
            }
        };

        let proceeds = outcome
            .amount_out
            .unwrap_or_else(|| TokenAmount::zero(self.settings.quote.decimals));
        let remaining = observed_balance.saturating_sub(sell_amount);

        let closed = match reservation.record_sale(sell_amount, proceeds, remaining)? {
            SaleResult::Closed(closed) => {
                info!(
                    mint = %mint,
                    proceeds = %closed.quote_proceeds,
                    sold = %closed.base_sold,
                    "Position closed"
                );
                // No subscribers is fine
                let _ = self.closed_tx.send(closed.clone());
                Some(closed)
            }
            SaleResult::Partial(record) => {
                info!(
                    mint = %mint,
                    sold = %record.base_sold,
                    remaining = %remaining,
                    "Partial exit"
                );
                None
            }
        };
        self.persist().await;

        Ok(ExitOutcome::Sold {
            trigger: decision.trigger,
            sold: sell_amount,
            proceeds,
            remaining,
            closed,
        })
    }

    /// Poll the position's value until take profit or stop loss fires.
    /// Without a signal the whole balance is sold.
    async fn price_match(
        &self,
        keys: &PoolKeys,
        record: &PositionRecord,
        held: TokenAmount,
    ) -> Result<ExitDecision> {
        if record.entry_base.is_zero() {
            return Ok(ExitRules::fallback(held));
        }

        let stop_loss = if self.settings.stop_loss.is_zero() {
            None
        } else {
            Some(stop_loss_threshold(record.entry_quote, self.settings.stop_loss)?)
        };
        let rules = ExitRules {
            ladder: &record.ladder,
            stop_loss_threshold: stop_loss,
        };

        let decision: Mutex<Option<ExitDecision>> = Mutex::new(None);
        let mint = record.mint;

        let outcome = poll_until(
            self.settings.price_check_interval,
            self.settings.price_check_duration,
            |_| {
                let rules = &rules;
                let decision = &decision;
                async move {
                    let quote = self
                        .services
                        .quoter
                        .quote_swap(
                            keys,
                            record.entry_base,
                            SwapDirection::Sell,
                            self.settings.sell_slippage,
                        )
                        .await?;
                    let value = quote.price_amount_out;

                    debug!(
                        mint = %mint,
                        stop_loss = %stop_loss.map(|s| s.to_string()).unwrap_or_default(),
                        current = %value,
                        "Price check"
                    );

                    match rules.evaluate(value, record.base_sold, held)? {
                        Some(found) => {
                            if let Ok(mut slot) = decision.lock() {
                                *slot = Some(found);
                            }
                            Ok(true)
                        }
                        None => Ok(false),
                    }
                }
            },
        )
        .await;

        let found = decision.into_inner().unwrap_or_default();
        match found {
            Some(decision) if outcome.matched => Ok(decision),
            _ => {
                debug!(
                    mint = %mint,
                    checks = outcome.attempts_run,
                    "No exit signal, selling balance"
                );
                Ok(ExitRules::fallback(held))
            }
        }
    }

    async fn submit_swap(
        &self,
        keys: &PoolKeys,
        direction: SwapDirection,
        amount_in: TokenAmount,
        closes_input: bool,
    ) -> Result<SwapOutcome> {
        let slippage = match direction {
            SwapDirection::Buy => self.settings.buy_slippage,
            SwapDirection::Sell => self.settings.sell_slippage,
        };

        let quote = self
            .services
            .quoter
            .quote_swap(keys, amount_in, direction, slippage)
            .await?;

        let request = SwapRequest {
            pool: keys.clone(),
            direction,
            amount_in,
            min_amount_out: quote.min_amount_out,
            expected_amount_out: quote.price_amount_out,
            slippage,
            plan: SwapPlan::assemble(
                &self.settings.strategy,
                &self.settings.priority_fees,
                keys,
                direction,
                closes_input,
            ),
        };

        let mut outcome = self.services.executor.build_and_submit_swap(&request).await?;
        if outcome.confirmed && outcome.amount_out.is_none() {
            outcome.amount_out = Some(quote.price_amount_out);
        }
        Ok(outcome)
    }

    async fn pool_keys(&self, pool_id: Pubkey, state: &PoolState) -> Result<PoolKeys> {
        let market_id = state.market_id;
        let market = self
            .services
            .markets
            .fetch_market_metadata(&market_id)
            .await?
            .ok_or_else(|| Error::MarketNotFound(market_id.to_string()))?;

        Ok(PoolKeys::assemble(pool_id, state, market))
    }

    async fn persist(&self) {
        if let Err(e) = self.registry.save().await {
            warn!(error = %e, "Failed to save positions");
        }
    }
}
