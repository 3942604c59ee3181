//! Test doubles shared by the unit tests

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::amount::{Percent, QuoteToken, TokenAmount};
use crate::cache::{MarketCache, PoolCache};
use crate::error::{Error, Result};
use crate::filter::{DebounceSettings, EligibilityPipeline, FilterCheck, PoolFilter, SnipeList};
use crate::position::controller::{Collaborators, ControllerSettings, PositionController};
use crate::position::ladder::TakeProfitLevel;
use crate::position::registry::PositionRegistry;
use crate::trading::{
    ExecutionStrategy, PriorityFees, SwapDirection, SwapExecutor, SwapOutcome, SwapQuote,
    SwapQuoter, SwapRequest,
};
use crate::types::{Candidate, MarketInfo, PoolKeys, PoolState};
use crate::wallet::TrackedBalances;

pub const QUOTE_DECIMALS: u8 = 9;
pub const BASE_DECIMALS: u8 = 6;

pub fn quote_units(raw: u128) -> TokenAmount {
    TokenAmount::new(raw, QUOTE_DECIMALS)
}

pub fn base_units(raw: u128) -> TokenAmount {
    TokenAmount::new(raw, BASE_DECIMALS)
}

pub fn pool_state(mint: Pubkey, quote_reserve_raw: u128) -> PoolState {
    PoolState {
        base_mint: mint,
        quote_mint: Pubkey::new_unique(),
        lp_mint: Pubkey::new_unique(),
        market_id: Pubkey::new_unique(),
        base_vault: Pubkey::new_unique(),
        quote_vault: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
        base_decimals: BASE_DECIMALS,
        quote_decimals: QUOTE_DECIMALS,
        quote_reserve: quote_units(quote_reserve_raw),
        open_time: 1_700_000_000,
    }
}

pub fn market_for(market_id: Pubkey) -> MarketInfo {
    MarketInfo {
        market_id,
        program_id: Pubkey::new_unique(),
        bids: Pubkey::new_unique(),
        asks: Pubkey::new_unique(),
        event_queue: Pubkey::new_unique(),
    }
}

pub fn candidate_with_reserve(mint: Pubkey, quote_reserve_raw: u128) -> Candidate {
    Candidate::new(Pubkey::new_unique(), pool_state(mint, quote_reserve_raw))
}

pub fn candidate(mint: Pubkey) -> Candidate {
    candidate_with_reserve(mint, 10_000)
}

pub fn pool_keys(mint: Pubkey) -> PoolKeys {
    let state = pool_state(mint, 10_000);
    let market = market_for(state.market_id);
    PoolKeys::assemble(Pubkey::new_unique(), &state, market)
}

enum Behavior {
    Pass,
    Fail(String),
    Hang,
    Error(Box<dyn Fn() -> Error + Send + Sync>),
    /// Scripted pass/fail per call; fails once the script runs out
    Sequence(Mutex<VecDeque<bool>>),
}

/// Filter with canned behaviour
pub struct ScriptedFilter {
    name: String,
    behavior: Behavior,
    delay: Option<Duration>,
    fail_open: bool,
    calls: AtomicU32,
}

impl ScriptedFilter {
    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: None,
            fail_open: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn passing(name: &str) -> Self {
        Self::with_behavior(name, Behavior::Pass)
    }

    pub fn failing(name: &str, detail: &str) -> Self {
        Self::with_behavior(name, Behavior::Fail(detail.to_string()))
    }

    pub fn hanging(name: &str) -> Self {
        Self::with_behavior(name, Behavior::Hang)
    }

    pub fn erroring(name: &str, make: impl Fn() -> Error + Send + Sync + 'static) -> Self {
        Self::with_behavior(name, Behavior::Error(Box::new(make)))
    }

    pub fn sequence(name: &str, script: Vec<bool>) -> Self {
        Self::with_behavior(name, Behavior::Sequence(Mutex::new(script.into())))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoolFilter for ScriptedFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fails_open_on_unsupported(&self) -> bool {
        self.fail_open
    }

    async fn check(&self, _candidate: &Candidate) -> Result<FilterCheck> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Pass => Ok(FilterCheck::pass("ok")),
            Behavior::Fail(detail) => Ok(FilterCheck::fail(detail.clone())),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(FilterCheck::pass("unreachable"))
            }
            Behavior::Error(make) => Err(make()),
            Behavior::Sequence(script) => {
                let next = script.lock().unwrap().pop_front().unwrap_or(false);
                if next {
                    Ok(FilterCheck::pass("scripted pass"))
                } else {
                    Ok(FilterCheck::fail("scripted fail"))
                }
            }
        }
    }
}

/// Quoter returning a fixed buy output and scripted sell values.
/// The last sell value repeats once the script runs out.
pub struct ScriptedQuoter {
    buy_out: TokenAmount,
    sell_values: Mutex<VecDeque<u128>>,
    sell_quotes: AtomicU32,
}

impl ScriptedQuoter {
    pub fn new(buy_out: TokenAmount, sell_values: Vec<u128>) -> Self {
        Self {
            buy_out,
            sell_values: Mutex::new(sell_values.into()),
            sell_quotes: AtomicU32::new(0),
        }
    }

    pub fn set_sell_values(&self, values: Vec<u128>) {
        *self.sell_values.lock().unwrap() = values.into();
    }

    pub fn sell_quotes(&self) -> u32 {
        self.sell_quotes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwapQuoter for ScriptedQuoter {
    async fn quote_swap(
        &self,
        _pool: &PoolKeys,
        _amount_in: TokenAmount,
        direction: SwapDirection,
        _slippage: Percent,
    ) -> Result<SwapQuote> {
        match direction {
            SwapDirection::Buy => Ok(SwapQuote {
                min_amount_out: self.buy_out,
                price_amount_out: self.buy_out,
            }),
            SwapDirection::Sell => {
                self.sell_quotes.fetch_add(1, Ordering::SeqCst);
                let mut values = self.sell_values.lock().unwrap();
                let value = if values.len() > 1 {
                    values.pop_front()
                } else {
                    values.front().copied()
                }
                .ok_or_else(|| Error::Quote("no sell price scripted".into()))?;

                Ok(SwapQuote {
                    min_amount_out: quote_units(value),
                    price_amount_out: quote_units(value),
                })
            }
        }
    }
}

/// One scripted executor response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Confirm,
    Unconfirmed,
    TransportError,
}

/// Executor replaying a script, then repeating a default step
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Step>>,
    default: Step,
    delay: Option<Duration>,
    calls: AtomicU32,
    requests: Mutex<Vec<SwapRequest>>,
}

impl ScriptedExecutor {
    pub fn new(default: Step) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default,
            delay: None,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn confirming() -> Self {
        Self::new(Step::Confirm)
    }

    pub fn with_script(self, script: Vec<Step>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SwapRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapExecutor for ScriptedExecutor {
    async fn build_and_submit_swap(&self, request: &SwapRequest) -> Result<SwapOutcome> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);

        match step {
            Step::Confirm => Ok(SwapOutcome::confirmed(format!("sig-{}", n), None)),
            Step::Unconfirmed => Ok(SwapOutcome::unconfirmed(
                Some(format!("sig-{}", n)),
                "transaction expired",
            )),
            Step::TransportError => Err(Error::TransactionSend("connection reset".into())),
        }
    }
}

/// Controller settings with no delays and a single-run filter window
pub fn settings() -> ControllerSettings {
    ControllerSettings {
        quote: QuoteToken::resolve("WSOL").unwrap(),
        quote_amount: quote_units(100),
        one_token_at_a_time: true,
        auto_buy_delay: Duration::ZERO,
        max_buy_retries: 3,
        buy_slippage: Percent::from_whole(20),
        auto_sell_delay: Duration::ZERO,
        max_sell_retries: 3,
        sell_slippage: Percent::from_whole(20),
        stop_loss: Percent::from_whole(20),
        price_check_interval: Duration::from_millis(100),
        price_check_duration: Duration::from_millis(1_000),
        take_profit: vec![
            TakeProfitLevel::new(Percent::from_whole(10), Percent::from_whole(40)),
            TakeProfitLevel::new(Percent::from_whole(20), Percent::from_whole(30)),
            TakeProfitLevel::new(Percent::from_whole(30), Percent::from_whole(30)),
        ],
        debounce: DebounceSettings {
            interval: Duration::ZERO,
            duration: Duration::ZERO,
            required: 1,
        },
        snipe_list_exclusive: true,
        strategy: ExecutionStrategy::default(),
        priority_fees: PriorityFees {
            compute_unit_limit: 101_337,
            compute_unit_price: 421_197,
        },
        dry_run: false,
    }
}

/// A controller wired to in-memory collaborators
pub struct Harness {
    pub controller: Arc<PositionController>,
    pub executor: Arc<ScriptedExecutor>,
    pub quoter: Arc<ScriptedQuoter>,
    pub pools: Arc<PoolCache>,
    pub markets: Arc<MarketCache>,
    pub wallet: Arc<TrackedBalances>,
}

pub struct HarnessBuilder {
    settings: ControllerSettings,
    pipeline: EligibilityPipeline,
    snipe_list: Option<Arc<SnipeList>>,
    executor: ScriptedExecutor,
    quoter: ScriptedQuoter,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            settings: settings(),
            pipeline: EligibilityPipeline::new(Duration::from_millis(500)),
            snipe_list: None,
            executor: ScriptedExecutor::confirming(),
            quoter: ScriptedQuoter::new(base_units(1_000), vec![100]),
        }
    }

    pub fn settings(mut self, f: impl FnOnce(&mut ControllerSettings)) -> Self {
        f(&mut self.settings);
        self
    }

    pub fn pipeline(mut self, pipeline: EligibilityPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn snipe_list(mut self, list: Arc<SnipeList>) -> Self {
        self.snipe_list = Some(list);
        self
    }

    pub fn executor(mut self, executor: ScriptedExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn quoter(mut self, quoter: ScriptedQuoter) -> Self {
        self.quoter = quoter;
        self
    }

    pub fn build(self) -> Harness {
        let executor = Arc::new(self.executor);
        let quoter = Arc::new(self.quoter);
        let pools = Arc::new(PoolCache::new());
        let markets = Arc::new(MarketCache::new());
        let wallet = Arc::new(TrackedBalances::new(Pubkey::new_unique()));

        let services = Collaborators {
            pools: pools.clone(),
            markets: markets.clone(),
            quoter: quoter.clone(),
            executor: executor.clone(),
            wallet: wallet.clone(),
        };

        let controller = Arc::new(PositionController::new(
            self.settings,
            services,
            self.pipeline,
            self.snipe_list,
            Arc::new(PositionRegistry::new(None)),
        ));

        Harness {
            controller,
            executor,
            quoter,
            pools,
            markets,
            wallet,
        }
    }
}

impl Harness {
    /// A new pool for `mint` whose pool and market are both cached
    pub fn known_pool(&self, mint: Pubkey) -> Candidate {
        let candidate = candidate(mint);
        self.pools.save(candidate.pool_id, candidate.state.clone());
        self.markets.save(market_for(candidate.state.market_id));
        candidate
    }
}
