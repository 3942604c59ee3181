//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::amount::{Percent, QuoteToken, TokenAmount, SOL_DECIMALS};
use crate::position::ladder::{validate_schedule, TakeProfitLevel};
use crate::trading::ExecutionStrategy;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub quote: QuoteConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub exit: ExitConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub snipe_list: SnipeListConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteConfig {
    /// Quote token symbol (WSOL or USDC)
    #[serde(default = "default_quote_symbol")]
    pub symbol: String,
    /// Quote amount spent per entry, as a decimal string
    #[serde(default = "default_quote_amount")]
    pub amount: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            symbol: default_quote_symbol(),
            amount: default_quote_amount(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Single-lane mode: at most one entry in flight across all instruments
    #[serde(default = "default_true")]
    pub one_token_at_a_time: bool,
    #[serde(default)]
    pub auto_buy_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_buy_retries: u32,
    #[serde(default = "default_slippage")]
    pub buy_slippage_pct: Percent,
    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price: u64,
    /// Developer mode: confirm every swap without sending it
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            one_token_at_a_time: true,
            auto_buy_delay_ms: 0,
            max_buy_retries: default_max_retries(),
            buy_slippage_pct: default_slippage(),
            compute_unit_limit: default_compute_unit_limit(),
            compute_unit_price: default_compute_unit_price(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExitConfig {
    #[serde(default = "default_true")]
    pub auto_sell: bool,
    #[serde(default)]
    pub auto_sell_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_sell_retries: u32,
    #[serde(default = "default_slippage")]
    pub sell_slippage_pct: Percent,
    #[serde(default = "default_stop_loss")]
    pub stop_loss_pct: Percent,
    #[serde(default = "default_price_check_interval_ms")]
    pub price_check_interval_ms: u64,
    #[serde(default = "default_price_check_duration_ms")]
    pub price_check_duration_ms: u64,
    /// Ladder of (profit %, sell % of entry size) steps
    #[serde(default = "default_take_profit")]
    pub take_profit: Vec<TakeProfitLevel>,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            auto_sell: true,
            auto_sell_delay_ms: 0,
            max_sell_retries: default_max_retries(),
            sell_slippage_pct: default_slippage(),
            stop_loss_pct: default_stop_loss(),
            price_check_interval_ms: default_price_check_interval_ms(),
            price_check_duration_ms: default_price_check_duration_ms(),
            take_profit: default_take_profit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_filter_check_interval_ms")]
    pub check_interval_ms: u64,
    #[serde(default = "default_filter_check_duration_ms")]
    pub check_duration_ms: u64,
    /// Consecutive passing runs required before entry
    #[serde(default = "default_consecutive_matches")]
    pub consecutive_matches: u32,
    /// Per-filter timeout; a filter that does not answer in time fails
    #[serde(default = "default_filter_timeout_ms")]
    pub filter_timeout_ms: u64,
    /// Quote-denominated pool size bounds ("0" disables a bound)
    #[serde(default = "default_zero")]
    pub min_pool_size: String,
    #[serde(default = "default_zero")]
    pub max_pool_size: String,
    /// Minimum native balance of the pool authority in SOL ("0" disables)
    #[serde(default = "default_zero")]
    pub authority_min_balance_sol: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_filter_check_interval_ms(),
            check_duration_ms: default_filter_check_duration_ms(),
            consecutive_matches: default_consecutive_matches(),
            filter_timeout_ms: default_filter_timeout_ms(),
            min_pool_size: default_zero(),
            max_pool_size: default_zero(),
            authority_min_balance_sol: default_zero(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnipeListConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snipe_list_path")]
    pub path: String,
    #[serde(default = "default_snipe_list_refresh_ms")]
    pub refresh_interval_ms: u64,
    /// Only trade listed mints. When false, unlisted mints still go through filters.
    #[serde(default = "default_true")]
    pub exclusive: bool,
}

impl Default for SnipeListConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_snipe_list_path(),
            refresh_interval_ms: default_snipe_list_refresh_ms(),
            exclusive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Plain RPC submission; the transaction carries its own compute budget
    #[default]
    Default,
    /// Warp relay; fees are paid by the relay
    Warp,
    /// Jito bundles; fees are paid as a tip
    Jito,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub strategy: ExecutorKind,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceConfig {
    /// Where open positions are saved; unset keeps them in memory only
    #[serde(default)]
    pub positions_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_quote_symbol() -> String {
    "WSOL".into()
}

fn default_quote_amount() -> String {
    "0.01".into()
}

fn default_true() -> bool {
    true
}

fn default_zero() -> String {
    "0".into()
}

fn default_max_retries() -> u32 {
    10
}

fn default_slippage() -> Percent {
    Percent::from_whole(20)
}

fn default_stop_loss() -> Percent {
    Percent::from_whole(20)
}

fn default_compute_unit_limit() -> u32 {
    101_337
}

fn default_compute_unit_price() -> u64 {
    421_197
}

fn default_price_check_interval_ms() -> u64 {
    2_000
}

fn default_price_check_duration_ms() -> u64 {
    600_000
}

fn default_take_profit() -> Vec<TakeProfitLevel> {
    vec![
        TakeProfitLevel::new(Percent::from_whole(10), Percent::from_whole(40)),
        TakeProfitLevel::new(Percent::from_whole(20), Percent::from_whole(30)),
        TakeProfitLevel::new(Percent::from_whole(30), Percent::from_whole(30)),
    ]
}

fn default_filter_check_interval_ms() -> u64 {
    2_000
}

fn default_filter_check_duration_ms() -> u64 {
    60_000
}

fn default_consecutive_matches() -> u32 {
    3
}

fn default_filter_timeout_ms() -> u64 {
    5_000
}

fn default_snipe_list_path() -> String {
    "snipe-list.txt".into()
}

fn default_snipe_list_refresh_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SNIPER_)
            .add_source(
                config::Environment::with_prefix("SNIPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let quote_amount = self.quote_amount()?;
        if quote_amount.is_zero() {
            anyhow::bail!("quote.amount must be positive");
        }

        if self.trading.max_buy_retries == 0 {
            anyhow::bail!("max_buy_retries must be at least 1");
        }

        if self.exit.max_sell_retries == 0 {
            anyhow::bail!("max_sell_retries must be at least 1");
        }

        if self.trading.buy_slippage_pct > Percent::ONE_HUNDRED
            || self.exit.sell_slippage_pct > Percent::ONE_HUNDRED
        {
            anyhow::bail!("slippage cannot exceed 100%");
        }

        // Zero turns the stop loss off
        if self.exit.stop_loss_pct > Percent::ONE_HUNDRED {
            anyhow::bail!("stop_loss_pct cannot exceed 100%");
        }

        validate_schedule(&self.exit.take_profit).context("Invalid exit.take_profit")?;

        if self.filters.consecutive_matches == 0 {
            anyhow::bail!("consecutive_matches must be at least 1");
        }

        if self.filters.filter_timeout_ms == 0 {
            anyhow::bail!("filter_timeout_ms must be positive");
        }

        let (min_pool, max_pool) = self.pool_size_bounds()?;
        if !max_pool.is_zero() && min_pool.raw() > max_pool.raw() {
            anyhow::bail!(
                "min_pool_size {} is above max_pool_size {}",
                min_pool,
                max_pool
            );
        }

        self.authority_min_balance()?;

        if self.snipe_list.enabled && self.snipe_list.path.trim().is_empty() {
            anyhow::bail!("snipe_list.path must be set when the snipe list is enabled");
        }

        if self.trading.dry_run {
            tracing::warn!("Dry-run mode enabled - swaps are confirmed without being sent");
        }

        Ok(())
    }

    pub fn quote_token(&self) -> Result<QuoteToken> {
        QuoteToken::resolve(&self.quote.symbol).map_err(Into::into)
    }

    pub fn quote_amount(&self) -> Result<TokenAmount> {
        let token = self.quote_token()?;
        token
            .amount(&self.quote.amount)
            .with_context(|| format!("Invalid quote.amount: {}", self.quote.amount))
    }

    /// (min, max) pool size in quote units
    pub fn pool_size_bounds(&self) -> Result<(TokenAmount, TokenAmount)> {
        let token = self.quote_token()?;
        let min = token
            .amount(&self.filters.min_pool_size)
            .context("Invalid filters.min_pool_size")?;
        let max = token
            .amount(&self.filters.max_pool_size)
            .context("Invalid filters.max_pool_size")?;
        Ok((min, max))
    }

    pub fn authority_min_balance(&self) -> Result<TokenAmount> {
        TokenAmount::from_decimal_str(&self.filters.authority_min_balance_sol, SOL_DECIMALS)
            .context("Invalid filters.authority_min_balance_sol")
    }

    pub fn execution_strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::from_kind(self.execution.strategy)
    }

    pub fn filter_check_interval(&self) -> Duration {
        Duration::from_millis(self.filters.check_interval_ms)
    }

    pub fn filter_check_duration(&self) -> Duration {
        Duration::from_millis(self.filters.check_duration_ms)
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_millis(self.filters.filter_timeout_ms)
    }

    pub fn price_check_interval(&self) -> Duration {
        Duration::from_millis(self.exit.price_check_interval_ms)
    }

    pub fn price_check_duration(&self) -> Duration {
        Duration::from_millis(self.exit.price_check_duration_ms)
    }

    /// Human-readable summary of the effective configuration
    pub fn summary(&self) -> String {
        let schedule = self
            .exit
            .take_profit
            .iter()
            .map(|l| format!("+{} -> sell {}", l.profit_pct, l.sell_pct))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"Configuration:
  Quote:
    token: {}
    amount: {}
  Trading:
    one_token_at_a_time: {}
    auto_buy_delay: {}ms
    max_buy_retries: {}
    buy_slippage: {}
    dry_run: {}
  Exit:
    auto_sell: {}
    auto_sell_delay: {}ms
    max_sell_retries: {}
    sell_slippage: {}
    stop_loss: {}
    price_check: every {}ms for {}ms
    take_profit: [{}]
  Filters:
    check: every {}ms for {}ms
    consecutive_matches: {}
    filter_timeout: {}ms
    pool_size: {} .. {}
    authority_min_balance: {} SOL
  Snipe list:
    enabled: {}
    path: {}
    exclusive: {}
  Execution:
    strategy: {:?}
"#,
            self.quote.symbol,
            self.quote.amount,
            self.trading.one_token_at_a_time,
            self.trading.auto_buy_delay_ms,
            self.trading.max_buy_retries,
            self.trading.buy_slippage_pct,
            self.trading.dry_run,
            self.exit.auto_sell,
            self.exit.auto_sell_delay_ms,
            self.exit.max_sell_retries,
            self.exit.sell_slippage_pct,
            self.exit.stop_loss_pct,
            self.exit.price_check_interval_ms,
            self.exit.price_check_duration_ms,
            schedule,
            self.filters.check_interval_ms,
            self.filters.check_duration_ms,
            self.filters.consecutive_matches,
            self.filters.filter_timeout_ms,
            self.filters.min_pool_size,
            self.filters.max_pool_size,
            self.filters.authority_min_balance_sol,
            self.snipe_list.enabled,
            self.snipe_list.path,
            self.snipe_list.exclusive,
            self.execution.strategy,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quote: QuoteConfig::default(),
            trading: TradingConfig::default(),
            exit: ExitConfig::default(),
            filters: FilterConfig::default(),
            snipe_list: SnipeListConfig::default(),
            execution: ExecutionConfig::default(),
            persistence: PersistenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.trading.one_token_at_a_time);
        assert_eq!(config.trading.buy_slippage_pct, Percent::from_whole(20));
        assert_eq!(config.quote_amount().unwrap().raw(), 10_000_000);
        assert_eq!(config.exit.take_profit.len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[quote]
symbol = "USDC"
amount = "25"

[trading]
one_token_at_a_time = false
max_buy_retries = 3

[exit]
stop_loss_pct = 15
take_profit = [
  {{ profit_pct = 50, sell_pct = 50 }},
  {{ profit_pct = 100, sell_pct = 50 }},
]

[execution]
strategy = "jito"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(!config.trading.one_token_at_a_time);
        assert_eq!(config.trading.max_buy_retries, 3);
        assert_eq!(config.quote_amount().unwrap().raw(), 25_000_000);
        assert_eq!(config.exit.stop_loss_pct.bps(), 1_500);
        assert_eq!(config.exit.take_profit.len(), 2);
        assert_eq!(config.execution.strategy, ExecutorKind::Jito);
        assert!(!config.execution_strategy().uses_priority_fee_instructions);
    }

    #[test]
    fn test_rejects_oversold_schedule() {
        let mut config = Config::default();
        config.exit.take_profit = vec![
            TakeProfitLevel::new(Percent::from_whole(10), Percent::from_whole(60)),
            TakeProfitLevel::new(Percent::from_whole(20), Percent::from_whole(50)),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_retry_budget() {
        let mut config = Config::default();
        config.exit.max_sell_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_pool_bounds() {
        let mut config = Config::default();
        config.filters.min_pool_size = "50".into();
        config.filters.max_pool_size = "10".into();
        assert!(config.validate().is_err());

        config.filters.max_pool_size = "0".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stop_loss_bounds() {
        let mut config = Config::default();
        config.exit.stop_loss_pct = Percent::ZERO;
        assert!(config.validate().is_ok());

        config.exit.stop_loss_pct = Percent::from_whole(101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_filter_timeout() {
        let mut config = Config::default();
        config.filters.filter_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_quote() {
        let mut config = Config::default();
        config.quote.symbol = "DOGE".into();
        assert!(config.validate().is_err());
    }
}
