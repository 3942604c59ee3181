//! CLI command implementations

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::amount::TokenAmount;
use crate::config::Config;
use crate::filter::{build_pipeline, SnipeList};
use crate::position::ladder::{stop_loss_threshold, ExitLadder};

/// Show the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.summary());

    let pipeline = build_pipeline(config, None)?;
    if pipeline.is_empty() {
        println!("Filters: none");
    } else {
        println!("Filters: {}", pipeline.filter_names().join(", "));
    }
    Ok(())
}

/// Render the exit ladder an entry receiving `base_amount` would get
pub fn ladder_report(config: &Config, base_amount: &str, base_decimals: u8) -> Result<String> {
    let quote = config.quote_token()?;
    let entry_quote = config.quote_amount()?;
    let entry_base = TokenAmount::from_decimal_str(base_amount, base_decimals)
        .with_context(|| format!("Invalid base amount: {}", base_amount))?;

    let ladder = ExitLadder::build(entry_quote, entry_base, &config.exit.take_profit)?;

    let mut out = format!(
        "Entry: {} {} for {} units\n",
        entry_quote, quote.symbol, entry_base
    );

    out.push_str("\nTake profit (value reached -> sell cumulative):\n");
    let mut cumulative = TokenAmount::zero(base_decimals);
    for point in ladder.points().iter().rev() {
        cumulative = cumulative.checked_add(point.base_to_sell)?;
        out.push_str(&format!(
            "  >= {} {}  ->  {} units (total {})\n",
            point.quote_threshold, quote.symbol, point.base_to_sell, cumulative
        ));
    }

    if config.exit.stop_loss_pct.is_zero() {
        out.push_str("\nStop loss: disabled\n");
    } else {
        let threshold = stop_loss_threshold(entry_quote, config.exit.stop_loss_pct)?;
        out.push_str(&format!(
            "\nStop loss: < {} {} ({}) sells the whole balance\n",
            threshold, quote.symbol, config.exit.stop_loss_pct
        ));
    }

    Ok(out)
}

pub fn ladder(config: &Config, base_amount: &str, base_decimals: u8) -> Result<()> {
    print!("{}", ladder_report(config, base_amount, base_decimals)?);
    Ok(())
}

/// Load and print the snipe list
pub async fn snipe_list(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(&config.snipe_list.path));
    let list = SnipeList::load(&path)
        .await
        .with_context(|| format!("Failed to read snipe list {}", path.display()))?;

    let entries = list.entries().await;

    println!("\n=== SNIPE LIST ({}) ===\n", path.display());
    if entries.is_empty() {
        println!("No entries.");
    }
    for mint in &entries {
        println!("{}", mint);
    }
    println!(
        "\nenabled: {}, exclusive: {}",
        config.snipe_list.enabled, config.snipe_list.exclusive
    );
    Ok(())
}
