//! Take-profit ladder
//!
//! A configured schedule of `(profit %, sell %)` steps is turned into concrete
//! quote thresholds and base amounts once per position. Points are kept sorted by
//! descending threshold so the cumulative sell amount for an observed quote value
//! is one forward pass.

use serde::{Deserialize, Serialize};

use crate::amount::{Percent, TokenAmount};
use crate::error::{Error, Result};

/// One configured take-profit step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    /// Gain over the entry quote amount that unlocks this step
    pub profit_pct: Percent,
    /// Share of the entry base amount sold at this step
    pub sell_pct: Percent,
}

impl TakeProfitLevel {
    pub const fn new(profit_pct: Percent, sell_pct: Percent) -> Self {
        Self {
            profit_pct,
            sell_pct,
        }
    }
}

/// Reject schedules that could sell more than the entry size or trigger at a loss
pub fn validate_schedule(levels: &[TakeProfitLevel]) -> Result<()> {
    let mut total = Percent::ZERO;

    for level in levels {
        if level.profit_pct.is_zero() {
            return Err(Error::InvalidSchedule(
                "profit levels must be positive".into(),
            ));
        }
        total = total
            .checked_add(level.sell_pct)
            .ok_or_else(|| Error::InvalidSchedule("sell percentages overflow".into()))?;
    }

    if total > Percent::ONE_HUNDRED {
        return Err(Error::InvalidSchedule(format!(
            "sell percentages add up to {}, above 100%",
            total
        )));
    }

    Ok(())
}

/// A concrete ladder step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeProfitPoint {
    pub quote_threshold: TokenAmount,
    pub base_to_sell: TokenAmount,
}

/// Sell schedule of one position, sorted by strictly descending threshold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitLadder {
    points: Vec<TakeProfitPoint>,
}

impl ExitLadder {
    /// Derive the ladder for an entry of `entry_quote` that received `entry_base`.
    ///
    /// `threshold = Q + Q * profit / 100`, `base = B * sell / 100`, both rounded
    /// down. Steps that round to the same threshold are merged.
    pub fn build(
        entry_quote: TokenAmount,
        entry_base: TokenAmount,
        levels: &[TakeProfitLevel],
    ) -> Result<Self> {
        validate_schedule(levels)?;

        let mut points = levels
            .iter()
            .map(|level| {
                let gain = entry_quote.percent_of(level.profit_pct)?;
                Ok(TakeProfitPoint {
                    quote_threshold: entry_quote.checked_add(gain)?,
                    base_to_sell: entry_base.percent_of(level.sell_pct)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        points.sort_by(|a, b| b.quote_threshold.raw().cmp(&a.quote_threshold.raw()));

        let mut merged: Vec<TakeProfitPoint> = Vec::with_capacity(points.len());
        for point in points {
            match merged.last_mut() {
                Some(last) if last.quote_threshold == point.quote_threshold => {
                    last.base_to_sell = last.base_to_sell.checked_add(point.base_to_sell)?;
                }
                _ => merged.push(point),
            }
        }

        Ok(Self { points: merged })
    }

    pub fn points(&self) -> &[TakeProfitPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Sum of every step's base amount
    pub fn total_base(&self) -> Result<Option<TokenAmount>> {
        let mut iter = self.points.iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        iter.try_fold(first.base_to_sell, |acc, p| acc.checked_add(p.base_to_sell))
            .map(Some)
    }

    /// Cumulative base amount unlocked at `observed_quote`: the sum of every step
    /// whose threshold is at or below it. Zero when no step is reached.
    pub fn amount_to_sell(&self, observed_quote: TokenAmount) -> Result<Option<TokenAmount>> {
        let mut unlocked: Option<TokenAmount> = None;

        for point in &self.points {
            if point.quote_threshold.decimals() != observed_quote.decimals() {
                return Err(Error::DecimalsMismatch {
                    left: point.quote_threshold.decimals(),
                    right: observed_quote.decimals(),
                });
            }
            if point.quote_threshold.raw() > observed_quote.raw() {
                continue;
            }
            unlocked = Some(match unlocked {
                Some(sum) => sum.checked_add(point.base_to_sell)?,
                None => point.base_to_sell,
            });
        }

        Ok(unlocked)
    }
}

/// Never sell more than is held
pub fn clamp_to_held(amount: TokenAmount, held: TokenAmount) -> TokenAmount {
    amount.min(held)
}

/// Quote value below which the whole position is sold: `Q - Q * stop_loss / 100`
pub fn stop_loss_threshold(entry_quote: TokenAmount, stop_loss: Percent) -> Result<TokenAmount> {
    let loss = entry_quote.percent_of(stop_loss)?;
    Ok(entry_quote.saturating_sub(loss))
}
