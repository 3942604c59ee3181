//! Take-profit and stop-loss evaluation
//!
//! Each price check compares the observed quote value of the position against
//! the stop-loss threshold first, then against the ladder. The ladder amount is
//! cumulative, so only the part not yet sold is returned.

use crate::amount::TokenAmount;
use crate::error::Result;
use crate::position::ladder::{clamp_to_held, ExitLadder};

/// Why an exit fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    /// A ladder step was reached
    TakeProfit,
    /// Value fell below the stop-loss threshold
    StopLoss,
    /// Price checks ran out (or are disabled); the whole balance goes
    CheckBudgetExhausted,
}

/// What to sell and why
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitDecision {
    pub trigger: TriggerType,
    pub sell_amount: TokenAmount,
}

/// Exit rules of one position
#[derive(Debug, Clone)]
pub struct ExitRules<'a> {
    pub ladder: &'a ExitLadder,
    /// `None` disables the stop loss
    pub stop_loss_threshold: Option<TokenAmount>,
}

impl ExitRules<'_> {
    /// Check an observed quote value.
    ///
    /// `base_sold` is what earlier exits already sold; `held` is the balance now.
    /// Returns `None` when nothing should be sold yet.
    pub fn evaluate(
        &self,
        observed_quote: TokenAmount,
        base_sold: TokenAmount,
        held: TokenAmount,
    ) -> Result<Option<ExitDecision>> {
        if held.is_zero() {
            return Ok(None);
        }

        if let Some(threshold) = self.stop_loss_threshold {
            if observed_quote.raw() < threshold.raw() {
                return Ok(Some(ExitDecision {
                    trigger: TriggerType::StopLoss,
                    sell_amount: held,
                }));
            }
        }

        let Some(unlocked) = self.ladder.amount_to_sell(observed_quote)? else {
            return Ok(None);
        };

        let pending = unlocked.saturating_sub(base_sold);
        if pending.is_zero() {
            return Ok(None);
        }

        Ok(Some(ExitDecision {
            trigger: TriggerType::TakeProfit,
            sell_amount: clamp_to_held(pending, held),
        }))
    }

    /// Decision used when checking ends without a signal
    pub fn fallback(held: TokenAmount) -> ExitDecision {
        ExitDecision {
            trigger: TriggerType::CheckBudgetExhausted,
            sell_amount: held,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Percent;
    use crate::position::ladder::{stop_loss_threshold, TakeProfitLevel};

    fn units(raw: u128) -> TokenAmount {
        TokenAmount::new(raw, 0)
    }

    fn ladder() -> ExitLadder {
        let schedule = [
            TakeProfitLevel::new(Percent::from_whole(10), Percent::from_whole(40)),
            TakeProfitLevel::new(Percent::from_whole(20), Percent::from_whole(30)),
            TakeProfitLevel::new(Percent::from_whole(30), Percent::from_whole(30)),
        ];
        ExitLadder::build(units(100), units(1_000), &schedule).unwrap()
    }

    fn rules(ladder: &ExitLadder) -> ExitRules<'_> {
        ExitRules {
            ladder,
            stop_loss_threshold: Some(
                stop_loss_threshold(units(100), Percent::from_whole(20)).unwrap(),
            ),
        }
    }

    #[test]
    fn test_take_profit_cumulative() {
        let ladder = ladder();
        let decision = rules(&ladder)
            .evaluate(units(125), units(0), units(1_000))
            .unwrap()
            .unwrap();

        assert_eq!(decision.trigger, TriggerType::TakeProfit);
        assert_eq!(decision.sell_amount, units(700));
    }

    #[test]
    fn test_already_sold_part_is_subtracted() {
        let ladder = ladder();
        let rules = rules(&ladder);

        // 400 sold at the first step; reaching 120 unlocks 300 more
        let decision = rules
            .evaluate(units(121), units(400), units(600))
            .unwrap()
            .unwrap();
        assert_eq!(decision.sell_amount, units(300));

        // Nothing new unlocked
        assert!(rules.evaluate(units(112), units(400), units(600)).unwrap().is_none());
    }

    #[test]
    fn test_sell_clamped_to_held() {
        let ladder = ladder();
        let decision = rules(&ladder)
            .evaluate(units(125), units(0), units(650))
            .unwrap()
            .unwrap();
        assert_eq!(decision.sell_amount, units(650));
    }

    #[test]
    fn test_stop_loss_sells_everything() {
        let ladder = ladder();
        let rules = rules(&ladder);

        let decision = rules
            .evaluate(units(79), units(0), units(1_000))
            .unwrap()
            .unwrap();
        assert_eq!(decision.trigger, TriggerType::StopLoss);
        assert_eq!(decision.sell_amount, units(1_000));

        // At the threshold itself nothing fires
        assert!(rules.evaluate(units(80), units(0), units(1_000)).unwrap().is_none());
    }

    #[test]
    fn test_no_stop_loss_configured() {
        let ladder = ladder();
        let rules = ExitRules {
            ladder: &ladder,
            stop_loss_threshold: None,
        };
        assert!(rules.evaluate(units(1), units(0), units(1_000)).unwrap().is_none());
    }

    #[test]
    fn test_empty_balance_never_sells() {
        let ladder = ladder();
        assert!(rules(&ladder)
            .evaluate(units(500), units(0), units(0))
            .unwrap()
            .is_none());
    }
}
