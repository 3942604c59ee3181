//! Swap plan assembly
//!
//! Lists the steps a swap transaction is made of, so executors stay free of
//! strategy checks. Compute budget steps map to real instructions here; the rest
//! are left to the executor's AMM and token program bindings.

use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::trading::{ExecutionStrategy, SwapDirection};
use crate::types::PoolKeys;

/// Compute budget settings for strategies that pay their own priority fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFees {
    pub compute_unit_limit: u32,
    /// Micro-lamports per compute unit
    pub compute_unit_price: u64,
}

/// One step of a swap transaction, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapStep {
    SetComputeUnitPrice(u64),
    SetComputeUnitLimit(u32),
    /// Create the output token account if missing
    CreateAssociatedAccount { mint: Pubkey },
    Swap { pool: Pubkey, direction: SwapDirection },
    /// Close the emptied input token account
    CloseAccount { mint: Pubkey },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapPlan {
    steps: Vec<SwapStep>,
}

impl SwapPlan {
    /// Plan a swap. `closes_input` only applies to sells of the whole balance.
    pub fn assemble(
        strategy: &ExecutionStrategy,
        fees: &PriorityFees,
        pool: &PoolKeys,
        direction: SwapDirection,
        closes_input: bool,
    ) -> Self {
        let mut steps = Vec::with_capacity(5);

        if strategy.uses_priority_fee_instructions {
            steps.push(SwapStep::SetComputeUnitPrice(fees.compute_unit_price));
            steps.push(SwapStep::SetComputeUnitLimit(fees.compute_unit_limit));
        }

        if direction == SwapDirection::Buy {
            steps.push(SwapStep::CreateAssociatedAccount {
                mint: pool.base_mint,
            });
        }

        steps.push(SwapStep::Swap {
            pool: pool.id,
            direction,
        });

        if direction == SwapDirection::Sell && closes_input {
            steps.push(SwapStep::CloseAccount {
                mint: pool.base_mint,
            });
        }

        Self { steps }
    }

    pub fn steps(&self) -> &[SwapStep] {
        &self.steps
    }

    /// Compute budget instructions to prepend, empty when the strategy pays fees itself
    pub fn compute_budget_instructions(&self) -> Vec<Instruction> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                SwapStep::SetComputeUnitPrice(price) => {
                    Some(ComputeBudgetInstruction::set_compute_unit_price(*price))
                }
                SwapStep::SetComputeUnitLimit(limit) => {
                    Some(ComputeBudgetInstruction::set_compute_unit_limit(*limit))
                }
                _ => None,
            })
            .collect()
    }
}
