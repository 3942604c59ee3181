//! Pool eligibility filtering
//!
//! Each filter is an opaque async predicate over a [`Candidate`]. The
//! [`EligibilityPipeline`] runs them concurrently and ANDs the results;
//! [`debounced_accept`] re-runs the pipeline until enough consecutive passes
//! are seen.

pub mod authority_balance;
pub mod debounce;
pub mod pipeline;
pub mod pool_size;
pub mod snipe_list;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::types::Candidate;

pub use authority_balance::{AuthorityBalanceFilter, NativeBalanceReader};
pub use debounce::{debounced_accept, DebounceOutcome, DebounceSettings};
pub use pipeline::{EligibilityPipeline, EligibilityVerdict, FilterReason};
pub use pool_size::PoolSizeFilter;
pub use snipe_list::SnipeList;

/// Result of one filter check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCheck {
    pub ok: bool,
    pub detail: String,
}

impl FilterCheck {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// A single eligibility predicate
#[async_trait]
pub trait PoolFilter: Send + Sync {
    /// Filter name for logging and verdict reasons
    fn name(&self) -> &str;

    /// Count the node's "unsupported query" error as a pass
    fn fails_open_on_unsupported(&self) -> bool {
        false
    }

    async fn check(&self, candidate: &Candidate) -> Result<FilterCheck>;
}

/// Assemble the built-in filters enabled in `config`.
///
/// The authority balance filter needs a balance reader; without one it is left out.
pub fn build_pipeline(
    config: &Config,
    authority_reader: Option<Arc<dyn NativeBalanceReader>>,
) -> Result<EligibilityPipeline> {
    let mut pipeline = EligibilityPipeline::new(config.filter_timeout());

    let (min_pool, max_pool) = config.pool_size_bounds()?;
    let pool_size = PoolSizeFilter::new(min_pool, max_pool);
    if pool_size.is_active() {
        pipeline.push(Arc::new(pool_size));
    }

    let min_authority = config.authority_min_balance()?;
    if !min_authority.is_zero() {
        match authority_reader {
            Some(reader) => pipeline.push(Arc::new(AuthorityBalanceFilter::new(
                reader,
                min_authority,
            ))),
            None => warn!("No balance reader available, authority balance filter disabled"),
        }
    }

    info!(filters = ?pipeline.filter_names(), "Eligibility pipeline ready");
    Ok(pipeline)
}
