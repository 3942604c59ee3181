//! Error types for the sniper control loop

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC "invalid params" code, returned by nodes that do not support a query
pub const UNSUPPORTED_QUERY_CODE: i64 = -32602;

/// Main error type for the sniper
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported quote token: {0}. Supported values are WSOL and USDC")]
    UnsupportedQuoteToken(String),

    #[error("Invalid take-profit schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount overflow in {0}")]
    AmountOverflow(&'static str),

    #[error("Decimals mismatch: {left} vs {right}")]
    DecimalsMismatch { left: u8, right: u8 },

    // Precondition errors (terminal for one instrument)
    #[error("Token account not found: {0}")]
    AccountNotFound(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Pool state not found for mint: {0}")]
    PoolNotFound(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC query not supported (code {code}): {message}")]
    RpcQuery { code: i64, message: String },

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    // Trading errors
    #[error("Quote failed: {0}")]
    Quote(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Transaction confirmation failed: {0}")]
    TransactionConfirm(String),

    // Position lifecycle errors
    #[error("Position already active for {0}")]
    PositionActive(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Position persistence failed: {0}")]
    PositionPersistence(String),

    // Event bus errors
    #[error("Event bus closed")]
    BusClosed,

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient transport failure)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_)
                | Error::RpcTimeout(_)
                | Error::Quote(_)
                | Error::TransactionSend(_)
                | Error::TransactionConfirm(_)
        )
    }

    /// Configuration or precondition failure scoped to one instrument.
    /// Surfaced to the caller, never retried.
    pub fn is_fatal_for_instrument(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::AccountNotFound(_)
                | Error::MarketNotFound(_)
                | Error::PoolNotFound(_)
                | Error::DecimalsMismatch { .. }
        )
    }

    /// The node rejected the query as unsupported. Fail-open filters pass on this.
    pub fn is_unsupported_query(&self) -> bool {
        matches!(self, Error::RpcQuery { code, .. } if *code == UNSUPPORTED_QUERY_CODE)
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
