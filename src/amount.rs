//! Fixed-point token amounts and percentages
//!
//! All amount arithmetic runs on raw integer units. Floats only appear when a
//! configuration file spells a percentage as `12.5`, and are converted to basis
//! points once at load time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Wrapped SOL mint
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// USDC mint
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Native SOL decimals (lamports)
pub const SOL_DECIMALS: u8 = 9;

const BPS_PER_WHOLE: u128 = 10_000;

/// A token amount in raw units, tagged with the mint's decimal precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmount {
    raw: u128,
    decimals: u8,
}

impl TokenAmount {
    pub const fn new(raw: u128, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub const fn zero(decimals: u8) -> Self {
        Self { raw: 0, decimals }
    }

    pub fn raw(&self) -> u128 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Parse a human-readable decimal string (`"0.01"`) into raw units.
    ///
    /// More fractional digits than `decimals` is an error rather than a silent
    /// truncation.
    pub fn from_decimal_str(value: &str, decimals: u8) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidAmount("empty amount".into()));
        }

        let (whole, fraction) = match value.split_once('.') {
            Some((w, f)) => (w, f),
            None => (value, ""),
        };

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) || (whole.is_empty() && fraction.is_empty())
        {
            return Err(Error::InvalidAmount(format!("not a decimal number: {}", value)));
        }

        if fraction.len() > decimals as usize {
            return Err(Error::InvalidAmount(format!(
                "{} has more than {} fractional digits",
                value, decimals
            )));
        }

        let scale = pow10(decimals)?;
        let whole_raw = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|e| Error::InvalidAmount(format!("{}: {}", value, e)))?
        };

        let mut fraction_raw: u128 = 0;
        if !fraction.is_empty() {
            let padded = format!("{:0<width$}", fraction, width = decimals as usize);
            fraction_raw = padded
                .parse::<u128>()
                .map_err(|e| Error::InvalidAmount(format!("{}: {}", value, e)))?;
        }

        let raw = whole_raw
            .checked_mul(scale)
            .and_then(|w| w.checked_add(fraction_raw))
            .ok_or(Error::AmountOverflow("decimal parse"))?;

        Ok(Self { raw, decimals })
    }

    /// Render as a decimal string with trailing zeros trimmed
    pub fn to_decimal_string(&self) -> String {
        if self.decimals == 0 {
            return self.raw.to_string();
        }

        let digits = format!("{:0>width$}", self.raw, width = self.decimals as usize + 1);
        let (whole, fraction) = digits.split_at(digits.len() - self.decimals as usize);
        let fraction = fraction.trim_end_matches('0');

        if fraction.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, fraction)
        }
    }

    pub fn checked_add(self, other: TokenAmount) -> Result<Self> {
        self.same_decimals(&other)?;
        let raw = self
            .raw
            .checked_add(other.raw)
            .ok_or(Error::AmountOverflow("add"))?;
        Ok(Self::new(raw, self.decimals))
    }

    /// Subtraction floored at zero
    pub fn saturating_sub(self, other: TokenAmount) -> Self {
        Self::new(self.raw.saturating_sub(other.raw), self.decimals)
    }

    /// `self * pct / 100`, rounded down
    pub fn percent_of(self, pct: Percent) -> Result<Self> {
        let raw = self
            .raw
            .checked_mul(pct.bps() as u128)
            .ok_or(Error::AmountOverflow("percent"))?
            / BPS_PER_WHOLE;
        Ok(Self::new(raw, self.decimals))
    }

    pub fn min(self, other: TokenAmount) -> Self {
        if other.raw < self.raw {
            Self::new(other.raw, self.decimals)
        } else {
            self
        }
    }

    fn same_decimals(&self, other: &TokenAmount) -> Result<()> {
        if self.decimals != other.decimals {
            return Err(Error::DecimalsMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        Ok(())
    }
}

impl PartialOrd for TokenAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.decimals != other.decimals {
            return None;
        }
        Some(self.raw.cmp(&other.raw))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

fn pow10(decimals: u8) -> Result<u128> {
    10u128
        .checked_pow(decimals as u32)
        .ok_or(Error::AmountOverflow("decimal scale"))
}

/// A percentage stored in basis points (1% = 100 bps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percent(u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const ONE_HUNDRED: Percent = Percent(10_000);

    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn from_whole(pct: u32) -> Self {
        Self(pct.saturating_mul(100))
    }

    pub fn bps(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Percent) -> Option<Percent> {
        self.0.checked_add(other.0).map(Percent)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

impl FromStr for Percent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('%');
        // Two fractional digits of a percent are exactly basis points
        let amount = TokenAmount::from_decimal_str(trimmed, 2)
            .map_err(|_| Error::Config(format!("invalid percentage: {}", s)))?;
        u32::try_from(amount.raw())
            .map(Percent)
            .map_err(|_| Error::Config(format!("percentage out of range: {}", s)))
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Same form FromStr accepts
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawPercent {
            Int(u64),
            Float(f64),
            Str(String),
        }

        match RawPercent::deserialize(deserializer)? {
            RawPercent::Int(v) => u32::try_from(v)
                .ok()
                .and_then(|v| v.checked_mul(100))
                .map(Percent)
                .ok_or_else(|| serde::de::Error::custom(format!("percentage out of range: {}", v))),
            RawPercent::Float(v) => {
                if !v.is_finite() || v < 0.0 || v * 100.0 > u32::MAX as f64 {
                    return Err(serde::de::Error::custom(format!("invalid percentage: {}", v)));
                }
                Ok(Percent((v * 100.0).round() as u32))
            }
            RawPercent::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// The asset positions are priced and paid in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteToken {
    pub symbol: String,
    pub mint: Pubkey,
    pub decimals: u8,
}

impl QuoteToken {
    /// Resolve a configured quote symbol
    pub fn resolve(symbol: &str) -> Result<Self> {
        let (mint, decimals) = match symbol.trim().to_ascii_uppercase().as_str() {
            "WSOL" => (WSOL_MINT, SOL_DECIMALS),
            "USDC" => (USDC_MINT, 6),
            _ => return Err(Error::UnsupportedQuoteToken(symbol.to_string())),
        };

        let mint = Pubkey::from_str(mint)
            .map_err(|e| Error::Config(format!("invalid quote mint {}: {}", mint, e)))?;

        Ok(Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            mint,
            decimals,
        })
    }

    /// Parse an amount denominated in this token
    pub fn amount(&self, value: &str) -> Result<TokenAmount> {
        TokenAmount::from_decimal_str(value, self.decimals)
    }
}
