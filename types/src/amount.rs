//! Token amount type.
//!
//! Balances are represented as fixed-point integers (u128) so the pool sum is
//! exact. One token is `RAW_PER_TOKEN` raw units. Floating-point values only
//! appear at the accrual edge and on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

use crate::TypesError;

/// Raw units per whole token (9 decimal places).
pub const RAW_PER_TOKEN: u128 = 1_000_000_000;

/// A non-negative token amount, stored as raw units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Convert a decimal token value, rounding to the nearest raw unit.
    ///
    /// Rejects negative, NaN and infinite inputs.
    pub fn from_tokens(tokens: f64) -> Result<Self, TypesError> {
        if !tokens.is_finite() || tokens < 0.0 {
            return Err(TypesError::InvalidAmount(tokens));
        }
        let raw = (tokens * RAW_PER_TOKEN as f64).round();
        if raw >= u128::MAX as f64 {
            return Err(TypesError::Overflow);
        }
        Ok(Self(raw as u128))
    }

    /// Whole-token constructor (test and config convenience).
    pub fn whole(tokens: u64) -> Self {
        Self(u128::from(tokens) * RAW_PER_TOKEN)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn as_tokens(&self) -> f64 {
        self.0 as f64 / RAW_PER_TOKEN as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for TokenAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / RAW_PER_TOKEN;
        let frac = self.0 % RAW_PER_TOKEN;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{frac:09}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tokens_rounds_to_raw() {
        let amount = TokenAmount::from_tokens(0.125).unwrap();
        assert_eq!(amount.raw(), 125_000_000);
        assert_eq!(amount.as_tokens(), 0.125);
    }

    #[test]
    fn from_tokens_rejects_negative_and_nan() {
        assert!(TokenAmount::from_tokens(-1.0).is_err());
        assert!(TokenAmount::from_tokens(f64::NAN).is_err());
        assert!(TokenAmount::from_tokens(f64::INFINITY).is_err());
    }

    #[test]
    fn display_trims_fraction() {
        assert_eq!(TokenAmount::whole(12).to_string(), "12");
        assert_eq!(TokenAmount::from_tokens(2.5).unwrap().to_string(), "2.5");
        assert_eq!(TokenAmount::new(1).to_string(), "0.000000001");
    }
}
