//! Monetary amounts and currencies for AgentPay
//!
//! All amounts are non-negative integers in the minor unit of their currency
//! (paise, cents). Arithmetic is checked; overflow is an explicit error, not
//! a wrap.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monetary amount in minor units (non-negative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from minor units
    pub fn from_minor(value: i64) -> Result<Self> {
        if value < 0 {
            return Err(GatewayError::validation(format!(
                "amount must be non-negative, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// The raw minor-unit value
    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Amount) -> Result<Amount> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(GatewayError::AmountOverflow)
    }

    /// Checked subtraction, erroring on underflow below zero
    pub fn checked_sub(&self, other: Amount) -> Result<Amount> {
        let v = self
            .0
            .checked_sub(other.0)
            .ok_or(GatewayError::AmountOverflow)?;
        Amount::from_minor(v)
    }

    /// Saturating subtraction, flooring at zero
    pub fn saturating_sub(&self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0).max(0))
    }

    /// Render in major units with two decimal places, for wire formats that
    /// refuse minor-unit integers.
    pub fn to_major_string(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl TryFrom<i64> for Amount {
    type Error = GatewayError;

    fn try_from(value: i64) -> Result<Self> {
        Amount::from_minor(value)
    }
}

impl From<Amount> for i64 {
    fn from(a: Amount) -> i64 {
        a.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An uppercase ISO-4217 currency code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse and validate a currency code (three uppercase ASCII letters)
    pub fn parse(code: &str) -> Result<Self> {
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(code.to_string()))
        } else {
            Err(GatewayError::validation(format!(
                "invalid ISO-4217 currency code: {:?}",
                code
            )))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn inr() -> Self {
        Self("INR".to_string())
    }
}

impl TryFrom<String> for Currency {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self> {
        Currency::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> String {
        c.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_amount_rejected() {
        assert!(Amount::from_minor(-1).is_err());
        assert!(Amount::from_minor(0).is_ok());
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::from_minor(300).unwrap();
        let b = Amount::from_minor(200).unwrap();
        assert_eq!(a.checked_add(b).unwrap().minor(), 500);
        assert_eq!(a.checked_sub(b).unwrap().minor(), 100);
        assert!(b.checked_sub(a).is_err());
        assert_eq!(b.saturating_sub(a).minor(), 0);
    }

    #[test]
    fn test_overflow_is_explicit() {
        let a = Amount::from_minor(i64::MAX).unwrap();
        assert!(a.checked_add(Amount::from_minor(1).unwrap()).is_err());
    }

    #[test]
    fn test_major_string() {
        assert_eq!(Amount::from_minor(199).unwrap().to_major_string(), "1.99");
        assert_eq!(Amount::from_minor(20000).unwrap().to_major_string(), "200.00");
        assert_eq!(Amount::from_minor(5).unwrap().to_major_string(), "0.05");
    }

    #[test]
    fn test_currency_validation() {
        assert!(Currency::parse("USD").is_ok());
        assert!(Currency::parse("usd").is_err());
        assert!(Currency::parse("US").is_err());
        assert!(Currency::parse("DOLLARS").is_err());
    }

    #[test]
    fn test_amount_serde_rejects_negative() {
        let ok: std::result::Result<Amount, _> = serde_json::from_str("199");
        assert_eq!(ok.unwrap().minor(), 199);
        let bad: std::result::Result<Amount, _> = serde_json::from_str("-5");
        assert!(bad.is_err());
    }
}
