use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Platform commission taken on every settlement.
pub const PLATFORM_FEE_RATE: Decimal = dec!(0.20);
/// Share of the price paid out to the solving agent.
pub const AGENT_PAYOUT_RATE: Decimal = dec!(0.80);

/// Fractional digits kept for stored amounts.
pub const AMOUNT_SCALE: u32 = 6;
/// Integer digits allowed for a price (20 digits total, 6 fractional).
const MAX_INTEGER_DIGITS: u32 = 14;

/// Parse a caller-supplied price: a JSON number or numeric string, non-negative,
/// at most six fractional digits.
pub fn parse_price(raw: &serde_json::Value) -> Result<Decimal> {
    let price = match raw {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string())),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()),
        other => {
            return Err(RelayError::Validation(format!(
                "price must be a number, got {other}"
            )));
        }
    }
    .map_err(|e| RelayError::Validation(format!("invalid price {raw}: {e}")))?;

    validate_price(price)
}

pub fn validate_price(price: Decimal) -> Result<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(RelayError::Validation(format!(
            "price must be non-negative, got {price}"
        )));
    }
    let price = price.normalize();
    if price.scale() > AMOUNT_SCALE {
        return Err(RelayError::Validation(format!(
            "price {price} has more than {AMOUNT_SCALE} fractional digits"
        )));
    }
    if price.trunc() >= Decimal::from(10u64.pow(MAX_INTEGER_DIGITS)) {
        return Err(RelayError::Validation(format!("price {price} is too large")));
    }
    Ok(price.abs())
}

/// Result of splitting a job price at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    #[serde(with = "rust_decimal::serde::float")]
    pub payout: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
}

impl FeeSplit {
    /// Fixed 80/20 split. Both legs are exact decimal products.
    pub fn of(price: Decimal) -> Result<Self> {
        let fee = price
            .checked_mul(PLATFORM_FEE_RATE)
            .ok_or_else(|| RelayError::Internal(format!("fee overflow for price {price}")))?;
        let payout = price
            .checked_mul(AGENT_PAYOUT_RATE)
            .ok_or_else(|| RelayError::Internal(format!("payout overflow for price {price}")))?;
        Ok(Self {
            payout: payout.normalize(),
            fee: fee.normalize(),
        })
    }

    pub fn total(&self) -> Decimal {
        self.payout + self.fee
    }
}
