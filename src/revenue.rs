//! Commission splits and Kana-to-fiat conversion.
//!
//! All percentage math is decimal-exact and rounded exactly once, at the
//! final step. Rounding mode: the creator share is rounded **down** (toward
//! negative infinity) to the currency's minor unit; the platform share is the
//! exact remainder, so the two shares always sum to the gross amount. One
//! mode, one place; call sites never round.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::money::Currency;
use crate::policy::{CommissionRate, KanaExchangeRate};

/// Outcome of distributing one gross monetary event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub currency: Currency,
    pub gross: Decimal,
    /// Creator's share net of commission.
    pub creator_share: Decimal,
    /// Retained by the platform; not tracked as a user account.
    pub platform_share: Decimal,
}

/// Convert a Kana spend to its fiat value: `units × rate`.
pub fn kana_to_fiat(kana_units: i64, exchange_rate: &KanaExchangeRate) -> Decimal {
    Decimal::from(kana_units) * exchange_rate.rate
}

/// Split a gross fiat amount between creator and platform.
pub fn split_fiat(gross: Decimal, currency: Currency, rate: &CommissionRate) -> RevenueSplit {
    let creator_share = (gross * rate.creator_multiplier())
        .round_dp_with_strategy(currency.decimal_places(), RoundingStrategy::ToNegativeInfinity);
    RevenueSplit {
        currency,
        gross,
        creator_share,
        platform_share: gross - creator_share,
    }
}

/// Split the revenue of a Kana spend: convert to fiat, then apply the
/// commission rate for type `Kana`.
pub fn kana_revenue_split(
    kana_units: i64,
    exchange_rate: &KanaExchangeRate,
    rate: &CommissionRate,
) -> RevenueSplit {
    split_fiat(
        kana_to_fiat(kana_units, exchange_rate),
        exchange_rate.currency,
        rate,
    )
}
