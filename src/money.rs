//! Money and pricing primitives.
//!
//! `Money` is a pure, validated container: amounts are `Decimal` (never
//! floats), bounds are enforced per currency at construction, and no
//! arithmetic is intrinsic. Comparisons and conversions are the caller's
//! responsibility via the exchange-rate collaborator.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, SettlementError};

/// Fiat currencies accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Usd,
    Vnd,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Vnd => "VND",
        }
    }

    /// Smallest chargeable amount.
    pub fn min_amount(&self) -> Decimal {
        match self {
            Currency::Usd => dec!(0.10),
            Currency::Vnd => dec!(10_000),
        }
    }

    /// Largest chargeable amount.
    pub fn max_amount(&self) -> Decimal {
        match self {
            Currency::Usd => dec!(10_000),
            Currency::Vnd => dec!(100_000_000),
        }
    }

    /// Number of minor-unit decimal places. VND has no minor unit.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::Usd => 2,
            Currency::Vnd => 0,
        }
    }
}

impl FromStr for Currency {
    type Err = SettlementError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "VND" => Ok(Currency::Vnd),
            other => Err(SettlementError::UnsupportedCurrency(other.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A validated fiat amount. Equality is value-based; instances are immutable.
///
/// # Examples
///
/// ```rust
/// use dashi_settlement::{Currency, Money};
/// use rust_decimal_macros::dec;
///
/// let price = Money::new(dec!(50_000), Currency::Vnd).unwrap();
/// assert_eq!(price.amount(), dec!(50_000));
/// assert!(Money::new(dec!(500), Currency::Vnd).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Create a validated amount.
    ///
    /// # Errors
    ///
    /// `SettlementError::InvalidAmount` when `amount` is outside the
    /// currency's `[min, max]` bounds.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self> {
        if amount < currency.min_amount() || amount > currency.max_amount() {
            return Err(SettlementError::InvalidAmount {
                amount,
                currency: currency.code(),
                min: currency.min_amount(),
                max: currency.max_amount(),
            }
            .into());
        }
        Ok(Self { amount, currency })
    }

    /// Create from an amount and a currency code.
    ///
    /// # Errors
    ///
    /// `SettlementError::UnsupportedCurrency` for an unknown code,
    /// `SettlementError::InvalidAmount` for an out-of-bounds amount.
    pub fn parse(amount: Decimal, code: &str) -> Result<Self> {
        let currency: Currency = code.parse()?;
        Self::new(amount, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// The validated difference `self − other`, used for upgrade pricing.
    ///
    /// # Errors
    ///
    /// `Validation` on currency mismatch or a non-positive difference,
    /// `InvalidAmount` when the difference is not itself chargeable.
    pub fn price_difference(&self, other: &Money) -> Result<Money> {
        if self.currency != other.currency {
            return Err(SettlementError::Validation(format!(
                "currency mismatch: {} vs {}",
                self.currency, other.currency
            ))
            .into());
        }
        let diff = self.amount - other.amount;
        if diff <= Decimal::ZERO {
            return Err(SettlementError::Validation(
                "price difference must be positive".to_string(),
            )
            .into());
        }
        Self::new(diff, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// How often a DashiFan tier bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl BillingInterval {
    /// Interval length in seconds. Months and years are approximate, matching
    /// what the provider uses for plan scheduling.
    pub fn seconds(&self) -> i64 {
        match self {
            BillingInterval::Daily => 86_400,
            BillingInterval::Weekly => 86_400 * 7,
            BillingInterval::Monthly => 86_400 * 30,
            BillingInterval::Yearly => 86_400 * 365,
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BillingInterval::Daily => "Daily",
            BillingInterval::Weekly => "Weekly",
            BillingInterval::Monthly => "Monthly",
            BillingInterval::Yearly => "Yearly",
        };
        f.write_str(label)
    }
}

/// Billing-cycle descriptor: an interval plus a count, e.g. every 1 month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCycle {
    pub interval: BillingInterval,
    pub interval_count: u32,
}

impl BillingCycle {
    /// # Errors
    ///
    /// `Validation` when `interval_count` is zero.
    pub fn new(interval: BillingInterval, interval_count: u32) -> Result<Self> {
        if interval_count == 0 {
            return Err(
                SettlementError::Validation("interval count must be positive".to_string()).into(),
            );
        }
        Ok(Self {
            interval,
            interval_count,
        })
    }

    /// The conventional DashiFan cycle.
    pub fn monthly() -> Self {
        Self {
            interval: BillingInterval::Monthly,
            interval_count: 1,
        }
    }

    pub fn period_seconds(&self) -> i64 {
        self.interval.seconds() * i64::from(self.interval_count)
    }

    /// Next billing date for a period starting at `from` (unix seconds).
    pub fn next_billing_date(&self, from: i64) -> i64 {
        from + self.period_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_money_within_bounds() {
        let m = Money::new(dec!(50_000), Currency::Vnd).unwrap();
        assert_eq!(m.amount(), dec!(50_000));
        assert_eq!(m.currency(), Currency::Vnd);

        let usd = Money::new(dec!(9.99), Currency::Usd).unwrap();
        assert_eq!(usd.amount(), dec!(9.99));
    }

    #[test]
    fn test_money_bounds_rejected() {
        assert!(Money::new(dec!(9_999), Currency::Vnd).is_err());
        assert!(Money::new(dec!(100_000_001), Currency::Vnd).is_err());
        assert!(Money::new(dec!(0.09), Currency::Usd).is_err());
        assert!(Money::new(dec!(10_001), Currency::Usd).is_err());

        // Bounds are inclusive.
        assert!(Money::new(dec!(10_000), Currency::Vnd).is_ok());
        assert!(Money::new(dec!(100_000_000), Currency::Vnd).is_ok());
        assert!(Money::new(dec!(0.10), Currency::Usd).is_ok());
        assert!(Money::new(dec!(10_000), Currency::Usd).is_ok());
    }

    #[test]
    fn test_unsupported_currency() {
        let err = Money::parse(dec!(100), "EUR").unwrap_err();
        let err = err.downcast::<SettlementError>().unwrap();
        assert!(matches!(err, SettlementError::UnsupportedCurrency(_)));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("vnd".parse::<Currency>().unwrap(), Currency::Vnd);
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert!("JPY".parse::<Currency>().is_err());
    }

    #[test]
    fn test_value_equality() {
        let a = Money::new(dec!(80_000), Currency::Vnd).unwrap();
        let b = Money::new(dec!(80_000), Currency::Vnd).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_price_difference() {
        let old = Money::new(dec!(50_000), Currency::Vnd).unwrap();
        let new = Money::new(dec!(80_000), Currency::Vnd).unwrap();

        let diff = new.price_difference(&old).unwrap();
        assert_eq!(diff.amount(), dec!(30_000));

        // Downgrades and no-ops are not a chargeable difference.
        assert!(old.price_difference(&new).is_err());
        assert!(old.price_difference(&old).is_err());
    }

    #[test]
    fn test_price_difference_currency_mismatch() {
        let vnd = Money::new(dec!(50_000), Currency::Vnd).unwrap();
        let usd = Money::new(dec!(5), Currency::Usd).unwrap();
        assert!(usd.price_difference(&vnd).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let m = Money::new(dec!(123_456), Currency::Vnd).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, parsed);
    }

    #[test]
    fn test_billing_cycle() {
        let cycle = BillingCycle::new(BillingInterval::Monthly, 1).unwrap();
        assert_eq!(cycle.period_seconds(), 86_400 * 30);
        assert_eq!(cycle.next_billing_date(1_000), 1_000 + 86_400 * 30);

        assert!(BillingCycle::new(BillingInterval::Daily, 0).is_err());

        let quarterly = BillingCycle::new(BillingInterval::Monthly, 3).unwrap();
        assert_eq!(quarterly.period_seconds(), 86_400 * 90);
    }

    proptest! {
        #[test]
        fn vnd_in_bounds_always_constructs(raw in 10_000i64..=100_000_000i64) {
            let m = Money::new(Decimal::from(raw), Currency::Vnd).unwrap();
            prop_assert_eq!(m.amount(), Decimal::from(raw));
            prop_assert_eq!(m.currency(), Currency::Vnd);
        }

        #[test]
        fn vnd_out_of_bounds_always_fails(raw in prop_oneof![
            i64::MIN..10_000i64,
            100_000_001i64..i64::MAX,
        ]) {
            prop_assert!(Money::new(Decimal::from(raw), Currency::Vnd).is_err());
        }
    }
}
