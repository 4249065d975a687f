//! Administrator-tunable settlement policy.
//!
//! Commission rates and the Kana exchange rate are read through the
//! [`SettingsProvider`] seam rather than as implicit global state; the
//! bundled [`SettingsTable`] serves cached values and invalidates them on
//! admin update.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::money::Currency;
use crate::{Result, SettlementError};

/// Which monetary events a commission rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommissionType {
    /// Kana spends (chapter unlocks).
    Kana,
    /// DashiFan subscription payments.
    DashiFan,
}

/// Platform's percentage cut of a monetary event, per type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionRate {
    pub commission_type: CommissionType,
    pub rate_percentage: Decimal,
}

impl CommissionRate {
    /// # Errors
    ///
    /// `Validation` when the rate is outside `[0, 100]`.
    pub fn new(commission_type: CommissionType, rate_percentage: Decimal) -> Result<Self> {
        if rate_percentage < Decimal::ZERO || rate_percentage > Decimal::from(100) {
            return Err(SettlementError::Validation(format!(
                "commission rate must be within [0, 100], got {rate_percentage}"
            ))
            .into());
        }
        Ok(Self {
            commission_type,
            rate_percentage,
        })
    }

    /// The creator's fraction of gross revenue: `1 − rate/100`.
    pub fn creator_multiplier(&self) -> Decimal {
        Decimal::ONE - self.rate_percentage / Decimal::from(100)
    }
}

/// How much fiat one unit of Kana spend is worth when converted to creator
/// revenue. Fixed to VND.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KanaExchangeRate {
    pub rate: Decimal,
    pub currency: Currency,
}

impl KanaExchangeRate {
    /// # Errors
    ///
    /// `Validation` when the rate is not positive.
    pub fn new(rate: Decimal) -> Result<Self> {
        if rate <= Decimal::ZERO {
            return Err(
                SettlementError::Validation("exchange rate must be positive".to_string()).into(),
            );
        }
        Ok(Self {
            rate,
            currency: Currency::Vnd,
        })
    }
}

/// Read seam for settlement policy, consulted at transaction time.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn commission_rate(&self, commission_type: CommissionType) -> Result<CommissionRate>;
    async fn kana_exchange_rate(&self) -> Result<KanaExchangeRate>;
}

#[derive(Debug, Clone)]
struct SettingsState {
    kana_rate: CommissionRate,
    dashifan_rate: CommissionRate,
    exchange_rate: KanaExchangeRate,
}

/// In-memory settings table. Reads serve the cached value; admin updates
/// replace it in place, so the next transaction sees the new policy.
pub struct SettingsTable {
    state: RwLock<SettingsState>,
}

impl SettingsTable {
    pub fn new(
        kana_rate: CommissionRate,
        dashifan_rate: CommissionRate,
        exchange_rate: KanaExchangeRate,
    ) -> Result<Self> {
        if kana_rate.commission_type != CommissionType::Kana
            || dashifan_rate.commission_type != CommissionType::DashiFan
        {
            return Err(SettlementError::Validation(
                "commission rates bound to the wrong type".to_string(),
            )
            .into());
        }
        Ok(Self {
            state: RwLock::new(SettingsState {
                kana_rate,
                dashifan_rate,
                exchange_rate,
            }),
        })
    }

    /// Admin update; invalidates the cached rate for that type.
    pub fn set_commission_rate(&self, rate: CommissionRate) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match rate.commission_type {
            CommissionType::Kana => state.kana_rate = rate,
            CommissionType::DashiFan => state.dashifan_rate = rate,
        }
    }

    /// Admin update; invalidates the cached exchange rate.
    pub fn set_exchange_rate(&self, rate: KanaExchangeRate) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.exchange_rate = rate;
    }
}

#[async_trait]
impl SettingsProvider for SettingsTable {
    async fn commission_rate(&self, commission_type: CommissionType) -> Result<CommissionRate> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(match commission_type {
            CommissionType::Kana => state.kana_rate,
            CommissionType::DashiFan => state.dashifan_rate,
        })
    }

    async fn kana_exchange_rate(&self) -> Result<KanaExchangeRate> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.exchange_rate)
    }
}
