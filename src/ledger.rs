//! Append-only ledgers.
//!
//! Every balance-affecting event is recorded exactly once and never mutated
//! or deleted afterwards; balances are derived by summation. Two logs exist:
//! Kana entries (Coin/Gold, integer units) for readers, and fiat revenue
//! transactions for creators. Using an immutable event log instead of a
//! mutable balance column avoids lost updates under concurrent postings and
//! keeps every balance reconstructable for audit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Currency;
use crate::{Result, SettlementError};

/// Kana denomination. Coin is earned through engagement, Gold is purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KanaType {
    Coin,
    Gold,
}

/// What a Kana ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Earn,
    Spend,
    Withdraw,
    Refund,
}

/// One immutable Kana movement, owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: Uuid,
    /// Kana units, always positive; direction comes from `kind`.
    pub amount: i64,
    pub kana_type: KanaType,
    pub kind: EntryKind,
    pub reason: String,
    pub recorded_at: i64,
}

impl LedgerEntry {
    fn record(
        user_id: Uuid,
        amount: i64,
        kana_type: KanaType,
        kind: EntryKind,
        reason: impl Into<String>,
    ) -> Result<Self> {
        if amount <= 0 {
            return Err(SettlementError::Validation(
                "ledger amount must be positive".to_string(),
            )
            .into());
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            amount,
            kana_type,
            kind,
            reason: reason.into(),
            recorded_at: chrono::Utc::now().timestamp(),
        })
    }

    pub fn earn(
        user_id: Uuid,
        amount: i64,
        kana_type: KanaType,
        reason: impl Into<String>,
    ) -> Result<Self> {
        Self::record(user_id, amount, kana_type, EntryKind::Earn, reason)
    }

    pub fn spend(
        user_id: Uuid,
        amount: i64,
        kana_type: KanaType,
        reason: impl Into<String>,
    ) -> Result<Self> {
        Self::record(user_id, amount, kana_type, EntryKind::Spend, reason)
    }

    pub fn withdraw(
        user_id: Uuid,
        amount: i64,
        kana_type: KanaType,
        reason: impl Into<String>,
    ) -> Result<Self> {
        Self::record(user_id, amount, kana_type, EntryKind::Withdraw, reason)
    }

    pub fn refund(
        user_id: Uuid,
        amount: i64,
        kana_type: KanaType,
        reason: impl Into<String>,
    ) -> Result<Self> {
        Self::record(user_id, amount, kana_type, EntryKind::Refund, reason)
    }

    /// Contribution of this entry to the owner's balance.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            EntryKind::Earn | EntryKind::Refund => self.amount,
            EntryKind::Spend | EntryKind::Withdraw => -self.amount,
        }
    }
}

/// Filter for ledger queries: by denomination, kind and time range.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub kana_type: Option<KanaType>,
    pub kind: Option<EntryKind>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if self.kana_type.is_some_and(|t| t != entry.kana_type) {
            return false;
        }
        if self.kind.is_some_and(|k| k != entry.kind) {
            return false;
        }
        if self.since.is_some_and(|s| entry.recorded_at < s) {
            return false;
        }
        if self.until.is_some_and(|u| entry.recorded_at >= u) {
            return false;
        }
        true
    }
}

/// Derived spendable balance for one Kana denomination.
pub fn kana_balance(entries: &[LedgerEntry], kana_type: KanaType) -> i64 {
    entries
        .iter()
        .filter(|e| e.kana_type == kana_type)
        .map(LedgerEntry::signed_amount)
        .sum()
}

/// What a revenue transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueKind {
    Earn,
    Withdraw,
    Refund,
}

/// One immutable fiat revenue movement, owned by a creator.
///
/// Amounts here are derived shares (already net of commission) and routinely
/// fall below the checkout minimum, so they carry a raw `Decimal` rather
/// than a bounds-checked [`crate::Money`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueTransaction {
    pub id: String,
    pub creator_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    pub kind: RevenueKind,
    pub reason: String,
    pub recorded_at: i64,
}

impl RevenueTransaction {
    fn record(
        creator_id: Uuid,
        amount: Decimal,
        currency: Currency,
        kind: RevenueKind,
        reason: impl Into<String>,
    ) -> Result<Self> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::Validation(
                "revenue amount must be positive".to_string(),
            )
            .into());
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            creator_id,
            amount,
            currency,
            kind,
            reason: reason.into(),
            recorded_at: chrono::Utc::now().timestamp(),
        })
    }

    pub fn earn(
        creator_id: Uuid,
        amount: Decimal,
        currency: Currency,
        reason: impl Into<String>,
    ) -> Result<Self> {
        Self::record(creator_id, amount, currency, RevenueKind::Earn, reason)
    }

    pub fn withdraw(
        creator_id: Uuid,
        amount: Decimal,
        currency: Currency,
        reason: impl Into<String>,
    ) -> Result<Self> {
        Self::record(creator_id, amount, currency, RevenueKind::Withdraw, reason)
    }

    pub fn refund(
        creator_id: Uuid,
        amount: Decimal,
        currency: Currency,
        reason: impl Into<String>,
    ) -> Result<Self> {
        Self::record(creator_id, amount, currency, RevenueKind::Refund, reason)
    }
}

/// Derived withdrawable balance in one currency:
/// `sum(Earn) − sum(Withdraw) + sum(Refund)`. Amounts in other currencies
/// never mix in, the same way [`kana_balance`] keys by denomination.
pub fn revenue_balance(transactions: &[RevenueTransaction], currency: Currency) -> Decimal {
    transactions
        .iter()
        .filter(|tx| tx.currency == currency)
        .map(|tx| match tx.kind {
            RevenueKind::Earn | RevenueKind::Refund => tx.amount,
            RevenueKind::Withdraw => -tx.amount,
        })
        .sum()
}
