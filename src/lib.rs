//! # Dashi Settlement Engine
//!
//! Turns a payment-provider transaction into a durable change of entitlement
//! (an active DashiFan subscription, a completed Kana Gold purchase) and a
//! correct, auditable movement of money between the platform, the creator and
//! the reader's virtual-currency balance.
//!
//! Key properties:
//! - Multi-state lifecycles (subscription, order) kept consistent with the
//!   external payment provider's asynchronous state
//! - Deterministic commission splits and Kana-to-fiat conversion with a single
//!   rounding mode, audited through an append-only ledger
//! - Idempotency against duplicate provider callbacks and client retries,
//!   serialized per aggregate
//! - Fixed-point decimal arithmetic throughout, never floats

pub mod engine;
pub mod events;
pub mod ledger;
pub mod money;
pub mod order;
pub mod policy;
pub mod provider;
pub mod revenue;
pub mod storage;
pub mod subscription;
pub mod test_utils;
pub mod tier;

pub use engine::{CaptureOutcome, PendingCheckout, PendingSubscription, SettlementEngine};
pub use events::{DomainEvent, Outcome};
pub use ledger::{
    kana_balance, revenue_balance, EntryKind, KanaType, LedgerEntry, LedgerFilter, RevenueKind,
    RevenueTransaction,
};
pub use money::{BillingCycle, BillingInterval, Currency, Money};
pub use order::{KanaGoldPack, OrderStatus, PurchaseOrder, SubscriptionOrder};
pub use policy::{
    CommissionRate, CommissionType, KanaExchangeRate, SettingsProvider, SettingsTable,
};
pub use provider::{
    CaptureResult, CheckoutHandle, PaymentProvider, PayoutReceipt, PlanHandle, ProviderOrderStatus,
};
pub use revenue::{kana_revenue_split, split_fiat, RevenueSplit};
pub use storage::{FileSettlementStore, SettlementStore};
pub use subscription::{Subscription, SubscriptionStatus};
pub use tier::Tier;

pub type Result<T> = anyhow::Result<T>;

#[derive(thiserror::Error, Debug)]
pub enum SettlementError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    #[error("invalid amount: {amount} {currency} is outside [{min}, {max}]")]
    InvalidAmount {
        amount: rust_decimal::Decimal,
        currency: &'static str,
        min: rust_decimal::Decimal,
        max: rust_decimal::Decimal,
    },
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("payment provider error: {0}")]
    Provider(String),
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: String, available: String },
    #[error("storage error: {0}")]
    Storage(String),
}

impl SettlementError {
    /// Whether a caller may retry the same operation with the same
    /// idempotency key and expect it to eventually succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Storage(_))
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}
