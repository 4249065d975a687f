//! Test doubles and fixtures for the provider and settings seams.
//!
//! [`MockProvider`] is scriptable per order id and counts remote calls, so
//! tests can assert both what settled locally and what was asked of the
//! provider.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::money::{BillingCycle, Currency, Money};
use crate::policy::{CommissionRate, CommissionType, KanaExchangeRate, SettingsTable};
use crate::provider::{
    CaptureResult, CheckoutHandle, PaymentProvider, PayoutReceipt, PlanHandle, ProviderOrderStatus,
};
use crate::tier::Tier;
use crate::{Result, SettlementError};

/// In-memory payment provider. Captures report whatever status the test
/// scripted for that order id (default `Completed`); failure toggles make the
/// corresponding remote calls fail.
#[derive(Default)]
pub struct MockProvider {
    order_seq: AtomicU64,
    subscription_seq: AtomicU64,
    plan_seq: AtomicU64,
    payout_seq: AtomicU64,
    capture_statuses: Mutex<HashMap<String, ProviderOrderStatus>>,
    pub capture_calls: AtomicU64,
    pub cancel_calls: AtomicU64,
    pub revise_calls: AtomicU64,
    pub payout_calls: AtomicU64,
    fail_payouts: AtomicBool,
    refuse_cancellations: AtomicBool,
    fail_revisions: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status the next capture of `order_id` reports.
    pub fn script_capture(&self, order_id: &str, status: ProviderOrderStatus) {
        self.capture_statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(order_id.to_string(), status);
    }

    pub fn fail_payouts(&self, fail: bool) {
        self.fail_payouts.store(fail, Ordering::SeqCst);
    }

    pub fn refuse_cancellations(&self, refuse: bool) {
        self.refuse_cancellations.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_revisions(&self, fail: bool) {
        self.fail_revisions.store(fail, Ordering::SeqCst);
    }

    fn scripted_status(&self, order_id: &str) -> ProviderOrderStatus {
        self.capture_statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(order_id)
            .cloned()
            .unwrap_or(ProviderOrderStatus::Completed)
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_order(&self, _amount: &Money) -> Result<CheckoutHandle> {
        let n = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("ORD-{n}");
        Ok(CheckoutHandle {
            approval_link: format!("https://provider.test/approve/{id}"),
            id,
        })
    }

    async fn capture_order(&self, provider_order_id: &str) -> Result<CaptureResult> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        let status = self.scripted_status(provider_order_id);
        let raw = serde_json::json!({ "id": provider_order_id, "status": format!("{status:?}") });
        Ok(CaptureResult { status, raw })
    }

    async fn create_subscription(
        &self,
        _tier: &Tier,
        _user_id: Uuid,
        _return_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutHandle> {
        let n = self.subscription_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("I-SUB{n}");
        Ok(CheckoutHandle {
            approval_link: format!("https://provider.test/subscribe/{id}"),
            id,
        })
    }

    async fn cancel_subscription(
        &self,
        _provider_subscription_id: &str,
        _reason: &str,
    ) -> Result<bool> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.refuse_cancellations.load(Ordering::SeqCst))
    }

    async fn suspend_subscription(
        &self,
        _provider_subscription_id: &str,
        _reason: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn reactivate_subscription(&self, _provider_subscription_id: &str) -> Result<()> {
        Ok(())
    }

    async fn revise_subscription_plan(
        &self,
        _provider_subscription_id: &str,
        _provider_plan_id: &str,
    ) -> Result<()> {
        self.revise_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_revisions.load(Ordering::SeqCst) {
            return Err(
                SettlementError::Provider("plan revision rejected".to_string()).into(),
            );
        }
        Ok(())
    }

    async fn create_plan(&self, _tier: &Tier) -> Result<PlanHandle> {
        let n = self.plan_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PlanHandle {
            id: format!("P-{n}"),
        })
    }

    async fn update_plan_pricing(&self, _provider_plan_id: &str, _price: &Money) -> Result<()> {
        Ok(())
    }

    async fn update_plan_status(&self, _provider_plan_id: &str, _active: bool) -> Result<()> {
        Ok(())
    }

    async fn payout(
        &self,
        _account_ref: &str,
        _amount: Decimal,
        _currency: Currency,
    ) -> Result<PayoutReceipt> {
        self.payout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_payouts.load(Ordering::SeqCst) {
            return Err(SettlementError::Provider("payout declined".to_string()).into());
        }
        let n = self.payout_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PayoutReceipt {
            id: format!("PAYOUT-{n}"),
        })
    }
}

/// Settings used throughout the tests: 30% commission on both types, 10 VND
/// per Kana unit.
pub fn default_settings() -> SettingsTable {
    SettingsTable::new(
        CommissionRate::new(CommissionType::Kana, dec!(30)).unwrap(),
        CommissionRate::new(CommissionType::DashiFan, dec!(30)).unwrap(),
        KanaExchangeRate::new(dec!(10)).unwrap(),
    )
    .unwrap()
}

pub fn vnd(amount: Decimal) -> Money {
    Money::new(amount, Currency::Vnd).unwrap()
}

/// A monthly VND tier with a provider plan already attached.
pub fn monthly_tier(series_id: Uuid, creator_id: Uuid, amount: Decimal) -> Tier {
    let (mut tier, _) = Tier::new(
        series_id,
        creator_id,
        "Supporter",
        "Early access",
        3,
        vnd(amount),
        BillingCycle::monthly(),
    )
    .unwrap();
    tier.attach_provider_plan(format!("P-{}", tier.id));
    tier
}
