//! Payment-provider contract.
//!
//! Every provider operation returns a strongly typed result struct validated
//! at the boundary; raw provider payloads travel only inside
//! [`CaptureResult::raw`] for audit. A call that times out or errors must
//! leave local state untouched so a retry can reuse the same provider id.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Currency, Money};
use crate::tier::Tier;
use crate::Result;

/// Provider resource created for a checkout: the id becomes the local order
/// (or subscription) key; the approval link is handed to the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutHandle {
    pub id: String,
    pub approval_link: String,
}

/// The provider's view of an order after a capture attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderOrderStatus {
    Completed,
    Voided,
    /// Not terminal yet; the caller may retry the capture.
    Pending,
    /// Anything the provider reports that we do not recognize. Treated like
    /// `Pending`: no local mutation.
    Other(String),
}

impl ProviderOrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "COMPLETED" => Self::Completed,
            "VOIDED" => Self::Voided,
            "PENDING" | "CREATED" | "APPROVED" | "SAVED" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Capture response: parsed status plus the raw payload for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub status: ProviderOrderStatus,
    pub raw: serde_json::Value,
}

/// Remote billing plan backing a DashiFan tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanHandle {
    pub id: String,
}

/// Confirmation of a revenue payout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub id: String,
}

/// External payment collaborator. Implementations must be safe to call
/// concurrently; the engine serializes per aggregate, not per provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a one-off order for `amount`; returns the provider order id
    /// and the reader-facing approval link.
    async fn create_order(&self, amount: &Money) -> Result<CheckoutHandle>;

    /// Attempt to capture a previously approved order.
    async fn capture_order(&self, provider_order_id: &str) -> Result<CaptureResult>;

    /// Create a recurring subscription on the tier's provider plan.
    async fn create_subscription(
        &self,
        tier: &Tier,
        user_id: Uuid,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutHandle>;

    /// Request cancellation; `false` means the provider refused.
    async fn cancel_subscription(&self, provider_subscription_id: &str, reason: &str)
        -> Result<bool>;

    async fn suspend_subscription(&self, provider_subscription_id: &str, reason: &str)
        -> Result<()>;

    async fn reactivate_subscription(&self, provider_subscription_id: &str) -> Result<()>;

    /// Move a live subscription onto another plan (tier upgrade).
    async fn revise_subscription_plan(
        &self,
        provider_subscription_id: &str,
        provider_plan_id: &str,
    ) -> Result<()>;

    /// Provider-plan lifecycle, driven by tier events via the payment-sync
    /// collaborator.
    async fn create_plan(&self, tier: &Tier) -> Result<PlanHandle>;
    async fn update_plan_pricing(&self, provider_plan_id: &str, price: &Money) -> Result<()>;
    async fn update_plan_status(&self, provider_plan_id: &str, active: bool) -> Result<()>;

    /// Pay withdrawn revenue out to the creator's external account.
    async fn payout(
        &self,
        account_ref: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<PayoutReceipt>;
}
