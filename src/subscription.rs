//! Subscription lifecycle state machine.
//!
//! `Pending → Active → {Cancelled, Suspended, Expired}`; a suspended
//! subscription can be reactivated or cancelled; a cancelled one still grants
//! entitlement until its `next_billing_date` passes, after which it lapses to
//! the terminal `Expired` state. Every transition is checked against the
//! table below; illegal transitions surface as `Conflict`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::tier::Tier;
use crate::{Result, SettlementError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// Created locally, waiting for the provider to confirm approval.
    Pending,
    Active,
    /// Cancellation requested; entitlement persists until period end.
    Cancelled,
    /// Provider-driven hold (e.g. billing failure).
    Suspended,
    /// Terminal: lapsed or provider-expired. Only a brand-new subscribe
    /// creates entitlement again.
    Expired,
}

impl SubscriptionStatus {
    pub fn can_transition_to(self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Active, Cancelled)
                | (Active, Suspended)
                | (Active, Expired)
                | (Suspended, Active)
                | (Suspended, Cancelled)
                | (Cancelled, Expired)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SubscriptionStatus::Expired)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubscriptionStatus::Pending => "Pending",
            SubscriptionStatus::Active => "Active",
            SubscriptionStatus::Cancelled => "Cancelled",
            SubscriptionStatus::Suspended => "Suspended",
            SubscriptionStatus::Expired => "Expired",
        };
        f.write_str(label)
    }
}

/// A reader's recurring relationship to one DashiFan tier. The tier reference
/// may change over the subscription's life (upgrade/downgrade); recurring
/// billing itself is delegated to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub series_id: Uuid,
    pub tier_id: Uuid,
    pub status: SubscriptionStatus,
    pub provider_subscription_id: Option<String>,
    pub next_billing_date: Option<i64>,
    pub created_at: i64,
}

impl Subscription {
    /// Create in `Pending`, carrying the provider resource id obtained from
    /// the subscription-create call.
    pub fn pending(user_id: Uuid, tier: &Tier, provider_subscription_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            series_id: tier.series_id,
            tier_id: tier.id,
            status: SubscriptionStatus::Pending,
            provider_subscription_id: Some(provider_subscription_id),
            next_billing_date: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    fn transition(&mut self, next: SubscriptionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SettlementError::Conflict(format!(
                "subscription {} cannot move from {} to {}",
                self.id, self.status, next
            ))
            .into());
        }
        self.status = next;
        Ok(())
    }

    /// Provider confirmed approval; the subscription starts billing.
    pub fn activate(&mut self, next_billing_date: i64) -> Result<()> {
        self.transition(SubscriptionStatus::Active)?;
        self.next_billing_date = Some(next_billing_date);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(SubscriptionStatus::Cancelled)
    }

    pub fn suspend(&mut self) -> Result<()> {
        self.transition(SubscriptionStatus::Suspended)
    }

    pub fn reactivate(&mut self) -> Result<()> {
        self.transition(SubscriptionStatus::Active)
    }

    pub fn expire(&mut self) -> Result<()> {
        self.transition(SubscriptionStatus::Expired)
    }

    /// Swap the tier reference to another tier of the same series.
    ///
    /// # Errors
    ///
    /// `NotFound` ("tier") when the tier belongs to a different series or is
    /// inactive; `Conflict` when the subscription is not active.
    pub fn change_tier(&mut self, tier: &Tier) -> Result<()> {
        if tier.series_id != self.series_id || !tier.is_active {
            return Err(SettlementError::not_found("tier", tier.id).into());
        }
        if self.status != SubscriptionStatus::Active {
            return Err(SettlementError::Conflict(format!(
                "subscription {} is {}, tier changes need an active subscription",
                self.id, self.status
            ))
            .into());
        }
        self.tier_id = tier.id;
        Ok(())
    }

    /// Whether the reader currently holds the tier's perks. A cancelled
    /// subscription keeps entitlement until the paid period ends.
    pub fn is_entitled(&self, now: i64) -> bool {
        match self.status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::Cancelled => {
                self.next_billing_date.is_some_and(|date| now < date)
            }
            _ => false,
        }
    }

    /// Cancelled and past period end: ready to be swept to `Expired`.
    pub fn has_lapsed(&self, now: i64) -> bool {
        self.status == SubscriptionStatus::Cancelled
            && self.next_billing_date.is_some_and(|date| now >= date)
    }
}
