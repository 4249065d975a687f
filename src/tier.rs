//! DashiFan tiers: creator-defined subscription plans on a series.
//!
//! Price and status mutations return the integration events the payment-sync
//! collaborator needs to create, update or archive the remote provider plan.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::DomainEvent;
use crate::money::{BillingCycle, Money};
use crate::{Result, SettlementError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub id: Uuid,
    pub series_id: Uuid,
    /// Owner of the series this tier belongs to; revenue is credited here.
    pub creator_id: Uuid,
    pub name: String,
    pub description: String,
    pub perks: u32,
    pub price: Money,
    pub cycle: BillingCycle,
    pub is_active: bool,
    /// Remote plan id, attached once the payment-sync collaborator has
    /// created it at the provider.
    pub provider_plan_id: Option<String>,
}

impl Tier {
    pub fn new(
        series_id: Uuid,
        creator_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        perks: u32,
        price: Money,
        cycle: BillingCycle,
    ) -> Result<(Self, DomainEvent)> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(
                SettlementError::Validation("tier name cannot be empty".to_string()).into(),
            );
        }
        let tier = Self {
            id: Uuid::new_v4(),
            series_id,
            creator_id,
            name,
            description: description.into(),
            perks,
            price,
            cycle,
            is_active: true,
            provider_plan_id: None,
        };
        let event = DomainEvent::TierCreated {
            tier_id: tier.id,
            series_id,
        };
        Ok((tier, event))
    }

    pub fn attach_provider_plan(&mut self, plan_id: impl Into<String>) {
        self.provider_plan_id = Some(plan_id.into());
    }

    /// Change the tier price; existing subscribers keep billing at the old
    /// rate until the provider plan revision propagates.
    ///
    /// # Errors
    ///
    /// `Validation` when the new price changes currency.
    pub fn change_price(&mut self, new_price: Money) -> Result<DomainEvent> {
        if new_price.currency() != self.price.currency() {
            return Err(SettlementError::Validation(
                "tier price cannot change currency".to_string(),
            )
            .into());
        }
        self.price = new_price;
        Ok(DomainEvent::TierPriceChanged {
            tier_id: self.id,
            amount: new_price.amount(),
            currency: new_price.currency(),
        })
    }

    /// Activate or retire the tier. Returns `None` when nothing changed, so
    /// repeated admin submissions do not re-publish the event.
    pub fn set_active(&mut self, is_active: bool) -> Option<DomainEvent> {
        if self.is_active == is_active {
            return None;
        }
        self.is_active = is_active;
        Some(DomainEvent::TierStatusChanged {
            tier_id: self.id,
            is_active,
        })
    }
}
