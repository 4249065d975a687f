//! Integration events and the outbox/result pattern.
//!
//! Commands return their primary result together with the events that became
//! pending during the transactional write; a thin dispatcher outside this
//! crate publishes them after the write commits, which preserves
//! at-least-once delivery without entities holding a mediator reference.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Currency;

/// Events the payment-sync and notification collaborators subscribe to.
/// The engine does not depend on their delivery beyond logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    TierCreated {
        tier_id: Uuid,
        series_id: Uuid,
    },
    TierPriceChanged {
        tier_id: Uuid,
        amount: Decimal,
        currency: Currency,
    },
    TierStatusChanged {
        tier_id: Uuid,
        is_active: bool,
    },
    SubscriptionCancelled {
        subscription_id: Uuid,
        provider_subscription_id: Option<String>,
    },
    SubscriptionSuspended {
        subscription_id: Uuid,
    },
    SubscriptionReactivated {
        subscription_id: Uuid,
    },
    SubscriptionTierChanged {
        subscription_id: Uuid,
        tier_id: Uuid,
    },
}

/// A command result plus the integration events it left pending.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<DomainEvent>,
}

impl<T> Outcome<T> {
    /// A result with no pending events.
    pub fn bare(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    pub fn with_events(value: T, events: Vec<DomainEvent>) -> Self {
        Self { value, events }
    }

    /// Hand the pending events to the dispatcher, leaving the outcome empty.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
}
