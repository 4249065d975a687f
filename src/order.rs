//! One-off order state machines and the Kana Gold catalog.
//!
//! Orders are keyed by the provider's order id, which makes duplicate local
//! orders per external transaction impossible at the storage layer. Status
//! only advances forward: `Pending → Completed | Voided`, both terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::money::Money;
use crate::{Result, SettlementError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Completed,
    Voided,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Voided)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Completed => "Completed",
            OrderStatus::Voided => "Voided",
        };
        f.write_str(label)
    }
}

fn forward_only(id: &str, status: OrderStatus) -> Result<()> {
    if status.is_terminal() {
        return Err(SettlementError::Conflict(format!(
            "order {id} is already {status}"
        ))
        .into());
    }
    Ok(())
}

/// One-off purchase of a Kana Gold pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// Provider order id; also the local primary key.
    pub id: String,
    pub user_id: Uuid,
    pub pack_id: Uuid,
    pub price: Money,
    pub status: OrderStatus,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl PurchaseOrder {
    pub fn pending(id: String, user_id: Uuid, pack_id: Uuid, price: Money) -> Self {
        Self {
            id,
            user_id,
            pack_id,
            price,
            status: OrderStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, now: i64) -> Result<()> {
        forward_only(&self.id, self.status)?;
        self.status = OrderStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn void(&mut self) -> Result<()> {
        forward_only(&self.id, self.status)?;
        self.status = OrderStatus::Voided;
        Ok(())
    }
}

/// One-off charge tied to a subscription change. `upgrade_tier_id` is set for
/// an upgrade price-difference order; regular renewals are fully delegated to
/// the provider and never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOrder {
    /// Provider order id; also the local primary key.
    pub id: String,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub upgrade_tier_id: Option<Uuid>,
    pub price: Money,
    pub status: OrderStatus,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl SubscriptionOrder {
    pub fn upgrade(
        id: String,
        user_id: Uuid,
        subscription_id: Uuid,
        upgrade_tier_id: Uuid,
        price: Money,
    ) -> Self {
        Self {
            id,
            user_id,
            subscription_id,
            upgrade_tier_id: Some(upgrade_tier_id),
            price,
            status: OrderStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, now: i64) -> Result<()> {
        forward_only(&self.id, self.status)?;
        self.status = OrderStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn void(&mut self) -> Result<()> {
        forward_only(&self.id, self.status)?;
        self.status = OrderStatus::Voided;
        Ok(())
    }
}

/// Admin-curated Kana Gold catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KanaGoldPack {
    pub id: Uuid,
    /// Gold units credited on completion.
    pub amount: i64,
    pub price: Money,
    pub is_active: bool,
}

impl KanaGoldPack {
    /// # Errors
    ///
    /// `Validation` when the Gold amount is not positive.
    pub fn new(amount: i64, price: Money) -> Result<Self> {
        if amount <= 0 {
            return Err(SettlementError::Validation(
                "pack amount must be positive".to_string(),
            )
            .into());
        }
        Ok(Self {
            id: Uuid::new_v4(),
            amount,
            price,
            is_active: true,
        })
    }
}
