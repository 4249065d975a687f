//! Settlement engine: the command surface of the crate.
//!
//! Each command validates, calls the payment collaborator, then persists —
//! in that order, so a provider failure never leaves a half-applied local
//! transition. Capture commands are idempotent: re-submitting against an
//! already-terminal order returns the stored result without re-applying
//! effects, and the storage settle units serialize concurrent attempts per
//! order id.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{DomainEvent, Outcome};
use crate::ledger::{
    kana_balance, revenue_balance, KanaType, LedgerEntry, LedgerFilter, RevenueTransaction,
};
use crate::money::{BillingCycle, Currency, Money};
use crate::order::{KanaGoldPack, OrderStatus, PurchaseOrder, SubscriptionOrder};
use crate::policy::{CommissionType, SettingsProvider};
use crate::provider::{PaymentProvider, PayoutReceipt, ProviderOrderStatus};
use crate::revenue::{kana_revenue_split, split_fiat, RevenueSplit};
use crate::storage::SettlementStore;
use crate::subscription::{Subscription, SubscriptionStatus};
use crate::tier::Tier;
use crate::{Result, SettlementError};

/// A locally pending order waiting for reader approval at the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCheckout {
    pub order_id: String,
    pub approval_link: String,
}

/// A locally pending subscription waiting for reader approval.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubscription {
    pub subscription_id: Uuid,
    pub approval_link: String,
}

/// Result of a capture attempt. `Pending` means the provider has not reached
/// a terminal state; nothing was mutated locally and the caller may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed,
    Voided,
    Pending,
}

pub struct SettlementEngine {
    store: Arc<dyn SettlementStore>,
    provider: Arc<dyn PaymentProvider>,
    settings: Arc<dyn SettingsProvider>,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        provider: Arc<dyn PaymentProvider>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    /// Storage reference (for read-model queries and tests).
    pub fn store(&self) -> &Arc<dyn SettlementStore> {
        &self.store
    }

    // ============================================================
    // Catalog administration
    // ============================================================

    #[allow(clippy::too_many_arguments)]
    pub async fn create_tier(
        &self,
        series_id: Uuid,
        creator_id: Uuid,
        name: &str,
        description: &str,
        perks: u32,
        price: Money,
        cycle: BillingCycle,
    ) -> Result<Outcome<Tier>> {
        let (tier, event) = Tier::new(series_id, creator_id, name, description, perks, price, cycle)?;
        self.store.save_tier(&tier).await?;
        info!(tier = %tier.id, series = %series_id, "tier created");
        Ok(Outcome::with_events(tier, vec![event]))
    }

    pub async fn change_tier_price(&self, tier_id: Uuid, new_price: Money) -> Result<Outcome<()>> {
        let mut tier = self
            .store
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", tier_id))?;
        let event = tier.change_price(new_price)?;
        self.store.save_tier(&tier).await?;
        Ok(Outcome::with_events((), vec![event]))
    }

    pub async fn set_tier_status(&self, tier_id: Uuid, is_active: bool) -> Result<Outcome<()>> {
        let mut tier = self
            .store
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", tier_id))?;
        let events = tier.set_active(is_active).into_iter().collect();
        self.store.save_tier(&tier).await?;
        Ok(Outcome::with_events((), events))
    }

    /// Record the remote plan id once the payment-sync collaborator has
    /// created it at the provider.
    pub async fn attach_tier_plan(&self, tier_id: Uuid, plan_id: &str) -> Result<()> {
        let mut tier = self
            .store
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", tier_id))?;
        tier.attach_provider_plan(plan_id);
        self.store.save_tier(&tier).await
    }

    pub async fn create_pack(&self, amount: i64, price: Money) -> Result<KanaGoldPack> {
        let pack = KanaGoldPack::new(amount, price)?;
        self.store.save_pack(&pack).await?;
        Ok(pack)
    }

    pub async fn set_pack_status(&self, pack_id: Uuid, is_active: bool) -> Result<()> {
        let mut pack = self
            .store
            .get_pack(pack_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("kana gold pack", pack_id))?;
        pack.is_active = is_active;
        self.store.save_pack(&pack).await
    }

    // ============================================================
    // Kana Gold purchases
    // ============================================================

    /// Open a checkout for a Gold pack. The provider order id becomes the
    /// local order key; nothing is credited until capture confirms.
    pub async fn purchase_gold_pack(
        &self,
        user_id: Uuid,
        pack_id: Uuid,
    ) -> Result<PendingCheckout> {
        let pack = self
            .store
            .get_pack(pack_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("kana gold pack", pack_id))?;
        if !pack.is_active {
            return Err(
                SettlementError::Validation(format!("pack {pack_id} is not active")).into(),
            );
        }

        let handle = self.provider.create_order(&pack.price).await?;
        let order = PurchaseOrder::pending(handle.id, user_id, pack.id, pack.price);
        self.store.insert_purchase_order(&order).await?;
        info!(order = %order.id, user = %user_id, "gold pack checkout opened");

        Ok(PendingCheckout {
            order_id: order.id,
            approval_link: handle.approval_link,
        })
    }

    /// Capture a pack purchase. Safe to call repeatedly and from webhooks.
    pub async fn capture_purchase(&self, caller: Uuid, order_id: &str) -> Result<CaptureOutcome> {
        let order = self
            .store
            .get_purchase_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("purchase order", order_id))?;
        if order.user_id != caller {
            return Err(SettlementError::Forbidden(format!(
                "order {order_id} belongs to another user"
            ))
            .into());
        }
        match order.status {
            OrderStatus::Completed => return Ok(CaptureOutcome::Completed),
            OrderStatus::Voided => return Ok(CaptureOutcome::Voided),
            OrderStatus::Pending => {}
        }

        let capture = self.provider.capture_order(order_id).await?;
        match capture.status {
            ProviderOrderStatus::Completed => {
                let pack = self
                    .store
                    .get_pack(order.pack_id)
                    .await?
                    .ok_or_else(|| SettlementError::not_found("kana gold pack", order.pack_id))?;
                let mut completed = order.clone();
                completed.complete(chrono::Utc::now().timestamp())?;
                let credit = LedgerEntry::earn(
                    order.user_id,
                    pack.amount,
                    KanaType::Gold,
                    format!("kana gold pack {}", pack.id),
                )?;
                let applied = self.store.settle_purchase(&completed, Some(&credit)).await?;
                if applied {
                    info!(order = %order_id, gold = pack.amount, "purchase settled");
                } else {
                    debug!(order = %order_id, "purchase already settled, no-op");
                }
                Ok(CaptureOutcome::Completed)
            }
            ProviderOrderStatus::Voided => {
                let mut voided = order.clone();
                voided.void()?;
                self.store.settle_purchase(&voided, None).await?;
                info!(order = %order_id, "purchase voided, no balance effect");
                Ok(CaptureOutcome::Voided)
            }
            ProviderOrderStatus::Pending | ProviderOrderStatus::Other(_) => {
                debug!(order = %order_id, status = ?capture.status, "capture not terminal, order stays pending");
                Ok(CaptureOutcome::Pending)
            }
        }
    }

    // ============================================================
    // Subscription lifecycle
    // ============================================================

    /// Subscribe a reader to a series tier. The subscription is persisted in
    /// `Pending` only after the provider accepted the create request.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        series_id: Uuid,
        tier_id: Uuid,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<PendingSubscription> {
        let tier = self
            .store
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", tier_id))?;
        if tier.series_id != series_id {
            return Err(SettlementError::not_found("tier", tier_id).into());
        }
        if !tier.is_active {
            return Err(
                SettlementError::Validation(format!("tier {tier_id} is not active")).into(),
            );
        }
        if self
            .store
            .find_blocking_subscription(user_id, series_id)
            .await?
            .is_some()
        {
            return Err(SettlementError::Conflict(format!(
                "user {user_id} already has a subscription for series {series_id}"
            ))
            .into());
        }

        let handle = self
            .provider
            .create_subscription(&tier, user_id, return_url, cancel_url)
            .await?;
        let sub = Subscription::pending(user_id, &tier, handle.id);
        self.store.save_subscription(&sub).await?;
        info!(subscription = %sub.id, user = %user_id, tier = %tier_id, "subscription pending approval");

        Ok(PendingSubscription {
            subscription_id: sub.id,
            approval_link: handle.approval_link,
        })
    }

    /// The provider confirmed the created subscription resource; activate
    /// and schedule the first renewal. Idempotent for repeat deliveries.
    pub async fn complete_subscription_creation(&self, subscription_id: Uuid) -> Result<()> {
        let mut sub = self
            .store
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("subscription", subscription_id))?;
        if sub.status == SubscriptionStatus::Active {
            debug!(subscription = %subscription_id, "already active, no-op");
            return Ok(());
        }
        let tier = self
            .store
            .get_tier(sub.tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", sub.tier_id))?;
        let now = chrono::Utc::now().timestamp();
        sub.activate(tier.cycle.next_billing_date(now))?;
        self.store.save_subscription(&sub).await?;
        info!(subscription = %subscription_id, "subscription active");
        Ok(())
    }

    async fn owned_subscription(&self, caller: Uuid, subscription_id: Uuid) -> Result<Subscription> {
        let sub = self
            .store
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("subscription", subscription_id))?;
        if sub.user_id != caller {
            return Err(SettlementError::Forbidden(format!(
                "subscription {subscription_id} belongs to another user"
            ))
            .into());
        }
        Ok(sub)
    }

    /// Fetch a tier and check it is a valid change target for `sub`.
    async fn change_target(&self, sub: &Subscription, tier_id: Uuid) -> Result<Tier> {
        let tier = self
            .store
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", tier_id))?;
        if tier.series_id != sub.series_id || !tier.is_active {
            return Err(SettlementError::not_found("tier", tier_id).into());
        }
        Ok(tier)
    }

    /// Move to a pricier tier. The price difference must be paid through a
    /// `SubscriptionOrder` before the tier actually changes; this only opens
    /// the checkout.
    pub async fn upgrade_tier(
        &self,
        caller: Uuid,
        subscription_id: Uuid,
        new_tier_id: Uuid,
    ) -> Result<PendingCheckout> {
        let sub = self.owned_subscription(caller, subscription_id).await?;
        if sub.status != SubscriptionStatus::Active {
            return Err(SettlementError::Conflict(format!(
                "subscription {subscription_id} is {}, upgrades need an active subscription",
                sub.status
            ))
            .into());
        }
        let current = self
            .store
            .get_tier(sub.tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", sub.tier_id))?;
        let target = self.change_target(&sub, new_tier_id).await?;

        // Positive difference enforced here; a cheaper tier is a downgrade.
        let difference = target.price.price_difference(&current.price)?;

        let handle = self.provider.create_order(&difference).await?;
        let order =
            SubscriptionOrder::upgrade(handle.id, caller, sub.id, target.id, difference);
        self.store.insert_subscription_order(&order).await?;
        info!(order = %order.id, subscription = %subscription_id, "upgrade checkout opened");

        Ok(PendingCheckout {
            order_id: order.id,
            approval_link: handle.approval_link,
        })
    }

    /// Capture an upgrade price-difference order. On completion the tier
    /// swaps, the provider plan is revised and the creator is credited —
    /// exactly once, no matter how often this is called.
    pub async fn capture_subscription_order(
        &self,
        caller: Uuid,
        order_id: &str,
    ) -> Result<Outcome<CaptureOutcome>> {
        let order = self
            .store
            .get_subscription_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("subscription order", order_id))?;
        if order.user_id != caller {
            return Err(SettlementError::Forbidden(format!(
                "order {order_id} belongs to another user"
            ))
            .into());
        }
        match order.status {
            OrderStatus::Completed => return Ok(Outcome::bare(CaptureOutcome::Completed)),
            OrderStatus::Voided => return Ok(Outcome::bare(CaptureOutcome::Voided)),
            OrderStatus::Pending => {}
        }

        let capture = self.provider.capture_order(order_id).await?;
        match capture.status {
            ProviderOrderStatus::Completed => {
                let mut sub = self
                    .store
                    .get_subscription(order.subscription_id)
                    .await?
                    .ok_or_else(|| {
                        SettlementError::not_found("subscription", order.subscription_id)
                    })?;
                let tier_id = order.upgrade_tier_id.ok_or_else(|| {
                    SettlementError::Validation(format!(
                        "order {order_id} carries no upgrade tier"
                    ))
                })?;
                let tier = self
                    .store
                    .get_tier(tier_id)
                    .await?
                    .ok_or_else(|| SettlementError::not_found("tier", tier_id))?;
                sub.change_tier(&tier)?;

                // The provider plan change applies only once the order
                // completes; a failure here aborts the local transition.
                let provider_sub = sub.provider_subscription_id.clone().ok_or_else(|| {
                    SettlementError::Validation(format!(
                        "subscription {} has no provider resource",
                        sub.id
                    ))
                })?;
                let plan = tier.provider_plan_id.clone().ok_or_else(|| {
                    SettlementError::Provider(format!("tier {tier_id} has no provider plan"))
                })?;
                self.provider
                    .revise_subscription_plan(&provider_sub, &plan)
                    .await?;

                let rate = self
                    .settings
                    .commission_rate(CommissionType::DashiFan)
                    .await?;
                let split = split_fiat(order.price.amount(), order.price.currency(), &rate);
                let revenue = RevenueTransaction::earn(
                    tier.creator_id,
                    split.creator_share,
                    split.currency,
                    format!("dashifan upgrade order {}", order.id),
                )?;

                let mut completed = order.clone();
                completed.complete(chrono::Utc::now().timestamp())?;
                let applied = self
                    .store
                    .settle_subscription_order(&completed, Some(&sub), Some(&revenue))
                    .await?;
                let events = if applied {
                    info!(order = %order_id, subscription = %sub.id, tier = %tier.id, "upgrade settled");
                    vec![DomainEvent::SubscriptionTierChanged {
                        subscription_id: sub.id,
                        tier_id: tier.id,
                    }]
                } else {
                    debug!(order = %order_id, "upgrade already settled, no-op");
                    Vec::new()
                };
                Ok(Outcome::with_events(CaptureOutcome::Completed, events))
            }
            ProviderOrderStatus::Voided => {
                let mut voided = order.clone();
                voided.void()?;
                self.store
                    .settle_subscription_order(&voided, None, None)
                    .await?;
                Ok(Outcome::bare(CaptureOutcome::Voided))
            }
            ProviderOrderStatus::Pending | ProviderOrderStatus::Other(_) => {
                debug!(order = %order_id, status = ?capture.status, "capture not terminal, order stays pending");
                Ok(Outcome::bare(CaptureOutcome::Pending))
            }
        }
    }

    /// Move to a cheaper tier. Takes effect as a stored tier swap only; no
    /// order, no refund — the partial-period credit is forfeited and the
    /// provider keeps billing the old rate until renewal reconciles.
    pub async fn downgrade_tier(
        &self,
        caller: Uuid,
        subscription_id: Uuid,
        new_tier_id: Uuid,
    ) -> Result<Outcome<()>> {
        let mut sub = self.owned_subscription(caller, subscription_id).await?;
        let current = self
            .store
            .get_tier(sub.tier_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("tier", sub.tier_id))?;
        let target = self.change_target(&sub, new_tier_id).await?;
        if target.price.currency() != current.price.currency() {
            return Err(SettlementError::Validation(
                "tiers are priced in different currencies".to_string(),
            )
            .into());
        }
        if target.price.amount() >= current.price.amount() {
            return Err(SettlementError::Validation(
                "downgrade requires a cheaper tier".to_string(),
            )
            .into());
        }

        sub.change_tier(&target)?;
        self.store.save_subscription(&sub).await?;
        info!(subscription = %subscription_id, tier = %target.id, "downgraded, effective next cycle");

        Ok(Outcome::with_events(
            (),
            vec![DomainEvent::SubscriptionTierChanged {
                subscription_id: sub.id,
                tier_id: target.id,
            }],
        ))
    }

    /// Cancel at the provider, then locally. The reader keeps entitlement
    /// until `next_billing_date`.
    pub async fn unsubscribe(
        &self,
        caller: Uuid,
        subscription_id: Uuid,
        reason: &str,
    ) -> Result<Outcome<()>> {
        let mut sub = self.owned_subscription(caller, subscription_id).await?;
        if !matches!(
            sub.status,
            SubscriptionStatus::Active | SubscriptionStatus::Suspended
        ) {
            return Err(SettlementError::Conflict(format!(
                "subscription {subscription_id} is {}, nothing to cancel",
                sub.status
            ))
            .into());
        }
        let provider_sub = sub.provider_subscription_id.clone().ok_or_else(|| {
            SettlementError::Validation(format!(
                "subscription {subscription_id} has no provider resource"
            ))
        })?;

        let accepted = self
            .provider
            .cancel_subscription(&provider_sub, reason)
            .await?;
        if !accepted {
            return Err(
                SettlementError::Provider("provider refused the cancellation".to_string()).into(),
            );
        }

        sub.cancel()?;
        self.store.save_subscription(&sub).await?;
        info!(subscription = %subscription_id, "cancelled, entitled until period end");

        Ok(Outcome::with_events(
            (),
            vec![DomainEvent::SubscriptionCancelled {
                subscription_id: sub.id,
                provider_subscription_id: sub.provider_subscription_id.clone(),
            }],
        ))
    }

    // ============================================================
    // Provider-driven mirrors (webhooks)
    // ============================================================

    /// Mirror a provider suspension. Idempotent for repeated delivery.
    pub async fn on_provider_suspended(&self, provider_subscription_id: &str) -> Result<()> {
        let mut sub = self.mirrored(provider_subscription_id).await?;
        if sub.status == SubscriptionStatus::Suspended {
            debug!(provider_subscription = provider_subscription_id, "repeat suspension, no-op");
            return Ok(());
        }
        sub.suspend()?;
        self.store.save_subscription(&sub).await?;
        info!(subscription = %sub.id, "suspended by provider");
        Ok(())
    }

    /// Mirror a provider reactivation. Idempotent for repeated delivery.
    pub async fn on_provider_reactivated(&self, provider_subscription_id: &str) -> Result<()> {
        let mut sub = self.mirrored(provider_subscription_id).await?;
        if sub.status == SubscriptionStatus::Active {
            debug!(provider_subscription = provider_subscription_id, "repeat reactivation, no-op");
            return Ok(());
        }
        sub.reactivate()?;
        self.store.save_subscription(&sub).await?;
        info!(subscription = %sub.id, "reactivated by provider");
        Ok(())
    }

    /// Mirror a provider-side terminal cancellation. Idempotent for repeated
    /// delivery.
    pub async fn on_provider_cancelled(&self, provider_subscription_id: &str) -> Result<()> {
        let mut sub = self.mirrored(provider_subscription_id).await?;
        if matches!(
            sub.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        ) {
            debug!(provider_subscription = provider_subscription_id, "repeat cancellation, no-op");
            return Ok(());
        }
        sub.cancel()?;
        self.store.save_subscription(&sub).await?;
        info!(subscription = %sub.id, "cancelled by provider");
        Ok(())
    }

    async fn mirrored(&self, provider_subscription_id: &str) -> Result<Subscription> {
        self.store
            .find_subscription_by_provider_id(provider_subscription_id)
            .await?
            .ok_or_else(|| {
                SettlementError::not_found("subscription", provider_subscription_id).into()
            })
    }

    /// Sweep cancelled subscriptions whose paid period has ended into the
    /// terminal `Expired` state. Returns how many lapsed.
    pub async fn expire_lapsed(&self, now: i64) -> Result<u32> {
        let mut count = 0;
        for mut sub in self.store.list_subscriptions().await? {
            if sub.has_lapsed(now) {
                sub.expire()?;
                self.store.save_subscription(&sub).await?;
                count += 1;
            }
        }
        if count > 0 {
            info!(count, "lapsed subscriptions expired");
        }
        Ok(count)
    }

    // ============================================================
    // Revenue
    // ============================================================

    /// Settle a chapter unlock: debit the reader's Kana, credit the creator
    /// with the fiat share net of commission, one ledger record each. The
    /// balance check lives inside the storage unit, under the ledger lock,
    /// so concurrent unlocks cannot overdraw.
    pub async fn unlock_chapter(
        &self,
        reader_id: Uuid,
        creator_id: Uuid,
        price: i64,
        kana_type: KanaType,
        chapter_ref: &str,
    ) -> Result<RevenueSplit> {
        if price <= 0 {
            return Err(SettlementError::Validation(
                "chapter price must be positive".to_string(),
            )
            .into());
        }

        let rate = self.settings.commission_rate(CommissionType::Kana).await?;
        let exchange = self.settings.kana_exchange_rate().await?;
        let split = kana_revenue_split(price, &exchange, &rate);

        let spend = LedgerEntry::spend(
            reader_id,
            price,
            kana_type,
            format!("chapter unlock {chapter_ref}"),
        )?;
        // 100% commission leaves nothing to credit; only the spend posts.
        let earn = if split.creator_share > Decimal::ZERO {
            Some(RevenueTransaction::earn(
                creator_id,
                split.creator_share,
                split.currency,
                format!("chapter unlock {chapter_ref}"),
            )?)
        } else {
            None
        };
        self.store.settle_chapter_unlock(&spend, earn.as_ref()).await?;
        info!(reader = %reader_id, creator = %creator_id, kana = price, share = %split.creator_share, "chapter unlock settled");
        Ok(split)
    }

    /// Withdraw creator revenue in one currency: reserve the `Withdraw`
    /// entry (balance-checked under the revenue-log lock), then pay out.
    /// A payout failure posts an equal-and-opposite reversal so the balance
    /// is never decremented without a completed payout.
    pub async fn withdraw_revenue(
        &self,
        creator_id: Uuid,
        amount: Decimal,
        currency: Currency,
        account_ref: &str,
    ) -> Result<PayoutReceipt> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::Validation(
                "withdrawal amount must be positive".to_string(),
            )
            .into());
        }

        let withdrawal = RevenueTransaction::withdraw(
            creator_id,
            amount,
            currency,
            format!("payout to {account_ref}"),
        )?;
        self.store.reserve_withdrawal(&withdrawal).await?;

        match self.provider.payout(account_ref, amount, currency).await {
            Ok(receipt) => {
                info!(creator = %creator_id, %amount, %currency, payout = %receipt.id, "withdrawal paid out");
                Ok(receipt)
            }
            Err(e) => {
                warn!(creator = %creator_id, %amount, %currency, "payout failed, compensating withdrawal");
                let reversal = RevenueTransaction::refund(
                    creator_id,
                    amount,
                    currency,
                    format!("payout reversal for withdrawal {}", withdrawal.id),
                )?;
                self.store.post_revenue_transaction(&reversal).await?;
                Err(e)
            }
        }
    }

    // ============================================================
    // Derived balances
    // ============================================================

    pub async fn kana_balance_of(&self, user_id: Uuid, kana_type: KanaType) -> Result<i64> {
        let entries = self
            .store
            .list_ledger_entries(user_id, &LedgerFilter::default())
            .await?;
        Ok(kana_balance(&entries, kana_type))
    }

    pub async fn revenue_balance_of(&self, creator_id: Uuid, currency: Currency) -> Result<Decimal> {
        let transactions = self.store.list_revenue_transactions(creator_id).await?;
        Ok(revenue_balance(&transactions, currency))
    }
}
