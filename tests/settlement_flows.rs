//! End-to-end settlement flows against the file store and the mock provider.

use std::sync::Arc;

use rust_decimal_macros::dec;
use tempfile::TempDir;
use uuid::Uuid;

use dashi_settlement::test_utils::{default_settings, monthly_tier, vnd, MockProvider};
use dashi_settlement::{
    CaptureOutcome, Currency, DomainEvent, EntryKind, FileSettlementStore, KanaType, LedgerEntry,
    LedgerFilter, ProviderOrderStatus, RevenueTransaction, SettlementEngine, SettlementError,
    Subscription, SubscriptionStatus,
};

struct Harness {
    engine: SettlementEngine,
    provider: Arc<MockProvider>,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSettlementStore::new(dir.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockProvider::new());
    let engine = SettlementEngine::new(store, provider.clone(), Arc::new(default_settings()));
    Harness {
        engine,
        provider,
        _dir: dir,
    }
}

async fn active_subscription(
    h: &Harness,
    user: Uuid,
    series: Uuid,
    tier_id: Uuid,
) -> Subscription {
    let pending = h
        .engine
        .subscribe(user, series, tier_id, "https://r", "https://c")
        .await
        .unwrap();
    h.engine
        .complete_subscription_creation(pending.subscription_id)
        .await
        .unwrap();
    h.engine
        .store()
        .get_subscription(pending.subscription_id)
        .await
        .unwrap()
        .unwrap()
}

fn capture_count(h: &Harness) -> u64 {
    h.provider
        .capture_calls
        .load(std::sync::atomic::Ordering::SeqCst)
}

// ============================================================
// Kana Gold purchases
// ============================================================

#[tokio::test]
async fn gold_pack_purchase_credits_balance_once() {
    let h = harness();
    let user = Uuid::new_v4();
    let pack = h.engine.create_pack(1000, vnd(dec!(10_000))).await.unwrap();

    let checkout = h.engine.purchase_gold_pack(user, pack.id).await.unwrap();
    assert!(checkout.approval_link.contains(&checkout.order_id));

    let outcome = h
        .engine
        .capture_purchase(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(outcome, CaptureOutcome::Completed);
    assert_eq!(
        h.engine.kana_balance_of(user, KanaType::Gold).await.unwrap(),
        1000
    );

    let entries = h
        .engine
        .store()
        .list_ledger_entries(user, &LedgerFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Earn);
}

#[tokio::test]
async fn repeated_capture_does_not_double_credit() {
    let h = harness();
    let user = Uuid::new_v4();
    let pack = h.engine.create_pack(1000, vnd(dec!(10_000))).await.unwrap();
    let checkout = h.engine.purchase_gold_pack(user, pack.id).await.unwrap();

    for _ in 0..3 {
        let outcome = h
            .engine
            .capture_purchase(user, &checkout.order_id)
            .await
            .unwrap();
        assert_eq!(outcome, CaptureOutcome::Completed);
    }

    assert_eq!(
        h.engine.kana_balance_of(user, KanaType::Gold).await.unwrap(),
        1000
    );
    // Terminal orders short-circuit before the provider is called again.
    assert_eq!(capture_count(&h), 1);
}

#[tokio::test]
async fn voided_capture_posts_nothing() {
    let h = harness();
    let user = Uuid::new_v4();
    let pack = h.engine.create_pack(500, vnd(dec!(10_000))).await.unwrap();
    let checkout = h.engine.purchase_gold_pack(user, pack.id).await.unwrap();
    h.provider
        .script_capture(&checkout.order_id, ProviderOrderStatus::Voided);

    let outcome = h
        .engine
        .capture_purchase(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(outcome, CaptureOutcome::Voided);
    assert_eq!(
        h.engine.kana_balance_of(user, KanaType::Gold).await.unwrap(),
        0
    );

    // The void is terminal too.
    let again = h
        .engine
        .capture_purchase(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(again, CaptureOutcome::Voided);
    assert_eq!(capture_count(&h), 1);
}

#[tokio::test]
async fn pending_capture_leaves_order_retryable() {
    let h = harness();
    let user = Uuid::new_v4();
    let pack = h.engine.create_pack(1000, vnd(dec!(10_000))).await.unwrap();
    let checkout = h.engine.purchase_gold_pack(user, pack.id).await.unwrap();
    h.provider
        .script_capture(&checkout.order_id, ProviderOrderStatus::Pending);

    let outcome = h
        .engine
        .capture_purchase(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(outcome, CaptureOutcome::Pending);
    assert_eq!(
        h.engine.kana_balance_of(user, KanaType::Gold).await.unwrap(),
        0
    );

    // Once the provider reaches a terminal state, the retry settles.
    h.provider
        .script_capture(&checkout.order_id, ProviderOrderStatus::Completed);
    let outcome = h
        .engine
        .capture_purchase(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(outcome, CaptureOutcome::Completed);
    assert_eq!(
        h.engine.kana_balance_of(user, KanaType::Gold).await.unwrap(),
        1000
    );
    assert_eq!(capture_count(&h), 2);
}

#[tokio::test]
async fn capture_requires_ownership() {
    let h = harness();
    let owner = Uuid::new_v4();
    let pack = h.engine.create_pack(1000, vnd(dec!(10_000))).await.unwrap();
    let checkout = h.engine.purchase_gold_pack(owner, pack.id).await.unwrap();

    let err = h
        .engine
        .capture_purchase(Uuid::new_v4(), &checkout.order_id)
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::Forbidden(_)));
    assert_eq!(capture_count(&h), 0);
}

#[tokio::test]
async fn inactive_pack_cannot_be_purchased() {
    let h = harness();
    let pack = h.engine.create_pack(1000, vnd(dec!(10_000))).await.unwrap();
    h.engine.set_pack_status(pack.id, false).await.unwrap();

    let err = h
        .engine
        .purchase_gold_pack(Uuid::new_v4(), pack.id)
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::Validation(_)));
}

// ============================================================
// Subscription lifecycle
// ============================================================

#[tokio::test]
async fn subscribe_activates_with_billing_date() {
    let h = harness();
    let (user, series, creator) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let tier = monthly_tier(series, creator, dec!(50_000));
    h.engine.store().save_tier(&tier).await.unwrap();

    let sub = active_subscription(&h, user, series, tier.id).await;
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert!(sub.next_billing_date.is_some());
    assert!(sub.provider_subscription_id.is_some());

    // One live subscription per (user, series).
    let err = h
        .engine
        .subscribe(user, series, tier.id, "https://r", "https://c")
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::Conflict(_)));
}

#[tokio::test]
async fn upgrade_charges_difference_and_credits_creator() {
    let h = harness();
    let (user, series, creator) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let basic = monthly_tier(series, creator, dec!(50_000));
    let premium = monthly_tier(series, creator, dec!(80_000));
    h.engine.store().save_tier(&basic).await.unwrap();
    h.engine.store().save_tier(&premium).await.unwrap();

    let sub = active_subscription(&h, user, series, basic.id).await;

    let checkout = h
        .engine
        .upgrade_tier(user, sub.id, premium.id)
        .await
        .unwrap();
    let order = h
        .engine
        .store()
        .get_subscription_order(&checkout.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.price.amount(), dec!(30_000));
    assert_eq!(order.upgrade_tier_id, Some(premium.id));

    let outcome = h
        .engine
        .capture_subscription_order(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(outcome.value, CaptureOutcome::Completed);
    assert!(outcome.events.iter().any(|e| matches!(
        e,
        DomainEvent::SubscriptionTierChanged { tier_id, .. } if *tier_id == premium.id
    )));

    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.tier_id, premium.id);

    // 30,000 gross at 30% commission: 21,000 to the creator.
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(21_000)
    );

    // Re-delivery returns the stored result and raises no further events.
    let again = h
        .engine
        .capture_subscription_order(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(again.value, CaptureOutcome::Completed);
    assert!(again.events.is_empty());
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(21_000)
    );
}

#[tokio::test]
async fn failed_plan_revision_aborts_upgrade() {
    let h = harness();
    let (user, series, creator) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let basic = monthly_tier(series, creator, dec!(50_000));
    let premium = monthly_tier(series, creator, dec!(80_000));
    h.engine.store().save_tier(&basic).await.unwrap();
    h.engine.store().save_tier(&premium).await.unwrap();
    let sub = active_subscription(&h, user, series, basic.id).await;

    let checkout = h
        .engine
        .upgrade_tier(user, sub.id, premium.id)
        .await
        .unwrap();
    h.provider.fail_revisions(true);

    assert!(h
        .engine
        .capture_subscription_order(user, &checkout.order_id)
        .await
        .is_err());

    // Nothing settled: the order stays pending and the tier is unchanged.
    let order = h
        .engine
        .store()
        .get_subscription_order(&checkout.order_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!order.status.is_terminal());
    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.tier_id, basic.id);
    assert_eq!(h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(), dec!(0));

    // A later retry settles normally.
    h.provider.fail_revisions(false);
    let outcome = h
        .engine
        .capture_subscription_order(user, &checkout.order_id)
        .await
        .unwrap();
    assert_eq!(outcome.value, CaptureOutcome::Completed);
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(21_000)
    );
}

#[tokio::test]
async fn downgrade_swaps_tier_without_an_order() {
    let h = harness();
    let (user, series, creator) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let basic = monthly_tier(series, creator, dec!(50_000));
    let premium = monthly_tier(series, creator, dec!(80_000));
    h.engine.store().save_tier(&basic).await.unwrap();
    h.engine.store().save_tier(&premium).await.unwrap();
    let sub = active_subscription(&h, user, series, premium.id).await;

    let outcome = h.engine.downgrade_tier(user, sub.id, basic.id).await.unwrap();
    assert!(outcome.events.iter().any(|e| matches!(
        e,
        DomainEvent::SubscriptionTierChanged { tier_id, .. } if *tier_id == basic.id
    )));

    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.tier_id, basic.id);
    // No charge, no credit: the partial-period difference is forfeited.
    assert_eq!(h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(), dec!(0));

    // A pricier target is not a downgrade.
    let err = h
        .engine
        .downgrade_tier(user, sub.id, premium.id)
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::Validation(_)));
}

#[tokio::test]
async fn unsubscribe_keeps_entitlement_until_period_end() {
    let h = harness();
    let (user, series, creator) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let tier = monthly_tier(series, creator, dec!(50_000));
    h.engine.store().save_tier(&tier).await.unwrap();
    let sub = active_subscription(&h, user, series, tier.id).await;
    let period_end = sub.next_billing_date.unwrap();

    h.engine.unsubscribe(user, sub.id, "done reading").await.unwrap();
    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Cancelled);
    assert!(stored.is_entitled(period_end - 1));
    assert!(!stored.is_entitled(period_end));

    // The sweep moves it to the terminal state once the period lapses.
    assert_eq!(h.engine.expire_lapsed(period_end - 1).await.unwrap(), 0);
    assert_eq!(h.engine.expire_lapsed(period_end).await.unwrap(), 1);
    let expired = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.status, SubscriptionStatus::Expired);

    // Terminal: no reactivation path, only a fresh subscribe.
    let err = h
        .engine
        .unsubscribe(user, sub.id, "again")
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::Conflict(_)));
    let renewed = active_subscription(&h, user, series, tier.id).await;
    assert_eq!(renewed.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn refused_provider_cancellation_keeps_subscription_active() {
    let h = harness();
    let (user, series, creator) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let tier = monthly_tier(series, creator, dec!(50_000));
    h.engine.store().save_tier(&tier).await.unwrap();
    let sub = active_subscription(&h, user, series, tier.id).await;

    h.provider.refuse_cancellations(true);
    let err = h.engine.unsubscribe(user, sub.id, "bye").await.unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::Provider(_)));

    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn provider_webhooks_mirror_status_idempotently() {
    let h = harness();
    let (user, series, creator) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let tier = monthly_tier(series, creator, dec!(50_000));
    h.engine.store().save_tier(&tier).await.unwrap();
    let sub = active_subscription(&h, user, series, tier.id).await;
    let provider_id = sub.provider_subscription_id.clone().unwrap();

    h.engine.on_provider_suspended(&provider_id).await.unwrap();
    // Repeat delivery is a no-op, not a conflict.
    h.engine.on_provider_suspended(&provider_id).await.unwrap();
    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Suspended);

    h.engine.on_provider_reactivated(&provider_id).await.unwrap();
    h.engine.on_provider_reactivated(&provider_id).await.unwrap();
    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Active);

    h.engine.on_provider_cancelled(&provider_id).await.unwrap();
    h.engine.on_provider_cancelled(&provider_id).await.unwrap();
    let stored = h
        .engine
        .store()
        .get_subscription(sub.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Cancelled);
}

// ============================================================
// Revenue settlement
// ============================================================

#[tokio::test]
async fn chapter_unlock_splits_kana_revenue() {
    let h = harness();
    let (reader, creator) = (Uuid::new_v4(), Uuid::new_v4());
    h.engine
        .store()
        .post_ledger_entry(&LedgerEntry::earn(reader, 100, KanaType::Coin, "promo").unwrap())
        .await
        .unwrap();

    // 100 Kana at 10 VND/unit, 30% commission: 700 VND to the creator.
    let split = h
        .engine
        .unlock_chapter(reader, creator, 100, KanaType::Coin, "ch-12")
        .await
        .unwrap();
    assert_eq!(split.gross, dec!(1000));
    assert_eq!(split.creator_share, dec!(700));
    assert_eq!(split.platform_share, dec!(300));

    assert_eq!(
        h.engine.kana_balance_of(reader, KanaType::Coin).await.unwrap(),
        0
    );
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(700)
    );
    let transactions = h
        .engine
        .store()
        .list_revenue_transactions(creator)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);

    // Balance is spent; a second unlock fails without touching the ledgers.
    let err = h
        .engine
        .unlock_chapter(reader, creator, 100, KanaType::Coin, "ch-13")
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::InsufficientBalance { .. }));
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(700)
    );
}

#[tokio::test]
async fn unlock_respects_kana_type_balances() {
    let h = harness();
    let (reader, creator) = (Uuid::new_v4(), Uuid::new_v4());
    h.engine
        .store()
        .post_ledger_entry(&LedgerEntry::earn(reader, 500, KanaType::Gold, "pack").unwrap())
        .await
        .unwrap();

    // Gold does not cover a Coin-priced unlock.
    let err = h
        .engine
        .unlock_chapter(reader, creator, 100, KanaType::Coin, "ch-1")
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::InsufficientBalance { .. }));

    h.engine
        .unlock_chapter(reader, creator, 100, KanaType::Gold, "ch-1")
        .await
        .unwrap();
    assert_eq!(
        h.engine.kana_balance_of(reader, KanaType::Gold).await.unwrap(),
        400
    );
}

#[tokio::test]
async fn withdrawal_pays_out_and_compensates_on_failure() {
    let h = harness();
    let creator = Uuid::new_v4();
    h.engine
        .store()
        .post_revenue_transaction(
            &RevenueTransaction::earn(
                creator,
                dec!(50_000),
                Currency::Vnd,
                "subscription revenue",
            )
            .unwrap(),
        )
        .await
        .unwrap();

    // Failed payout: the withdrawal is reversed, the balance is intact.
    h.provider.fail_payouts(true);
    let err = h
        .engine
        .withdraw_revenue(creator, dec!(20_000), Currency::Vnd, "bank-1")
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::Provider(_)));
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(50_000)
    );
    // The audit trail keeps both legs: withdraw and its reversal.
    let transactions = h
        .engine
        .store()
        .list_revenue_transactions(creator)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 3);

    // Successful payout decrements the balance.
    h.provider.fail_payouts(false);
    let receipt = h
        .engine
        .withdraw_revenue(creator, dec!(20_000), Currency::Vnd, "bank-1")
        .await
        .unwrap();
    assert!(!receipt.id.is_empty());
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(30_000)
    );

    // Balance is a hard limit.
    let err = h
        .engine
        .withdraw_revenue(creator, dec!(30_001), Currency::Vnd, "bank-1")
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::InsufficientBalance { .. }));
}

#[tokio::test]
async fn withdrawals_are_segregated_by_currency() {
    let h = harness();
    let creator = Uuid::new_v4();
    h.engine
        .store()
        .post_revenue_transaction(
            &RevenueTransaction::earn(creator, dec!(50_000), Currency::Vnd, "dashifan").unwrap(),
        )
        .await
        .unwrap();
    h.engine
        .store()
        .post_revenue_transaction(
            &RevenueTransaction::earn(creator, dec!(100), Currency::Usd, "dashifan").unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(50_000)
    );
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Usd).await.unwrap(),
        dec!(100)
    );

    // The USD earnings do not fund a VND withdrawal beyond the VND balance.
    let err = h
        .engine
        .withdraw_revenue(creator, dec!(60_000), Currency::Vnd, "bank-1")
        .await
        .unwrap_err();
    let err = err.downcast::<SettlementError>().unwrap();
    assert!(matches!(err, SettlementError::InsufficientBalance { .. }));

    h.engine
        .withdraw_revenue(creator, dec!(100), Currency::Usd, "bank-1")
        .await
        .unwrap();
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Usd).await.unwrap(),
        dec!(0)
    );
    assert_eq!(
        h.engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(50_000)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unlocks_cannot_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSettlementStore::new(dir.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockProvider::new());
    let engine = Arc::new(SettlementEngine::new(
        store,
        provider,
        Arc::new(default_settings()),
    ));
    let (reader, creator) = (Uuid::new_v4(), Uuid::new_v4());
    engine
        .store()
        .post_ledger_entry(&LedgerEntry::earn(reader, 100, KanaType::Gold, "pack").unwrap())
        .await
        .unwrap();

    // Two full-balance unlocks race; only one may settle.
    let mut handles = Vec::new();
    for i in 0..2 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .unlock_chapter(reader, creator, 100, KanaType::Gold, &format!("ch-{i}"))
                .await
        }));
    }
    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 1);

    assert_eq!(
        engine.kana_balance_of(reader, KanaType::Gold).await.unwrap(),
        0
    );
    // Exactly one unlock's share was credited.
    assert_eq!(
        engine.revenue_balance_of(creator, Currency::Vnd).await.unwrap(),
        dec!(700)
    );
}
