//! Persistence seam and the file-backed store.
//!
//! One JSON document per aggregate, ledgers as per-user append files. The
//! settle methods are the serialization primitive the engine relies on: they
//! take an exclusive `fs2` lock on the order file, re-check the stored status
//! and only then apply effects, so two concurrent captures of the same order
//! can never both apply.

use async_trait::async_trait;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::ledger::{kana_balance, revenue_balance, LedgerEntry, LedgerFilter, RevenueTransaction};
use crate::order::{KanaGoldPack, PurchaseOrder, SubscriptionOrder};
use crate::subscription::{Subscription, SubscriptionStatus};
use crate::tier::Tier;
use crate::{Result, SettlementError};

/// Storage contract for settlement state.
///
/// Ledger postings are append-only by construction: there is no update or
/// delete surface for entries, only `post_*` and `list_*`.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    // Catalog
    async fn save_tier(&self, tier: &Tier) -> Result<()>;
    async fn get_tier(&self, id: Uuid) -> Result<Option<Tier>>;
    async fn save_pack(&self, pack: &KanaGoldPack) -> Result<()>;
    async fn get_pack(&self, id: Uuid) -> Result<Option<KanaGoldPack>>;

    // Subscriptions
    async fn save_subscription(&self, sub: &Subscription) -> Result<()>;
    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>>;
    async fn find_subscription_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<Subscription>>;
    /// A Pending/Active/Suspended subscription for `(user, series)`, if any;
    /// used to reject duplicate subscribes.
    async fn find_blocking_subscription(
        &self,
        user_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<Subscription>>;
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    // Orders. Inserts fail with `Conflict` on a duplicate provider id: the
    // id is the primary key, giving natural idempotency per external
    // transaction.
    async fn insert_purchase_order(&self, order: &PurchaseOrder) -> Result<()>;
    async fn get_purchase_order(&self, id: &str) -> Result<Option<PurchaseOrder>>;
    async fn insert_subscription_order(&self, order: &SubscriptionOrder) -> Result<()>;
    async fn get_subscription_order(&self, id: &str) -> Result<Option<SubscriptionOrder>>;

    // Ledgers
    async fn post_ledger_entry(&self, entry: &LedgerEntry) -> Result<()>;
    async fn list_ledger_entries(
        &self,
        user_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>>;
    async fn post_revenue_transaction(&self, tx: &RevenueTransaction) -> Result<()>;
    async fn list_revenue_transactions(&self, creator_id: Uuid)
        -> Result<Vec<RevenueTransaction>>;

    // Settlement units. Each returns `false` without applying anything when
    // the stored order is already terminal (a concurrent capture won), and
    // applies either all of its effects or none of them.
    async fn settle_purchase(
        &self,
        order: &PurchaseOrder,
        credit: Option<&LedgerEntry>,
    ) -> Result<bool>;
    async fn settle_subscription_order(
        &self,
        order: &SubscriptionOrder,
        subscription: Option<&Subscription>,
        revenue: Option<&RevenueTransaction>,
    ) -> Result<bool>;
    /// Post a reader's spend and the creator's earn as one unit. The balance
    /// check runs under the lock on the reader's ledger, so a concurrent
    /// unlock cannot also pass it; `InsufficientBalance` when the spend is
    /// not covered.
    async fn settle_chapter_unlock(
        &self,
        spend: &LedgerEntry,
        revenue: Option<&RevenueTransaction>,
    ) -> Result<()>;
    /// Append a withdrawal only if the creator's balance in the withdrawal's
    /// currency covers it, checked and applied under the lock on the
    /// creator's revenue log.
    async fn reserve_withdrawal(&self, withdrawal: &RevenueTransaction) -> Result<()>;
}

/// File-backed store: one JSON file per aggregate under `base_path`.
pub struct FileSettlementStore {
    base_path: PathBuf,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

impl FileSettlementStore {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        for dir in [
            "tiers",
            "packs",
            "subscriptions",
            "purchase_orders",
            "subscription_orders",
            "ledgers",
            "revenue",
        ] {
            std::fs::create_dir_all(base_path.join(dir))?;
        }
        Ok(Self { base_path })
    }

    fn tier_path(&self, id: Uuid) -> PathBuf {
        self.base_path.join("tiers").join(format!("{id}.json"))
    }

    fn pack_path(&self, id: Uuid) -> PathBuf {
        self.base_path.join("packs").join(format!("{id}.json"))
    }

    fn subscription_path(&self, id: Uuid) -> PathBuf {
        self.base_path
            .join("subscriptions")
            .join(format!("{id}.json"))
    }

    fn purchase_order_path(&self, id: &str) -> PathBuf {
        self.base_path
            .join("purchase_orders")
            .join(format!("{id}.json"))
    }

    fn subscription_order_path(&self, id: &str) -> PathBuf {
        self.base_path
            .join("subscription_orders")
            .join(format!("{id}.json"))
    }

    fn ledger_path(&self, user_id: Uuid) -> PathBuf {
        self.base_path.join("ledgers").join(format!("{user_id}.json"))
    }

    fn revenue_path(&self, creator_id: Uuid) -> PathBuf {
        self.base_path
            .join("revenue")
            .join(format!("{creator_id}.json"))
    }

    /// Create-new insert; an existing file means the provider id was already
    /// settled or is being settled by another request.
    fn insert_new<T: serde::Serialize>(&self, path: &Path, value: &T, id: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(json.as_bytes())?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(SettlementError::Conflict(
                format!("order {id} already exists"),
            )
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a record to a JSON-array file under an exclusive lock.
    fn append_locked<T>(&self, path: &Path, record: &T) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;

        let result = (|| -> Result<()> {
            let mut records: Vec<T> = if std::fs::metadata(path)?.len() > 0 {
                let json = std::fs::read_to_string(path)?;
                serde_json::from_str(&json)?
            } else {
                Vec::new()
            };
            records.push(record.clone());
            write_json(path, &records)
        })();

        file.unlock()?;
        result
    }

    /// Rewrite a JSON-array file under an exclusive lock, keeping only the
    /// records `keep` accepts. Compensation path for failed settle units.
    fn remove_record_locked<T>(&self, path: &Path, keep: impl Fn(&T) -> bool) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;

        let result = (|| -> Result<()> {
            let mut records: Vec<T> = if std::fs::metadata(path)?.len() > 0 {
                let json = std::fs::read_to_string(path)?;
                serde_json::from_str(&json)?
            } else {
                Vec::new()
            };
            records.retain(|r| keep(r));
            write_json(path, &records)
        })();

        file.unlock()?;
        result
    }

    fn read_list<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    fn scan_subscriptions(&self) -> Result<Vec<Subscription>> {
        let dir = self.base_path.join("subscriptions");
        let mut result = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let json = std::fs::read_to_string(&path)?;
            result.push(serde_json::from_str::<Subscription>(&json)?);
        }
        Ok(result)
    }
}

#[async_trait]
impl SettlementStore for FileSettlementStore {
    async fn save_tier(&self, tier: &Tier) -> Result<()> {
        write_json(&self.tier_path(tier.id), tier)
    }

    async fn get_tier(&self, id: Uuid) -> Result<Option<Tier>> {
        read_json(&self.tier_path(id))
    }

    async fn save_pack(&self, pack: &KanaGoldPack) -> Result<()> {
        write_json(&self.pack_path(pack.id), pack)
    }

    async fn get_pack(&self, id: Uuid) -> Result<Option<KanaGoldPack>> {
        read_json(&self.pack_path(id))
    }

    async fn save_subscription(&self, sub: &Subscription) -> Result<()> {
        write_json(&self.subscription_path(sub.id), sub)
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        read_json(&self.subscription_path(id))
    }

    async fn find_subscription_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<Subscription>> {
        Ok(self.scan_subscriptions()?.into_iter().find(|s| {
            s.provider_subscription_id.as_deref() == Some(provider_id)
        }))
    }

    async fn find_blocking_subscription(
        &self,
        user_id: Uuid,
        series_id: Uuid,
    ) -> Result<Option<Subscription>> {
        Ok(self.scan_subscriptions()?.into_iter().find(|s| {
            s.user_id == user_id
                && s.series_id == series_id
                && matches!(
                    s.status,
                    SubscriptionStatus::Pending
                        | SubscriptionStatus::Active
                        | SubscriptionStatus::Suspended
                )
        }))
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.scan_subscriptions()
    }

    async fn insert_purchase_order(&self, order: &PurchaseOrder) -> Result<()> {
        self.insert_new(&self.purchase_order_path(&order.id), order, &order.id)
    }

    async fn get_purchase_order(&self, id: &str) -> Result<Option<PurchaseOrder>> {
        read_json(&self.purchase_order_path(id))
    }

    async fn insert_subscription_order(&self, order: &SubscriptionOrder) -> Result<()> {
        self.insert_new(&self.subscription_order_path(&order.id), order, &order.id)
    }

    async fn get_subscription_order(&self, id: &str) -> Result<Option<SubscriptionOrder>> {
        read_json(&self.subscription_order_path(id))
    }

    async fn post_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        self.append_locked(&self.ledger_path(entry.user_id), entry)
    }

    async fn list_ledger_entries(
        &self,
        user_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self.read_list(&self.ledger_path(user_id))?;
        Ok(entries.into_iter().filter(|e| filter.matches(e)).collect())
    }

    async fn post_revenue_transaction(&self, tx: &RevenueTransaction) -> Result<()> {
        self.append_locked(&self.revenue_path(tx.creator_id), tx)
    }

    async fn list_revenue_transactions(
        &self,
        creator_id: Uuid,
    ) -> Result<Vec<RevenueTransaction>> {
        self.read_list(&self.revenue_path(creator_id))
    }

    async fn settle_purchase(
        &self,
        order: &PurchaseOrder,
        credit: Option<&LedgerEntry>,
    ) -> Result<bool> {
        let path = self.purchase_order_path(&order.id);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        file.lock_exclusive()?;

        // Effects first; the terminal order write is the commit point, so a
        // failure in between leaves the order retryable instead of settled
        // without its effects.
        let result = (|| -> Result<bool> {
            let json = std::fs::read_to_string(&path)?;
            let stored: PurchaseOrder = serde_json::from_str(&json)?;
            if stored.status.is_terminal() {
                return Ok(false);
            }
            if let Some(credit) = credit {
                self.append_locked(&self.ledger_path(credit.user_id), credit)?;
            }
            if let Err(e) = write_json(&path, order) {
                // The credit must not survive a failed commit.
                if let Some(credit) = credit {
                    self.remove_record_locked(
                        &self.ledger_path(credit.user_id),
                        |e: &LedgerEntry| e.id != credit.id,
                    )?;
                }
                return Err(e);
            }
            Ok(true)
        })();

        file.unlock()?;
        result
    }

    async fn settle_subscription_order(
        &self,
        order: &SubscriptionOrder,
        subscription: Option<&Subscription>,
        revenue: Option<&RevenueTransaction>,
    ) -> Result<bool> {
        let path = self.subscription_order_path(&order.id);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        file.lock_exclusive()?;

        // Same discipline: revenue and subscription first, order commit last,
        // with compensation in reverse on a failed step.
        let result = (|| -> Result<bool> {
            let json = std::fs::read_to_string(&path)?;
            let stored: SubscriptionOrder = serde_json::from_str(&json)?;
            if stored.status.is_terminal() {
                return Ok(false);
            }
            let prior_subscription: Option<Subscription> = match subscription {
                Some(sub) => read_json(&self.subscription_path(sub.id))?,
                None => None,
            };
            let undo_revenue = |store: &Self| -> Result<()> {
                if let Some(revenue) = revenue {
                    store.remove_record_locked(
                        &store.revenue_path(revenue.creator_id),
                        |tx: &RevenueTransaction| tx.id != revenue.id,
                    )?;
                }
                Ok(())
            };
            if let Some(revenue) = revenue {
                self.append_locked(&self.revenue_path(revenue.creator_id), revenue)?;
            }
            if let Some(sub) = subscription {
                if let Err(e) = write_json(&self.subscription_path(sub.id), sub) {
                    undo_revenue(self)?;
                    return Err(e);
                }
            }
            if let Err(e) = write_json(&path, order) {
                if let (Some(sub), Some(prior)) = (subscription, prior_subscription.as_ref()) {
                    write_json(&self.subscription_path(sub.id), prior)?;
                }
                undo_revenue(self)?;
                return Err(e);
            }
            Ok(true)
        })();

        file.unlock()?;
        result
    }

    async fn settle_chapter_unlock(
        &self,
        spend: &LedgerEntry,
        revenue: Option<&RevenueTransaction>,
    ) -> Result<()> {
        let ledger = self.ledger_path(spend.user_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&ledger)?;
        file.lock_exclusive()?;

        // The lock spans check and append: no other unlock can read the
        // balance between them.
        let result = (|| -> Result<()> {
            let mut entries: Vec<LedgerEntry> = if std::fs::metadata(&ledger)?.len() > 0 {
                let json = std::fs::read_to_string(&ledger)?;
                serde_json::from_str(&json)?
            } else {
                Vec::new()
            };
            let available = kana_balance(&entries, spend.kana_type);
            if available < spend.amount {
                return Err(SettlementError::InsufficientBalance {
                    requested: spend.amount.to_string(),
                    available: available.to_string(),
                }
                .into());
            }
            entries.push(spend.clone());
            write_json(&ledger, &entries)?;
            if let Some(revenue) = revenue {
                if let Err(e) =
                    self.append_locked(&self.revenue_path(revenue.creator_id), revenue)
                {
                    // Undo the spend: the reader is not debited unless the
                    // creator was credited.
                    entries.pop();
                    write_json(&ledger, &entries)?;
                    return Err(e);
                }
            }
            Ok(())
        })();

        file.unlock()?;
        result
    }

    async fn reserve_withdrawal(&self, withdrawal: &RevenueTransaction) -> Result<()> {
        let path = self.revenue_path(withdrawal.creator_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        let result = (|| -> Result<()> {
            let mut transactions: Vec<RevenueTransaction> =
                if std::fs::metadata(&path)?.len() > 0 {
                    let json = std::fs::read_to_string(&path)?;
                    serde_json::from_str(&json)?
                } else {
                    Vec::new()
                };
            let available = revenue_balance(&transactions, withdrawal.currency);
            if withdrawal.amount > available {
                return Err(SettlementError::InsufficientBalance {
                    requested: withdrawal.amount.to_string(),
                    available: available.to_string(),
                }
                .into());
            }
            transactions.push(withdrawal.clone());
            write_json(&path, &transactions)
        })();

        file.unlock()?;
        result
    }
}
