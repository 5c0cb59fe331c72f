//! Coin ledger: the only writer of balances.
//!
//! Every balance change goes through a store unit that appends the matching
//! ledger entry in the same write, so `balance == earned - spent` holds for
//! every identity at all times.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::{
    Achievement, AchievementAward, AchievementGrant, Category, CoinTransaction, Credit, Debit,
    DebitReceipt, LedgerTotals, OwnerRef,
};
use crate::database::{SharedStore, StoreError};
use crate::types::{Page, Pagination};

/// Outcome of a daily category bonus attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyBonus {
    Awarded(i64),
    AlreadyAwarded,
    /// The configured bonus is zero.
    Disabled,
}

impl DailyBonus {
    pub fn amount(&self) -> i64 {
        match self {
            DailyBonus::Awarded(amount) => *amount,
            DailyBonus::AlreadyAwarded | DailyBonus::Disabled => 0,
        }
    }

    pub fn already_awarded_today(&self) -> bool {
        matches!(self, DailyBonus::AlreadyAwarded)
    }
}

#[derive(Clone)]
pub struct CoinLedger {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    daily_bonus_coins: i64,
}

impl CoinLedger {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, daily_bonus_coins: i64) -> Self {
        Self {
            store,
            clock,
            daily_bonus_coins,
        }
    }

    /// Pay the fixed bonus for `category` at most once per identity per UTC day.
    pub async fn award_daily_category_bonus(
        &self,
        owner: &OwnerRef,
        category: Category,
        performed_by: Uuid,
    ) -> Result<DailyBonus, StoreError> {
        if self.daily_bonus_coins <= 0 {
            return Ok(DailyBonus::Disabled);
        }

        let now = self.clock.now();
        let credit = Credit {
            owner: owner.clone(),
            performed_by_parent_id: Some(performed_by),
            amount: self.daily_bonus_coins,
            reason: category.coin_reason().to_string(),
            category: Some(category),
            bonus_day: Some(now.date_naive()),
            occurred_at: now,
        };

        match self.store.credit(&credit).await? {
            Some(entry) => {
                info!("Awarded {} coins to {} for {}", entry.amount, owner, category);
                Ok(DailyBonus::Awarded(entry.amount))
            }
            None => {
                debug!("Daily {} bonus already paid to {}", category, owner);
                Ok(DailyBonus::AlreadyAwarded)
            }
        }
    }

    /// Record the award fact and pay its reward in one unit. `None` if already held.
    pub async fn award_achievement(
        &self,
        owner: &OwnerRef,
        achievement: &Achievement,
        performed_by: Option<Uuid>,
    ) -> Result<Option<AchievementAward>, StoreError> {
        let grant = AchievementGrant {
            owner: owner.clone(),
            achievement_id: achievement.id,
            reward_coins: achievement.reward_coins.max(0),
            reason: format!("Achievement unlocked: {}", achievement.title),
            performed_by_parent_id: performed_by,
            awarded_at: self.clock.now(),
        };
        self.store.grant_achievement(&grant).await
    }

    /// Spend coins. The balance is re-checked inside the store unit.
    pub async fn spend(
        &self,
        owner: &OwnerRef,
        amount: i64,
        reason: impl Into<String>,
        performed_by: Option<Uuid>,
        badge_id: Option<Uuid>,
    ) -> Result<DebitReceipt, StoreError> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let debit = Debit {
            owner: owner.clone(),
            performed_by_parent_id: performed_by,
            amount,
            reason: reason.into(),
            badge_id,
            occurred_at: self.clock.now(),
        };
        let receipt = self.store.debit(&debit).await?;
        info!(
            "Spent {} coins for {}: {} (balance {})",
            receipt.entry.amount, owner, receipt.entry.reason, receipt.balance
        );
        Ok(receipt)
    }

    pub async fn totals(&self, owner: &OwnerRef) -> Result<LedgerTotals, StoreError> {
        self.store.totals(owner).await
    }

    pub async fn transactions(
        &self,
        owner: &OwnerRef,
        pagination: Pagination,
    ) -> Result<Page<CoinTransaction>, StoreError> {
        self.store
            .list_transactions(owner, pagination.normalized())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::models::{CategoryFilter, CriteriaKind, NewParent};
    use crate::database::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    async fn setup() -> (CoinLedger, ManualClock, OwnerRef) {
        setup_with_bonus(10).await
    }

    async fn setup_with_bonus(daily_bonus_coins: i64) -> (CoinLedger, ManualClock, OwnerRef) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
        let parent = store
            .create_parent(
                &NewParent {
                    first_name: "Ngozi".into(),
                    last_name: "Eze".into(),
                    email: "ngozi@example.com".into(),
                    avatar_url: None,
                },
                clock.now(),
            )
            .await
            .unwrap();
        let ledger = CoinLedger::new(store, Arc::new(clock.clone()), daily_bonus_coins);
        (ledger, clock, OwnerRef::parent(parent.id))
    }

    #[tokio::test]
    async fn daily_bonus_is_idempotent_within_a_utc_day() {
        let (ledger, clock, owner) = setup().await;
        let by = owner.parent_id();

        let first = ledger
            .award_daily_category_bonus(&owner, Category::Hydration, by)
            .await
            .unwrap();
        assert_eq!(first, DailyBonus::Awarded(10));

        clock.advance(Duration::hours(9));
        let second = ledger
            .award_daily_category_bonus(&owner, Category::Hydration, by)
            .await
            .unwrap();
        assert_eq!(second, DailyBonus::AlreadyAwarded);
        assert!(second.already_awarded_today());

        // Other categories have their own key
        let mood = ledger
            .award_daily_category_bonus(&owner, Category::Mood, by)
            .await
            .unwrap();
        assert_eq!(mood.amount(), 10);

        let totals = ledger.totals(&owner).await.unwrap();
        assert_eq!(totals.balance, 20);
        assert!(totals.is_consistent());
    }

    #[tokio::test]
    async fn bonus_is_paid_again_after_midnight_utc() {
        let (ledger, clock, owner) = setup().await;
        let by = owner.parent_id();
        ledger
            .award_daily_category_bonus(&owner, Category::Pain, by)
            .await
            .unwrap();

        clock.set(Utc.with_ymd_and_hms(2024, 6, 4, 0, 1, 0).unwrap());
        let next_day = ledger
            .award_daily_category_bonus(&owner, Category::Pain, by)
            .await
            .unwrap();
        assert_eq!(next_day, DailyBonus::Awarded(10));
        assert_eq!(ledger.totals(&owner).await.unwrap().balance, 20);
    }

    #[tokio::test]
    async fn spend_guards_the_balance() {
        let (ledger, _clock, owner) = setup().await;
        ledger
            .award_daily_category_bonus(&owner, Category::Pain, owner.parent_id())
            .await
            .unwrap();

        let err = ledger.spend(&owner, 25, "Redeemed: Star", None, None).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientBalance { balance: 10, requested: 25 }));

        let err = ledger.spend(&owner, 0, "nothing", None, None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidAmount(0)));

        let receipt = ledger.spend(&owner, 4, "Redeemed: Sticker", None, None).await.unwrap();
        assert_eq!(receipt.entry.signed_amount(), -4);
        assert_eq!(receipt.balance, 6);

        let totals = ledger.totals(&owner).await.unwrap();
        assert_eq!(totals, LedgerTotals { balance: 6, earned: 10, spent: 4 });
    }

    #[tokio::test]
    async fn achievement_reward_is_paid_once() {
        let (ledger, _clock, owner) = setup().await;
        let achievement = Achievement {
            id: Uuid::new_v4(),
            title: "Pain Tracker".into(),
            description: "Log pain five times".into(),
            icon: "🩹".into(),
            criteria_kind: CriteriaKind::TotalLogs,
            criteria_value: 5,
            category_filter: CategoryFilter::Pain,
            reward_coins: 50,
            active: true,
        };

        assert!(ledger.award_achievement(&owner, &achievement, None).await.unwrap().is_some());
        assert!(ledger.award_achievement(&owner, &achievement, None).await.unwrap().is_none());

        let page = ledger.transactions(&owner, Pagination::default()).await.unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].reason, "Achievement unlocked: Pain Tracker");
        assert_eq!(page.data[0].achievement_id, Some(achievement.id));
        assert_eq!(ledger.totals(&owner).await.unwrap().balance, 50);
    }

    #[tokio::test]
    async fn zero_bonus_is_disabled_not_already_awarded() {
        let (ledger, _clock, owner) = setup_with_bonus(0).await;
        let bonus = ledger
            .award_daily_category_bonus(&owner, Category::Mood, owner.parent_id())
            .await
            .unwrap();
        assert_eq!(bonus, DailyBonus::Disabled);
        assert!(!bonus.already_awarded_today());
        assert_eq!(bonus.amount(), 0);
        assert_eq!(ledger.transactions(&owner, Pagination::default()).await.unwrap().meta.total, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bonus_claims_credit_once() {
        let (ledger, _clock, owner) = setup().await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                let owner = owner.clone();
                tokio::spawn(async move {
                    ledger
                        .award_daily_category_bonus(&owner, Category::Hydration, owner.parent_id())
                        .await
                })
            })
            .collect();

        let mut awarded = 0;
        for handle in handles {
            if let DailyBonus::Awarded(_) = handle.await.unwrap().unwrap() {
                awarded += 1;
            }
        }
        assert_eq!(awarded, 1);

        let totals = ledger.totals(&owner).await.unwrap();
        assert_eq!(totals.balance, 10);
        assert!(totals.is_consistent());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_spends_cannot_overdraw() {
        let (ledger, _clock, owner) = setup().await;
        for category in [Category::Pain, Category::Mood, Category::Hydration] {
            ledger
                .award_daily_category_bonus(&owner, category, owner.parent_id())
                .await
                .unwrap();
        }

        let spend = |reason: &'static str| {
            let ledger = ledger.clone();
            let owner = owner.clone();
            tokio::spawn(async move { ledger.spend(&owner, 20, reason, None, None).await })
        };
        let (first, second) = tokio::join!(spend("Redeemed: Kite"), spend("Redeemed: Yo-yo"));
        let results = [first.unwrap(), second.unwrap()];

        let succeeded: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(succeeded.len(), 1);
        assert_eq!(succeeded[0].balance, 10);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(StoreError::InsufficientBalance { balance: 10, requested: 20 })
        )));

        let totals = ledger.totals(&owner).await.unwrap();
        assert_eq!(totals, LedgerTotals { balance: 10, earned: 30, spent: 20 });
        assert!(totals.is_consistent());
    }
}
