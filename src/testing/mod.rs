use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::{Clock, ManualClock};
use crate::config::RewardsConfig;
use crate::database::models::{
    Achievement, AchievementAward, AchievementGrant, Badge, Category, CategoryFilter, ChildProfile,
    CoinTransaction, Credit, Debit, DebitReceipt, Household, LedgerTotals, LogDetails, LogQuery,
    LogRecord, MedicationSchedule, NewChild, NewParent, OwnerRef, ParentAccount, RedeemedBadge,
    ScheduleDetails,
};
use crate::database::{
    AchievementStore, BadgeStore, LedgerStore, LogStore, MemoryStore, ProfileStore, ScheduleStore,
    SharedStore, Store, StoreError,
};
use crate::services::Services;
use crate::types::{Page, Pagination};

/// Services over a fresh in-memory store and a manual clock
pub struct TestContext {
    pub memory: MemoryStore,
    pub store: SharedStore,
    pub clock: ManualClock,
    pub services: Services,
}

impl TestContext {
    /// Clock starts at 2024-06-03 09:00 UTC
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        let memory = MemoryStore::new();
        let store: SharedStore = Arc::new(memory.clone());
        Self::build(memory, store, start)
    }

    /// Services over a store whose ledger and log queries can be made to fail
    pub fn with_faults() -> (Self, FaultyStore) {
        let faults = FaultyStore::new(MemoryStore::new());
        let store: SharedStore = Arc::new(faults.clone());
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        (Self::build(faults.inner.clone(), store, start), faults)
    }

    fn build(memory: MemoryStore, store: SharedStore, start: DateTime<Utc>) -> Self {
        let clock = ManualClock::new(start);
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let services = Services::new(store.clone(), shared_clock, &RewardsConfig::default());
        Self {
            memory,
            store,
            clock,
            services,
        }
    }

    /// Create a parent account with a unique email
    pub async fn create_parent(&self, first_name: &str) -> ParentAccount {
        self.store
            .create_parent(
                &NewParent {
                    first_name: first_name.to_string(),
                    last_name: "Tester".to_string(),
                    email: format!("{}-{}@example.com", first_name.to_lowercase(), Uuid::new_v4()),
                    avatar_url: None,
                },
                self.clock.now(),
            )
            .await
            .expect("create parent")
    }

    /// Add a child through the profile service and return its stored row
    pub async fn create_child(&self, parent_id: Uuid, name: &str) -> ChildProfile {
        let summary = self
            .services
            .profiles
            .create_child(
                parent_id,
                NewChild {
                    name: name.to_string(),
                    date_of_birth: None,
                    health_notes: None,
                    avatar_url: None,
                },
            )
            .await
            .expect("create child");

        let household = self
            .store
            .load_household(parent_id)
            .await
            .expect("load household")
            .expect("household exists");
        household
            .children
            .into_iter()
            .find(|c| c.child_id == summary.id)
            .expect("child was stored")
    }

    pub async fn balance(&self, owner: &OwnerRef) -> i64 {
        self.store.totals(owner).await.expect("totals").balance
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn injected() -> StoreError {
    StoreError::Sqlx(sqlx::Error::PoolTimedOut)
}

/// `MemoryStore` wrapper that fails selected calls on demand
#[derive(Clone)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_credit: Arc<AtomicBool>,
    fail_grant: Arc<AtomicBool>,
    count_logs_left: Arc<AtomicI64>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_credit: Arc::new(AtomicBool::new(false)),
            fail_grant: Arc::new(AtomicBool::new(false)),
            count_logs_left: Arc::new(AtomicI64::new(i64::MAX)),
        }
    }

    pub fn fail_credits(&self, fail: bool) {
        self.fail_credit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_grants(&self, fail: bool) {
        self.fail_grant.store(fail, Ordering::SeqCst);
    }

    /// Let `calls` more `count_logs` calls through, then fail every later one
    pub fn fail_count_logs_after(&self, calls: i64) {
        self.count_logs_left.store(calls, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_credits(false);
        self.fail_grants(false);
        self.fail_count_logs_after(i64::MAX);
    }
}

#[async_trait]
impl ProfileStore for FaultyStore {
    async fn create_parent(
        &self,
        parent: &NewParent,
        created_at: DateTime<Utc>,
    ) -> Result<ParentAccount, StoreError> {
        self.inner.create_parent(parent, created_at).await
    }

    async fn load_household(&self, parent_id: Uuid) -> Result<Option<Household>, StoreError> {
        self.inner.load_household(parent_id).await
    }

    async fn set_active_child(
        &self,
        parent_id: Uuid,
        child_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.inner.set_active_child(parent_id, child_id).await
    }

    async fn clear_stale_active_child(
        &self,
        parent_id: Uuid,
        stale_child_id: &str,
    ) -> Result<(), StoreError> {
        self.inner.clear_stale_active_child(parent_id, stale_child_id).await
    }

    async fn insert_child(&self, child: &ChildProfile) -> Result<(), StoreError> {
        self.inner.insert_child(child).await
    }

    async fn delete_child(&self, parent_id: Uuid, child_id: &str) -> Result<bool, StoreError> {
        self.inner.delete_child(parent_id, child_id).await
    }
}

#[async_trait]
impl LogStore for FaultyStore {
    async fn insert_log(&self, log: &LogRecord) -> Result<(), StoreError> {
        self.inner.insert_log(log).await
    }

    async fn list_logs(
        &self,
        owner: &OwnerRef,
        category: Category,
        query: &LogQuery,
        pagination: Pagination,
    ) -> Result<Page<LogRecord>, StoreError> {
        self.inner.list_logs(owner, category, query, pagination).await
    }

    async fn update_log(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        occurred_at: Option<DateTime<Utc>>,
        details: &LogDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<LogRecord>, StoreError> {
        self.inner
            .update_log(owner, id, occurred_at, details, updated_at)
            .await
    }

    async fn delete_log(
        &self,
        owner: &OwnerRef,
        category: Category,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        self.inner.delete_log(owner, category, id).await
    }

    async fn count_logs(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        if self.count_logs_left.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return Err(injected());
        }
        self.inner.count_logs(owner, filter, since).await
    }

    async fn active_days(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, StoreError> {
        self.inner.active_days(owner, filter, from, to).await
    }
}

#[async_trait]
impl ScheduleStore for FaultyStore {
    async fn insert_schedule(&self, schedule: &MedicationSchedule) -> Result<(), StoreError> {
        self.inner.insert_schedule(schedule).await
    }

    async fn list_schedules(&self, owner: &OwnerRef) -> Result<Vec<MedicationSchedule>, StoreError> {
        self.inner.list_schedules(owner).await
    }

    async fn find_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
    ) -> Result<Option<MedicationSchedule>, StoreError> {
        self.inner.find_schedule(owner, id).await
    }

    async fn update_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        details: &ScheduleDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<MedicationSchedule>, StoreError> {
        self.inner.update_schedule(owner, id, details, updated_at).await
    }

    async fn delete_schedule(&self, owner: &OwnerRef, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_schedule(owner, id).await
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn credit(&self, credit: &Credit) -> Result<Option<CoinTransaction>, StoreError> {
        if self.fail_credit.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.credit(credit).await
    }

    async fn debit(&self, debit: &Debit) -> Result<DebitReceipt, StoreError> {
        self.inner.debit(debit).await
    }

    async fn grant_achievement(
        &self,
        grant: &AchievementGrant,
    ) -> Result<Option<AchievementAward>, StoreError> {
        if self.fail_grant.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.grant_achievement(grant).await
    }

    async fn list_transactions(
        &self,
        owner: &OwnerRef,
        pagination: Pagination,
    ) -> Result<Page<CoinTransaction>, StoreError> {
        self.inner.list_transactions(owner, pagination).await
    }

    async fn totals(&self, owner: &OwnerRef) -> Result<LedgerTotals, StoreError> {
        self.inner.totals(owner).await
    }
}

#[async_trait]
impl AchievementStore for FaultyStore {
    async fn insert_achievement(&self, achievement: &Achievement) -> Result<(), StoreError> {
        self.inner.insert_achievement(achievement).await
    }

    async fn active_achievements(&self) -> Result<Vec<Achievement>, StoreError> {
        self.inner.active_achievements().await
    }

    async fn pending_achievements(&self, owner: &OwnerRef) -> Result<Vec<Achievement>, StoreError> {
        self.inner.pending_achievements(owner).await
    }

    async fn awards_for(&self, owner: &OwnerRef) -> Result<Vec<AchievementAward>, StoreError> {
        self.inner.awards_for(owner).await
    }
}

#[async_trait]
impl BadgeStore for FaultyStore {
    async fn insert_badge(&self, badge: &Badge) -> Result<(), StoreError> {
        self.inner.insert_badge(badge).await
    }

    async fn active_badges(&self) -> Result<Vec<Badge>, StoreError> {
        self.inner.active_badges().await
    }

    async fn find_active_badge(&self, id: Uuid) -> Result<Option<Badge>, StoreError> {
        self.inner.find_active_badge(id).await
    }

    async fn redeemed_badges(&self, owner: &OwnerRef) -> Result<Vec<RedeemedBadge>, StoreError> {
        self.inner.redeemed_badges(owner).await
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
