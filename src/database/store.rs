//! Storage traits.
//!
//! Services only ever see `Arc<dyn Store>`. Each method is a single atomic unit
//! against the backing store; multi-write operations (credit, debit, grant) are
//! implemented as one transaction by every backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    Achievement, AchievementAward, AchievementGrant, Badge, Category, CategoryFilter, ChildProfile,
    CoinTransaction, Credit, Debit, DebitReceipt, Household, LedgerTotals, LogDetails, LogQuery,
    LogRecord, MedicationSchedule, NewParent, OwnerRef, ParentAccount, RedeemedBadge,
    ScheduleDetails,
};
use crate::types::{Page, Pagination};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient balance: have {balance}, need {requested}")]
    InsufficientBalance { balance: i64, requested: i64 },

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_parent(
        &self,
        parent: &NewParent,
        created_at: DateTime<Utc>,
    ) -> Result<ParentAccount, StoreError>;

    /// Parent account plus its children (ordered by creation).
    async fn load_household(&self, parent_id: Uuid) -> Result<Option<Household>, StoreError>;

    /// Persist the active-profile pointer. Returns `false` when `child_id` is not one
    /// of the parent's children (checked in the same write) or the parent is unknown.
    async fn set_active_child(
        &self,
        parent_id: Uuid,
        child_id: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Reset the pointer to parent mode, but only while it still points at `stale_child_id`.
    async fn clear_stale_active_child(
        &self,
        parent_id: Uuid,
        stale_child_id: &str,
    ) -> Result<(), StoreError>;

    async fn insert_child(&self, child: &ChildProfile) -> Result<(), StoreError>;

    /// Remove a child; clears the pointer in the same unit if it was active.
    async fn delete_child(&self, parent_id: Uuid, child_id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_log(&self, log: &LogRecord) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_logs(
        &self,
        owner: &OwnerRef,
        category: Category,
        query: &LogQuery,
        pagination: Pagination,
    ) -> Result<Page<LogRecord>, StoreError>;

    /// Replace the category fields of a log owned by `owner`, and its timestamp when given.
    /// `None` if no such log.
    async fn update_log(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        occurred_at: Option<DateTime<Utc>>,
        details: &LogDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<LogRecord>, StoreError>;

    async fn delete_log(
        &self,
        owner: &OwnerRef,
        category: Category,
        id: Uuid,
    ) -> Result<bool, StoreError>;

    async fn count_logs(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError>;

    /// Distinct UTC days within `[from, to]` that have at least one matching log, newest first.
    async fn active_days(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, StoreError>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert_schedule(&self, schedule: &MedicationSchedule) -> Result<(), StoreError>;

    /// Newest `fromDate` first.
    async fn list_schedules(&self, owner: &OwnerRef) -> Result<Vec<MedicationSchedule>, StoreError>;

    /// `None` unless the schedule exists and belongs to `owner`.
    async fn find_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
    ) -> Result<Option<MedicationSchedule>, StoreError>;

    async fn update_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        details: &ScheduleDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<MedicationSchedule>, StoreError>;

    async fn delete_schedule(&self, owner: &OwnerRef, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Increment the owner's balance and append an EARN entry together.
    /// Returns `None` when `credit.bonus_day` was already claimed for this reason.
    async fn credit(&self, credit: &Credit) -> Result<Option<CoinTransaction>, StoreError>;

    /// Decrement the owner's balance and append a SPEND entry together, re-checking the
    /// balance inside the unit. Fails with `InsufficientBalance` and changes nothing if short.
    /// The receipt carries the balance written by the same unit.
    async fn debit(&self, debit: &Debit) -> Result<DebitReceipt, StoreError>;

    /// Insert the award fact and pay its reward together.
    /// Returns `None` when the owner already holds the achievement.
    async fn grant_achievement(
        &self,
        grant: &AchievementGrant,
    ) -> Result<Option<AchievementAward>, StoreError>;

    async fn list_transactions(
        &self,
        owner: &OwnerRef,
        pagination: Pagination,
    ) -> Result<Page<CoinTransaction>, StoreError>;

    async fn totals(&self, owner: &OwnerRef) -> Result<LedgerTotals, StoreError>;
}

#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn insert_achievement(&self, achievement: &Achievement) -> Result<(), StoreError>;

    async fn active_achievements(&self) -> Result<Vec<Achievement>, StoreError>;

    /// Active achievements the owner has not been awarded yet.
    async fn pending_achievements(&self, owner: &OwnerRef) -> Result<Vec<Achievement>, StoreError>;

    async fn awards_for(&self, owner: &OwnerRef) -> Result<Vec<AchievementAward>, StoreError>;
}

#[async_trait]
pub trait BadgeStore: Send + Sync {
    async fn insert_badge(&self, badge: &Badge) -> Result<(), StoreError>;

    /// Ordered by coin cost.
    async fn active_badges(&self) -> Result<Vec<Badge>, StoreError>;

    async fn find_active_badge(&self, id: Uuid) -> Result<Option<Badge>, StoreError>;

    /// Most recent first.
    async fn redeemed_badges(&self, owner: &OwnerRef) -> Result<Vec<RedeemedBadge>, StoreError>;
}

/// Everything the services need from a backend.
#[async_trait]
pub trait Store:
    ProfileStore + LogStore + ScheduleStore + LedgerStore + AchievementStore + BadgeStore
{
    async fn ping(&self) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn Store>;
