//! Postgres store.
//!
//! Multi-write units run inside one transaction. Balances move only through a
//! conditional `UPDATE` that refuses to go negative, and the daily-bonus key,
//! award facts and badge redemptions are guarded by unique indexes.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::models::{
    Achievement, AchievementAward, AchievementGrant, Badge, Category, CategoryFilter, ChildProfile,
    CoinTransaction, Credit, Debit, DebitReceipt, Household, LedgerTotals, LogDetails, LogQuery,
    LogRecord, MedicationSchedule, NewParent, OwnerRef, ParentAccount, RedeemedBadge,
    ScheduleDetails, TransactionKind,
};
use super::store::{
    AchievementStore, BadgeStore, LedgerStore, LogStore, ProfileStore, ScheduleStore, Store,
    StoreError,
};
use crate::clock::start_of_day;
use crate::types::{Page, Pagination};

const LOG_COLUMNS: &str = "id, owner_parent_id, owner_child_id, recorded_by_parent_id, \
     occurred_at, details, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, owner_parent_id, owner_child_id, performed_by_parent_id, \
     kind, amount, reason, category, achievement_id, badge_id, bonus_day, occurred_at";

const SCHEDULE_COLUMNS: &str = "id, owner_parent_id, owner_child_id, created_by_parent_id, \
     details, created_at, updated_at";

const ACHIEVEMENT_COLUMNS: &str = "id, title, description, icon, criteria_kind, criteria_value, \
     category_filter, reward_coins, active";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map unique and foreign-key violations onto store-level errors.
fn classify(err: sqlx::Error, what: impl Into<String>) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(what.into());
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound(what.into());
        }
    }
    StoreError::Sqlx(err)
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StoreError::Corrupt)
}

fn owner_from_row(row: &PgRow) -> Result<OwnerRef, StoreError> {
    Ok(OwnerRef::from_storage(
        row.try_get("owner_parent_id")?,
        row.try_get("owner_child_id")?,
    ))
}

fn log_from_row(row: &PgRow) -> Result<LogRecord, StoreError> {
    let Json(details): Json<LogDetails> = row.try_get("details")?;
    Ok(LogRecord {
        id: row.try_get("id")?,
        owner: owner_from_row(row)?,
        recorded_by_parent_id: row.try_get("recorded_by_parent_id")?,
        occurred_at: row.try_get("occurred_at")?,
        details,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn schedule_from_row(row: &PgRow) -> Result<MedicationSchedule, StoreError> {
    let Json(details): Json<ScheduleDetails> = row.try_get("details")?;
    Ok(MedicationSchedule {
        id: row.try_get("id")?,
        owner: owner_from_row(row)?,
        created_by_parent_id: row.try_get("created_by_parent_id")?,
        details,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<CoinTransaction, StoreError> {
    let category: Option<String> = row.try_get("category")?;
    Ok(CoinTransaction {
        id: row.try_get("id")?,
        owner: owner_from_row(row)?,
        performed_by_parent_id: row.try_get("performed_by_parent_id")?,
        kind: parse_column(row, "kind")?,
        amount: row.try_get("amount")?,
        reason: row.try_get("reason")?,
        category: category
            .map(|c| c.parse::<Category>())
            .transpose()
            .map_err(StoreError::Corrupt)?,
        achievement_id: row.try_get("achievement_id")?,
        badge_id: row.try_get("badge_id")?,
        bonus_day: row.try_get("bonus_day")?,
        occurred_at: row.try_get("occurred_at")?,
    })
}

fn achievement_from_row(row: &PgRow) -> Result<Achievement, StoreError> {
    Ok(Achievement {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        criteria_kind: parse_column(row, "criteria_kind")?,
        criteria_value: row.try_get("criteria_value")?,
        category_filter: parse_column(row, "category_filter")?,
        reward_coins: row.try_get("reward_coins")?,
        active: row.try_get("active")?,
    })
}

fn badge_from_row(row: &PgRow) -> Result<Badge, StoreError> {
    Ok(Badge {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        coin_cost: row.try_get("coin_cost")?,
        active: row.try_get("active")?,
    })
}

/// Add `delta` to the owner's balance unless the result would be negative.
/// `None` means the owner is unknown or the balance is too low.
async fn adjust_balance(
    conn: &mut PgConnection,
    owner: &OwnerRef,
    delta: i64,
) -> Result<Option<i64>, StoreError> {
    let row = match owner {
        OwnerRef::Parent { parent_id } => {
            sqlx::query(
                "UPDATE parent_accounts SET coins = coins + $2 \
                 WHERE id = $1 AND coins + $2 >= 0 RETURNING coins",
            )
            .bind(parent_id)
            .bind(delta)
            .fetch_optional(&mut *conn)
            .await?
        }
        OwnerRef::Child { parent_id, child_id } => {
            sqlx::query(
                "UPDATE child_profiles SET coins = coins + $3 \
                 WHERE parent_id = $1 AND child_id = $2 AND coins + $3 >= 0 RETURNING coins",
            )
            .bind(parent_id)
            .bind(child_id)
            .bind(delta)
            .fetch_optional(&mut *conn)
            .await?
        }
    };
    row.map(|r| r.try_get::<i64, _>("coins"))
        .transpose()
        .map_err(StoreError::from)
}

async fn current_balance(
    conn: &mut PgConnection,
    owner: &OwnerRef,
) -> Result<Option<i64>, StoreError> {
    let balance = match owner {
        OwnerRef::Parent { parent_id } => {
            sqlx::query_scalar::<_, i64>("SELECT coins FROM parent_accounts WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        OwnerRef::Child { parent_id, child_id } => {
            sqlx::query_scalar::<_, i64>(
                "SELECT coins FROM child_profiles WHERE parent_id = $1 AND child_id = $2",
            )
            .bind(parent_id)
            .bind(child_id)
            .fetch_optional(&mut *conn)
            .await?
        }
    };
    Ok(balance)
}

async fn insert_transaction(
    conn: &mut PgConnection,
    entry: &CoinTransaction,
) -> Result<bool, StoreError> {
    let sql = format!(
        "INSERT INTO coin_transactions ({}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (owner_parent_id, owner_child_id, reason, bonus_day) \
         WHERE bonus_day IS NOT NULL DO NOTHING",
        TRANSACTION_COLUMNS
    );
    let result = sqlx::query(&sql)
        .bind(entry.id)
        .bind(entry.owner.parent_id())
        .bind(entry.owner.storage_child_key())
        .bind(entry.performed_by_parent_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(&entry.reason)
        .bind(entry.category.map(|c| c.as_str()))
        .bind(entry.achievement_id)
        .bind(entry.badge_id)
        .bind(entry.bonus_day)
        .bind(entry.occurred_at)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn create_parent(
        &self,
        parent: &NewParent,
        created_at: DateTime<Utc>,
    ) -> Result<ParentAccount, StoreError> {
        let email = parent.email.trim().to_lowercase();
        sqlx::query_as::<_, ParentAccount>(
            "INSERT INTO parent_accounts (id, first_name, last_name, email, avatar_url, coins, created_at) \
             VALUES ($1, $2, $3, $4, $5, 0, $6) \
             RETURNING id, first_name, last_name, email, avatar_url, coins, active_child_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(parent.first_name.trim())
        .bind(parent.last_name.trim())
        .bind(&email)
        .bind(&parent.avatar_url)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, format!("email {} already registered", email)))
    }

    async fn load_household(&self, parent_id: Uuid) -> Result<Option<Household>, StoreError> {
        let parent = sqlx::query_as::<_, ParentAccount>(
            "SELECT id, first_name, last_name, email, avatar_url, coins, active_child_id, created_at \
             FROM parent_accounts WHERE id = $1",
        )
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(parent) = parent else {
            return Ok(None);
        };

        let children = sqlx::query_as::<_, ChildProfile>(
            "SELECT parent_id, child_id, name, date_of_birth, health_notes, avatar_url, coins, created_at \
             FROM child_profiles WHERE parent_id = $1 ORDER BY created_at, child_id",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Household { parent, children }))
    }

    async fn set_active_child(
        &self,
        parent_id: Uuid,
        child_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = match child_id {
            None => {
                sqlx::query("UPDATE parent_accounts SET active_child_id = NULL WHERE id = $1")
                    .bind(parent_id)
                    .execute(&self.pool)
                    .await?
            }
            Some(child_id) => {
                sqlx::query(
                    "UPDATE parent_accounts SET active_child_id = $2 \
                     WHERE id = $1 AND EXISTS ( \
                         SELECT 1 FROM child_profiles WHERE parent_id = $1 AND child_id = $2)",
                )
                .bind(parent_id)
                .bind(child_id)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    async fn clear_stale_active_child(
        &self,
        parent_id: Uuid,
        stale_child_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE parent_accounts SET active_child_id = NULL \
             WHERE id = $1 AND active_child_id = $2",
        )
        .bind(parent_id)
        .bind(stale_child_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_child(&self, child: &ChildProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO child_profiles \
             (parent_id, child_id, name, date_of_birth, health_notes, avatar_url, coins, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(child.parent_id)
        .bind(&child.child_id)
        .bind(&child.name)
        .bind(child.date_of_birth)
        .bind(&child.health_notes)
        .bind(&child.avatar_url)
        .bind(child.coins)
        .bind(child.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, format!("child {} for parent {}", child.child_id, child.parent_id)))?;
        Ok(())
    }

    async fn delete_child(&self, parent_id: Uuid, child_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM child_profiles WHERE parent_id = $1 AND child_id = $2")
            .bind(parent_id)
            .bind(child_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            == 1;

        if removed {
            sqlx::query(
                "UPDATE parent_accounts SET active_child_id = NULL \
                 WHERE id = $1 AND active_child_id = $2",
            )
            .bind(parent_id)
            .bind(child_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn insert_log(&self, log: &LogRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO activity_logs ({}, category) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            LOG_COLUMNS
        );
        sqlx::query(&sql)
            .bind(log.id)
            .bind(log.owner.parent_id())
            .bind(log.owner.storage_child_key())
            .bind(log.recorded_by_parent_id)
            .bind(log.occurred_at)
            .bind(Json(&log.details))
            .bind(log.created_at)
            .bind(log.updated_at)
            .bind(log.category().as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, format!("log {}", log.id)))?;
        Ok(())
    }

    async fn list_logs(
        &self,
        owner: &OwnerRef,
        category: Category,
        query: &LogQuery,
        pagination: Pagination,
    ) -> Result<Page<LogRecord>, StoreError> {
        const FILTER: &str = "owner_parent_id = $1 AND owner_child_id = $2 AND category = $3 \
             AND ($4::timestamptz IS NULL OR occurred_at >= $4) \
             AND ($5::timestamptz IS NULL OR occurred_at <= $5)";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM activity_logs WHERE {}", FILTER))
                .bind(owner.parent_id())
                .bind(owner.storage_child_key())
                .bind(category.as_str())
                .bind(query.from)
                .bind(query.to)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM activity_logs WHERE {} \
             ORDER BY occurred_at DESC, id LIMIT $6 OFFSET $7",
            LOG_COLUMNS, FILTER
        );
        let rows = sqlx::query(&sql)
            .bind(owner.parent_id())
            .bind(owner.storage_child_key())
            .bind(category.as_str())
            .bind(query.from)
            .bind(query.to)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let data = rows.iter().map(log_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(data, pagination, total))
    }

    async fn update_log(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        occurred_at: Option<DateTime<Utc>>,
        details: &LogDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<LogRecord>, StoreError> {
        let sql = format!(
            "UPDATE activity_logs SET occurred_at = COALESCE($4, occurred_at), details = $5, updated_at = $6 \
             WHERE id = $1 AND owner_parent_id = $2 AND owner_child_id = $3 AND category = $7 \
             RETURNING {}",
            LOG_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner.parent_id())
            .bind(owner.storage_child_key())
            .bind(occurred_at)
            .bind(Json(details))
            .bind(updated_at)
            .bind(details.category().as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(log_from_row).transpose()
    }

    async fn delete_log(
        &self,
        owner: &OwnerRef,
        category: Category,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM activity_logs \
             WHERE id = $1 AND owner_parent_id = $2 AND owner_child_id = $3 AND category = $4",
        )
        .bind(id)
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .bind(category.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_logs(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activity_logs \
             WHERE owner_parent_id = $1 AND owner_child_id = $2 \
             AND ($3::text IS NULL OR category = $3) \
             AND ($4::timestamptz IS NULL OR occurred_at >= $4)",
        )
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .bind(filter.category().map(|c| c.as_str()))
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn active_days(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, StoreError> {
        let days = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT DISTINCT (occurred_at AT TIME ZONE 'UTC')::date AS day FROM activity_logs \
             WHERE owner_parent_id = $1 AND owner_child_id = $2 \
             AND ($3::text IS NULL OR category = $3) \
             AND occurred_at >= $4 AND occurred_at < $5 \
             ORDER BY day DESC",
        )
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .bind(filter.category().map(|c| c.as_str()))
        .bind(start_of_day(from))
        .bind(start_of_day(to) + Duration::days(1))
        .fetch_all(&self.pool)
        .await?;
        Ok(days)
    }
}

#[async_trait]
impl ScheduleStore for PgStore {
    async fn insert_schedule(&self, schedule: &MedicationSchedule) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO medication_schedules ({}, from_date) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            SCHEDULE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(schedule.id)
            .bind(schedule.owner.parent_id())
            .bind(schedule.owner.storage_child_key())
            .bind(schedule.created_by_parent_id)
            .bind(Json(&schedule.details))
            .bind(schedule.created_at)
            .bind(schedule.updated_at)
            .bind(schedule.details.from_date)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, format!("identity {}", schedule.owner)))?;
        Ok(())
    }

    async fn list_schedules(&self, owner: &OwnerRef) -> Result<Vec<MedicationSchedule>, StoreError> {
        let sql = format!(
            "SELECT {} FROM medication_schedules \
             WHERE owner_parent_id = $1 AND owner_child_id = $2 \
             ORDER BY from_date DESC, created_at DESC",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner.parent_id())
            .bind(owner.storage_child_key())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    async fn find_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
    ) -> Result<Option<MedicationSchedule>, StoreError> {
        let sql = format!(
            "SELECT {} FROM medication_schedules \
             WHERE id = $1 AND owner_parent_id = $2 AND owner_child_id = $3",
            SCHEDULE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner.parent_id())
            .bind(owner.storage_child_key())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn update_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        details: &ScheduleDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<MedicationSchedule>, StoreError> {
        let sql = format!(
            "UPDATE medication_schedules SET details = $4, from_date = $5, updated_at = $6 \
             WHERE id = $1 AND owner_parent_id = $2 AND owner_child_id = $3 \
             RETURNING {}",
            SCHEDULE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner.parent_id())
            .bind(owner.storage_child_key())
            .bind(Json(details))
            .bind(details.from_date)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn delete_schedule(&self, owner: &OwnerRef, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM medication_schedules \
             WHERE id = $1 AND owner_parent_id = $2 AND owner_child_id = $3",
        )
        .bind(id)
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn credit(&self, credit: &Credit) -> Result<Option<CoinTransaction>, StoreError> {
        let entry = CoinTransaction {
            id: Uuid::new_v4(),
            owner: credit.owner.clone(),
            performed_by_parent_id: credit.performed_by_parent_id,
            kind: TransactionKind::Earn,
            amount: credit.amount,
            reason: credit.reason.clone(),
            category: credit.category,
            achievement_id: None,
            badge_id: None,
            bonus_day: credit.bonus_day,
            occurred_at: credit.occurred_at,
        };

        let mut tx = self.pool.begin().await?;
        if !insert_transaction(&mut *tx, &entry).await? {
            return Ok(None);
        }
        if adjust_balance(&mut *tx, &entry.owner, entry.amount).await?.is_none() {
            return Err(StoreError::NotFound(format!("identity {}", entry.owner)));
        }
        tx.commit().await?;
        Ok(Some(entry))
    }

    async fn debit(&self, debit: &Debit) -> Result<DebitReceipt, StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(badge_id) = debit.badge_id {
            let owned = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM badge_redemptions \
                 WHERE owner_parent_id = $1 AND owner_child_id = $2 AND badge_id = $3)",
            )
            .bind(debit.owner.parent_id())
            .bind(debit.owner.storage_child_key())
            .bind(badge_id)
            .fetch_one(&mut *tx)
            .await?;
            if owned {
                return Err(StoreError::Conflict(format!("badge {} already owned", badge_id)));
            }
        }

        let Some(remaining) = adjust_balance(&mut *tx, &debit.owner, -debit.amount).await? else {
            return match current_balance(&mut *tx, &debit.owner).await? {
                Some(balance) => Err(StoreError::InsufficientBalance {
                    balance,
                    requested: debit.amount,
                }),
                None => Err(StoreError::NotFound(format!("identity {}", debit.owner))),
            };
        };

        if let Some(badge_id) = debit.badge_id {
            sqlx::query(
                "INSERT INTO badge_redemptions (owner_parent_id, owner_child_id, badge_id, redeemed_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(debit.owner.parent_id())
            .bind(debit.owner.storage_child_key())
            .bind(badge_id)
            .bind(debit.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(e, format!("badge {} already owned", badge_id)))?;
        }

        let entry = CoinTransaction {
            id: Uuid::new_v4(),
            owner: debit.owner.clone(),
            performed_by_parent_id: debit.performed_by_parent_id,
            kind: TransactionKind::Spend,
            amount: debit.amount,
            reason: debit.reason.clone(),
            category: None,
            achievement_id: None,
            badge_id: debit.badge_id,
            bonus_day: None,
            occurred_at: debit.occurred_at,
        };
        insert_transaction(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(DebitReceipt {
            entry,
            balance: remaining,
        })
    }

    async fn grant_achievement(
        &self,
        grant: &AchievementGrant,
    ) -> Result<Option<AchievementAward>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO achievement_awards (owner_parent_id, owner_child_id, achievement_id, awarded_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(grant.owner.parent_id())
        .bind(grant.owner.storage_child_key())
        .bind(grant.achievement_id)
        .bind(grant.awarded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, format!("achievement {}", grant.achievement_id)))?
        .rows_affected()
            == 1;

        if !inserted {
            return Ok(None);
        }

        if grant.reward_coins > 0 {
            let entry = CoinTransaction {
                id: Uuid::new_v4(),
                owner: grant.owner.clone(),
                performed_by_parent_id: grant.performed_by_parent_id,
                kind: TransactionKind::Earn,
                amount: grant.reward_coins,
                reason: grant.reason.clone(),
                category: None,
                achievement_id: Some(grant.achievement_id),
                badge_id: None,
                bonus_day: None,
                occurred_at: grant.awarded_at,
            };
            insert_transaction(&mut *tx, &entry).await?;
            if adjust_balance(&mut *tx, &grant.owner, grant.reward_coins)
                .await?
                .is_none()
            {
                return Err(StoreError::NotFound(format!("identity {}", grant.owner)));
            }
        } else if current_balance(&mut *tx, &grant.owner).await?.is_none() {
            return Err(StoreError::NotFound(format!("identity {}", grant.owner)));
        }

        tx.commit().await?;
        Ok(Some(AchievementAward {
            owner: grant.owner.clone(),
            achievement_id: grant.achievement_id,
            awarded_at: grant.awarded_at,
        }))
    }

    async fn list_transactions(
        &self,
        owner: &OwnerRef,
        pagination: Pagination,
    ) -> Result<Page<CoinTransaction>, StoreError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM coin_transactions WHERE owner_parent_id = $1 AND owner_child_id = $2",
        )
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM coin_transactions WHERE owner_parent_id = $1 AND owner_child_id = $2 \
             ORDER BY occurred_at DESC, id LIMIT $3 OFFSET $4",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner.parent_id())
            .bind(owner.storage_child_key())
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let data = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(data, pagination, total))
    }

    async fn totals(&self, owner: &OwnerRef) -> Result<LedgerTotals, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let balance = current_balance(&mut *conn, owner)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("identity {}", owner)))?;

        let row = sqlx::query(
            "SELECT \
                 COALESCE(SUM(amount) FILTER (WHERE kind = 'EARN'), 0)::BIGINT AS earned, \
                 COALESCE(SUM(amount) FILTER (WHERE kind = 'SPEND'), 0)::BIGINT AS spent \
             FROM coin_transactions WHERE owner_parent_id = $1 AND owner_child_id = $2",
        )
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .fetch_one(&mut *conn)
        .await?;

        Ok(LedgerTotals {
            balance,
            earned: row.try_get("earned")?,
            spent: row.try_get("spent")?,
        })
    }
}

#[async_trait]
impl AchievementStore for PgStore {
    async fn insert_achievement(&self, achievement: &Achievement) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO achievements ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            ACHIEVEMENT_COLUMNS
        ))
        .bind(achievement.id)
        .bind(&achievement.title)
        .bind(&achievement.description)
        .bind(&achievement.icon)
        .bind(achievement.criteria_kind.as_str())
        .bind(achievement.criteria_value)
        .bind(achievement.category_filter.as_str())
        .bind(achievement.reward_coins)
        .bind(achievement.active)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, format!("achievement {}", achievement.id)))?;
        Ok(())
    }

    async fn active_achievements(&self) -> Result<Vec<Achievement>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM achievements WHERE active ORDER BY created_at, title",
            ACHIEVEMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(achievement_from_row).collect()
    }

    async fn pending_achievements(&self, owner: &OwnerRef) -> Result<Vec<Achievement>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM achievements a WHERE a.active AND NOT EXISTS ( \
                 SELECT 1 FROM achievement_awards w WHERE w.achievement_id = a.id \
                 AND w.owner_parent_id = $1 AND w.owner_child_id = $2) \
             ORDER BY a.created_at, a.title",
            ACHIEVEMENT_COLUMNS
        ))
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(achievement_from_row).collect()
    }

    async fn awards_for(&self, owner: &OwnerRef) -> Result<Vec<AchievementAward>, StoreError> {
        let rows = sqlx::query(
            "SELECT owner_parent_id, owner_child_id, achievement_id, awarded_at \
             FROM achievement_awards WHERE owner_parent_id = $1 AND owner_child_id = $2 \
             ORDER BY awarded_at",
        )
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AchievementAward {
                    owner: owner_from_row(row)?,
                    achievement_id: row.try_get("achievement_id")?,
                    awarded_at: row.try_get("awarded_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl BadgeStore for PgStore {
    async fn insert_badge(&self, badge: &Badge) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO badges (id, title, description, icon, coin_cost, active) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(badge.id)
        .bind(&badge.title)
        .bind(&badge.description)
        .bind(&badge.icon)
        .bind(badge.coin_cost)
        .bind(badge.active)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, format!("badge {}", badge.id)))?;
        Ok(())
    }

    async fn active_badges(&self) -> Result<Vec<Badge>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, description, icon, coin_cost, active FROM badges \
             WHERE active ORDER BY coin_cost, title",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(badge_from_row).collect()
    }

    async fn find_active_badge(&self, id: Uuid) -> Result<Option<Badge>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, description, icon, coin_cost, active FROM badges \
             WHERE id = $1 AND active",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(badge_from_row).transpose()
    }

    async fn redeemed_badges(&self, owner: &OwnerRef) -> Result<Vec<RedeemedBadge>, StoreError> {
        let rows = sqlx::query(
            "SELECT b.id, b.title, b.description, b.icon, b.coin_cost, b.active, r.redeemed_at \
             FROM badge_redemptions r JOIN badges b ON b.id = r.badge_id \
             WHERE r.owner_parent_id = $1 AND r.owner_child_id = $2 \
             ORDER BY r.redeemed_at DESC",
        )
        .bind(owner.parent_id())
        .bind(owner.storage_child_key())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RedeemedBadge {
                    badge: badge_from_row(row)?,
                    redeemed_at: row.try_get("redeemed_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
