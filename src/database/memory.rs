//! In-process store used for development and tests.
//!
//! All state sits behind one mutex, so every trait call is a single atomic unit.
//! The lock is never held across an await point.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
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
use crate::types::{Page, Pagination};

#[derive(Default)]
struct MemoryState {
    parents: Vec<ParentAccount>,
    children: Vec<ChildProfile>,
    logs: Vec<LogRecord>,
    schedules: Vec<MedicationSchedule>,
    transactions: Vec<CoinTransaction>,
    bonus_keys: HashSet<(OwnerRef, String, NaiveDate)>,
    achievements: Vec<Achievement>,
    awards: Vec<AchievementAward>,
    badges: Vec<Badge>,
    redemptions: Vec<(OwnerRef, Uuid, DateTime<Utc>)>,
}

impl MemoryState {
    fn balance_mut(&mut self, owner: &OwnerRef) -> Option<&mut i64> {
        match owner {
            OwnerRef::Parent { parent_id } => self
                .parents
                .iter_mut()
                .find(|p| p.id == *parent_id)
                .map(|p| &mut p.coins),
            OwnerRef::Child { parent_id, child_id } => self
                .children
                .iter_mut()
                .find(|c| c.parent_id == *parent_id && c.child_id == *child_id)
                .map(|c| &mut c.coins),
        }
    }

    /// Apply an EARN entry: bump the owner's balance and append the entry.
    fn apply_earn(&mut self, entry: CoinTransaction) -> Result<CoinTransaction, StoreError> {
        let balance = self
            .balance_mut(&entry.owner)
            .ok_or_else(|| StoreError::NotFound(format!("identity {}", entry.owner)))?;
        *balance += entry.amount;
        self.transactions.push(entry.clone());
        Ok(entry)
    }
}

fn earn_entry(
    owner: &OwnerRef,
    performed_by: Option<Uuid>,
    amount: i64,
    reason: &str,
    occurred_at: DateTime<Utc>,
) -> CoinTransaction {
    CoinTransaction {
        id: Uuid::new_v4(),
        owner: owner.clone(),
        performed_by_parent_id: performed_by,
        kind: TransactionKind::Earn,
        amount,
        reason: reason.to_string(),
        category: None,
        achievement_id: None,
        badge_id: None,
        bonus_day: None,
        occurred_at,
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Units validate before mutating, so poisoned state is still consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Point a parent at any child id, existing or not.
    #[cfg(test)]
    pub(crate) fn force_active_child(&self, parent_id: Uuid, child_id: &str) {
        if let Some(parent) = self.lock().parents.iter_mut().find(|p| p.id == parent_id) {
            parent.active_child_id = Some(child_id.to_string());
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn create_parent(
        &self,
        parent: &NewParent,
        created_at: DateTime<Utc>,
    ) -> Result<ParentAccount, StoreError> {
        let mut state = self.lock();
        let email = parent.email.trim().to_lowercase();
        if state.parents.iter().any(|p| p.email == email) {
            return Err(StoreError::Conflict(format!("email {} already registered", email)));
        }
        let account = ParentAccount {
            id: Uuid::new_v4(),
            first_name: parent.first_name.trim().to_string(),
            last_name: parent.last_name.trim().to_string(),
            email,
            avatar_url: parent.avatar_url.clone(),
            coins: 0,
            active_child_id: None,
            created_at,
        };
        state.parents.push(account.clone());
        Ok(account)
    }

    async fn load_household(&self, parent_id: Uuid) -> Result<Option<Household>, StoreError> {
        let state = self.lock();
        let Some(parent) = state.parents.iter().find(|p| p.id == parent_id).cloned() else {
            return Ok(None);
        };
        let children = state
            .children
            .iter()
            .filter(|c| c.parent_id == parent_id)
            .cloned()
            .collect();
        Ok(Some(Household { parent, children }))
    }

    async fn set_active_child(
        &self,
        parent_id: Uuid,
        child_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if let Some(child_id) = child_id {
            let exists = state
                .children
                .iter()
                .any(|c| c.parent_id == parent_id && c.child_id == child_id);
            if !exists {
                return Ok(false);
            }
        }
        match state.parents.iter_mut().find(|p| p.id == parent_id) {
            Some(parent) => {
                parent.active_child_id = child_id.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_stale_active_child(
        &self,
        parent_id: Uuid,
        stale_child_id: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(parent) = state.parents.iter_mut().find(|p| p.id == parent_id) {
            if parent.active_child_id.as_deref() == Some(stale_child_id) {
                parent.active_child_id = None;
            }
        }
        Ok(())
    }

    async fn insert_child(&self, child: &ChildProfile) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.parents.iter().any(|p| p.id == child.parent_id) {
            return Err(StoreError::NotFound(format!("parent {}", child.parent_id)));
        }
        if state.children.iter().any(|c| c.child_id == child.child_id) {
            return Err(StoreError::Conflict(format!("child id {} in use", child.child_id)));
        }
        state.children.push(child.clone());
        Ok(())
    }

    async fn delete_child(&self, parent_id: Uuid, child_id: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let before = state.children.len();
        state
            .children
            .retain(|c| !(c.parent_id == parent_id && c.child_id == child_id));
        let removed = state.children.len() != before;
        if removed {
            if let Some(parent) = state.parents.iter_mut().find(|p| p.id == parent_id) {
                if parent.active_child_id.as_deref() == Some(child_id) {
                    parent.active_child_id = None;
                }
            }
        }
        Ok(removed)
    }
}

fn in_range(log: &LogRecord, query: &LogQuery) -> bool {
    query.from.map_or(true, |from| log.occurred_at >= from)
        && query.to.map_or(true, |to| log.occurred_at <= to)
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert_log(&self, log: &LogRecord) -> Result<(), StoreError> {
        self.lock().logs.push(log.clone());
        Ok(())
    }

    async fn list_logs(
        &self,
        owner: &OwnerRef,
        category: Category,
        query: &LogQuery,
        pagination: Pagination,
    ) -> Result<Page<LogRecord>, StoreError> {
        let state = self.lock();
        let mut matching: Vec<LogRecord> = state
            .logs
            .iter()
            .filter(|l| &l.owner == owner && l.category() == category && in_range(l, query))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(Page::from_vec(matching, pagination))
    }

    async fn update_log(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        occurred_at: Option<DateTime<Utc>>,
        details: &LogDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<LogRecord>, StoreError> {
        let mut state = self.lock();
        let category = details.category();
        let Some(log) = state
            .logs
            .iter_mut()
            .find(|l| l.id == id && &l.owner == owner && l.category() == category)
        else {
            return Ok(None);
        };
        if let Some(occurred_at) = occurred_at {
            log.occurred_at = occurred_at;
        }
        log.details = details.clone();
        log.updated_at = updated_at;
        Ok(Some(log.clone()))
    }

    async fn delete_log(
        &self,
        owner: &OwnerRef,
        category: Category,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let before = state.logs.len();
        state
            .logs
            .retain(|l| !(l.id == id && &l.owner == owner && l.category() == category));
        Ok(state.logs.len() != before)
    }

    async fn count_logs(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let state = self.lock();
        let count = state
            .logs
            .iter()
            .filter(|l| &l.owner == owner && filter.matches(l.category()))
            .filter(|l| since.map_or(true, |s| l.occurred_at >= s))
            .count();
        Ok(count as i64)
    }

    async fn active_days(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, StoreError> {
        let state = self.lock();
        let mut days: Vec<NaiveDate> = state
            .logs
            .iter()
            .filter(|l| &l.owner == owner && filter.matches(l.category()))
            .map(|l| l.occurred_at.date_naive())
            .filter(|d| *d >= from && *d <= to)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        days.sort_by(|a, b| b.cmp(a));
        Ok(days)
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn insert_schedule(&self, schedule: &MedicationSchedule) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.balance_mut(&schedule.owner).is_none() {
            return Err(StoreError::NotFound(format!("identity {}", schedule.owner)));
        }
        state.schedules.push(schedule.clone());
        Ok(())
    }

    async fn list_schedules(&self, owner: &OwnerRef) -> Result<Vec<MedicationSchedule>, StoreError> {
        let mut schedules: Vec<MedicationSchedule> = self
            .lock()
            .schedules
            .iter()
            .filter(|s| &s.owner == owner)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| b.details.from_date.cmp(&a.details.from_date));
        Ok(schedules)
    }

    async fn find_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
    ) -> Result<Option<MedicationSchedule>, StoreError> {
        Ok(self
            .lock()
            .schedules
            .iter()
            .find(|s| s.id == id && &s.owner == owner)
            .cloned())
    }

    async fn update_schedule(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        details: &ScheduleDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<MedicationSchedule>, StoreError> {
        let mut state = self.lock();
        let Some(schedule) = state
            .schedules
            .iter_mut()
            .find(|s| s.id == id && &s.owner == owner)
        else {
            return Ok(None);
        };
        schedule.details = details.clone();
        schedule.updated_at = updated_at;
        Ok(Some(schedule.clone()))
    }

    async fn delete_schedule(&self, owner: &OwnerRef, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let before = state.schedules.len();
        state.schedules.retain(|s| !(s.id == id && &s.owner == owner));
        Ok(state.schedules.len() != before)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn credit(&self, credit: &Credit) -> Result<Option<CoinTransaction>, StoreError> {
        let mut state = self.lock();
        if state.balance_mut(&credit.owner).is_none() {
            return Err(StoreError::NotFound(format!("identity {}", credit.owner)));
        }
        if let Some(day) = credit.bonus_day {
            let key = (credit.owner.clone(), credit.reason.clone(), day);
            if !state.bonus_keys.insert(key) {
                return Ok(None);
            }
        }
        let entry = CoinTransaction {
            category: credit.category,
            bonus_day: credit.bonus_day,
            ..earn_entry(
                &credit.owner,
                credit.performed_by_parent_id,
                credit.amount,
                &credit.reason,
                credit.occurred_at,
            )
        };
        state.apply_earn(entry).map(Some)
    }

    async fn debit(&self, debit: &Debit) -> Result<DebitReceipt, StoreError> {
        let mut state = self.lock();
        if let Some(badge_id) = debit.badge_id {
            if state
                .redemptions
                .iter()
                .any(|(o, b, _)| o == &debit.owner && *b == badge_id)
            {
                return Err(StoreError::Conflict(format!("badge {} already owned", badge_id)));
            }
        }

        let balance = state
            .balance_mut(&debit.owner)
            .ok_or_else(|| StoreError::NotFound(format!("identity {}", debit.owner)))?;
        if *balance < debit.amount {
            return Err(StoreError::InsufficientBalance {
                balance: *balance,
                requested: debit.amount,
            });
        }
        *balance -= debit.amount;
        let remaining = *balance;

        if let Some(badge_id) = debit.badge_id {
            state
                .redemptions
                .push((debit.owner.clone(), badge_id, debit.occurred_at));
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
        state.transactions.push(entry.clone());
        Ok(DebitReceipt {
            entry,
            balance: remaining,
        })
    }

    async fn grant_achievement(
        &self,
        grant: &AchievementGrant,
    ) -> Result<Option<AchievementAward>, StoreError> {
        let mut state = self.lock();
        if state.balance_mut(&grant.owner).is_none() {
            return Err(StoreError::NotFound(format!("identity {}", grant.owner)));
        }
        if state
            .awards
            .iter()
            .any(|a| a.owner == grant.owner && a.achievement_id == grant.achievement_id)
        {
            return Ok(None);
        }

        let award = AchievementAward {
            owner: grant.owner.clone(),
            achievement_id: grant.achievement_id,
            awarded_at: grant.awarded_at,
        };
        state.awards.push(award.clone());

        if grant.reward_coins > 0 {
            let entry = CoinTransaction {
                achievement_id: Some(grant.achievement_id),
                ..earn_entry(
                    &grant.owner,
                    grant.performed_by_parent_id,
                    grant.reward_coins,
                    &grant.reason,
                    grant.awarded_at,
                )
            };
            state.apply_earn(entry)?;
        }
        Ok(Some(award))
    }

    async fn list_transactions(
        &self,
        owner: &OwnerRef,
        pagination: Pagination,
    ) -> Result<Page<CoinTransaction>, StoreError> {
        let state = self.lock();
        // Insertion order is chronological; newest first
        let entries: Vec<CoinTransaction> = state
            .transactions
            .iter()
            .rev()
            .filter(|t| &t.owner == owner)
            .cloned()
            .collect();
        Ok(Page::from_vec(entries, pagination))
    }

    async fn totals(&self, owner: &OwnerRef) -> Result<LedgerTotals, StoreError> {
        let mut state = self.lock();
        let balance = *state
            .balance_mut(owner)
            .ok_or_else(|| StoreError::NotFound(format!("identity {}", owner)))?;
        let (earned, spent) = state
            .transactions
            .iter()
            .filter(|t| &t.owner == owner)
            .fold((0, 0), |(earned, spent), t| match t.kind {
                TransactionKind::Earn => (earned + t.amount, spent),
                TransactionKind::Spend => (earned, spent + t.amount),
            });
        Ok(LedgerTotals {
            balance,
            earned,
            spent,
        })
    }
}

#[async_trait]
impl AchievementStore for MemoryStore {
    async fn insert_achievement(&self, achievement: &Achievement) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.achievements.iter().any(|a| a.id == achievement.id) {
            return Err(StoreError::Conflict(format!("achievement {}", achievement.id)));
        }
        state.achievements.push(achievement.clone());
        Ok(())
    }

    async fn active_achievements(&self) -> Result<Vec<Achievement>, StoreError> {
        Ok(self
            .lock()
            .achievements
            .iter()
            .filter(|a| a.active)
            .cloned()
            .collect())
    }

    async fn pending_achievements(&self, owner: &OwnerRef) -> Result<Vec<Achievement>, StoreError> {
        let state = self.lock();
        Ok(state
            .achievements
            .iter()
            .filter(|a| a.active)
            .filter(|a| {
                !state
                    .awards
                    .iter()
                    .any(|aw| &aw.owner == owner && aw.achievement_id == a.id)
            })
            .cloned()
            .collect())
    }

    async fn awards_for(&self, owner: &OwnerRef) -> Result<Vec<AchievementAward>, StoreError> {
        Ok(self
            .lock()
            .awards
            .iter()
            .filter(|a| &a.owner == owner)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BadgeStore for MemoryStore {
    async fn insert_badge(&self, badge: &Badge) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.badges.iter().any(|b| b.id == badge.id) {
            return Err(StoreError::Conflict(format!("badge {}", badge.id)));
        }
        state.badges.push(badge.clone());
        Ok(())
    }

    async fn active_badges(&self) -> Result<Vec<Badge>, StoreError> {
        let mut badges: Vec<Badge> = self
            .lock()
            .badges
            .iter()
            .filter(|b| b.active)
            .cloned()
            .collect();
        badges.sort_by_key(|b| b.coin_cost);
        Ok(badges)
    }

    async fn find_active_badge(&self, id: Uuid) -> Result<Option<Badge>, StoreError> {
        Ok(self
            .lock()
            .badges
            .iter()
            .find(|b| b.id == id && b.active)
            .cloned())
    }

    async fn redeemed_badges(&self, owner: &OwnerRef) -> Result<Vec<RedeemedBadge>, StoreError> {
        let state = self.lock();
        let mut owned: Vec<RedeemedBadge> = state
            .redemptions
            .iter()
            .filter(|(o, _, _)| o == owner)
            .filter_map(|(_, badge_id, redeemed_at)| {
                state
                    .badges
                    .iter()
                    .find(|b| b.id == *badge_id)
                    .map(|badge| RedeemedBadge {
                        badge: badge.clone(),
                        redeemed_at: *redeemed_at,
                    })
            })
            .collect();
        owned.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at));
        Ok(owned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
