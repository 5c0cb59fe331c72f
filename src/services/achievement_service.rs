//! Achievement evaluator.
//!
//! Scans the pending catalog for an identity and awards every newly satisfied
//! achievement. The award fact's uniqueness is the only guard against double
//! awarding, so concurrent evaluations for the same identity are harmless.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::coin_service::CoinLedger;
use crate::clock::{start_of_day, Clock};
use crate::config::RewardsConfig;
use crate::database::models::{Achievement, CategoryFilter, CriteriaKind, OwnerRef};
use crate::database::{SharedStore, StoreError};

/// Unlock event returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub reward_coins: i64,
    pub message: String,
}

impl From<&Achievement> for UnlockedAchievement {
    fn from(a: &Achievement) -> Self {
        Self {
            id: a.id,
            title: a.title.clone(),
            description: a.description.clone(),
            icon: a.icon.clone(),
            reward_coins: a.reward_coins,
            message: format!("Unlocked: {}!", a.title),
        }
    }
}

/// Catalog entry as seen by one identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub is_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementSummary {
    pub total: usize,
    pub unlocked: usize,
    pub achievements: Vec<AchievementView>,
}

/// Length of the run of consecutive days ending at `today`.
///
/// `days` holds distinct active days, newest first. A missing `today` means no streak.
pub fn streak_length(days: &[NaiveDate], today: NaiveDate) -> i64 {
    let mut expected = today;
    let mut streak = 0;
    for day in days.iter().copied().filter(|d| *d <= today) {
        if day != expected {
            break;
        }
        streak += 1;
        match expected.pred_opt() {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    streak
}

#[derive(Clone)]
pub struct AchievementEvaluator {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    ledger: CoinLedger,
    monthly_window_days: u32,
    streak_page_days: u32,
}

impl AchievementEvaluator {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        ledger: CoinLedger,
        rewards: &RewardsConfig,
    ) -> Self {
        Self {
            store,
            clock,
            ledger,
            monthly_window_days: rewards.monthly_window_days.max(1),
            streak_page_days: rewards.streak_page_days.max(1),
        }
    }

    /// Award every pending achievement whose criteria now hold.
    ///
    /// A failure to measure or grant one achievement is logged and skipped, so
    /// the result always lists every award committed by this call.
    pub async fn check_and_award(
        &self,
        owner: &OwnerRef,
        performed_by: Option<Uuid>,
    ) -> Result<Vec<UnlockedAchievement>, StoreError> {
        let pending = self.store.pending_achievements(owner).await?;
        let mut measured: HashMap<(CriteriaKind, CategoryFilter), i64> = HashMap::new();
        let mut unlocked = Vec::new();

        for achievement in &pending {
            let key = (achievement.criteria_kind, achievement.category_filter);
            let value = match measured.get(&key) {
                Some(value) => *value,
                None => match self.measure(owner, key.0, key.1).await {
                    Ok(value) => {
                        measured.insert(key, value);
                        value
                    }
                    Err(e) => {
                        warn!(
                            "Skipping '{}' for {}: could not measure {} ({}): {}",
                            achievement.title,
                            owner,
                            key.0.as_str(),
                            key.1.as_str(),
                            e
                        );
                        continue;
                    }
                },
            };

            if value < achievement.criteria_value {
                continue;
            }

            match self
                .ledger
                .award_achievement(owner, achievement, performed_by)
                .await
            {
                Ok(Some(_)) => {
                    info!("{} unlocked achievement '{}'", owner, achievement.title);
                    unlocked.push(UnlockedAchievement::from(achievement));
                }
                Ok(None) => debug!(
                    "Achievement '{}' already held by {}",
                    achievement.title, owner
                ),
                Err(e) => error!(
                    "Failed to award '{}' to {}: {}",
                    achievement.title, owner, e
                ),
            }
        }

        Ok(unlocked)
    }

    /// Current value of a criterion for an identity.
    pub async fn measure(
        &self,
        owner: &OwnerRef,
        kind: CriteriaKind,
        filter: CategoryFilter,
    ) -> Result<i64, StoreError> {
        match kind {
            CriteriaKind::Streak => self.current_streak(owner, filter).await,
            CriteriaKind::TotalLogs => self.store.count_logs(owner, filter, None).await,
            CriteriaKind::MonthlyLogs => {
                let since = self.window_start(self.monthly_window_days);
                self.store.count_logs(owner, filter, Some(since)).await
            }
        }
    }

    pub async fn current_streak(
        &self,
        owner: &OwnerRef,
        filter: CategoryFilter,
    ) -> Result<i64, StoreError> {
        let page = i64::from(self.streak_page_days);
        let mut to = self.clock.today();
        let mut streak = 0;

        // Keep paging back while the run fills the whole page
        loop {
            let from = to - Duration::days(page - 1);
            let days = self.store.active_days(owner, filter, from, to).await?;
            let run = streak_length(&days, to);
            streak += run;
            if run < page {
                break;
            }
            match from.pred_opt() {
                Some(prev) => to = prev,
                None => break,
            }
        }
        Ok(streak)
    }

    /// Catalog with unlock state and streak progress for one identity.
    pub async fn summary(&self, owner: &OwnerRef) -> Result<AchievementSummary, StoreError> {
        let (catalog, awards) = futures::try_join!(
            self.store.active_achievements(),
            self.store.awards_for(owner)
        )?;
        let awarded_at: HashMap<Uuid, DateTime<Utc>> = awards
            .into_iter()
            .map(|a| (a.achievement_id, a.awarded_at))
            .collect();

        let mut streaks: HashMap<CategoryFilter, i64> = HashMap::new();
        let mut views = Vec::with_capacity(catalog.len());

        for achievement in catalog {
            let unlocked_at = awarded_at.get(&achievement.id).copied();
            let mut view = AchievementView {
                is_unlocked: unlocked_at.is_some(),
                unlocked_at,
                progress: None,
                streak: None,
                days_left: None,
                achievement,
            };

            if !view.is_unlocked && view.achievement.criteria_kind == CriteriaKind::Streak {
                let filter = view.achievement.category_filter;
                let current = match streaks.get(&filter) {
                    Some(current) => *current,
                    None => {
                        let current = self.current_streak(owner, filter).await?;
                        streaks.insert(filter, current);
                        current
                    }
                };
                let needed = view.achievement.criteria_value.max(1);
                view.progress = Some((current as f64 / needed as f64).min(1.0));
                view.streak = Some(current);
                view.days_left = Some((needed - current).max(0));
            }

            views.push(view);
        }

        views.sort_by(|a, b| {
            b.is_unlocked
                .cmp(&a.is_unlocked)
                .then(b.achievement.reward_coins.cmp(&a.achievement.reward_coins))
        });

        Ok(AchievementSummary {
            total: views.len(),
            unlocked: views.iter().filter(|v| v.is_unlocked).count(),
            achievements: views,
        })
    }

    fn window_start(&self, days: u32) -> DateTime<Utc> {
        let today = self.clock.today();
        start_of_day(today - Duration::days(i64::from(days) - 1))
    }
}
