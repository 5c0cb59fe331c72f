//! Activity logging with best-effort gamification.
//!
//! The log insert is the primary write. The daily bonus and the achievement
//! evaluation run afterwards; their failures are logged and only degrade the
//! reward fields of the response.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use super::achievement_service::{AchievementEvaluator, UnlockedAchievement};
use super::coin_service::CoinLedger;
use crate::clock::Clock;
use crate::database::models::{
    Category, CategoryInput, FieldErrors, LogPayload, LogQuery, LogRecord, OwnerRef,
};
use crate::database::{SharedStore, StoreError};
use crate::types::{Page, Pagination};

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("Invalid {category} log")]
    Validation {
        category: Category,
        field_errors: FieldErrors,
    },

    #[error("{category} log {id} not found")]
    NotFound { category: Category, id: Uuid },

    #[error("Medication schedule {0} not found")]
    ScheduleNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Response for a created log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogOutcome {
    pub log: LogRecord,
    pub achievements: Vec<UnlockedAchievement>,
    pub coins_earned: i64,
    pub already_awarded_today: bool,
    pub message: String,
}

/// Client-facing message for a saved log.
pub fn outcome_message(
    category: Category,
    achievements: &[UnlockedAchievement],
    coins_earned: i64,
    already_awarded_today: bool,
) -> String {
    let mut message = if achievements.is_empty() {
        category.saved_message().to_string()
    } else {
        let titles: Vec<&str> = achievements.iter().map(|a| a.title.as_str()).collect();
        format!("Amazing! {} unlocked!", titles.join(", "))
    };

    if coins_earned > 0 {
        message.push_str(&format!(" +{} coins!", coins_earned));
    } else if already_awarded_today {
        message.push_str(" (Coins already earned today)");
    }
    message
}

fn check<T: CategoryInput>(field_errors: FieldErrors) -> Result<(), ActivityError> {
    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ActivityError::Validation {
            category: T::CATEGORY,
            field_errors,
        })
    }
}

#[derive(Clone)]
pub struct ActivityService {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    ledger: CoinLedger,
    evaluator: AchievementEvaluator,
}

impl ActivityService {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        ledger: CoinLedger,
        evaluator: AchievementEvaluator,
    ) -> Self {
        Self {
            store,
            clock,
            ledger,
            evaluator,
        }
    }

    /// Reject a payload that points at a schedule `owner` does not hold.
    async fn check_schedule(
        &self,
        owner: &OwnerRef,
        schedule_id: Option<Uuid>,
    ) -> Result<(), ActivityError> {
        if let Some(schedule_id) = schedule_id {
            if self.store.find_schedule(owner, schedule_id).await?.is_none() {
                return Err(ActivityError::ScheduleNotFound(schedule_id));
            }
        }
        Ok(())
    }

    /// Insert a log for `owner`, then pay the daily bonus and evaluate achievements.
    pub async fn create<T: CategoryInput>(
        &self,
        owner: &OwnerRef,
        recorded_by: Uuid,
        payload: LogPayload<T>,
    ) -> Result<LogOutcome, ActivityError> {
        let field_errors = payload.create_errors();
        let Some(occurred_at) = payload.occurred_at.filter(|_| field_errors.is_empty()) else {
            return Err(ActivityError::Validation {
                category: T::CATEGORY,
                field_errors,
            });
        };
        self.check_schedule(owner, payload.details.schedule_id()).await?;

        let now = self.clock.now();
        let log = LogRecord {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            recorded_by_parent_id: recorded_by,
            occurred_at,
            details: payload.details.into_details(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_log(&log).await?;
        info!("{} log {} saved for {}", T::CATEGORY, log.id, owner);

        let bonus = match self
            .ledger
            .award_daily_category_bonus(owner, T::CATEGORY, recorded_by)
            .await
        {
            Ok(bonus) => Some(bonus),
            Err(e) => {
                error!("Daily {} bonus failed for {}: {}", T::CATEGORY, owner, e);
                None
            }
        };

        let achievements = self
            .evaluator
            .check_and_award(owner, Some(recorded_by))
            .await
            .unwrap_or_else(|e| {
                error!("Achievement check failed for {}: {}", owner, e);
                Vec::new()
            });

        let coins_earned = bonus.map_or(0, |b| b.amount());
        let already_awarded_today = bonus.map_or(false, |b| b.already_awarded_today());
        let message = outcome_message(
            T::CATEGORY,
            &achievements,
            coins_earned,
            already_awarded_today,
        );

        Ok(LogOutcome {
            log,
            achievements,
            coins_earned,
            already_awarded_today,
            message,
        })
    }

    pub async fn list(
        &self,
        owner: &OwnerRef,
        category: Category,
        query: &LogQuery,
        pagination: Pagination,
    ) -> Result<Page<LogRecord>, ActivityError> {
        Ok(self
            .store
            .list_logs(owner, category, query, pagination.normalized())
            .await?)
    }

    /// Replace a log's fields. Only the identity that owns it may do so.
    pub async fn update<T: CategoryInput>(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        payload: LogPayload<T>,
    ) -> Result<LogRecord, ActivityError> {
        check::<T>(payload.details.field_errors())?;
        self.check_schedule(owner, payload.details.schedule_id()).await?;

        let details = payload.details.into_details();
        self.store
            .update_log(owner, id, payload.occurred_at, &details, self.clock.now())
            .await?
            .ok_or(ActivityError::NotFound {
                category: T::CATEGORY,
                id,
            })
    }

    pub async fn delete(
        &self,
        owner: &OwnerRef,
        category: Category,
        id: Uuid,
    ) -> Result<(), ActivityError> {
        if !self.store.delete_log(owner, category, id).await? {
            return Err(ActivityError::NotFound { category, id });
        }
        info!("{} log {} deleted by {}", category, id, owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{
        MedicationIntakeDetails, PainDetails, ScheduleDetails,
    };
    use crate::services::catalog::seed_if_empty;
    use crate::testing::TestContext;
    use chrono::Duration;
    use serde::de::DeserializeOwned;
    use serde_json::json;

    fn payload<T: DeserializeOwned>(value: serde_json::Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    fn pain_at(ctx: &TestContext) -> LogPayload<PainDetails> {
        payload(json!({
            "occurredAt": ctx.clock.now(),
            "location": "back",
            "painType": "dull",
            "intensity": 4
        }))
    }

    fn unlocked(title: &str) -> UnlockedAchievement {
        UnlockedAchievement {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            icon: "🏅".into(),
            reward_coins: 10,
            message: format!("Unlocked: {}!", title),
        }
    }

    #[test]
    fn message_reports_fresh_coins() {
        assert_eq!(
            outcome_message(Category::Hydration, &[], 10, false),
            "Hydration logged! +10 coins!"
        );
    }

    #[test]
    fn message_reports_repeat_day() {
        assert_eq!(
            outcome_message(Category::Pain, &[], 0, true),
            "Pain log saved (Coins already earned today)"
        );
    }

    #[test]
    fn message_leads_with_unlocks() {
        let achievements = [unlocked("First Steps"), unlocked("Hydration Hero")];
        assert_eq!(
            outcome_message(Category::Medication, &achievements, 10, false),
            "Amazing! First Steps, Hydration Hero unlocked! +10 coins!"
        );
    }

    #[test]
    fn message_is_plain_when_rewards_are_unavailable() {
        assert_eq!(outcome_message(Category::Mood, &[], 0, false), "Mood log saved");
    }

    #[tokio::test]
    async fn reward_failures_do_not_lose_the_log() {
        let (ctx, faults) = TestContext::with_faults();
        seed_if_empty(&ctx.store).await.unwrap();
        let parent = ctx.create_parent("Ada").await;
        let owner = OwnerRef::parent(parent.id);

        faults.fail_credits(true);
        faults.fail_grants(true);
        let outcome = ctx
            .services
            .activity
            .create(&owner, parent.id, pain_at(&ctx))
            .await
            .unwrap();
        assert_eq!(outcome.coins_earned, 0);
        assert!(!outcome.already_awarded_today);
        assert!(outcome.achievements.is_empty());
        assert_eq!(outcome.message, "Pain log saved");
        assert_eq!(ctx.balance(&owner).await, 0);

        let logs = ctx
            .services
            .activity
            .list(&owner, Category::Pain, &LogQuery::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(logs.data.len(), 1);
        assert_eq!(logs.data[0].id, outcome.log.id);

        // The next log after recovery pays the missed bonus and unlock
        faults.heal();
        ctx.clock.advance(Duration::minutes(10));
        let outcome = ctx
            .services
            .activity
            .create(&owner, parent.id, pain_at(&ctx))
            .await
            .unwrap();
        assert_eq!(outcome.coins_earned, 10);
        assert_eq!(outcome.achievements[0].title, "First Steps");
    }

    #[tokio::test]
    async fn create_without_timestamp_stores_nothing() {
        let ctx = TestContext::new();
        let parent = ctx.create_parent("Ada").await;
        let owner = OwnerRef::parent(parent.id);

        let missing: LogPayload<PainDetails> = payload(json!({
            "location": "back",
            "painType": "dull",
            "intensity": 4
        }));
        match ctx.services.activity.create(&owner, parent.id, missing).await {
            Err(ActivityError::Validation { field_errors, .. }) => {
                assert_eq!(field_errors.len(), 1);
                assert!(field_errors.contains_key("occurredAt"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(ctx.balance(&owner).await, 0);
    }

    #[tokio::test]
    async fn intakes_need_a_schedule_of_the_same_identity() {
        let ctx = TestContext::new();
        let parent = ctx.create_parent("Ada").await;
        let child = ctx.create_child(parent.id, "Ike").await;
        let child_owner = OwnerRef::child(parent.id, &child.child_id);
        let parent_owner = OwnerRef::parent(parent.id);

        let schedule = ctx
            .services
            .medications
            .create(
                &child_owner,
                parent.id,
                payload::<ScheduleDetails>(json!({
                    "name": "Cetirizine",
                    "dose": "5ml",
                    "type": "Liquid",
                    "times": { "bedTime": "20:00" },
                    "fromDate": "2024-06-01",
                    "daysOfWeek": [1, 2, 3, 4, 5, 6, 7]
                })),
            )
            .await
            .unwrap();
        let intake = |schedule_id: Uuid| -> LogPayload<MedicationIntakeDetails> {
            payload(json!({
                "occurredAt": ctx.clock.now(),
                "scheduleId": schedule_id,
                "label": "BedTime",
                "status": "Taken"
            }))
        };

        for (owner, schedule_id) in [
            (&parent_owner, schedule.id),
            (&child_owner, Uuid::new_v4()),
        ] {
            match ctx.services.activity.create(owner, parent.id, intake(schedule_id)).await {
                Err(ActivityError::ScheduleNotFound(id)) => assert_eq!(id, schedule_id),
                other => panic!("expected missing schedule, got {:?}", other),
            }
        }
        assert_eq!(ctx.balance(&parent_owner).await, 0);

        let outcome = ctx
            .services
            .activity
            .create(&child_owner, parent.id, intake(schedule.id))
            .await
            .unwrap();
        assert_eq!(outcome.coins_earned, 10);
        assert_eq!(ctx.balance(&child_owner).await, 10);
    }
}
