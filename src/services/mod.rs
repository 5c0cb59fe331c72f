pub mod achievement_service;
pub mod activity_service;
pub mod badge_service;
pub mod catalog;
pub mod coin_service;
pub mod medication_service;
pub mod profile_service;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::RewardsConfig;
use crate::database::SharedStore;

pub use achievement_service::{AchievementEvaluator, AchievementSummary, UnlockedAchievement};
pub use activity_service::{ActivityError, ActivityService, LogOutcome};
pub use badge_service::{BadgeService, Redemption};
pub use coin_service::{CoinLedger, DailyBonus};
pub use medication_service::{MedicationError, MedicationService};
pub use profile_service::{ProfileError, ProfileService};

/// All services wired over one store and one clock.
#[derive(Clone)]
pub struct Services {
    pub profiles: ProfileService,
    pub ledger: CoinLedger,
    pub achievements: AchievementEvaluator,
    pub activity: ActivityService,
    pub medications: MedicationService,
    pub badges: BadgeService,
}

impl Services {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, rewards: &RewardsConfig) -> Self {
        let ledger = CoinLedger::new(store.clone(), clock.clone(), rewards.daily_bonus_coins);
        let achievements =
            AchievementEvaluator::new(store.clone(), clock.clone(), ledger.clone(), rewards);

        Self {
            profiles: ProfileService::new(store.clone(), clock.clone()),
            medications: MedicationService::new(store.clone(), clock.clone()),
            activity: ActivityService::new(
                store.clone(),
                clock,
                ledger.clone(),
                achievements.clone(),
            ),
            badges: BadgeService::new(store, ledger.clone()),
            ledger,
            achievements,
        }
    }
}
