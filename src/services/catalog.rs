use tracing::info;
use uuid::Uuid;

use crate::database::models::{Achievement, Badge, CategoryFilter, CriteriaKind};
use crate::database::{SharedStore, StoreError};

fn achievement(
    title: &str,
    description: &str,
    icon: &str,
    criteria_kind: CriteriaKind,
    criteria_value: i64,
    category_filter: CategoryFilter,
    reward_coins: i64,
) -> Achievement {
    Achievement {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        criteria_kind,
        criteria_value,
        category_filter,
        reward_coins,
        active: true,
    }
}

fn badge(title: &str, description: &str, icon: &str, coin_cost: i64) -> Badge {
    Badge {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        coin_cost,
        active: true,
    }
}

pub fn default_achievements() -> Vec<Achievement> {
    use CategoryFilter::*;
    use CriteriaKind::*;

    vec![
        achievement("First Steps", "Save your first log", "🌱", TotalLogs, 1, Any, 10),
        achievement("Pain Tracker", "Record 5 pain entries", "🩹", TotalLogs, 5, Pain, 50),
        achievement("Mood Explorer", "Log your mood 10 times", "🌈", TotalLogs, 10, Mood, 50),
        achievement("Hydration Hero", "Log water 20 times", "💧", TotalLogs, 20, Hydration, 75),
        achievement("Med Master", "Record 30 medication doses", "💊", TotalLogs, 30, Medication, 100),
        achievement("On a Roll", "Log something 3 days in a row", "🔥", Streak, 3, Any, 30),
        achievement("Week Warrior", "Log something 7 days in a row", "🏆", Streak, 7, Any, 100),
        achievement("Steady Sipper", "Log water 5 days in a row", "🥤", Streak, 5, Hydration, 50),
        achievement("Busy Month", "Save 40 logs within 30 days", "📅", MonthlyLogs, 40, Any, 150),
    ]
}

pub fn default_badges() -> Vec<Badge> {
    vec![
        badge("Bright Star", "A star for showing up", "⭐", 50),
        badge("Brave Heart", "For facing the tough days", "💖", 100),
        badge("Focus Badge", "Stayed on top of your care", "🎯", 200),
        badge("Super Sipper", "Hydration champion", "🌊", 300),
        badge("Champion Crown", "The family's top tracker", "👑", 500),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub achievements: usize,
    pub badges: usize,
}

/// Insert the default catalogs into whichever of them is empty.
pub async fn seed_if_empty(store: &SharedStore) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    if store.active_achievements().await?.is_empty() {
        for achievement in default_achievements() {
            store.insert_achievement(&achievement).await?;
            report.achievements += 1;
        }
    }

    if store.active_badges().await?.is_empty() {
        for badge in default_badges() {
            store.insert_badge(&badge).await?;
            report.badges += 1;
        }
    }

    if report != SeedReport::default() {
        info!(
            "Seeded {} achievements and {} badges",
            report.achievements, report.badges
        );
    }
    Ok(report)
}
