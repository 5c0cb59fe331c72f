use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::activity::CategoryFilter;
use super::identity::OwnerRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaKind {
    Streak,
    TotalLogs,
    MonthlyLogs,
}

impl CriteriaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaKind::Streak => "streak",
            CriteriaKind::TotalLogs => "total_logs",
            CriteriaKind::MonthlyLogs => "monthly_logs",
        }
    }
}

impl FromStr for CriteriaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streak" => Ok(CriteriaKind::Streak),
            "total_logs" => Ok(CriteriaKind::TotalLogs),
            "monthly_logs" => Ok(CriteriaKind::MonthlyLogs),
            other => Err(format!("unknown criteria kind '{}'", other)),
        }
    }
}

/// Catalog entry. Admin-managed; the service only reads it (and seeds defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub criteria_kind: CriteriaKind,
    pub criteria_value: i64,
    pub category_filter: CategoryFilter,
    pub reward_coins: i64,
    pub active: bool,
}

/// Fact: `achievement_id` was awarded to `owner`. Unique on the pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementAward {
    pub owner: OwnerRef,
    pub achievement_id: Uuid,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub coin_cost: i64,
    pub active: bool,
}

/// A badge bought by an identity. Unique on `(owner, badge)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedBadge {
    #[serde(flatten)]
    pub badge: Badge,
    pub redeemed_at: DateTime<Utc>,
}
