use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::activity::Category;
use super::identity::OwnerRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Earn,
    Spend,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Earn => "EARN",
            TransactionKind::Spend => "SPEND",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EARN" => Ok(TransactionKind::Earn),
            "SPEND" => Ok(TransactionKind::Spend),
            other => Err(format!("unknown transaction kind '{}'", other)),
        }
    }
}

/// One append-only ledger entry. `amount` is always positive; `kind` carries the sign.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinTransaction {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub performed_by_parent_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub amount: i64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_id: Option<Uuid>,
    /// UTC day this entry claims for the once-per-day bonus, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_day: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

impl CoinTransaction {
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionKind::Earn => self.amount,
            TransactionKind::Spend => -self.amount,
        }
    }
}

/// Earn request. When `bonus_day` is set, `(owner, reason, bonus_day)` must be unique
/// and a repeat is reported as "nothing credited" instead of an error.
#[derive(Debug, Clone)]
pub struct Credit {
    pub owner: OwnerRef,
    pub performed_by_parent_id: Option<Uuid>,
    pub amount: i64,
    pub reason: String,
    pub category: Option<Category>,
    pub bonus_day: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Spend request. With `badge_id` set the badge redemption is recorded in the same unit.
#[derive(Debug, Clone)]
pub struct Debit {
    pub owner: OwnerRef,
    pub performed_by_parent_id: Option<Uuid>,
    pub amount: i64,
    pub reason: String,
    pub badge_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

/// A committed spend and the balance it left behind.
#[derive(Debug, Clone)]
pub struct DebitReceipt {
    pub entry: CoinTransaction,
    pub balance: i64,
}

/// Achievement award plus its (possibly zero) coin reward, applied as one unit.
#[derive(Debug, Clone)]
pub struct AchievementGrant {
    pub owner: OwnerRef,
    pub achievement_id: Uuid,
    pub reward_coins: i64,
    pub reason: String,
    pub performed_by_parent_id: Option<Uuid>,
    pub awarded_at: DateTime<Utc>,
}

/// Aggregate view of an identity's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTotals {
    pub balance: i64,
    pub earned: i64,
    pub spent: i64,
}

impl LedgerTotals {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.earned - self.spent
    }
}
