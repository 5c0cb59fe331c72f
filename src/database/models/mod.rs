pub mod activity;
pub mod identity;
pub mod ledger;
pub mod medication;
pub mod rewards;

pub use activity::{
    Category, CategoryFilter, CategoryInput, FieldErrors, HydrationDetails, LogDetails, LogPayload,
    LogQuery, LogRecord, MedicationIntakeDetails, MoodDetails, PainDetails,
};
pub use identity::{
    ActiveIdentity, ChildProfile, Household, IdentityKind, NewChild, NewParent, OwnerRef,
    ParentAccount,
};
pub use ledger::{
    AchievementGrant, CoinTransaction, Credit, Debit, DebitReceipt, LedgerTotals, TransactionKind,
};
pub use medication::{DoseTimes, MedicationForm, MedicationSchedule, ScheduleDetails, ScheduleStatus};
pub use rewards::{Achievement, AchievementAward, Badge, CriteriaKind, RedeemedBadge};
