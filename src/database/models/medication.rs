use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::FieldErrors;
use super::identity::OwnerRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MedicationForm {
    Capsule,
    Tablet,
    Liquid,
    Injection,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScheduleStatus {
    #[default]
    Active,
    Paused,
    Ended,
}

/// Dose times as `HH:MM`, one optional slot per label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseTimes {
    #[serde(default)]
    pub morning: Option<String>,
    #[serde(default)]
    pub afternoon: Option<String>,
    #[serde(default)]
    pub evening: Option<String>,
    #[serde(default)]
    pub bed_time: Option<String>,
}

impl DoseTimes {
    fn slots(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("morning", self.morning.as_deref()),
            ("afternoon", self.afternoon.as_deref()),
            ("evening", self.evening.as_deref()),
            ("bedTime", self.bed_time.as_deref()),
        ]
    }
}

fn default_true() -> bool {
    true
}

/// Editable fields of a medication schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDetails {
    pub name: String,
    pub dose: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(rename = "type")]
    pub form: MedicationForm,
    pub times: DoseTimes,
    pub from_date: NaiveDate,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    /// ISO weekdays, 1 = Monday .. 7 = Sunday.
    pub days_of_week: Vec<u8>,
    #[serde(default)]
    pub full_week_reminder: bool,
    #[serde(default = "default_true")]
    pub intake_tracking: bool,
    #[serde(default)]
    pub status: ScheduleStatus,
}

impl ScheduleDetails {
    pub fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.insert("name".into(), "name is required".into());
        }
        if self.dose.trim().is_empty() {
            errors.insert("dose".into(), "dose is required".into());
        }
        if self.days_of_week.is_empty() || self.days_of_week.iter().any(|d| !(1..=7).contains(d)) {
            errors.insert(
                "daysOfWeek".into(),
                "daysOfWeek must list weekdays between 1 and 7".into(),
            );
        }
        if self.to_date.map_or(false, |to| to < self.from_date) {
            errors.insert("toDate".into(), "toDate cannot be before fromDate".into());
        }
        for (slot, time) in self.times.slots() {
            if let Some(time) = time {
                if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
                    errors.insert(format!("times.{}", slot), format!("{} must be HH:MM", slot));
                }
            }
        }
        errors
    }

    /// Trim text fields and keep weekdays sorted and unique.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.dose = self.dose.trim().to_string();
        self.reason = self
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        self.days_of_week.sort_unstable();
        self.days_of_week.dedup();
        self
    }
}

/// A medication schedule. Intakes may only reference schedules of their own identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSchedule {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub created_by_parent_id: Uuid,
    #[serde(flatten)]
    pub details: ScheduleDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
