use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::identity::OwnerRef;

/// Activity-log taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pain,
    Mood,
    Hydration,
    Medication,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Pain,
        Category::Mood,
        Category::Hydration,
        Category::Medication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pain => "pain",
            Category::Mood => "mood",
            Category::Hydration => "hydration",
            Category::Medication => "medication",
        }
    }

    /// Ledger reason for the daily bonus; part of the daily dedup key.
    pub fn coin_reason(&self) -> &'static str {
        match self {
            Category::Pain => "Logged pain entry",
            Category::Mood => "Logged mood",
            Category::Hydration => "Logged hydration",
            Category::Medication => "Recorded medication intake",
        }
    }

    /// Message shown when a log is saved without unlocking anything.
    pub fn saved_message(&self) -> &'static str {
        match self {
            Category::Pain => "Pain log saved",
            Category::Mood => "Mood log saved",
            Category::Hydration => "Hydration logged!",
            Category::Medication => "Medicine logged!",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pain" => Ok(Category::Pain),
            "mood" => Ok(Category::Mood),
            "hydration" => Ok(Category::Hydration),
            "medication" => Ok(Category::Medication),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Category restriction used by achievement criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    Any,
    Pain,
    Mood,
    Hydration,
    Medication,
}

impl CategoryFilter {
    pub fn category(&self) -> Option<Category> {
        match self {
            CategoryFilter::Any => None,
            CategoryFilter::Pain => Some(Category::Pain),
            CategoryFilter::Mood => Some(Category::Mood),
            CategoryFilter::Hydration => Some(Category::Hydration),
            CategoryFilter::Medication => Some(Category::Medication),
        }
    }

    pub fn matches(&self, category: Category) -> bool {
        self.category().map_or(true, |c| c == category)
    }

    pub fn as_str(&self) -> &'static str {
        self.category().map_or("any", |c| c.as_str())
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "any" {
            return Ok(CategoryFilter::Any);
        }
        Ok(match s.parse::<Category>()? {
            Category::Pain => CategoryFilter::Pain,
            Category::Mood => CategoryFilter::Mood,
            Category::Hydration => CategoryFilter::Hydration,
            Category::Medication => CategoryFilter::Medication,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PainDetails {
    pub location: String,
    pub pain_type: String,
    pub intensity: u8,
    #[serde(default)]
    pub mood_emoji: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodDetails {
    pub emoji: String,
    pub intensity: u8,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HydrationKind {
    Glass,
    Bottle,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationDetails {
    pub amount_oz: f64,
    pub kind: HydrationKind,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoseLabel {
    Morning,
    Afternoon,
    Evening,
    BedTime,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeStatus {
    Taken,
    Late,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationIntakeDetails {
    pub schedule_id: Uuid,
    pub label: DoseLabel,
    pub status: IntakeStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Category-specific fields of a log, tagged with the category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum LogDetails {
    Pain(PainDetails),
    Mood(MoodDetails),
    Hydration(HydrationDetails),
    Medication(MedicationIntakeDetails),
}

impl LogDetails {
    pub fn category(&self) -> Category {
        match self {
            LogDetails::Pain(_) => Category::Pain,
            LogDetails::Mood(_) => Category::Mood,
            LogDetails::Hydration(_) => Category::Hydration,
            LogDetails::Medication(_) => Category::Medication,
        }
    }
}

/// A stored activity log. The owner is fixed at creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub recorded_by_parent_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: LogDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogRecord {
    pub fn category(&self) -> Category {
        self.details.category()
    }
}

/// Filters for listing logs of one category.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub type FieldErrors = HashMap<String, String>;

/// Request body for creating or updating a log: the timestamp plus the category
/// fields at the top level. `occurredAt` is required on create and optional on update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPayload<T> {
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: T,
}

impl<T: CategoryInput> LogPayload<T> {
    /// Field errors for a new log.
    pub fn create_errors(&self) -> FieldErrors {
        let mut errors = self.details.field_errors();
        if self.occurred_at.is_none() {
            errors.insert("occurredAt".into(), "occurredAt is required".into());
        }
        errors
    }
}

/// Implemented by each category's request payload.
pub trait CategoryInput: DeserializeOwned + Send + 'static {
    const CATEGORY: Category;

    fn field_errors(&self) -> FieldErrors;

    fn into_details(self) -> LogDetails;

    /// Medication schedule the log refers to, if any.
    fn schedule_id(&self) -> Option<Uuid> {
        None
    }
}

fn require_text(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), format!("{} is required", field));
    }
}

fn check_range(errors: &mut FieldErrors, field: &str, value: u8, min: u8, max: u8) {
    if value < min || value > max {
        errors.insert(
            field.to_string(),
            format!("{} must be between {} and {}", field, min, max),
        );
    }
}

impl CategoryInput for PainDetails {
    const CATEGORY: Category = Category::Pain;

    fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "location", &self.location);
        require_text(&mut errors, "painType", &self.pain_type);
        check_range(&mut errors, "intensity", self.intensity, 0, 10);
        errors
    }

    fn into_details(mut self) -> LogDetails {
        self.pain_type = self.pain_type.trim().to_string();
        LogDetails::Pain(self)
    }
}

impl CategoryInput for MoodDetails {
    const CATEGORY: Category = Category::Mood;

    fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "emoji", &self.emoji);
        check_range(&mut errors, "intensity", self.intensity, 1, 10);
        errors
    }

    fn into_details(self) -> LogDetails {
        LogDetails::Mood(self)
    }
}

impl CategoryInput for HydrationDetails {
    const CATEGORY: Category = Category::Hydration;

    fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if !self.amount_oz.is_finite() || self.amount_oz < 0.1 {
            errors.insert("amountOz".into(), "amountOz must be at least 0.1".into());
        }
        if self.quantity == Some(0) {
            errors.insert("quantity".into(), "quantity must be at least 1".into());
        }
        if self.note.as_deref().map_or(false, |n| n.trim().chars().count() > 200) {
            errors.insert("note".into(), "note cannot exceed 200 characters".into());
        }
        errors
    }

    fn into_details(mut self) -> LogDetails {
        self.note = self
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        LogDetails::Hydration(self)
    }
}

impl CategoryInput for MedicationIntakeDetails {
    const CATEGORY: Category = Category::Medication;

    fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.schedule_id.is_nil() {
            errors.insert("scheduleId".into(), "scheduleId is required".into());
        }
        errors
    }

    fn into_details(self) -> LogDetails {
        LogDetails::Medication(self)
    }

    fn schedule_id(&self) -> Option<Uuid> {
        Some(self.schedule_id)
    }
}
