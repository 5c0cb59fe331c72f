//! Medication schedules, owned by one identity like its logs.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::{FieldErrors, MedicationSchedule, OwnerRef, ScheduleDetails};
use crate::database::{SharedStore, StoreError};

#[derive(Debug, Error)]
pub enum MedicationError {
    #[error("Invalid medication schedule")]
    Validation(FieldErrors),

    #[error("Medication schedule {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn checked(details: ScheduleDetails) -> Result<ScheduleDetails, MedicationError> {
    let field_errors = details.field_errors();
    if field_errors.is_empty() {
        Ok(details.normalized())
    } else {
        Err(MedicationError::Validation(field_errors))
    }
}

#[derive(Clone)]
pub struct MedicationService {
    store: SharedStore,
    clock: Arc<dyn Clock>,
}

impl MedicationService {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self, owner: &OwnerRef) -> Result<Vec<MedicationSchedule>, MedicationError> {
        Ok(self.store.list_schedules(owner).await?)
    }

    pub async fn create(
        &self,
        owner: &OwnerRef,
        created_by: Uuid,
        details: ScheduleDetails,
    ) -> Result<MedicationSchedule, MedicationError> {
        let now = self.clock.now();
        let schedule = MedicationSchedule {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            created_by_parent_id: created_by,
            details: checked(details)?,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_schedule(&schedule).await?;
        info!(
            "Medication schedule {} ('{}') added for {}",
            schedule.id, schedule.details.name, owner
        );
        Ok(schedule)
    }

    pub async fn update(
        &self,
        owner: &OwnerRef,
        id: Uuid,
        details: ScheduleDetails,
    ) -> Result<MedicationSchedule, MedicationError> {
        let details = checked(details)?;
        self.store
            .update_schedule(owner, id, &details, self.clock.now())
            .await?
            .ok_or(MedicationError::NotFound(id))
    }

    pub async fn delete(&self, owner: &OwnerRef, id: Uuid) -> Result<(), MedicationError> {
        if !self.store.delete_schedule(owner, id).await? {
            return Err(MedicationError::NotFound(id));
        }
        info!("Medication schedule {} deleted by {}", id, owner);
        Ok(())
    }
}
