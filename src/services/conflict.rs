use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::models::Appointment;
use crate::database::repositories::AppointmentRepository;

/// Two half-open intervals [s1,e1) and [s2,e2) overlap iff s1 < e2 && s2 < e1.
/// One inequality covers partial overlap from either side, containment and
/// identity; back-to-back slots sharing an endpoint do not conflict.
pub fn overlaps(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Availability conflict detection over active appointments. Used for new
/// bookings and for validating candidate reassignment slots.
#[derive(Clone)]
pub struct ConflictDetector {
    appointments: AppointmentRepository,
}

impl ConflictDetector {
    pub fn new(appointments: AppointmentRepository) -> Self {
        Self { appointments }
    }

    pub async fn find_conflicts(
        &self,
        clinic_id: Uuid,
        staff_id: Option<Uuid>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment: Option<Uuid>,
    ) -> Result<Vec<Appointment>> {
        self.appointments
            .find_conflicts(clinic_id, staff_id, start_time, end_time, exclude_appointment)
            .await
    }

    pub async fn slot_is_free(
        &self,
        clinic_id: Uuid,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment: Option<Uuid>,
    ) -> Result<bool> {
        let conflicts = self
            .find_conflicts(
                clinic_id,
                Some(staff_id),
                start_time,
                end_time,
                exclude_appointment,
            )
            .await?;
        Ok(conflicts.is_empty())
    }
}
