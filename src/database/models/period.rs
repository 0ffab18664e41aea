use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::operation::UnavailabilityReason;

/// A calendar block consumed by availability queries. Created together with
/// its operation so the staff calendar reflects the absence before execution.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UnavailabilityPeriod {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub clinic_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: UnavailabilityReason,
    pub operation_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PeriodInput {
    pub staff_id: Uuid,
    pub clinic_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: UnavailabilityReason,
    pub operation_id: Option<Uuid>,
    pub notes: Option<String>,
}
