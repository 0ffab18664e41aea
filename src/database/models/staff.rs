use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub leave_balance_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A qualified alternate staff member as loaded for the planner: capable of
/// the service, same clinic, not blocked by an unavailability period.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateStaff {
    pub id: Uuid,
    pub name: String,
    /// Appointments already assigned on the day being planned; first
    /// tie-break key (fewest wins).
    pub day_load: i64,
}
