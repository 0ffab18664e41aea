use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

/// The bulk staff-unavailability event. Counters are maintained
/// transactionally by the orchestrator, never recomputed from cases.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UnavailabilityOperation {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub staff_id: Uuid,
    pub initiated_by: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: UnavailabilityReason,
    pub detail: Option<String>,
    pub status: OperationStatus,
    pub total_appointments: i32,
    pub cancelled_count: i32,
    pub reassigned_count: i32,
    pub failed_count: i32,
    pub leave_days_debited: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    pub enum UnavailabilityReason {
        SickLeave => "sick_leave",
        Emergency => "emergency",
        Vacation => "vacation",
        Other => "other",
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    pub enum OperationStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInput {
    pub clinic_id: Uuid,
    pub staff_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: UnavailabilityReason,
    pub detail: Option<String>,
}

/// Aggregate counter snapshot returned by `get_operation_stats`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub id: Uuid,
    pub status: OperationStatus,
    pub total_appointments: i32,
    pub cancelled_count: i32,
    pub reassigned_count: i32,
    pub failed_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UnavailabilityOperation {
    pub fn resolved_count(&self) -> i32 {
        self.cancelled_count + self.reassigned_count + self.failed_count
    }

    /// Counter invariant: resolved cases never exceed the batch size.
    pub fn counters_consistent(&self) -> bool {
        self.resolved_count() <= self.total_appointments
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.resolved_count() >= self.total_appointments
    }
}
