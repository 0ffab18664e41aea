use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;
use crate::error::AppError;

/// Per-appointment reassignment lifecycle. Transitions are enforced here so
/// every caller (orchestrator, patient-response handlers) goes through the
/// same graph; anything outside it is an `InvalidStateTransition`, never a
/// silent no-op.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReassignmentCase {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub appointment_id: Uuid,
    pub original_staff_id: Uuid,
    pub candidate_staff_id: Option<Uuid>,
    pub original_start_time: DateTime<Utc>,
    pub proposed_start_time: Option<DateTime<Utc>>,
    pub status: CaseStatus,
    pub notification_channel: Option<String>,
    pub notified_at: Option<DateTime<Utc>>,
    pub patient_responded_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub failure_reason: Option<String>,
    /// Optimistic concurrency token; bumped on every persisted update.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    pub enum CaseStatus {
        Pending => "pending",
        PatientNotified => "patient_notified",
        PatientApproved => "patient_approved",
        PatientRejected => "patient_rejected",
        Completed => "completed",
        Failed => "failed",
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    pub enum CaseFailureReason {
        NoAlternateStaff => "no_alternate_staff",
        NoAvailableSlot => "no_available_slot",
        DeliveryFailed => "delivery_failed",
        PatientRejected => "patient_rejected",
        AppointmentGone => "appointment_gone",
        Internal => "internal_error",
    }
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Completed | CaseStatus::Failed)
    }
}

impl ReassignmentCase {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Attach a candidate staff/slot to a freshly created case. Allowed only
    /// while pending; the status itself does not change until the patient
    /// has been notified.
    pub fn propose(
        &mut self,
        candidate_staff_id: Uuid,
        proposed_start_time: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status != CaseStatus::Pending {
            return Err(AppError::invalid_transition(
                "reassignment_case",
                self.status,
                "pending+candidate",
            ));
        }
        self.candidate_staff_id = Some(candidate_staff_id);
        self.proposed_start_time = Some(proposed_start_time);
        Ok(())
    }

    /// Record the notification attempt. Delivery success moves the case to
    /// `patient_notified`; a delivery error degrades it to `failed`.
    pub fn notify_patient(
        &mut self,
        delivered: bool,
        channel: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status != CaseStatus::Pending || self.candidate_staff_id.is_none() {
            return Err(AppError::invalid_transition(
                "reassignment_case",
                self.status,
                CaseStatus::PatientNotified,
            ));
        }
        self.notification_channel = Some(channel.to_string());
        self.notified_at = Some(now);
        if delivered {
            self.status = CaseStatus::PatientNotified;
        } else {
            self.status = CaseStatus::Failed;
            self.failure_reason = Some(CaseFailureReason::DeliveryFailed.to_string());
        }
        Ok(())
    }

    pub fn record_approval(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != CaseStatus::PatientNotified {
            return Err(AppError::invalid_transition(
                "reassignment_case",
                self.status,
                CaseStatus::PatientApproved,
            ));
        }
        self.status = CaseStatus::PatientApproved;
        self.patient_responded_at = Some(now);
        Ok(())
    }

    pub fn record_rejection(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != CaseStatus::PatientNotified {
            return Err(AppError::invalid_transition(
                "reassignment_case",
                self.status,
                CaseStatus::PatientRejected,
            ));
        }
        self.status = CaseStatus::PatientRejected;
        self.rejection_reason = Some(reason.to_string());
        self.patient_responded_at = Some(now);
        Ok(())
    }

    /// Close an approved case once the appointment has been updated.
    pub fn complete(&mut self) -> Result<(), AppError> {
        if self.status != CaseStatus::PatientApproved {
            return Err(AppError::invalid_transition(
                "reassignment_case",
                self.status,
                CaseStatus::Completed,
            ));
        }
        self.status = CaseStatus::Completed;
        Ok(())
    }

    /// Degrade any non-terminal case to `failed`.
    pub fn fail(&mut self, reason: CaseFailureReason) -> Result<(), AppError> {
        if self.is_terminal() {
            return Err(AppError::invalid_transition(
                "reassignment_case",
                self.status,
                CaseStatus::Failed,
            ));
        }
        self.status = CaseStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        Ok(())
    }
}
