use serde_json::json;
use uuid::Uuid;

use crate::database::models::{Activity, CreateActivityInput, EntityType};
use crate::database::repositories::ActivityRepository;
use crate::error::AppError;
use crate::services::policy::Actor;

/// Explicit domain events emitted by the orchestrator at every state change.
/// Persisting them here keeps the audit trail out of the models; nothing is
/// logged implicitly on save.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    OperationCreated {
        operation_id: Uuid,
        staff_id: Uuid,
        reason: String,
    },
    OperationExecuted {
        operation_id: Uuid,
        total: i32,
    },
    OperationCompleted {
        operation_id: Uuid,
    },
    OperationCancelled {
        operation_id: Uuid,
        leave_days_credited: i32,
    },
    CasePlanned {
        operation_id: Uuid,
        case_id: Uuid,
        candidate_staff_id: Uuid,
    },
    CaseNotified {
        case_id: Uuid,
        channel: String,
    },
    CaseApproved {
        case_id: Uuid,
        appointment_id: Uuid,
    },
    CaseRejected {
        case_id: Uuid,
        reason: String,
    },
    CaseFailed {
        case_id: Uuid,
        reason: String,
    },
    AppointmentCancelled {
        appointment_id: Uuid,
        reason: String,
    },
}

impl DomainEvent {
    fn parts(&self) -> (&'static str, Uuid, &'static str, String, serde_json::Value) {
        match self {
            DomainEvent::OperationCreated {
                operation_id,
                staff_id,
                reason,
            } => (
                EntityType::OPERATION,
                *operation_id,
                "created",
                format!("Unavailability operation created for staff {}", staff_id),
                json!({ "staffId": staff_id, "reason": reason }),
            ),
            DomainEvent::OperationExecuted {
                operation_id,
                total,
            } => (
                EntityType::OPERATION,
                *operation_id,
                "executed",
                format!("Operation executed over {} appointment(s)", total),
                json!({ "total": total }),
            ),
            DomainEvent::OperationCompleted { operation_id } => (
                EntityType::OPERATION,
                *operation_id,
                "completed",
                "All cases resolved; operation completed".to_string(),
                json!({}),
            ),
            DomainEvent::OperationCancelled {
                operation_id,
                leave_days_credited,
            } => (
                EntityType::OPERATION,
                *operation_id,
                "cancelled",
                "Operation cancelled while pending".to_string(),
                json!({ "leaveDaysCredited": leave_days_credited }),
            ),
            DomainEvent::CasePlanned {
                operation_id,
                case_id,
                candidate_staff_id,
            } => (
                EntityType::CASE,
                *case_id,
                "planned",
                format!("Candidate {} proposed", candidate_staff_id),
                json!({ "operationId": operation_id, "candidateStaffId": candidate_staff_id }),
            ),
            DomainEvent::CaseNotified { case_id, channel } => (
                EntityType::CASE,
                *case_id,
                "patient_notified",
                format!("Patient notified via {}", channel),
                json!({ "channel": channel }),
            ),
            DomainEvent::CaseApproved {
                case_id,
                appointment_id,
            } => (
                EntityType::CASE,
                *case_id,
                "patient_approved",
                "Patient approved the reassignment".to_string(),
                json!({ "appointmentId": appointment_id }),
            ),
            DomainEvent::CaseRejected { case_id, reason } => (
                EntityType::CASE,
                *case_id,
                "patient_rejected",
                format!("Patient rejected the reassignment: {}", reason),
                json!({ "reason": reason }),
            ),
            DomainEvent::CaseFailed { case_id, reason } => (
                EntityType::CASE,
                *case_id,
                "failed",
                format!("Case failed: {}", reason),
                json!({ "reason": reason }),
            ),
            DomainEvent::AppointmentCancelled {
                appointment_id,
                reason,
            } => (
                EntityType::APPOINTMENT,
                *appointment_id,
                "cancelled",
                format!("Appointment cancelled: {}", reason),
                json!({ "reason": reason }),
            ),
        }
    }
}

/// Consumes domain events and persists them as activity rows. Audit writes
/// are best effort: a failed insert is logged, never bubbled into the
/// workflow that emitted the event.
#[derive(Clone)]
pub struct AuditLogger {
    repository: ActivityRepository,
}

impl AuditLogger {
    pub fn new(repository: ActivityRepository) -> Self {
        Self { repository }
    }

    pub async fn record(&self, actor: Option<&Actor>, clinic_id: Uuid, event: DomainEvent) {
        let (entity_type, entity_id, action, description, metadata) = event.parts();

        let input = CreateActivityInput {
            clinic_id,
            actor_id: actor.map(|a| a.user_id),
            entity_type: entity_type.to_string(),
            entity_id,
            action: action.to_string(),
            description,
            metadata: Some(metadata),
        };

        if let Err(err) = self.repository.log_activity(input).await {
            log::warn!("Failed to record audit event {}/{}: {}", entity_type, action, err);
        }
    }

    /// Recorded trail for one entity, newest first.
    pub async fn history(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<Vec<Activity>, AppError> {
        Ok(self.repository.list_for_entity(entity_type, entity_id, None).await?)
    }
}
