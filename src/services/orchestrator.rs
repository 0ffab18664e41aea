use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{
    Activity, Appointment, CaseFailureReason, EntityType, OperationInput, OperationStats,
    OperationStatus, PeriodInput, ReassignmentCase, UnavailabilityOperation,
    UnavailabilityReason,
};
use crate::database::repositories::{
    AppointmentRepository, CaseRepository, OperationRepository, PeriodRepository, StaffRepository,
    operation::CounterField,
};
use crate::error::AppError;
use crate::services::audit::{AuditLogger, DomainEvent};
use crate::services::ledger::LeaveLedger;
use crate::services::notification::{CaseNotification, NotificationGateway};
use crate::services::planner::{PlanFailure, Proposal, ReassignmentPlanner};
use crate::services::policy::{AccessPolicy, Actor};

const CANCELLED_NO_CANDIDATE: &str = "staff_unavailable_no_reassignment";
const CANCELLED_NOTIFICATION_FAILED: &str = "staff_unavailable_notification_failed";
const CANCELLED_PATIENT_REJECTED: &str = "staff_unavailable_patient_rejected";
const CANCELLED_SLOT_TAKEN: &str = "staff_unavailable_candidate_slot_taken";

/// Half-open UTC window covering an inclusive date range.
pub fn operation_window(start_date: NaiveDate, end_date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_date.and_time(NaiveTime::MIN).and_utc();
    let end = (end_date + chrono::Duration::days(1))
        .and_time(NaiveTime::MIN)
        .and_utc();
    (start, end)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplannableAppointment {
    pub appointment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub reason: String,
}

/// Result of the read-only `preview`: what `execute` would do right now.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPreview {
    pub staff_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_affected: usize,
    pub proposals: Vec<Proposal>,
    pub unplannable: Vec<UnplannableAppointment>,
}

/// Coordinates planner, ledger, cases and the notification gateway. Owns the
/// aggregate counters and the operation status; every counter change rides
/// the same transaction as the case/appointment transition it accounts for.
#[derive(Clone)]
pub struct OperationOrchestrator {
    pool: PgPool,
    operations: OperationRepository,
    cases: CaseRepository,
    appointments: AppointmentRepository,
    periods: PeriodRepository,
    staff: StaffRepository,
    planner: ReassignmentPlanner,
    ledger: LeaveLedger,
    gateway: Arc<dyn NotificationGateway>,
    audit: AuditLogger,
    access: AccessPolicy,
}

impl OperationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        operations: OperationRepository,
        cases: CaseRepository,
        appointments: AppointmentRepository,
        periods: PeriodRepository,
        staff: StaffRepository,
        planner: ReassignmentPlanner,
        ledger: LeaveLedger,
        gateway: Arc<dyn NotificationGateway>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            pool,
            operations,
            cases,
            appointments,
            periods,
            staff,
            planner,
            ledger,
            gateway,
            audit,
            access: AccessPolicy,
        }
    }

    /// Read-only dry run: plans every affected appointment, persists nothing.
    pub async fn preview(
        &self,
        actor: &Actor,
        clinic_id: Uuid,
        staff_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<OperationPreview, AppError> {
        self.access.authorize_manage(actor, clinic_id)?;
        validate_range(start_date, end_date)?;

        let (window_start, window_end) = operation_window(start_date, end_date);
        let affected = self
            .appointments
            .find_active_for_staff_in_window(staff_id, clinic_id, window_start, window_end)
            .await?;

        let mut proposals = Vec::new();
        let mut unplannable = Vec::new();
        for appointment in &affected {
            match self.planner.plan_for(appointment, &[staff_id]).await? {
                Ok(proposal) => proposals.push(proposal),
                Err(failure) => unplannable.push(UnplannableAppointment {
                    appointment_id: appointment.id,
                    start_time: appointment.start_time,
                    reason: failure.as_case_reason().to_string(),
                }),
            }
        }

        Ok(OperationPreview {
            staff_id,
            start_date,
            end_date,
            total_affected: affected.len(),
            proposals,
            unplannable,
        })
    }

    /// Persist a pending operation together with its calendar block, debiting
    /// leave up front for vacations.
    pub async fn create(
        &self,
        actor: &Actor,
        input: OperationInput,
    ) -> Result<UnavailabilityOperation, AppError> {
        self.access.authorize_manage(actor, input.clinic_id)?;
        validate_range(input.start_date, input.end_date)?;

        let staff = self
            .staff
            .find_by_id(input.staff_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", input.staff_id)))?;
        if staff.clinic_id != input.clinic_id {
            return Err(AppError::Validation(
                "Staff member does not belong to this clinic".to_string(),
            ));
        }

        let overlapping = self
            .periods
            .find_overlapping(input.staff_id, input.start_date, input.end_date)
            .await?;
        if !overlapping.is_empty() {
            return Err(AppError::Validation(format!(
                "Staff {} already has an unavailability period overlapping {}..{}",
                input.staff_id, input.start_date, input.end_date
            )));
        }

        let mut tx = self.pool.begin().await?;

        // Leave is spent at creation time; cancelling while pending credits
        // it back exactly.
        let debited = if input.reason == UnavailabilityReason::Vacation {
            self.ledger
                .debit(&mut tx, input.staff_id, input.start_date, input.end_date)
                .await?
        } else {
            0
        };

        let operation = self
            .operations
            .create(&mut tx, &input, actor.user_id, debited)
            .await?;

        self.periods
            .create(
                &mut tx,
                &PeriodInput {
                    staff_id: input.staff_id,
                    clinic_id: input.clinic_id,
                    start_date: input.start_date,
                    end_date: input.end_date,
                    reason: input.reason,
                    operation_id: Some(operation.id),
                    notes: input.detail.clone(),
                },
            )
            .await?;

        tx.commit().await?;

        self.audit
            .record(
                Some(actor),
                operation.clinic_id,
                DomainEvent::OperationCreated {
                    operation_id: operation.id,
                    staff_id: operation.staff_id,
                    reason: operation.reason.to_string(),
                },
            )
            .await;

        Ok(operation)
    }

    /// Drive a pending operation through every affected appointment. Each
    /// appointment is an independent transactional unit; one failure degrades
    /// that case and the loop moves on.
    pub async fn execute(
        &self,
        actor: &Actor,
        operation_id: Uuid,
    ) -> Result<UnavailabilityOperation, AppError> {
        let operation = self.require_operation(operation_id).await?;
        self.access.authorize_manage(actor, operation.clinic_id)?;

        if operation.status != OperationStatus::Pending {
            return Err(AppError::invalid_transition(
                "unavailability_operation",
                operation.status,
                OperationStatus::InProgress,
            ));
        }

        let (window_start, window_end) =
            operation_window(operation.start_date, operation.end_date);
        let affected = self
            .appointments
            .find_active_for_staff_in_window(
                operation.staff_id,
                operation.clinic_id,
                window_start,
                window_end,
            )
            .await?;

        let operation = self
            .operations
            .mark_in_progress(operation_id, affected.len() as i32, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::ConcurrencyConflict(format!(
                    "Operation {} is no longer pending",
                    operation_id
                ))
            })?;

        self.audit
            .record(
                Some(actor),
                operation.clinic_id,
                DomainEvent::OperationExecuted {
                    operation_id,
                    total: affected.len() as i32,
                },
            )
            .await;

        for appointment in &affected {
            match self.process_one_appointment(&operation, appointment).await {
                Ok(events) => self.emit_all(Some(actor), operation.clinic_id, events).await,
                Err(err) => {
                    log::error!(
                        "Failed to process appointment {} for operation {}: {}",
                        appointment.id,
                        operation_id,
                        err
                    );
                    let events = self
                        .record_processing_failure(&operation, appointment)
                        .await;
                    self.emit_all(Some(actor), operation.clinic_id, events).await;
                }
            }
        }

        self.finish_if_resolved(Some(actor), operation.clinic_id, operation_id)
            .await?;

        self.require_operation(operation_id).await
    }

    /// Cancel a pending operation: credit back any debited leave and remove
    /// the calendar block.
    pub async fn cancel(
        &self,
        actor: &Actor,
        operation_id: Uuid,
    ) -> Result<UnavailabilityOperation, AppError> {
        let operation = self.require_operation(operation_id).await?;
        self.access.authorize_manage(actor, operation.clinic_id)?;

        let mut tx = self.pool.begin().await?;

        let cancelled = self
            .operations
            .mark_cancelled(&mut tx, operation_id)
            .await?
            .ok_or_else(|| {
                AppError::invalid_transition(
                    "unavailability_operation",
                    operation.status,
                    OperationStatus::Cancelled,
                )
            })?;

        if cancelled.leave_days_debited > 0 {
            self.ledger
                .credit(&mut tx, cancelled.staff_id, cancelled.leave_days_debited)
                .await?;
        }
        self.periods.delete_by_operation(&mut tx, operation_id).await?;

        tx.commit().await?;

        self.audit
            .record(
                Some(actor),
                cancelled.clinic_id,
                DomainEvent::OperationCancelled {
                    operation_id,
                    leave_days_credited: cancelled.leave_days_debited,
                },
            )
            .await;

        Ok(cancelled)
    }

    pub async fn get_operation(
        &self,
        actor: &Actor,
        operation_id: Uuid,
    ) -> Result<UnavailabilityOperation, AppError> {
        let operation = self.require_operation(operation_id).await?;
        self.access.authorize_manage(actor, operation.clinic_id)?;
        Ok(operation)
    }

    pub async fn list_cases(
        &self,
        actor: &Actor,
        operation_id: Uuid,
    ) -> Result<Vec<ReassignmentCase>, AppError> {
        let operation = self.require_operation(operation_id).await?;
        self.access.authorize_manage(actor, operation.clinic_id)?;
        Ok(self.cases.find_by_operation(operation_id).await?)
    }

    /// Audit trail of one operation, newest first.
    pub async fn operation_activity(
        &self,
        actor: &Actor,
        operation_id: Uuid,
    ) -> Result<Vec<Activity>, AppError> {
        let operation = self.require_operation(operation_id).await?;
        self.access.authorize_manage(actor, operation.clinic_id)?;
        self.audit.history(EntityType::OPERATION, operation_id).await
    }

    pub async fn get_stats(
        &self,
        actor: &Actor,
        operation_id: Uuid,
    ) -> Result<OperationStats, AppError> {
        let operation = self.require_operation(operation_id).await?;
        self.access.authorize_manage(actor, operation.clinic_id)?;

        self.operations
            .stats(operation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Operation {} not found", operation_id)))
    }

    /// Patient accepted the proposal: apply the new staff/slot to the
    /// appointment and complete the case. Retried once on a stale version.
    pub async fn process_patient_approval(
        &self,
        case_id: Uuid,
    ) -> Result<ReassignmentCase, AppError> {
        self.with_conflict_retry(|| self.try_approval(case_id)).await
    }

    /// Patient declined: depending on policy either cancel the appointment
    /// or re-plan with the next candidate. Retried once on a stale version.
    pub async fn process_patient_rejection(
        &self,
        case_id: Uuid,
        reason: String,
    ) -> Result<ReassignmentCase, AppError> {
        self.with_conflict_retry(|| self.try_rejection(case_id, reason.clone()))
            .await
    }

    async fn with_conflict_retry<T, F, Fut>(&self, mut attempt: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        match attempt().await {
            Err(err) if err.is_concurrency_conflict() => {
                log::warn!("Optimistic conflict, retrying once against fresh state: {}", err);
                attempt().await
            }
            other => other,
        }
    }

    async fn try_approval(&self, case_id: Uuid) -> Result<ReassignmentCase, AppError> {
        let mut case = self.require_case(case_id).await?;
        let expected_version = case.version;
        let operation = self.require_operation(case.operation_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut events = Vec::new();

        let appointment = self
            .appointments
            .lock_for_update(&mut tx, case.appointment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Appointment {} not found", case.appointment_id))
            })?;

        if !appointment.is_active() {
            // The patient (or clinic) cancelled the appointment while the
            // reassignment was in flight.
            case.fail(CaseFailureReason::AppointmentGone)?;
            self.persist_case(&mut tx, &case, expected_version).await?;
            self.operations
                .increment_counter(&mut tx, operation.id, CounterField::Failed)
                .await?;
            events.push(DomainEvent::CaseFailed {
                case_id,
                reason: CaseFailureReason::AppointmentGone.to_string(),
            });
        } else {
            let new_staff = case.candidate_staff_id.ok_or_else(|| {
                AppError::Internal(Some(format!("Case {} has no candidate", case_id)))
            })?;
            let new_start = case.proposed_start_time.ok_or_else(|| {
                AppError::Internal(Some(format!("Case {} has no proposed slot", case_id)))
            })?;
            let duration = appointment.end_time - appointment.start_time;
            let new_end = new_start + duration;

            // The candidate's calendar may have changed between notification
            // and approval: a new booking or a declared absence at the
            // proposed slot must not be double-booked over.
            let clashes = self
                .appointments
                .find_conflicts(
                    appointment.clinic_id,
                    Some(new_staff),
                    new_start,
                    new_end,
                    Some(appointment.id),
                )
                .await?;
            let absences = self
                .periods
                .find_overlapping(new_staff, new_start.date_naive(), new_end.date_naive())
                .await?;

            if !clashes.is_empty() || !absences.is_empty() {
                case.fail(CaseFailureReason::NoAvailableSlot)?;
                self.persist_case(&mut tx, &case, expected_version).await?;
                self.appointments
                    .cancel(&mut tx, appointment.id, CANCELLED_SLOT_TAKEN)
                    .await?;
                self.operations
                    .increment_counter(&mut tx, operation.id, CounterField::Failed)
                    .await?;
                events.push(DomainEvent::CaseFailed {
                    case_id,
                    reason: CaseFailureReason::NoAvailableSlot.to_string(),
                });
                events.push(DomainEvent::AppointmentCancelled {
                    appointment_id: appointment.id,
                    reason: CANCELLED_SLOT_TAKEN.to_string(),
                });
            } else {
                case.record_approval(Utc::now())?;
                self.appointments
                    .reassign(&mut tx, appointment.id, new_staff, new_start, new_end)
                    .await?;

                case.complete()?;
                self.persist_case(&mut tx, &case, expected_version).await?;
                self.operations
                    .increment_counter(&mut tx, operation.id, CounterField::Reassigned)
                    .await?;
                events.push(DomainEvent::CaseApproved {
                    case_id,
                    appointment_id: appointment.id,
                });
            }
        }

        let completed = self
            .operations
            .complete_if_resolved(&mut tx, operation.id)
            .await?;
        tx.commit().await?;

        if completed {
            events.push(DomainEvent::OperationCompleted {
                operation_id: operation.id,
            });
        }
        self.emit_all(None, operation.clinic_id, events).await;

        self.require_case(case_id).await
    }

    async fn try_rejection(
        &self,
        case_id: Uuid,
        reason: String,
    ) -> Result<ReassignmentCase, AppError> {
        let mut case = self.require_case(case_id).await?;
        let expected_version = case.version;
        let operation = self.require_operation(case.operation_id).await?;
        let rejected_candidate = case.candidate_staff_id;

        let mut tx = self.pool.begin().await?;
        let mut events = Vec::new();

        case.record_rejection(&reason, Utc::now())?;
        events.push(DomainEvent::CaseRejected {
            case_id,
            reason: reason.clone(),
        });

        let appointment = self
            .appointments
            .lock_for_update(&mut tx, case.appointment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Appointment {} not found", case.appointment_id))
            })?;

        let retry = self.planner.policy().retry_on_rejection && appointment.is_active();

        // The rejected case closes as failed either way; on the retry path a
        // fresh pending case takes over the appointment, and only that case's
        // terminal outcome will touch the counters.
        case.fail(CaseFailureReason::PatientRejected)?;
        self.persist_case(&mut tx, &case, expected_version).await?;

        if retry {
            let mut excluded = vec![operation.staff_id];
            excluded.extend(rejected_candidate);

            let replacement = self.cases.create(&mut tx, operation.id, &appointment).await?;
            match self.planner.plan_for(&appointment, &excluded).await? {
                Ok(proposal) => {
                    let mut more = self
                        .propose_and_notify(&mut tx, &operation, &appointment, replacement, proposal)
                        .await?;
                    events.append(&mut more);
                }
                Err(failure) => {
                    let mut more = self
                        .fail_unplannable(&mut tx, &operation, &appointment, replacement, failure)
                        .await?;
                    events.append(&mut more);
                }
            }
        } else {
            if appointment.is_active() {
                self.appointments
                    .cancel(&mut tx, appointment.id, CANCELLED_PATIENT_REJECTED)
                    .await?;
                events.push(DomainEvent::AppointmentCancelled {
                    appointment_id: appointment.id,
                    reason: CANCELLED_PATIENT_REJECTED.to_string(),
                });
            }
            self.operations
                .increment_counter(&mut tx, operation.id, CounterField::Failed)
                .await?;
            events.push(DomainEvent::CaseFailed {
                case_id,
                reason: CaseFailureReason::PatientRejected.to_string(),
            });
        }

        let completed = self
            .operations
            .complete_if_resolved(&mut tx, operation.id)
            .await?;
        tx.commit().await?;

        if completed {
            events.push(DomainEvent::OperationCompleted {
                operation_id: operation.id,
            });
        }
        self.emit_all(None, operation.clinic_id, events).await;

        self.require_case(case_id).await
    }

    /// One appointment of the execute loop, in its own transaction.
    async fn process_one_appointment(
        &self,
        operation: &UnavailabilityOperation,
        appointment: &Appointment,
    ) -> Result<Vec<DomainEvent>, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = self
            .appointments
            .lock_for_update(&mut tx, appointment.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Appointment {} disappeared", appointment.id))
            })?;

        let case = self.cases.create(&mut tx, operation.id, &locked).await?;

        let events = if !locked.is_active() {
            // Cancelled between discovery and locking; account for it so the
            // operation can still complete.
            let mut case = case;
            case.fail(CaseFailureReason::AppointmentGone)?;
            self.persist_case(&mut tx, &case, 0).await?;
            self.operations
                .increment_counter(&mut tx, operation.id, CounterField::Failed)
                .await?;
            vec![DomainEvent::CaseFailed {
                case_id: case.id,
                reason: CaseFailureReason::AppointmentGone.to_string(),
            }]
        } else {
            match self.planner.plan_for(&locked, &[operation.staff_id]).await? {
                Ok(proposal) => {
                    self.propose_and_notify(&mut tx, operation, &locked, case, proposal)
                        .await?
                }
                Err(failure) => {
                    self.fail_unplannable(&mut tx, operation, &locked, case, failure)
                        .await?
                }
            }
        };

        tx.commit().await?;
        Ok(events)
    }

    /// Attach the proposal to a fresh case and ask the patient. Delivery
    /// errors degrade the case and cancel the appointment.
    async fn propose_and_notify(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        operation: &UnavailabilityOperation,
        appointment: &Appointment,
        mut case: ReassignmentCase,
        proposal: Proposal,
    ) -> Result<Vec<DomainEvent>, AppError> {
        let expected_version = case.version;
        case.propose(proposal.candidate_staff_id, proposal.proposed_start_time)?;

        let outcome = self
            .gateway
            .send(CaseNotification {
                case_id: case.id,
                patient_id: appointment.patient_id,
                candidate_staff_name: proposal.candidate_staff_name.clone(),
                proposed_start_time: proposal.proposed_start_time,
            })
            .await;

        case.notify_patient(outcome.success, self.gateway.channel(), Utc::now())?;

        let mut events = vec![DomainEvent::CasePlanned {
            operation_id: operation.id,
            case_id: case.id,
            candidate_staff_id: proposal.candidate_staff_id,
        }];

        if outcome.success {
            events.push(DomainEvent::CaseNotified {
                case_id: case.id,
                channel: self.gateway.channel().to_string(),
            });
        } else {
            log::warn!(
                "Notification for case {} failed: {}",
                case.id,
                outcome.error_message.as_deref().unwrap_or("unknown")
            );
            self.appointments
                .cancel(tx, appointment.id, CANCELLED_NOTIFICATION_FAILED)
                .await?;
            self.operations
                .increment_counter(tx, operation.id, CounterField::Failed)
                .await?;
            events.push(DomainEvent::CaseFailed {
                case_id: case.id,
                reason: CaseFailureReason::DeliveryFailed.to_string(),
            });
            events.push(DomainEvent::AppointmentCancelled {
                appointment_id: appointment.id,
                reason: CANCELLED_NOTIFICATION_FAILED.to_string(),
            });
        }

        self.persist_case(tx, &case, expected_version).await?;
        Ok(events)
    }

    /// No candidate or no slot: cancel the appointment outright and count it
    /// under `cancelled`.
    async fn fail_unplannable(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        operation: &UnavailabilityOperation,
        appointment: &Appointment,
        mut case: ReassignmentCase,
        failure: PlanFailure,
    ) -> Result<Vec<DomainEvent>, AppError> {
        let expected_version = case.version;
        let reason = failure.as_case_reason();

        case.fail(reason)?;
        self.persist_case(tx, &case, expected_version).await?;
        self.appointments
            .cancel(tx, appointment.id, CANCELLED_NO_CANDIDATE)
            .await?;
        self.operations
            .increment_counter(tx, operation.id, CounterField::Cancelled)
            .await?;

        Ok(vec![
            DomainEvent::CaseFailed {
                case_id: case.id,
                reason: reason.to_string(),
            },
            DomainEvent::AppointmentCancelled {
                appointment_id: appointment.id,
                reason: CANCELLED_NO_CANDIDATE.to_string(),
            },
        ])
    }

    /// Last-resort accounting when per-appointment processing blew up and
    /// its transaction was rolled back: record a failed case so the batch
    /// stays accountable.
    async fn record_processing_failure(
        &self,
        operation: &UnavailabilityOperation,
        appointment: &Appointment,
    ) -> Vec<DomainEvent> {
        let result: Result<Vec<DomainEvent>, AppError> = async {
            let mut tx = self.pool.begin().await?;
            let mut case = self.cases.create(&mut tx, operation.id, appointment).await?;
            case.fail(CaseFailureReason::Internal)?;
            self.persist_case(&mut tx, &case, 0).await?;
            self.operations
                .increment_counter(&mut tx, operation.id, CounterField::Failed)
                .await?;
            tx.commit().await?;
            Ok(vec![DomainEvent::CaseFailed {
                case_id: case.id,
                reason: CaseFailureReason::Internal.to_string(),
            }])
        }
        .await;

        match result {
            Ok(events) => events,
            Err(err) => {
                log::error!(
                    "Could not record processing failure for appointment {}: {}",
                    appointment.id,
                    err
                );
                Vec::new()
            }
        }
    }

    async fn finish_if_resolved(
        &self,
        actor: Option<&Actor>,
        clinic_id: Uuid,
        operation_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let completed = self
            .operations
            .complete_if_resolved(&mut tx, operation_id)
            .await?;
        tx.commit().await?;

        if completed {
            self.audit
                .record(actor, clinic_id, DomainEvent::OperationCompleted { operation_id })
                .await;
        }
        Ok(())
    }

    async fn persist_case(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        case: &ReassignmentCase,
        expected_version: i32,
    ) -> Result<ReassignmentCase, AppError> {
        self.cases
            .update_versioned(tx, case, expected_version)
            .await?
            .ok_or_else(|| {
                AppError::ConcurrencyConflict(format!(
                    "Case {} was modified concurrently",
                    case.id
                ))
            })
    }

    async fn emit_all(&self, actor: Option<&Actor>, clinic_id: Uuid, events: Vec<DomainEvent>) {
        for event in events {
            self.audit.record(actor, clinic_id, event).await;
        }
    }

    async fn require_operation(
        &self,
        operation_id: Uuid,
    ) -> Result<UnavailabilityOperation, AppError> {
        self.operations
            .find_by_id(operation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Operation {} not found", operation_id)))
    }

    async fn require_case(&self, case_id: Uuid) -> Result<ReassignmentCase, AppError> {
        self.cases
            .find_by_id(case_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case {} not found", case_id)))
    }
}

fn validate_range(start_date: NaiveDate, end_date: NaiveDate) -> Result<(), AppError> {
    if end_date < start_date {
        return Err(AppError::Validation(format!(
            "end_date {} precedes start_date {}",
            end_date, start_date
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn window_covers_inclusive_range() {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let (ws, we) = operation_window(start, end);
        assert_eq!(ws.to_rfc3339(), "2025-06-01T00:00:00+00:00");
        assert_eq!(we.to_rfc3339(), "2025-06-04T00:00:00+00:00");
    }

    #[test]
    fn single_day_window_is_one_day_wide() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let (ws, we) = operation_window(day, day);
        assert_eq!(we - ws, chrono::Duration::days(1));
    }

    #[test]
    fn inverted_range_is_a_validation_error() {
        let start = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(matches!(
            validate_range(start, end),
            Err(AppError::Validation(_))
        ));
        assert!(validate_range(end, start).is_ok());
    }
}
