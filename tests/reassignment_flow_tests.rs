//! End-to-end workflow tests against a real Postgres instance.
//!
//! These are ignored by default; point DATABASE_URL at a disposable database
//! and run `cargo test -- --ignored` to exercise them.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serial_test::serial;
use uuid::Uuid;

use clinic_be::AppError;
use clinic_be::database::models::{OperationInput, OperationStatus, UnavailabilityReason};
use clinic_be::database::repositories::CaseRepository;
use clinic_be::services::notification::DeliveryOutcome;

mod common;

struct Clinic {
    pool: sqlx::PgPool,
    clinic_id: Uuid,
    manager_id: Uuid,
    service_id: Uuid,
    patient_id: Uuid,
}

/// Clinic with a manager (not qualified for the service, so never a
/// reassignment candidate) plus one service and one patient.
async fn seed_clinic() -> anyhow::Result<Clinic> {
    let pool = common::test_pool().await?;
    let clinic_id = common::create_clinic(&pool).await?;
    let manager_id = common::create_staff(&pool, clinic_id, "Manager", 0).await?;
    let service_id = common::create_service(&pool, clinic_id).await?;
    let patient_id = common::create_patient(&pool, clinic_id).await?;

    Ok(Clinic {
        pool,
        clinic_id,
        manager_id,
        service_id,
        patient_id,
    })
}

fn operation_input(clinic: &Clinic, staff_id: Uuid, day: NaiveDate) -> OperationInput {
    OperationInput {
        clinic_id: clinic.clinic_id,
        staff_id,
        start_date: day,
        end_date: day,
        reason: UnavailabilityReason::SickLeave,
        detail: None,
    }
}

// Monday.
const YEAR: i32 = 2025;
const MONTH: u32 = 9;
const DAY: u32 = 1;

fn sick_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(YEAR, MONTH, DAY).unwrap()
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn no_candidate_cancels_appointment_and_completes_operation() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    assert_eq!(operation.status, OperationStatus::Completed);
    assert_eq!(operation.total_appointments, 1);
    assert_eq!(operation.cancelled_count, 1);
    assert_eq!(operation.reassigned_count, 0);
    assert_eq!(operation.failed_count, 0);

    let (status, _, _) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "cancelled");

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].status.to_string(), "failed");
    assert_eq!(cases[0].failure_reason.as_deref(), Some("no_alternate_staff"));
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn approval_reassigns_appointment_to_candidate() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let gateway = Arc::new(common::ScriptedGateway::always_delivers());
    let orchestrator = common::build_orchestrator(pool, gateway.clone(), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    // Awaiting the patient: nothing resolved yet, appointment untouched.
    assert_eq!(operation.status, OperationStatus::InProgress);
    assert_eq!(operation.reassigned_count, 0);
    let (status, staff_id, _) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "confirmed");
    assert_eq!(staff_id, sick_staff);
    assert_eq!(gateway.sent.lock().unwrap().len(), 1);

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    assert_eq!(cases[0].status.to_string(), "patient_notified");
    assert_eq!(cases[0].candidate_staff_id, Some(candidate));

    let case = orchestrator.process_patient_approval(cases[0].id).await.unwrap();
    assert_eq!(case.status.to_string(), "completed");

    let (status, staff_id, new_start) =
        common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "confirmed");
    assert_eq!(staff_id, candidate);
    assert_eq!(new_start, start);

    let stats = orchestrator.get_stats(&actor, operation.id).await.unwrap();
    assert_eq!(stats.status, OperationStatus::Completed);
    assert_eq!(stats.reassigned_count, 1);
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn busy_candidate_gets_a_shifted_slot() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let half_hour = chrono::Duration::minutes(30);

    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + half_hour,
    )
    .await
    .unwrap();
    // Candidate already booked at the original slot.
    common::create_appointment(
        pool,
        clinic.clinic_id,
        candidate,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + half_hour,
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    assert_eq!(cases[0].proposed_start_time, Some(start + half_hour));

    orchestrator.process_patient_approval(cases[0].id).await.unwrap();

    let (_, staff_id, new_start) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(staff_id, candidate);
    assert_eq!(new_start, start + half_hour);
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn slot_search_skips_candidate_declared_absence() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();
    // Candidate is solidly booked on the sick day and on declared leave the
    // day after; the first admissible slot is two days out.
    common::create_appointment(
        pool,
        clinic.clinic_id,
        candidate,
        clinic.patient_id,
        clinic.service_id,
        Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 8, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 18, 0, 0).unwrap(),
    )
    .await
    .unwrap();
    common::create_period(
        pool,
        candidate,
        clinic.clinic_id,
        NaiveDate::from_ymd_opt(YEAR, MONTH, DAY + 1).unwrap(),
        NaiveDate::from_ymd_opt(YEAR, MONTH, DAY + 1).unwrap(),
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    assert_eq!(cases[0].status.to_string(), "patient_notified");
    // Never inside the leave day; lands on the morning after it.
    assert_eq!(
        cases[0].proposed_start_time,
        Some(Utc.with_ymd_and_hms(YEAR, MONTH, DAY + 2, 8, 0, 0).unwrap())
    );
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn rejection_without_retry_cancels_appointment() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    let case = orchestrator
        .process_patient_rejection(cases[0].id, "prefers the original doctor".to_string())
        .await
        .unwrap();

    assert_eq!(case.status.to_string(), "failed");
    assert_eq!(case.failure_reason.as_deref(), Some("patient_rejected"));
    assert_eq!(
        case.rejection_reason.as_deref(),
        Some("prefers the original doctor")
    );

    let (status, _, _) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "cancelled");

    let stats = orchestrator.get_stats(&actor, operation.id).await.unwrap();
    assert_eq!(stats.status, OperationStatus::Completed);
    assert_eq!(stats.failed_count, 1);
    assert_eq!(stats.reassigned_count, 0);
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn rejection_with_retry_opens_a_new_case() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let first_choice = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    let second_choice = common::create_staff(pool, clinic.clinic_id, "Dr C", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, first_choice, clinic.service_id).await.unwrap();
    common::qualify(pool, second_choice, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), true);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    let case_repo = CaseRepository::new(pool.clone());
    let cases = case_repo.find_by_operation(operation.id).await.unwrap();
    assert_eq!(cases.len(), 1);
    let first_candidate = cases[0].candidate_staff_id.unwrap();

    orchestrator
        .process_patient_rejection(cases[0].id, "too early".to_string())
        .await
        .unwrap();

    let cases = case_repo.find_by_operation(operation.id).await.unwrap();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].status.to_string(), "failed");
    assert_eq!(cases[1].status.to_string(), "patient_notified");
    // The new proposal excludes the rejected candidate.
    assert_ne!(cases[1].candidate_staff_id, Some(first_candidate));

    // Still awaiting the patient: nothing counted, appointment untouched.
    let stats = orchestrator.get_stats(&actor, operation.id).await.unwrap();
    assert_eq!(stats.status, OperationStatus::InProgress);
    assert_eq!(stats.failed_count, 0);
    let (status, _, _) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "confirmed");

    orchestrator.process_patient_approval(cases[1].id).await.unwrap();

    let stats = orchestrator.get_stats(&actor, operation.id).await.unwrap();
    assert_eq!(stats.status, OperationStatus::Completed);
    assert_eq!(stats.reassigned_count, 1);
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn delivery_failure_degrades_case_and_cancels_appointment() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let gateway = Arc::new(common::ScriptedGateway::with_outcomes(vec![
        DeliveryOutcome::failed("provider timeout"),
    ]));
    let orchestrator = common::build_orchestrator(pool, gateway, false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    assert_eq!(operation.status, OperationStatus::Completed);
    assert_eq!(operation.failed_count, 1);
    assert_eq!(operation.cancelled_count, 0);

    let (status, _, _) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "cancelled");

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    assert_eq!(cases[0].failure_reason.as_deref(), Some("delivery_failed"));
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn vacation_debits_weekdays_and_cancel_credits_back() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 10).await.unwrap();
    common::qualify(pool, staff, clinic.service_id).await.unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    // Mon 2025-09-01 through Sun 2025-09-07: five weekdays.
    let operation = orchestrator
        .create(
            &actor,
            OperationInput {
                clinic_id: clinic.clinic_id,
                staff_id: staff,
                start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
                reason: UnavailabilityReason::Vacation,
                detail: Some("summer break".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(operation.leave_days_debited, 5);
    assert_eq!(common::leave_balance(pool, staff).await.unwrap(), 5);

    let cancelled = orchestrator.cancel(&actor, operation.id).await.unwrap();
    assert_eq!(cancelled.status, OperationStatus::Cancelled);
    assert_eq!(common::leave_balance(pool, staff).await.unwrap(), 10);
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn vacation_with_insufficient_balance_is_rejected() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 2).await.unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let err = orchestrator
        .create(
            &actor,
            OperationInput {
                clinic_id: clinic.clinic_id,
                staff_id: staff,
                start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 9, 5).unwrap(),
                reason: UnavailabilityReason::Vacation,
                detail: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientBalance {
            required: 5,
            available: 2
        }
    ));
    // The whole creation rolled back, balance untouched.
    assert_eq!(common::leave_balance(pool, staff).await.unwrap(), 2);
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn overlapping_operation_for_same_staff_is_rejected() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    orchestrator
        .create(&actor, operation_input(&clinic, staff, sick_day()))
        .await
        .unwrap();
    let err = orchestrator
        .create(&actor, operation_input(&clinic, staff, sick_day()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn execute_is_single_shot() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, staff, sick_day()))
        .await
        .unwrap();
    orchestrator.execute(&actor, operation.id).await.unwrap();

    let err = orchestrator.execute(&actor, operation.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn manager_of_another_clinic_is_denied() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let other_clinic = common::create_clinic(pool).await.unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let outsider = common::manager_actor(clinic.manager_id, other_clinic);

    let err = orchestrator
        .create(&outsider, operation_input(&clinic, staff, sick_day()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn mixed_batch_counts_each_outcome_once() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    // A second service only the sick staff can deliver.
    let rare_service = common::create_service(pool, clinic.clinic_id).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, sick_staff, rare_service).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let half_hour = chrono::Duration::minutes(30);
    let at = |hour| Utc.with_ymd_and_hms(YEAR, MONTH, DAY, hour, 0, 0).unwrap();
    for (hour, service) in [(9, clinic.service_id), (10, clinic.service_id), (11, rare_service)] {
        common::create_appointment(
            pool,
            clinic.clinic_id,
            sick_staff,
            clinic.patient_id,
            service,
            at(hour),
            at(hour) + half_hour,
        )
        .await
        .unwrap();
    }

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    let operation = orchestrator.execute(&actor, operation.id).await.unwrap();

    // Two appointments await their patients; the unplannable one is already
    // cancelled and the operation stays open.
    assert_eq!(operation.status, OperationStatus::InProgress);
    assert_eq!(operation.total_appointments, 3);
    assert_eq!(operation.cancelled_count, 1);
    assert_eq!(operation.reassigned_count, 0);
    assert_eq!(operation.failed_count, 0);

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    assert_eq!(cases.len(), 3);
    let notified: Vec<_> = cases
        .iter()
        .filter(|c| c.status.to_string() == "patient_notified")
        .collect();
    let failed: Vec<_> = cases
        .iter()
        .filter(|c| c.status.to_string() == "failed")
        .collect();
    assert_eq!(notified.len(), 2);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].failure_reason.as_deref(), Some("no_alternate_staff"));

    for case in &notified {
        orchestrator.process_patient_approval(case.id).await.unwrap();
    }

    let stats = orchestrator.get_stats(&actor, operation.id).await.unwrap();
    assert_eq!(stats.status, OperationStatus::Completed);
    assert_eq!(stats.cancelled_count, 1);
    assert_eq!(stats.reassigned_count, 2);
    assert_eq!(stats.failed_count, 0);

    let activity = orchestrator
        .operation_activity(&actor, operation.id)
        .await
        .unwrap();
    let actions: Vec<_> = activity.iter().map(|a| a.action.as_str()).collect();
    assert!(actions.contains(&"created"));
    assert!(actions.contains(&"executed"));
    assert!(actions.contains(&"completed"));
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn concurrent_approvals_resolve_the_case_once() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    orchestrator.execute(&actor, operation.id).await.unwrap();

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    let case_id = cases[0].id;

    // A double-submitted approval: exactly one call wins, the loser either
    // hits the version guard and finds the case terminal on its retry, or
    // reads the terminal state outright.
    let (first, second) = tokio::join!(
        orchestrator.process_patient_approval(case_id),
        orchestrator.process_patient_approval(case_id)
    );
    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);

    let (status, staff_id, _) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "confirmed");
    assert_eq!(staff_id, candidate);

    let stats = orchestrator.get_stats(&actor, operation.id).await.unwrap();
    assert_eq!(stats.status, OperationStatus::Completed);
    assert_eq!(stats.reassigned_count, 1);
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn stale_case_version_is_rejected_and_fresh_one_accepted() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    orchestrator.execute(&actor, operation.id).await.unwrap();

    let case_repo = CaseRepository::new(pool.clone());
    let case = case_repo
        .find_by_operation(operation.id)
        .await
        .unwrap()
        .remove(0);

    // An outdated version number must not overwrite the row.
    let mut tx = pool.begin().await.unwrap();
    let stale = case_repo
        .update_versioned(&mut tx, &case, case.version - 1)
        .await
        .unwrap();
    assert!(stale.is_none());

    let fresh = case_repo
        .update_versioned(&mut tx, &case, case.version)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.version, case.version + 1);
    tx.commit().await.unwrap();
}

#[actix_rt::test]
#[serial]
#[ignore]
async fn approval_after_candidate_slot_is_taken_fails_safely() {
    let clinic = seed_clinic().await.unwrap();
    let pool = &clinic.pool;

    let sick_staff = common::create_staff(pool, clinic.clinic_id, "Dr A", 0).await.unwrap();
    let candidate = common::create_staff(pool, clinic.clinic_id, "Dr B", 0).await.unwrap();
    common::qualify(pool, sick_staff, clinic.service_id).await.unwrap();
    common::qualify(pool, candidate, clinic.service_id).await.unwrap();

    let start = Utc.with_ymd_and_hms(YEAR, MONTH, DAY, 9, 0, 0).unwrap();
    let appointment = common::create_appointment(
        pool,
        clinic.clinic_id,
        sick_staff,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let orchestrator =
        common::build_orchestrator(pool, Arc::new(common::ScriptedGateway::always_delivers()), false);
    let actor = common::manager_actor(clinic.manager_id, clinic.clinic_id);

    let operation = orchestrator
        .create(&actor, operation_input(&clinic, sick_staff, sick_day()))
        .await
        .unwrap();
    orchestrator.execute(&actor, operation.id).await.unwrap();

    let cases = CaseRepository::new(pool.clone())
        .find_by_operation(operation.id)
        .await
        .unwrap();
    assert_eq!(cases[0].proposed_start_time, Some(start));

    // The candidate takes a new booking at the proposed slot while the
    // patient is still deciding.
    common::create_appointment(
        pool,
        clinic.clinic_id,
        candidate,
        clinic.patient_id,
        clinic.service_id,
        start,
        start + chrono::Duration::minutes(30),
    )
    .await
    .unwrap();

    let case = orchestrator.process_patient_approval(cases[0].id).await.unwrap();
    assert_eq!(case.status.to_string(), "failed");
    assert_eq!(case.failure_reason.as_deref(), Some("no_available_slot"));

    // The original appointment was not double-booked onto the candidate.
    let (status, staff_id, _) = common::appointment_state(pool, appointment).await.unwrap();
    assert_eq!(status, "cancelled");
    assert_eq!(staff_id, sick_staff);

    let stats = orchestrator.get_stats(&actor, operation.id).await.unwrap();
    assert_eq!(stats.status, OperationStatus::Completed);
    assert_eq!(stats.failed_count, 1);
    assert_eq!(stats.reassigned_count, 0);
}
