use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{Appointment, CaseStatus, ReassignmentCase};

const CASE_COLUMNS: &str = r#"
    id,
    operation_id,
    appointment_id,
    original_staff_id,
    candidate_staff_id,
    original_start_time,
    proposed_start_time,
    status,
    notification_channel,
    notified_at,
    patient_responded_at,
    rejection_reason,
    failure_reason,
    version,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct CaseRepository {
    pool: PgPool,
}

impl CaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One case per affected appointment, created as the execute loop (or a
    /// rejection re-plan) reaches it.
    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        operation_id: Uuid,
        appointment: &Appointment,
    ) -> Result<ReassignmentCase> {
        let now = Utc::now();
        let status = CaseStatus::Pending.to_string();

        let case = sqlx::query_as::<_, ReassignmentCase>(&format!(
            r#"
            INSERT INTO reassignment_cases (
                operation_id,
                appointment_id,
                original_staff_id,
                original_start_time,
                status,
                version,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6, $6)
            RETURNING {CASE_COLUMNS}
            "#
        ))
        .bind(operation_id)
        .bind(appointment.id)
        .bind(appointment.staff_id)
        .bind(appointment.start_time)
        .bind(status)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Ok(case)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ReassignmentCase>> {
        let case = sqlx::query_as::<_, ReassignmentCase>(&format!(
            r#"
            SELECT {CASE_COLUMNS}
            FROM reassignment_cases
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(case)
    }

    pub async fn find_by_operation(&self, operation_id: Uuid) -> Result<Vec<ReassignmentCase>> {
        let cases = sqlx::query_as::<_, ReassignmentCase>(&format!(
            r#"
            SELECT {CASE_COLUMNS}
            FROM reassignment_cases
            WHERE operation_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(operation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cases)
    }

    /// Persist an in-memory transition under an optimistic version check.
    /// Returns None when another writer got there first; the caller decides
    /// whether to retry against fresh state or surface the conflict.
    pub async fn update_versioned(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        case: &ReassignmentCase,
        expected_version: i32,
    ) -> Result<Option<ReassignmentCase>> {
        let updated = sqlx::query_as::<_, ReassignmentCase>(&format!(
            r#"
            UPDATE reassignment_cases
            SET
                candidate_staff_id = $1,
                proposed_start_time = $2,
                status = $3,
                notification_channel = $4,
                notified_at = $5,
                patient_responded_at = $6,
                rejection_reason = $7,
                failure_reason = $8,
                version = version + 1,
                updated_at = $9
            WHERE id = $10
              AND version = $11
            RETURNING {CASE_COLUMNS}
            "#
        ))
        .bind(case.candidate_staff_id)
        .bind(case.proposed_start_time)
        .bind(case.status.to_string())
        .bind(case.notification_channel.clone())
        .bind(case.notified_at)
        .bind(case.patient_responded_at)
        .bind(case.rejection_reason.clone())
        .bind(case.failure_reason.clone())
        .bind(Utc::now())
        .bind(case.id)
        .bind(expected_version)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(updated)
    }
}
