use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{
    OperationInput, OperationStats, OperationStatus, UnavailabilityOperation,
};

const OPERATION_COLUMNS: &str = r#"
    id,
    clinic_id,
    staff_id,
    initiated_by,
    start_date,
    end_date,
    reason,
    detail,
    status,
    total_appointments,
    cancelled_count,
    reassigned_count,
    failed_count,
    leave_days_debited,
    started_at,
    completed_at,
    created_at,
    updated_at
"#;

/// Which aggregate counter a case outcome lands in. Exactly one per case,
/// so cancelled + reassigned + failed never exceeds total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterField {
    Cancelled,
    Reassigned,
    Failed,
}

impl CounterField {
    fn column(self) -> &'static str {
        match self {
            CounterField::Cancelled => "cancelled_count",
            CounterField::Reassigned => "reassigned_count",
            CounterField::Failed => "failed_count",
        }
    }
}

#[derive(Clone)]
pub struct OperationRepository {
    pool: PgPool,
}

impl OperationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: &OperationInput,
        initiated_by: Uuid,
        leave_days_debited: i32,
    ) -> Result<UnavailabilityOperation> {
        let now = Utc::now();
        let status = OperationStatus::Pending.to_string();

        let operation = sqlx::query_as::<_, UnavailabilityOperation>(&format!(
            r#"
            INSERT INTO unavailability_operations (
                clinic_id,
                staff_id,
                initiated_by,
                start_date,
                end_date,
                reason,
                detail,
                status,
                leave_days_debited,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {OPERATION_COLUMNS}
            "#
        ))
        .bind(input.clinic_id)
        .bind(input.staff_id)
        .bind(initiated_by)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.reason.to_string())
        .bind(input.detail.clone())
        .bind(status)
        .bind(leave_days_debited)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Ok(operation)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UnavailabilityOperation>> {
        let operation = sqlx::query_as::<_, UnavailabilityOperation>(&format!(
            r#"
            SELECT {OPERATION_COLUMNS}
            FROM unavailability_operations
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(operation)
    }

    /// pending -> in_progress, stamping started_at and the discovered batch
    /// size. Guarded on status so a concurrent execute takes effect once.
    pub async fn mark_in_progress(
        &self,
        id: Uuid,
        total_appointments: i32,
        started_at: DateTime<Utc>,
    ) -> Result<Option<UnavailabilityOperation>> {
        let operation = sqlx::query_as::<_, UnavailabilityOperation>(&format!(
            r#"
            UPDATE unavailability_operations
            SET
                status = 'in_progress',
                total_appointments = $1,
                started_at = $2,
                updated_at = $2
            WHERE id = $3
              AND status = 'pending'
            RETURNING {OPERATION_COLUMNS}
            "#
        ))
        .bind(total_appointments)
        .bind(started_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(operation)
    }

    /// Cancellation is only legal while still pending.
    pub async fn mark_cancelled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<UnavailabilityOperation>> {
        let operation = sqlx::query_as::<_, UnavailabilityOperation>(&format!(
            r#"
            UPDATE unavailability_operations
            SET
                status = 'cancelled',
                updated_at = $1
            WHERE id = $2
              AND status = 'pending'
            RETURNING {OPERATION_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(operation)
    }

    /// Bump one outcome counter inside the same transaction as the case and
    /// appointment updates it accounts for.
    pub async fn increment_counter(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        field: CounterField,
    ) -> Result<()> {
        let query = format!(
            r#"
            UPDATE unavailability_operations
            SET
                {column} = {column} + 1,
                updated_at = $1
            WHERE id = $2
            "#,
            column = field.column()
        );

        sqlx::query(&query)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// in_progress -> completed once every case is terminal. The guard re-reads
    /// the counters inside the transaction, so concurrent responders racing on
    /// the last two cases complete the operation exactly once.
    pub async fn complete_if_resolved(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE unavailability_operations
            SET
                status = 'completed',
                completed_at = $1,
                updated_at = $1
            WHERE id = $2
              AND status = 'in_progress'
              AND cancelled_count + reassigned_count + failed_count >= total_appointments
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(&self, id: Uuid) -> Result<Option<OperationStats>> {
        let stats = sqlx::query_as::<_, OperationStats>(
            r#"
            SELECT
                id,
                status,
                total_appointments,
                cancelled_count,
                reassigned_count,
                failed_count,
                started_at,
                completed_at
            FROM unavailability_operations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stats)
    }
}
