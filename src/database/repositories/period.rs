use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{PeriodInput, UnavailabilityPeriod};

const PERIOD_COLUMNS: &str = r#"
    id,
    staff_id,
    clinic_id,
    start_date,
    end_date,
    reason,
    operation_id,
    notes,
    created_at
"#;

#[derive(Clone)]
pub struct PeriodRepository {
    pool: PgPool,
}

impl PeriodRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Existing periods of a staff member overlapping an inclusive date
    /// range. Non-empty means a new block would double-book the calendar.
    pub async fn find_overlapping(
        &self,
        staff_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<UnavailabilityPeriod>> {
        let periods = sqlx::query_as::<_, UnavailabilityPeriod>(&format!(
            r#"
            SELECT {PERIOD_COLUMNS}
            FROM unavailability_periods
            WHERE staff_id = $1
              AND start_date <= $3
              AND end_date >= $2
            ORDER BY start_date ASC
            "#
        ))
        .bind(staff_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(periods)
    }

    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: &PeriodInput,
    ) -> Result<UnavailabilityPeriod> {
        let period = sqlx::query_as::<_, UnavailabilityPeriod>(&format!(
            r#"
            INSERT INTO unavailability_periods (
                staff_id,
                clinic_id,
                start_date,
                end_date,
                reason,
                operation_id,
                notes,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PERIOD_COLUMNS}
            "#
        ))
        .bind(input.staff_id)
        .bind(input.clinic_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.reason.to_string())
        .bind(input.operation_id)
        .bind(input.notes.clone())
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        Ok(period)
    }

    pub async fn delete_by_operation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        operation_id: Uuid,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM unavailability_periods WHERE operation_id = $1")
            .bind(operation_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
