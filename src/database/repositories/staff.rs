use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{CandidateStaff, Staff};

#[derive(Clone)]
pub struct StaffRepository {
    pool: PgPool,
}

impl StaffRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Staff>> {
        let staff = sqlx::query_as::<_, Staff>(
            r#"
            SELECT
                id,
                clinic_id,
                name,
                email,
                role,
                leave_balance_days,
                is_active,
                created_at,
                updated_at
            FROM staff
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(staff)
    }

    /// Qualified alternates for one appointment: same clinic, capable of the
    /// service, active, not the unavailable staff, and not blocked by an
    /// unavailability period covering the target day. Ordered by the
    /// planner's tie-break keys so selection is deterministic.
    pub async fn find_candidates(
        &self,
        clinic_id: Uuid,
        service_id: Uuid,
        excluded_staff: &[Uuid],
        day: NaiveDate,
    ) -> Result<Vec<CandidateStaff>> {
        let candidates = sqlx::query_as::<_, CandidateStaff>(
            r#"
            SELECT
                s.id,
                s.name,
                (
                    SELECT COUNT(*)
                    FROM appointments a
                    WHERE a.staff_id = s.id
                      AND a.status IN ('pending', 'confirmed')
                      AND a.start_time::date = $4
                ) AS day_load
            FROM staff s
            JOIN staff_services ss ON ss.staff_id = s.id
            WHERE s.clinic_id = $1
              AND ss.service_id = $2
              AND s.is_active
              AND s.id <> ALL($3)
              AND NOT EXISTS (
                  SELECT 1
                  FROM unavailability_periods p
                  WHERE p.staff_id = s.id
                    AND p.start_date <= $4
                    AND p.end_date >= $4
              )
            ORDER BY day_load ASC, s.id ASC
            "#,
        )
        .bind(clinic_id)
        .bind(service_id)
        .bind(excluded_staff)
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    pub async fn get_leave_balance(&self, staff_id: Uuid) -> Result<Option<i32>> {
        let balance: Option<(i32,)> =
            sqlx::query_as("SELECT leave_balance_days FROM staff WHERE id = $1")
                .bind(staff_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance.map(|(days,)| days))
    }

    /// Guarded decrement: applies only when the balance covers the debit, so
    /// concurrent debits for the same staff cannot lose updates. Returns the
    /// new balance, or None when the guard rejected the debit.
    pub async fn try_debit_leave(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        staff_id: Uuid,
        days: i32,
    ) -> Result<Option<i32>> {
        let updated: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE staff
            SET
                leave_balance_days = leave_balance_days - $1,
                updated_at = $2
            WHERE id = $3
              AND leave_balance_days >= $1
            RETURNING leave_balance_days
            "#,
        )
        .bind(days)
        .bind(Utc::now())
        .bind(staff_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(updated.map(|(days,)| days))
    }

    pub async fn credit_leave(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        staff_id: Uuid,
        days: i32,
    ) -> Result<i32> {
        let (balance,): (i32,) = sqlx::query_as(
            r#"
            UPDATE staff
            SET
                leave_balance_days = leave_balance_days + $1,
                updated_at = $2
            WHERE id = $3
            RETURNING leave_balance_days
            "#,
        )
        .bind(days)
        .bind(Utc::now())
        .bind(staff_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(balance)
    }
}
