use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{Appointment, AppointmentStatus};

const APPOINTMENT_COLUMNS: &str = r#"
    id,
    clinic_id,
    staff_id,
    patient_id,
    service_id,
    start_time,
    end_time,
    status,
    cancellation_reason,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(appointment)
    }

    /// Active appointments of a staff member whose start falls inside the
    /// half-open window. This is the operation discovery query.
    pub async fn find_active_for_staff_in_window(
        &self,
        staff_id: Uuid,
        clinic_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE staff_id = $1
              AND clinic_id = $2
              AND status IN ('pending', 'confirmed')
              AND start_time >= $3
              AND start_time < $4
            ORDER BY start_time ASC
            "#
        ))
        .bind(staff_id)
        .bind(clinic_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(appointments)
    }

    /// Interval-overlap query behind the conflict detector. Two half-open
    /// intervals [s1,e1) and [s2,e2) overlap iff s1 < e2 AND s2 < e1.
    pub async fn find_conflicts(
        &self,
        clinic_id: Uuid,
        staff_id: Option<Uuid>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment: Option<Uuid>,
    ) -> Result<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE clinic_id = $1
              AND ($2::uuid IS NULL OR staff_id = $2)
              AND status IN ('pending', 'confirmed')
              AND start_time < $4
              AND $3 < end_time
              AND ($5::uuid IS NULL OR id <> $5)
            ORDER BY start_time ASC
            "#
        ))
        .bind(clinic_id)
        .bind(staff_id)
        .bind(start_time)
        .bind(end_time)
        .bind(exclude_appointment)
        .fetch_all(&self.pool)
        .await?;

        Ok(appointments)
    }

    /// Busy intervals of one staff member inside a window, for slot scanning.
    pub async fn busy_intervals(
        &self,
        staff_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let rows: Vec<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT start_time, end_time
            FROM appointments
            WHERE staff_id = $1
              AND status IN ('pending', 'confirmed')
              AND start_time < $3
              AND $2 < end_time
            ORDER BY start_time ASC
            "#,
        )
        .bind(staff_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Row-locked read used inside per-appointment transactions so a
    /// concurrent patient cancellation is observed before we act.
    pub async fn lock_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Appointment>> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE id = $1
            FOR UPDATE
            "#
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(appointment)
    }

    /// Apply an approved reassignment: new staff and slot, status preserved.
    pub async fn reassign(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        new_staff_id: Uuid,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<Appointment> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET
                staff_id = $1,
                start_time = $2,
                end_time = $3,
                updated_at = $4
            WHERE id = $5
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(new_staff_id)
        .bind(new_start)
        .bind(new_end)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(appointment)
    }

    pub async fn cancel(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        reason: &str,
    ) -> Result<Appointment> {
        let status = AppointmentStatus::Cancelled.to_string();

        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET
                status = $1,
                cancellation_reason = $2,
                updated_at = $3
            WHERE id = $4
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(appointment)
    }
}
