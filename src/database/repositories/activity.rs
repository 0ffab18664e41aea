use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{Activity, CreateActivityInput};

#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log_activity(&self, input: CreateActivityInput) -> Result<Activity> {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (
                clinic_id,
                actor_id,
                entity_type,
                entity_id,
                action,
                description,
                metadata,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id,
                clinic_id,
                actor_id,
                entity_type,
                entity_id,
                action,
                description,
                metadata,
                created_at
            "#,
        )
        .bind(input.clinic_id)
        .bind(input.actor_id)
        .bind(input.entity_type)
        .bind(input.entity_id)
        .bind(input.action)
        .bind(input.description)
        .bind(input.metadata)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(activity)
    }

    pub async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT
                id,
                clinic_id,
                actor_id,
                entity_type,
                entity_id,
                action,
                description,
                metadata,
                created_at
            FROM activities
            WHERE entity_type = $1
              AND entity_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit.unwrap_or(50))
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }
}
