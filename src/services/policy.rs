use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::macros::string_enum;
use crate::error::AppError;

/// The authenticated caller, threaded explicitly through every orchestrator
/// call instead of living in ambient request state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub clinic_id: Uuid,
    pub role: Role,
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        Admin => "admin",
        ClinicManager => "clinic_manager",
        Practitioner => "practitioner",
        Receptionist => "receptionist",
    }
}

/// Single capability gate for the reassignment surface; the per-endpoint
/// role checks collapse into this one decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn can_manage_operation(&self, actor: &Actor, clinic_id: Uuid) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::ClinicManager => actor.clinic_id == clinic_id,
            Role::Practitioner | Role::Receptionist => false,
        }
    }

    pub fn authorize_manage(&self, actor: &Actor, clinic_id: Uuid) -> Result<(), AppError> {
        if self.can_manage_operation(actor, clinic_id) {
            return Ok(());
        }
        Err(AppError::Authorization(format!(
            "{} may not manage unavailability operations for clinic {}",
            actor.role, clinic_id
        )))
    }
}

/// Planner and rejection-handling knobs, derived from config once at startup.
#[derive(Debug, Clone)]
pub struct ReassignmentPolicy {
    pub retry_on_rejection: bool,
    pub slot_search_days: i64,
    pub clinic_day_start_hour: u32,
    pub clinic_day_end_hour: u32,
    pub slot_step: Duration,
}

impl ReassignmentPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_on_rejection: config.retry_on_rejection,
            slot_search_days: config.slot_search_days,
            clinic_day_start_hour: config.clinic_day_start_hour,
            clinic_day_end_hour: config.clinic_day_end_hour,
            slot_step: Duration::minutes(config.slot_step_minutes),
        }
    }
}

impl Default for ReassignmentPolicy {
    fn default() -> Self {
        Self {
            retry_on_rejection: false,
            slot_search_days: 7,
            clinic_day_start_hour: 8,
            clinic_day_end_hour: 18,
            slot_step: Duration::minutes(30),
        }
    }
}
