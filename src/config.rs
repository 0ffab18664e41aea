use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// On patient rejection: re-plan with the next candidate instead of
    /// cancelling the appointment.
    pub retry_on_rejection: bool,
    /// How many days around the original slot the planner may search.
    pub slot_search_days: i64,
    /// Clinic working hours bounding the slot scan (whole hours, local to
    /// the stored UTC times).
    pub clinic_day_start_hour: u32,
    pub clinic_day_end_hour: u32,
    /// Granularity of the slot scan in minutes.
    pub slot_step_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_env_only()
    }

    /// Read configuration from the process environment without touching .env
    /// files; used by tests that control the environment directly.
    pub fn from_env_only() -> Result<Self> {
        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://@localhost:5432/clinic".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-only-jwt-secret-change-in-production".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            retry_on_rejection: env::var("RETRY_ON_REJECTION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            slot_search_days: env::var("SLOT_SEARCH_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            clinic_day_start_hour: env::var("CLINIC_DAY_START")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),
            clinic_day_end_hour: env::var("CLINIC_DAY_END")
                .unwrap_or_else(|_| "18".to_string())
                .parse()
                .unwrap_or(18),
            slot_step_minutes: env::var("SLOT_STEP_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
