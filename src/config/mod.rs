use crate::core::retry::DEFAULT_MAX_ATTEMPTS;
use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;

pub mod database;
pub mod gateway;
pub mod server;

pub use database::DatabaseConfig;
pub use gateway::PagoFacilConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pagofacil: PagoFacilConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// `json` or `pretty`
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub overdue_sweep_interval_secs: u64,
    /// Attempts for a unit of work that hits lock contention
    pub reconcile_max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            pagofacil: PagoFacilConfig::from_env()?,
            scheduler: SchedulerConfig {
                overdue_sweep_interval_secs: env::var("OVERDUE_SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Configuration("Invalid OVERDUE_SWEEP_INTERVAL_SECS".to_string())
                    })?,
                reconcile_max_attempts: env::var("RECONCILE_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| DEFAULT_MAX_ATTEMPTS.to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Configuration("Invalid RECONCILE_MAX_ATTEMPTS".to_string())
                    })?,
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.app.log_format.as_str(), "json" | "pretty") {
            return Err(AppError::Configuration(
                "LOG_FORMAT must be json or pretty".to_string(),
            ));
        }

        self.database.validate()?;

        if self.server.workers == 0 {
            return Err(AppError::Configuration(
                "Server workers must be greater than 0".to_string(),
            ));
        }

        if !(-12..=14).contains(&self.pagofacil.utc_offset_hours) {
            return Err(AppError::Configuration(
                "PAGOFACIL_UTC_OFFSET_HOURS must be between -12 and 14".to_string(),
            ));
        }

        if self.scheduler.overdue_sweep_interval_secs == 0 {
            return Err(AppError::Configuration(
                "Overdue sweep interval must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.reconcile_max_attempts == 0 {
            return Err(AppError::Configuration(
                "Reconcile attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
