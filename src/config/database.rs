use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Executor;
use tracing::debug;

use crate::core::{AppError, Result};

/// MySQL settings for the ledger.
///
/// Every posting locks its receivable row with `FOR UPDATE`. The InnoDB lock wait
/// is kept short so a blocked unit of work fails with error 1205, which the
/// conflict retry picks up, instead of stalling a worker.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub max_connections: u32,
    /// How long a request waits for a free pooled connection
    pub acquire_timeout_secs: u64,
    /// `innodb_lock_wait_timeout` set on every connection
    pub lock_wait_timeout_secs: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Configuration("DATABASE_URL not set".to_string()))?,
            pool_size: env_or("DATABASE_POOL_SIZE", 5)?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20)?,
            acquire_timeout_secs: env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?,
            lock_wait_timeout_secs: env_or("DATABASE_LOCK_WAIT_TIMEOUT_SECS", 10)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 || self.pool_size > self.max_connections {
            return Err(AppError::Configuration(
                "DATABASE_POOL_SIZE must not exceed a non-zero DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }

        if self.acquire_timeout_secs == 0 || self.lock_wait_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "Database timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create the MySQL pool with the session lock wait applied to each connection
    pub async fn create_pool(&self) -> Result<MySqlPool> {
        let lock_wait = format!(
            "SET SESSION innodb_lock_wait_timeout = {}",
            self.lock_wait_timeout_secs
        );

        debug!(
            acquire_timeout_secs = self.acquire_timeout_secs,
            lock_wait_timeout_secs = self.lock_wait_timeout_secs,
            "Connecting ledger database"
        );

        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.pool_size)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .after_connect(move |conn, _meta| {
                let lock_wait = lock_wait.clone();
                Box::pin(async move {
                    conn.execute(lock_wait.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&self.url)
            .await
            .map_err(AppError::Database)
    }
}
