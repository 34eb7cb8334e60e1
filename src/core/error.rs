use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// MySQL error numbers that indicate lock contention rather than a broken query
const MYSQL_LOCK_WAIT_TIMEOUT: u16 = 1205;
const MYSQL_DEADLOCK: u16 = 1213;
/// SQLSTATE for serialization failure
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Installment schedule input cannot produce a valid schedule
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Schedule regeneration attempted after payments were applied
    #[error("Schedule locked: {0}")]
    ScheduleLocked(String),

    /// Payment amount is non-positive or exceeds the outstanding balance
    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row lock contention or an idempotency race; safe to retry
    #[error("Reconciliation conflict: {0}")]
    ReconciliationConflict(String),

    /// Opaque failure reported by the payment gateway
    #[error("Gateway error: {0}")]
    ExternalGateway(String),

    /// Validation errors for other business rules
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            let contended = db_err
                .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                .map(|e| e.number() == MYSQL_DEADLOCK || e.number() == MYSQL_LOCK_WAIT_TIMEOUT)
                .unwrap_or(false)
                || db_err.code().as_deref() == Some(SQLSTATE_SERIALIZATION_FAILURE);

            if contended {
                return AppError::ReconciliationConflict(db_err.message().to_string());
            }
        }
        AppError::Database(err)
    }
}

impl From<reqwest_middleware::Error> for AppError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => AppError::HttpClient(e),
            reqwest_middleware::Error::Middleware(e) => AppError::ExternalGateway(e.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
                "retryable": self.is_retryable(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidSchedule(_) => StatusCode::BAD_REQUEST,
            AppError::ScheduleLocked(_) => StatusCode::CONFLICT,
            AppError::InvalidPaymentAmount(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ReconciliationConflict(_) => StatusCode::CONFLICT,
            AppError::ExternalGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn invalid_schedule(msg: impl Into<String>) -> Self {
        AppError::InvalidSchedule(msg.into())
    }

    pub fn schedule_locked(msg: impl Into<String>) -> Self {
        AppError::ScheduleLocked(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        AppError::InvalidPaymentAmount(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::ReconciliationConflict(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::ExternalGateway(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Whether the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ReconciliationConflict(_) | AppError::ExternalGateway(_) | AppError::HttpClient(_)
        )
    }
}
