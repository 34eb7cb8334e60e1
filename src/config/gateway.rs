use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;

pub const DEFAULT_PAGOFACIL_BASE_URL: &str = "https://masterqr.pagofacil.com.bo/api/services/v2";

/// PagoFácil QR gateway settings
#[derive(Debug, Clone, Deserialize)]
pub struct PagoFacilConfig {
    pub base_url: String,
    pub token_service: String,
    pub token_secret: String,
    /// URL the gateway posts payment notifications to
    pub callback_url: String,
    /// Gateway currency code (2 = BOB)
    pub currency: i32,
    /// Gateway document type code (1 = CI)
    pub document_type: i32,
    /// `Response-Language` header
    pub language: String,
    /// Offset of the gateway's local time, in hours
    pub utc_offset_hours: i32,
}

impl PagoFacilConfig {
    pub fn from_env() -> Result<Self> {
        Ok(PagoFacilConfig {
            base_url: env::var("PAGOFACIL_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PAGOFACIL_BASE_URL.to_string()),
            token_service: env::var("PAGOFACIL_TOKEN_SERVICE").map_err(|_| {
                AppError::Configuration("PAGOFACIL_TOKEN_SERVICE not set".to_string())
            })?,
            token_secret: env::var("PAGOFACIL_TOKEN_SECRET").map_err(|_| {
                AppError::Configuration("PAGOFACIL_TOKEN_SECRET not set".to_string())
            })?,
            callback_url: env::var("PAGOFACIL_CALLBACK_URL").map_err(|_| {
                AppError::Configuration("PAGOFACIL_CALLBACK_URL not set".to_string())
            })?,
            currency: env::var("PAGOFACIL_CURRENCY")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .map_err(|_| AppError::Configuration("Invalid PAGOFACIL_CURRENCY".to_string()))?,
            document_type: env::var("PAGOFACIL_DOCUMENT_TYPE")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| {
                    AppError::Configuration("Invalid PAGOFACIL_DOCUMENT_TYPE".to_string())
                })?,
            language: env::var("PAGOFACIL_LANGUAGE").unwrap_or_else(|_| "es".to_string()),
            utc_offset_hours: env::var("PAGOFACIL_UTC_OFFSET_HOURS")
                .unwrap_or_else(|_| "-4".to_string())
                .parse()
                .map_err(|_| {
                    AppError::Configuration("Invalid PAGOFACIL_UTC_OFFSET_HOURS".to_string())
                })?,
        })
    }
}
