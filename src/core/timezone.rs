use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::core::error::{AppError, Result};

/// Default offset of the QR gateway's local clock (Bolivia, UTC-4)
pub const DEFAULT_GATEWAY_UTC_OFFSET_HOURS: i32 = -4;

/// Gateway-local timezone handling.
/// All timestamps are stored as UTC; the gateway reports wall-clock date and time
/// in its own zone.
#[derive(Debug, Clone, Copy)]
pub struct GatewayClock {
    offset: FixedOffset,
}

impl GatewayClock {
    pub fn new(offset_hours: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::Configuration(format!("Invalid gateway UTC offset: {}", offset_hours))
        })?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Convert a gateway wall-clock instant to UTC
    pub fn local_to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Parse the `Fecha` (YYYY-MM-DD) and `Hora` (HH:MM:SS) pair sent by the gateway.
    ///
    /// Returns `None` if either part is missing or malformed; the caller falls back to now.
    pub fn parse_fecha_hora(&self, fecha: Option<&str>, hora: Option<&str>) -> Option<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(fecha?.trim(), "%Y-%m-%d").ok()?;
        let time = NaiveTime::parse_from_str(hora?.trim(), "%H:%M:%S").ok()?;
        self.local_to_utc(date.and_time(time))
    }

    /// Today's date on the gateway's clock
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}

impl Default for GatewayClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_GATEWAY_UTC_OFFSET_HOURS * 3600)
                .expect("Valid offset"),
        }
    }
}
