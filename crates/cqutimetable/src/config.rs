/// Configuration file for the server and the timetable settings
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timetable::{CalendarZone, PeriodClock, TimetableSettings, MAX_WEEK};

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid start time {value:?} for period {period} (expected HH:MM)")]
    InvalidPeriodTime { period: u32, value: String },

    #[error("Invalid UTC offset: {minutes} minutes")]
    InvalidOffset { minutes: i32 },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub timetable: TimetableConfig,
}

/// HTTP server and upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Origin allowed by CORS (the frontend)
    pub frontend_url: String,
    /// Largest accepted upload, in bytes
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8849,
            frontend_url: "http://localhost:5173".to_string(),
            max_file_size: 2 * 1024 * 1024,
            allowed_extensions: vec![".xls".to_string(), ".xlsx".to_string()],
            allowed_mime_types: vec![
                "application/vnd.ms-excel".to_string(),
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ],
        }
    }
}

/// Period table and calendar settings, as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimetableConfig {
    /// Written as the `TZID` of every event
    pub timezone: String,
    /// Offset of `timezone` from UTC
    pub utc_offset_minutes: i32,
    pub lesson_minutes: i64,
    pub semester_weeks: u32,
    /// Period index to start time (`HH:MM`)
    pub period_starts: BTreeMap<u32, String>,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        let clock = PeriodClock::default();
        let period_starts = (1..=13)
            .filter_map(|p| {
                clock
                    .start_of(p)
                    .ok()
                    .map(|t| (p, t.format("%H:%M").to_string()))
            })
            .collect();

        Self {
            timezone: CalendarZone::default().tzid,
            utc_offset_minutes: 8 * 60,
            lesson_minutes: clock.lesson_duration().num_minutes(),
            semester_weeks: 20,
            period_starts,
        }
    }
}

impl TimetableConfig {
    /// Validates the config and converts it into [`TimetableSettings`].
    pub fn to_settings(&self) -> Result<TimetableSettings, ConfigError> {
        let mut starts = BTreeMap::new();
        for (&period, value) in &self.period_starts {
            let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
                ConfigError::InvalidPeriodTime {
                    period,
                    value: value.clone(),
                }
            })?;
            starts.insert(period, time);
        }
        if starts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "period_starts",
                message: "at least one period is required".to_string(),
            });
        }
        if self.lesson_minutes <= 0 || self.lesson_minutes >= 24 * 60 {
            return Err(ConfigError::InvalidValue {
                field: "lesson_minutes",
                message: format!("{} is not a lesson length", self.lesson_minutes),
            });
        }
        if self.semester_weeks == 0 || self.semester_weeks > MAX_WEEK {
            return Err(ConfigError::InvalidValue {
                field: "semester_weeks",
                message: format!("must be between 1 and {}", MAX_WEEK),
            });
        }

        let offset = FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).ok_or(
            ConfigError::InvalidOffset {
                minutes: self.utc_offset_minutes,
            },
        )?;

        Ok(TimetableSettings {
            clock: PeriodClock::new(starts, self.lesson_minutes),
            zone: CalendarZone {
                tzid: self.timezone.clone(),
                offset,
            },
            semester_weeks: self.semester_weeks,
        })
    }
}

impl AppConfig {
    /// Loads the configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the config file
    ///
    /// # Returns
    /// * `Ok(AppConfig)` - Loaded configuration; missing fields take their defaults
    /// * `Err` - If the file can't be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
