use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{Duration, NaiveTime};

use crate::workflows::scheduling::domain::{Period, ScheduleConfig};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduling: SchedulingDefaults,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let ansi = env_flag("APP_LOG_ANSI", false)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, ansi },
            scheduling: SchedulingDefaults::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Limits applied when a period's schedule config is provisioned on first access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingDefaults {
    pub session_minutes: u32,
    pub max_off_days_per_person: u32,
    pub max_off_days_per_day: u32,
    pub max_weekend_off_days: u32,
    pub max_store_off_days_per_day: u32,
    pub max_part_time_off_days: u32,
    pub max_standby_off_days: u32,
    pub auto_provision: bool,
    pub reminder_hours: u32,
}

impl Default for SchedulingDefaults {
    fn default() -> Self {
        Self {
            session_minutes: 10,
            max_off_days_per_person: 8,
            max_off_days_per_day: 3,
            max_weekend_off_days: 2,
            max_store_off_days_per_day: 1,
            max_part_time_off_days: 1,
            max_standby_off_days: 1,
            auto_provision: true,
            reminder_hours: 48,
        }
    }
}

impl SchedulingDefaults {
    pub fn from_env() -> Result<Self, ConfigError> {
        let fallback = Self::default();
        let session_minutes = env_number("SCHEDULE_SESSION_MINUTES", fallback.session_minutes)?;
        if session_minutes == 0 {
            return Err(ConfigError::ZeroSessionLength);
        }
        Ok(Self {
            session_minutes,
            max_off_days_per_person: env_number(
                "SCHEDULE_MAX_OFF_PER_PERSON",
                fallback.max_off_days_per_person,
            )?,
            max_off_days_per_day: env_number(
                "SCHEDULE_MAX_OFF_PER_DAY",
                fallback.max_off_days_per_day,
            )?,
            max_weekend_off_days: env_number(
                "SCHEDULE_MAX_WEEKEND_OFF",
                fallback.max_weekend_off_days,
            )?,
            max_store_off_days_per_day: env_number(
                "SCHEDULE_MAX_STORE_OFF_PER_DAY",
                fallback.max_store_off_days_per_day,
            )?,
            max_part_time_off_days: env_number(
                "SCHEDULE_MAX_PART_TIME_OFF",
                fallback.max_part_time_off_days,
            )?,
            max_standby_off_days: env_number(
                "SCHEDULE_MAX_STANDBY_OFF",
                fallback.max_standby_off_days,
            )?,
            auto_provision: env_flag("SCHEDULE_AUTO_PROVISION", fallback.auto_provision)?,
            reminder_hours: env_number("SCHEDULE_REMINDER_HOURS", fallback.reminder_hours)?,
        })
    }

    pub fn reminder_window(&self) -> Duration {
        Duration::hours(i64::from(self.reminder_hours))
    }

    /// Build the config a period receives when nobody has configured it yet.
    ///
    /// Submissions for a period are collected during the preceding month, so the
    /// window opens at midnight UTC on the first of the previous month and closes
    /// at midnight UTC on the first day of the period itself.
    pub fn config_for(&self, period: Period) -> ScheduleConfig {
        let opens = period.previous().first_day().and_time(NaiveTime::MIN).and_utc();
        let closes = period.first_day().and_time(NaiveTime::MIN).and_utc();

        ScheduleConfig {
            period,
            version: 1,
            active: true,
            max_off_days_per_person: self.max_off_days_per_person,
            max_off_days_per_day: self.max_off_days_per_day,
            max_weekend_off_days: self.max_weekend_off_days,
            max_store_off_days_per_day: self.max_store_off_days_per_day,
            max_part_time_off_days: self.max_part_time_off_days,
            max_standby_off_days: self.max_standby_off_days,
            system_open_at: Some(opens),
            system_close_at: Some(closes),
            session_time_limit_seconds: self.session_minutes.saturating_mul(60),
            holiday_dates: Default::default(),
            forbidden_dates: Default::default(),
            store_holiday_dates: Default::default(),
            store_forbidden_dates: Default::default(),
        }
    }
}

fn env_number<T>(key: &'static str, fallback: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(fallback),
    }
}

fn env_flag(key: &'static str, fallback: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
        Err(_) => Ok(fallback),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
    ZeroSessionLength,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::ZeroSessionLength => {
                write!(f, "SCHEDULE_SESSION_MINUTES must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. }
            | ConfigError::ZeroSessionLength => None,
        }
    }
}
