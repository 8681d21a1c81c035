use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::planning::capacity::{LeaveCounting, StaffingPolicy};
use crate::planning::overview::PlanningSettings;

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
    pub planning: PlanningConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            planning: PlanningConfig::from_env()?,
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
}

/// Staffing thresholds applied to every team without an explicit override.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningConfig {
    pub minimum_staff: u32,
    pub minimum_ratio: f32,
    pub count_pending_as_leave: bool,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        let policy = StaffingPolicy::default();
        Self {
            minimum_staff: policy.minimum_staff,
            minimum_ratio: policy.minimum_ratio,
            count_pending_as_leave: false,
        }
    }
}

impl PlanningConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let minimum_staff = match env::var("PLANNER_MIN_STAFF") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidMinimumStaff)?,
            Err(_) => defaults.minimum_staff,
        };

        let minimum_ratio = match env::var("PLANNER_MIN_STAFFING_RATIO") {
            Ok(raw) => raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|ratio| (0.0..=1.0).contains(ratio))
                .ok_or(ConfigError::InvalidStaffingRatio)?,
            Err(_) => defaults.minimum_ratio,
        };

        let count_pending_as_leave = match env::var("PLANNER_COUNT_PENDING_AS_LEAVE") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                name: "PLANNER_COUNT_PENDING_AS_LEAVE",
            })?,
            Err(_) => defaults.count_pending_as_leave,
        };

        Ok(Self {
            minimum_staff,
            minimum_ratio,
            count_pending_as_leave,
        })
    }

    pub fn settings(&self) -> PlanningSettings {
        PlanningSettings {
            staffing: StaffingPolicy {
                minimum_staff: self.minimum_staff,
                minimum_ratio: self.minimum_ratio,
                ..StaffingPolicy::default()
            },
            counting: if self.count_pending_as_leave {
                LeaveCounting::IncludePending
            } else {
                LeaveCounting::ApprovedOnly
            },
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMinimumStaff,
    InvalidStaffingRatio,
    InvalidFlag { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMinimumStaff => {
                write!(f, "PLANNER_MIN_STAFF must be a non-negative integer")
            }
            ConfigError::InvalidStaffingRatio => {
                write!(f, "PLANNER_MIN_STAFFING_RATIO must be a number between 0 and 1")
            }
            ConfigError::InvalidFlag { name } => write!(f, "{name} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidMinimumStaff
            | ConfigError::InvalidStaffingRatio
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
