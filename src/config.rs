//! Engine configuration derived from environment variables.
//!
//! ## Environment Variables
//!
//! - `RECOVERY_DB_PATH`: Path to the ReDB database file (default `./.data/recovery.redb`)
//! - `RECOVERY_THRESHOLD`: Shares needed to recover (default: majority plus one)
//! - `RECOVERY_TIME_LOCK_HOURS`: Wait before shares are accepted (default 72, min 24)
//! - `RECOVERY_ENABLE_EXPIRY`: Give shares an expiry date (`1`/`true`/`yes`)
//! - `RECOVERY_EXPIRY_DAYS`: Share lifetime when expiry is enabled (default 365)
//! - `RECOVERY_EXPIRY_CHECK_INTERVAL_SECS`: Expiry daemon period (default 3600)
//! - `RECOVERY_LOG_FORMAT`: `pretty` or `json` (default `pretty`)
//! - `RUST_LOG`: Log level filter

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::recovery::registry::{MIN_TIME_LOCK_HOURS, default_threshold};
use crate::recovery::types::{
    DEFAULT_EXPIRY_DAYS, DEFAULT_TIME_LOCK_HOURS, ExpiryPolicy, RecoveryOptions,
};

const DEFAULT_DB_PATH: &str = "./.data/recovery.redb";
const DEFAULT_EXPIRY_CHECK_INTERVAL_SECS: u64 = 3600;

/// Helper to get trimmed env var or empty string.
fn env_trim(name: &str) -> String {
    env::var(name).unwrap_or_default().trim().to_string()
}

/// Helper to get lowercase env var.
fn env_lower(name: &str) -> String {
    env_trim(name).to_lowercase()
}

/// Check if a string value is truthy.
fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        env_lower("RECOVERY_LOG_FORMAT").parse().unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Invalid log format '{other}'. Must be 'pretty' or 'json'."
            )),
        }
    }
}

/// Parse a trimmed value. An empty value is `None`.
///
/// A non-empty value that does not parse is recorded in `invalid` so that
/// [`Settings::validate`] rejects it instead of silently using a default.
fn parse_optional<T: FromStr>(raw: &str, name: &str, invalid: &mut Vec<String>) -> Option<T> {
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            invalid.push(format!("{name} has an invalid value: '{raw}'"));
            None
        }
    }
}

fn parse_or<T: FromStr>(raw: &str, name: &str, default: T, invalid: &mut Vec<String>) -> T {
    parse_optional(raw, name, invalid).unwrap_or(default)
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct Settings {
    db_path: PathBuf,
    threshold: Option<usize>,
    time_lock_hours: u32,
    enable_expiry: bool,
    expiry_days: u32,
    expiry_check_interval: Duration,
    log_format: LogFormat,
    /// Variables that were set but could not be parsed.
    invalid: Vec<String>,
}

impl Settings {
    /// Load settings from environment variables. Call
    /// [`Settings::validate`] afterwards: unparseable values are reported
    /// there.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).unwrap_or_default().trim().to_string();
        let mut invalid = Vec::new();

        let db_path = var("RECOVERY_DB_PATH");
        let db_path = if db_path.is_empty() {
            PathBuf::from(DEFAULT_DB_PATH)
        } else {
            PathBuf::from(db_path)
        };

        let threshold = parse_optional(
            &var("RECOVERY_THRESHOLD"),
            "RECOVERY_THRESHOLD",
            &mut invalid,
        );

        let time_lock_hours = parse_or(
            &var("RECOVERY_TIME_LOCK_HOURS"),
            "RECOVERY_TIME_LOCK_HOURS",
            DEFAULT_TIME_LOCK_HOURS,
            &mut invalid,
        );

        let enable_expiry = is_truthy(&var("RECOVERY_ENABLE_EXPIRY").to_lowercase());

        let expiry_days = parse_or(
            &var("RECOVERY_EXPIRY_DAYS"),
            "RECOVERY_EXPIRY_DAYS",
            DEFAULT_EXPIRY_DAYS,
            &mut invalid,
        );

        let expiry_check_interval = Duration::from_secs(parse_or(
            &var("RECOVERY_EXPIRY_CHECK_INTERVAL_SECS"),
            "RECOVERY_EXPIRY_CHECK_INTERVAL_SECS",
            DEFAULT_EXPIRY_CHECK_INTERVAL_SECS,
            &mut invalid,
        ));

        let log_format = parse_or(
            &var("RECOVERY_LOG_FORMAT"),
            "RECOVERY_LOG_FORMAT",
            LogFormat::default(),
            &mut invalid,
        );

        Self {
            db_path,
            threshold,
            time_lock_hours,
            enable_expiry,
            expiry_days,
            expiry_check_interval,
            log_format,
            invalid,
        }
    }

    /// Settings for tests: in-tree database path, minimum time lock, expiry on.
    pub fn for_tests() -> Self {
        Self {
            db_path: PathBuf::from("./.data/test-recovery.redb"),
            threshold: None,
            time_lock_hours: MIN_TIME_LOCK_HOURS,
            enable_expiry: true,
            expiry_days: 30,
            expiry_check_interval: Duration::from_secs(1),
            log_format: LogFormat::Pretty,
            invalid: Vec::new(),
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.invalid.is_empty() {
            return Err(self.invalid.join("; "));
        }
        if let Some(threshold) = self.threshold
            && threshold < 2
        {
            return Err(format!(
                "RECOVERY_THRESHOLD must be at least 2, got {threshold}"
            ));
        }
        if self.time_lock_hours < MIN_TIME_LOCK_HOURS {
            return Err(format!(
                "RECOVERY_TIME_LOCK_HOURS must be at least {MIN_TIME_LOCK_HOURS}, got {}",
                self.time_lock_hours
            ));
        }
        if self.enable_expiry && self.expiry_days == 0 {
            return Err("RECOVERY_EXPIRY_DAYS must be at least 1".to_string());
        }
        if self.expiry_check_interval.is_zero() {
            return Err("RECOVERY_EXPIRY_CHECK_INTERVAL_SECS must be positive".to_string());
        }
        Ok(())
    }

    // Getters

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    /// Threshold that will be used for `guardian_count` guardians.
    pub fn effective_threshold(&self, guardian_count: usize) -> usize {
        self.threshold
            .unwrap_or_else(|| default_threshold(guardian_count))
    }

    pub fn time_lock_hours(&self) -> u32 {
        self.time_lock_hours
    }

    pub fn enable_expiry(&self) -> bool {
        self.enable_expiry
    }

    pub fn expiry_days(&self) -> u32 {
        self.expiry_days
    }

    pub fn expiry_check_interval(&self) -> Duration {
        self.expiry_check_interval
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Options for `initialize_recovery` built from these settings.
    pub fn recovery_options(&self) -> RecoveryOptions {
        let expiry = if self.enable_expiry {
            ExpiryPolicy::Enabled {
                days: self.expiry_days,
            }
        } else {
            ExpiryPolicy::Disabled
        };

        RecoveryOptions {
            threshold: self.threshold,
            time_lock_hours: self.time_lock_hours,
            expiry,
        }
    }
}
