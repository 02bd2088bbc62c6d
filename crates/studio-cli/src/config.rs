use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::cli::View;

const CONFIG_FILE: &str = "studio.toml";

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// SQLite file holding bookings and tasks
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// IANA timezone used to decide what "today" is
    #[serde(default = "detect_system_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub default_view: View,
    /// Reject bookings that double-book a resource
    #[serde(default = "default_check_conflicts")]
    pub check_conflicts: bool,
    /// tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("studio.db")
}

fn default_check_conflicts() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            timezone: detect_system_timezone(),
            default_view: View::default(),
            check_conflicts: default_check_conflicts(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Reads `studio.toml` (or the file named by `STUDIO_CONFIG`), then
    /// `STUDIO_*` environment variables on top.
    pub fn new() -> Result<Self, figment::Error> {
        let file = std::env::var("STUDIO_CONFIG").unwrap_or_else(|_| CONFIG_FILE.to_string());
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(file))
                .merge(Env::prefixed("STUDIO_").ignore(&["config"])),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    /// The configured timezone, validated.
    pub fn tz(&self) -> Result<Tz, String> {
        validate_timezone(&self.timezone)
    }
}

/// Validates that a timezone string is a valid IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, String> {
    Tz::from_str(timezone).map_err(|_| {
        format!(
            "Invalid timezone: '{}'. Use IANA names like {}",
            timezone,
            suggest_timezone(timezone).join(", ")
        )
    })
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

const COMMON_TIMEZONES: &[&str] = &[
    "UTC",
    "America/New_York",
    "America/Chicago",
    "America/Los_Angeles",
    "America/Sao_Paulo",
    "Europe/London",
    "Europe/Berlin",
    "Europe/Madrid",
    "Asia/Tokyo",
    "Asia/Kolkata",
    "Australia/Sydney",
];

/// Suggests similar timezone names when validation fails
fn suggest_timezone(invalid_tz: &str) -> Vec<&'static str> {
    let lower_invalid = invalid_tz.to_lowercase();
    let matches: Vec<&'static str> = COMMON_TIMEZONES
        .iter()
        .copied()
        .filter(|tz| {
            let lower_tz = tz.to_lowercase();
            !lower_invalid.is_empty()
                && (lower_tz.contains(&lower_invalid) || lower_invalid.contains(&lower_tz))
        })
        .collect();

    if matches.is_empty() {
        COMMON_TIMEZONES.iter().copied().take(3).collect()
    } else {
        matches
    }
}
