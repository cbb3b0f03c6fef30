//! Service configuration
//!
//! Loaded once at startup from a TOML document and shared read-only afterwards.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use toml::Value;

use crate::error::ConfigError;

/// Drive letter the share is mapped to unless `MountPoint` says otherwise
pub const DEFAULT_MOUNT_POINT: &str = "Z:";

/// Largest accepted `BackupTime`, one week
pub const MAX_SCHEDULED_HOUR: f64 = 168.0;

/// Upper bound on the product catalog query unless `CatalogTimeoutSeconds` says otherwise
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(600);

/// Validated service configuration
#[derive(Clone, PartialEq)]
pub struct Configuration {
    /// Hours after midnight of the daily run; values above 24 roll into the next day
    pub scheduled_hour: f64,
    /// Share path without leading separators, e.g. `fileserver\inventory`
    pub target_share: String,
    /// Account used to connect the share
    pub username: String,
    /// Password for `username`
    pub password: String,
    /// Local mount point, e.g. `Z:`
    pub mount_point: String,
    /// Time limit for the product catalog query
    pub catalog_timeout: Duration,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("scheduled_hour", &self.scheduled_hour)
            .field("target_share", &self.target_share)
            .field("username", &self.username)
            .field("password", &"********")
            .field("mount_point", &self.mount_point)
            .field("catalog_timeout", &self.catalog_timeout)
            .finish()
    }
}

/// Settings document as written on disk
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(rename = "BackupTime")]
    backup_time: Option<Value>,
    #[serde(rename = "TargetShare")]
    target_share: Option<Value>,
    #[serde(rename = "Username")]
    username: Option<Value>,
    #[serde(rename = "Password")]
    password: Option<Value>,
    #[serde(rename = "MountPoint")]
    mount_point: Option<Value>,
    #[serde(rename = "CatalogTimeoutSeconds")]
    catalog_timeout_seconds: Option<Value>,
}

impl Configuration {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns `ConfigError::Read` if the file cannot be read, `ConfigError::Parse`
    /// if it is not TOML, `ConfigError::Missing` for an absent required setting and
    /// `ConfigError::Malformed` for an unusable one.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML document
    ///
    /// # Errors
    /// Same as [`Configuration::load`], minus the read failure.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let scheduled_hour = parse_hours(required(raw.backup_time, "BackupTime")?)?;
        let target_share = required_string(raw.target_share, "TargetShare")?
            .trim_start_matches(['\\', '/'])
            .to_string();
        if target_share.is_empty() {
            return Err(ConfigError::Malformed("TargetShare is empty".to_string()));
        }
        let username = required_string(raw.username, "Username")?;
        let password = required_string(raw.password, "Password")?;

        let mount_point = match raw.mount_point {
            Some(value) => expect_string(value, "MountPoint")?,
            None => DEFAULT_MOUNT_POINT.to_string(),
        };

        let catalog_timeout = match raw.catalog_timeout_seconds {
            Some(Value::Integer(secs)) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
            Some(other) => {
                return Err(ConfigError::Malformed(format!(
                    "CatalogTimeoutSeconds must be a positive integer, got {other:?}"
                )));
            }
            None => DEFAULT_CATALOG_TIMEOUT,
        };

        Ok(Self {
            scheduled_hour,
            target_share,
            username,
            password,
            mount_point,
            catalog_timeout,
        })
    }

    /// UNC form of the target share
    #[must_use]
    pub fn share_unc(&self) -> String {
        format!(r"\\{}", self.target_share)
    }
}

fn required(value: Option<Value>, field: &'static str) -> Result<Value, ConfigError> {
    value.ok_or(ConfigError::Missing(field))
}

fn required_string(value: Option<Value>, field: &'static str) -> Result<String, ConfigError> {
    expect_string(required(value, field)?, field)
}

fn expect_string(value: Value, field: &str) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ConfigError::Malformed(format!(
            "{field} must be a string, got {}",
            other.type_str()
        ))),
    }
}

/// Decimal hours: integer, float or numeric string; finite, not negative, at most a week
fn parse_hours(value: Value) -> Result<f64, ConfigError> {
    #[allow(clippy::cast_precision_loss)]
    let hours = match value {
        Value::Float(f) => f,
        Value::Integer(i) => i as f64,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            ConfigError::Malformed(format!("BackupTime is not a number: {s:?}"))
        })?,
        other => {
            return Err(ConfigError::Malformed(format!(
                "BackupTime must be numeric, got {}",
                other.type_str()
            )));
        }
    };

    if !hours.is_finite() || !(0.0..=MAX_SCHEDULED_HOUR).contains(&hours) {
        return Err(ConfigError::Malformed(format!(
            "BackupTime must be between 0 and {MAX_SCHEDULED_HOUR} hours, got {hours}"
        )));
    }

    Ok(hours)
}
