//! Inventory type definitions

use std::fmt;

use chrono::NaiveDate;

/// Rendered in place of any field that is absent or could not be read
pub const UNKNOWN: &str = "Unknown";

/// Where in the configuration store an entry was found
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Machine-wide uninstall registrations
    Machine,
    /// 32-bit compatibility uninstall registrations on 64-bit systems
    Machine32Bit,
    /// Registrations owned by a single user account
    User {
        /// Account security identifier
        sid: String,
        /// Human-readable profile name
        profile: String,
    },
}

impl Scope {
    /// Section heading used in rendered reports
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Scope::Machine => "Apps in HKLM:".to_string(),
            Scope::Machine32Bit => "Apps in HKLM (32-bit):".to_string(),
            Scope::User { profile, .. } => format!("Apps in user {profile}:"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Machine => write!(f, "machine"),
            Scope::Machine32Bit => write!(f, "machine (32-bit)"),
            Scope::User { profile, .. } => write!(f, "user {profile}"),
        }
    }
}

/// One installed software registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareEntry {
    /// Product name; entries without one are never constructed
    pub display_name: String,
    /// Publisher
    pub publisher: Option<String>,
    /// Version string
    pub version: Option<String>,
    /// Install date
    pub install_date: Option<NaiveDate>,
    /// Install directory, direct or from the product catalog
    pub install_location: Option<String>,
}

impl SoftwareEntry {
    /// Create an entry with only a display name
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            publisher: None,
            version: None,
            install_date: None,
            install_location: None,
        }
    }

    /// Set publisher
    #[must_use]
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    /// Set version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set install date
    #[must_use]
    pub fn with_install_date(mut self, date: NaiveDate) -> Self {
        self.install_date = Some(date);
        self
    }

    /// Set install location
    #[must_use]
    pub fn with_install_location(mut self, location: impl Into<String>) -> Self {
        self.install_location = Some(location.into());
        self
    }

    /// Publisher or `Unknown`
    #[must_use]
    pub fn publisher_or_unknown(&self) -> &str {
        self.publisher.as_deref().unwrap_or(UNKNOWN)
    }

    /// Version or `Unknown`
    #[must_use]
    pub fn version_or_unknown(&self) -> &str {
        self.version.as_deref().unwrap_or(UNKNOWN)
    }

    /// Install date as `YYYY-MM-DD` or `Unknown`
    #[must_use]
    pub fn install_date_or_unknown(&self) -> String {
        self.install_date
            .map_or_else(|| UNKNOWN.to_string(), |d| d.format("%Y-%m-%d").to_string())
    }

    /// Install location or `Unknown`
    #[must_use]
    pub fn install_location_or_unknown(&self) -> &str {
        self.install_location.as_deref().unwrap_or(UNKNOWN)
    }
}

/// Parse a compact `YYYYMMDD` install date
///
/// The raw value must be exactly eight ASCII digits. Separators are inserted
/// (`YYYY/MM/DD`) before parsing, so impossible dates such as `20231301` are
/// rejected as well.
#[must_use]
pub fn parse_install_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let separated = format!("{}/{}/{}", &raw[..4], &raw[4..6], &raw[6..]);
    NaiveDate::parse_from_str(&separated, "%Y/%m/%d").ok()
}
