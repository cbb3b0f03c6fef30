//! Inventory report rendering and persistence

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use appslist_inventory::{InventoryError, Scope, SoftwareEntry};

use crate::error::WriteError;

/// Entries found in one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Where the entries came from
    pub scope: Scope,
    /// Entries in enumeration order
    pub entries: Vec<SoftwareEntry>,
}

/// A fully materialized inventory report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    machine_name: String,
    generated_at: NaiveDateTime,
    sections: Vec<Section>,
}

impl Report {
    /// Empty report; the machine and 32-bit sections are always present
    pub fn new(machine_name: impl Into<String>, generated_at: NaiveDateTime) -> Self {
        Self {
            machine_name: machine_name.into(),
            generated_at,
            sections: vec![
                Section {
                    scope: Scope::Machine,
                    entries: Vec::new(),
                },
                Section {
                    scope: Scope::Machine32Bit,
                    entries: Vec::new(),
                },
            ],
        }
    }

    /// Build a report from enumerated entries, stopping at the first scope-level error
    ///
    /// # Errors
    /// Returns the first `Err` item produced by `entries`
    pub fn collect<I>(
        machine_name: impl Into<String>,
        generated_at: NaiveDateTime,
        entries: I,
    ) -> Result<Self, InventoryError>
    where
        I: IntoIterator<Item = Result<(Scope, SoftwareEntry), InventoryError>>,
    {
        let mut report = Self::new(machine_name, generated_at);
        for item in entries {
            let (scope, entry) = item?;
            report.push(scope, entry);
        }
        Ok(report)
    }

    /// Append an entry to its scope's section, opening a new section for a new scope
    pub fn push(&mut self, scope: Scope, entry: SoftwareEntry) {
        if let Some(section) = self.sections.iter_mut().find(|s| s.scope == scope) {
            section.entries.push(entry);
            return;
        }

        debug!(scope = %scope, "opening report section");
        self.sections.push(Section {
            scope,
            entries: vec![entry],
        });
    }

    /// Machine name shown in the title
    #[must_use]
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Generation timestamp
    #[must_use]
    pub fn generated_at(&self) -> NaiveDateTime {
        self.generated_at
    }

    /// Sections in output order
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Total number of entries across sections
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }

    /// `AppsList_<YYYY-MM-DD>.txt` for the generation date
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("AppsList_{}.txt", self.generated_at.format("%Y-%m-%d"))
    }

    fn title(&self) -> String {
        format!(
            "List of apps on {} as of {}",
            self.machine_name,
            self.generated_at.format("%Y-%m-%d %H:%M")
        )
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.title();
        writeln!(f, "{title}")?;
        writeln!(f, "{}", "-".repeat(title.chars().count()))?;
        writeln!(f)?;

        for section in &self.sections {
            writeln!(f, "{}", section.scope.label())?;
            writeln!(f)?;

            for entry in &section.entries {
                writeln!(f, "Name: {}", entry.display_name)?;
                writeln!(f, "Publisher: {}", entry.publisher_or_unknown())?;
                writeln!(f, "Version: {}", entry.version_or_unknown())?;
                writeln!(f, "Install date: {}", entry.install_date_or_unknown())?;
                writeln!(f, "Install location: {}", entry.install_location_or_unknown())?;
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

/// Render `report` into `destination`, replacing any same-day file
///
/// # Errors
/// Returns `WriteError::Io` if the file cannot be created or written
pub async fn write_report(report: &Report, destination: &Path) -> Result<PathBuf, WriteError> {
    let path = destination.join(report.file_name());
    let rendered = report.to_string();

    tokio::fs::write(&path, rendered.as_bytes())
        .await
        .map_err(|e| WriteError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;

    info!(path = %path.display(), bytes = rendered.len(), "report written");
    Ok(path)
}
