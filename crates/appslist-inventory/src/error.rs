//! Error types for appslist-inventory

use thiserror::Error;

/// Errors that can occur during inventory operations
#[derive(Error, Debug, Clone)]
pub enum InventoryError {
    /// The configuration store cannot be queried at all
    #[error("configuration store unavailable: {0}")]
    StoreUnavailable(String),

    /// Reading a key from the store failed
    #[error("failed to read {key}: {message}")]
    ReadFailed {
        /// Key that was being read
        key: String,
        /// Underlying error
        message: String,
    },

    /// A single value of a single entry could not be extracted
    #[error("failed to read field {field} of {key}: {message}")]
    FieldError {
        /// Key of the entry
        key: String,
        /// Value name
        field: String,
        /// Underlying error
        message: String,
    },

    /// Product catalog query failed
    #[error("product catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Failed to parse product catalog output
    #[error("product catalog parse error: {0}")]
    CatalogParse(String),
}
