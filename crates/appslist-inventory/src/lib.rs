//! appslist-inventory: installed software enumeration
//!
//! Walks the uninstall registrations of the local configuration store (machine-wide,
//! 32-bit compatibility and per-user) and turns each registration into a `SoftwareEntry`.

pub mod catalog;
pub mod enumerator;
pub mod error;
pub mod powershell;
pub mod registry;
pub mod store;
pub mod types;

pub use catalog::{CatalogSource, Product, ProductCatalog, ProductList, UnavailableCatalog, WmiCatalogSource};
pub use enumerator::{Entries, Enumerator};
pub use error::InventoryError;
pub use registry::PowerShellStore;
pub use store::{ConfigStore, Hive, KeyPath, MemoryStore};
pub use types::{Scope, SoftwareEntry, UNKNOWN};
