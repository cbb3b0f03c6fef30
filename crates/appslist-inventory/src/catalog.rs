//! Secondary product catalog used to fill in missing install locations

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use appslist_exec::{CommandExecutor, CommandSpec};

use crate::error::InventoryError;
use crate::powershell::{self, POWERSHELL_EXE};

/// Lists every MSI product with its install location as compact JSON
const WIN32_PRODUCT_QUERY: &str = "Get-CimInstance -ClassName Win32_Product | Select-Object Name,InstallLocation | ConvertTo-Json -Compress";

/// Looks up an install location by product name
pub trait ProductCatalog: Send + Sync {
    /// Install location of the first product whose name contains `display_name`
    ///
    /// `Ok(None)` when nothing matches or the match has no location.
    ///
    /// # Errors
    /// Returns an error if the catalog could not be consulted
    fn find_install_location(&self, display_name: &str) -> Result<Option<String>, InventoryError>;
}

/// A catalog product
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    /// Product name
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Install directory
    #[serde(rename = "InstallLocation", default)]
    pub install_location: Option<String>,
}

impl Product {
    /// Create a product
    pub fn new(name: impl Into<String>, install_location: Option<&str>) -> Self {
        Self {
            name: name.into(),
            install_location: install_location.map(ToString::to_string),
        }
    }
}

/// Snapshot of the catalog taken once per run
#[derive(Debug, Clone, Default)]
pub struct ProductList {
    products: Vec<Product>,
}

impl ProductList {
    /// Create a snapshot from products in catalog order
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Number of products
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the snapshot is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Parse `ConvertTo-Json` output
    ///
    /// PowerShell emits a bare object instead of an array when there is
    /// exactly one product, and nothing at all when there are none.
    ///
    /// # Errors
    /// Returns `InventoryError::CatalogParse` if the output is not valid JSON
    pub fn from_json(raw: &str) -> Result<Self, InventoryError> {
        let raw = raw.trim_start_matches('\u{feff}').trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let value: Value =
            serde_json::from_str(raw).map_err(|e| InventoryError::CatalogParse(e.to_string()))?;

        let records = match value {
            Value::Array(arr) => arr,
            Value::Null => Vec::new(),
            single => vec![single],
        };

        let products = records
            .into_iter()
            .filter_map(|record| serde_json::from_value::<Product>(record).ok())
            .filter(|product| !product.name.is_empty())
            .collect();

        Ok(Self { products })
    }
}

impl ProductCatalog for ProductList {
    fn find_install_location(&self, display_name: &str) -> Result<Option<String>, InventoryError> {
        Ok(self
            .products
            .iter()
            .find(|product| product.name.contains(display_name))
            .and_then(|product| product.install_location.clone())
            .filter(|location| !location.trim().is_empty()))
    }
}

/// Catalog that could not be loaded; every lookup fails
#[derive(Debug, Clone)]
pub struct UnavailableCatalog {
    reason: String,
}

impl UnavailableCatalog {
    /// Create with the load failure reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ProductCatalog for UnavailableCatalog {
    fn find_install_location(&self, _display_name: &str) -> Result<Option<String>, InventoryError> {
        Err(InventoryError::CatalogUnavailable(self.reason.clone()))
    }
}

/// Produces a fresh catalog for each run
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Load the catalog
    ///
    /// # Errors
    /// Returns an error if the catalog could not be queried or parsed
    async fn load(&self) -> Result<Arc<dyn ProductCatalog>, InventoryError>;
}

#[async_trait]
impl CatalogSource for ProductList {
    async fn load(&self) -> Result<Arc<dyn ProductCatalog>, InventoryError> {
        Ok(Arc::new(self.clone()))
    }
}

/// Catalog source querying `Win32_Product` through PowerShell
pub struct WmiCatalogSource {
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

impl WmiCatalogSource {
    /// Create a source; queries exceeding `timeout` fail
    pub fn new(executor: Arc<dyn CommandExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    fn command() -> CommandSpec {
        CommandSpec::new(POWERSHELL_EXE).args(powershell::arguments(WIN32_PRODUCT_QUERY))
    }
}

#[async_trait]
impl CatalogSource for WmiCatalogSource {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<Arc<dyn ProductCatalog>, InventoryError> {
        debug!(timeout = ?self.timeout, executor = self.executor.executor_type(), "loading product catalog");

        let result = self
            .executor
            .run_with_timeout(&Self::command(), self.timeout)
            .await
            .map_err(|e| InventoryError::CatalogUnavailable(e.to_string()))?;

        if !result.success() {
            return Err(InventoryError::CatalogUnavailable(format!(
                "query exited with status {}: {}",
                result.status,
                result.stderr.trim()
            )));
        }

        let products = ProductList::from_json(&result.stdout)?;
        info!(count = products.len(), duration = ?result.duration, "product catalog loaded");

        Ok(Arc::new(products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use appslist_exec::{CommandResult, ExecError};

    struct MockExecutor {
        result: Result<CommandResult, ExecError>,
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn run(&self, _cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
            self.result.clone()
        }

        async fn run_with_timeout(
            &self,
            cmd: &CommandSpec,
            _timeout: Duration,
        ) -> Result<CommandResult, ExecError> {
            self.run(cmd).await
        }

        fn executor_type(&self) -> &'static str {
            "mock"
        }
    }

    fn output(status: i32, stdout: &str) -> CommandResult {
        CommandResult {
            status,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_from_json_array_and_single_object() {
        let list = ProductList::from_json(
            r#"[{"Name":"Contoso Agent 5.1","InstallLocation":"C:\\Contoso\\"},{"Name":"Other","InstallLocation":null}]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);

        let single = ProductList::from_json(r#"{"Name":"Solo","InstallLocation":"D:\\Solo"}"#).unwrap();
        assert_eq!(single.len(), 1);

        assert!(ProductList::from_json("  ").unwrap().is_empty());
        assert!(ProductList::from_json("not json").is_err());
    }

    #[test]
    fn test_from_json_keeps_non_ascii_names() {
        let list = ProductList::from_json(
            "\u{feff}[{\"Name\":\"Logiciel Comptabilité\",\"InstallLocation\":\"C:\\\\Comptabilité\"}]",
        )
        .unwrap();

        assert_eq!(
            list.find_install_location("Comptabilité").unwrap(),
            Some(r"C:\Comptabilité".to_string())
        );
    }

    #[test]
    fn test_query_is_encoded() {
        let cmd = WmiCatalogSource::command();
        let argv: Vec<&str> = cmd.argv().collect();

        assert_eq!(cmd.program(), POWERSHELL_EXE);
        assert_eq!(&argv[..3], ["-NoProfile", "-NonInteractive", "-EncodedCommand"]);
        assert_eq!(argv[3], powershell::encode_script(WIN32_PRODUCT_QUERY));
    }

    #[test]
    fn test_substring_match() {
        let list = ProductList::new(vec![
            Product::new("Unrelated", Some(r"C:\Unrelated")),
            Product::new("Contoso Agent 5.1 (x64)", Some(r"C:\Program Files\Contoso")),
        ]);

        assert_eq!(
            list.find_install_location("Contoso Agent").unwrap(),
            Some(r"C:\Program Files\Contoso".to_string())
        );
        assert_eq!(list.find_install_location("Fabrikam").unwrap(), None);
    }

    #[test]
    fn test_match_without_location_is_none() {
        let list = ProductList::new(vec![Product::new("Contoso", Some("  "))]);
        assert_eq!(list.find_install_location("Contoso").unwrap(), None);
    }

    #[test]
    fn test_unavailable_catalog_errors() {
        let catalog = UnavailableCatalog::new("access denied");
        assert!(matches!(
            catalog.find_install_location("anything"),
            Err(InventoryError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_wmi_source_parses_output() {
        let source = WmiCatalogSource::new(
            Arc::new(MockExecutor {
                result: Ok(output(0, r#"{"Name":"Contoso","InstallLocation":"C:\\Contoso"}"#)),
            }),
            Duration::from_secs(1),
        );

        let catalog = source.load().await.unwrap();
        assert_eq!(
            catalog.find_install_location("Contoso").unwrap(),
            Some(r"C:\Contoso".to_string())
        );
    }

    #[tokio::test]
    async fn test_wmi_source_failures() {
        let failed = WmiCatalogSource::new(
            Arc::new(MockExecutor {
                result: Ok(output(1, "")),
            }),
            Duration::from_secs(1),
        );
        assert!(matches!(
            failed.load().await,
            Err(InventoryError::CatalogUnavailable(_))
        ));

        let timed_out = WmiCatalogSource::new(
            Arc::new(MockExecutor {
                result: Err(ExecError::Timeout {
                    timeout: Duration::from_secs(1),
                }),
            }),
            Duration::from_secs(1),
        );
        assert!(matches!(
            timed_out.load().await,
            Err(InventoryError::CatalogUnavailable(_))
        ));
    }
}
