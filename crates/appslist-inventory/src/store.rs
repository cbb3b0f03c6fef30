//! Hierarchical configuration store abstraction

use std::collections::HashMap;
use std::fmt;

use crate::error::InventoryError;

/// Root of a key path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hive {
    /// `HKEY_LOCAL_MACHINE`
    LocalMachine,
    /// `HKEY_USERS`
    Users,
}

impl Hive {
    /// Abbreviated name accepted by `reg.exe`
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKLM",
            Hive::Users => "HKU",
        }
    }

    /// Full name as printed by `reg.exe`
    #[must_use]
    pub fn long_name(self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::Users => "HKEY_USERS",
        }
    }
}

/// Path to a key: a hive plus a backslash separated sub-path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    hive: Hive,
    path: String,
}

impl KeyPath {
    /// Create a key path; leading and trailing separators are dropped
    pub fn new(hive: Hive, path: impl AsRef<str>) -> Self {
        Self {
            hive,
            path: path.as_ref().trim_matches('\\').to_string(),
        }
    }

    /// The hive itself
    #[must_use]
    pub fn root(hive: Hive) -> Self {
        Self::new(hive, "")
    }

    /// Path of a descendant key
    #[must_use]
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_matches('\\');
        if self.path.is_empty() {
            Self::new(self.hive, child)
        } else {
            Self::new(self.hive, format!("{}\\{child}", self.path))
        }
    }

    /// Hive
    #[must_use]
    pub fn hive(&self) -> Hive {
        self.hive
    }

    /// Sub-path below the hive (empty for the hive itself)
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path spelled with the full hive name
    #[must_use]
    pub fn long_form(&self) -> String {
        if self.path.is_empty() {
            self.hive.long_name().to_string()
        } else {
            format!("{}\\{}", self.hive.long_name(), self.path)
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(self.hive.short_name())
        } else {
            write!(f, "{}\\{}", self.hive.short_name(), self.path)
        }
    }
}

/// Read-only access to a hierarchical configuration store
///
/// `Ok(None)` means the key (or value) does not exist, which callers treat
/// differently from a failed read.
pub trait ConfigStore: Send + Sync {
    /// Names of the direct children of `key`, in store order
    ///
    /// # Errors
    /// Returns an error if the store could not be queried
    fn subkey_names(&self, key: &KeyPath) -> Result<Option<Vec<String>>, InventoryError>;

    /// String form of value `name` under `key`
    ///
    /// # Errors
    /// Returns an error if the store could not be queried
    fn value(&self, key: &KeyPath, name: &str) -> Result<Option<String>, InventoryError>;
}

#[derive(Debug, Default, Clone)]
struct MemoryKey {
    children: Vec<String>,
    values: HashMap<String, String>,
}

/// In-memory store, keyed case-insensitively like the registry
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    keys: HashMap<String, MemoryKey>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(key: &KeyPath) -> String {
        key.to_string().to_lowercase()
    }

    /// Create `key` and any missing ancestors
    pub fn insert_key(&mut self, key: &KeyPath) {
        if self.keys.contains_key(&Self::normalize(key)) {
            return;
        }

        let mut current = KeyPath::root(key.hive());
        self.keys.entry(Self::normalize(&current)).or_default();

        for component in key.path().split('\\').filter(|c| !c.is_empty()) {
            let child = current.join(component);
            let child_id = Self::normalize(&child);
            if !self.keys.contains_key(&child_id) {
                if let Some(parent) = self.keys.get_mut(&Self::normalize(&current)) {
                    parent.children.push(component.to_string());
                }
                self.keys.insert(child_id, MemoryKey::default());
            }
            current = child;
        }
    }

    /// Set a value, creating the key if needed
    pub fn set_value(&mut self, key: &KeyPath, name: &str, value: impl Into<String>) {
        self.insert_key(key);
        if let Some(node) = self.keys.get_mut(&Self::normalize(key)) {
            node.values.insert(name.to_lowercase(), value.into());
        }
    }

    /// Builder form of [`MemoryStore::insert_key`]
    #[must_use]
    pub fn with_key(mut self, key: &KeyPath) -> Self {
        self.insert_key(key);
        self
    }

    /// Builder form of [`MemoryStore::set_value`]
    #[must_use]
    pub fn with_value(mut self, key: &KeyPath, name: &str, value: impl Into<String>) -> Self {
        self.set_value(key, name, value);
        self
    }
}

impl ConfigStore for MemoryStore {
    fn subkey_names(&self, key: &KeyPath) -> Result<Option<Vec<String>>, InventoryError> {
        Ok(self
            .keys
            .get(&Self::normalize(key))
            .map(|node| node.children.clone()))
    }

    fn value(&self, key: &KeyPath, name: &str) -> Result<Option<String>, InventoryError> {
        Ok(self
            .keys
            .get(&Self::normalize(key))
            .and_then(|node| node.values.get(&name.to_lowercase()).cloned()))
    }
}
