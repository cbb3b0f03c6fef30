//! Windows registry access through PowerShell
//!
//! One PowerShell run lists a key together with the values of every direct
//! child, so walking an uninstall root costs a single process. Output is UTF-8
//! JSON; a missing key exits with [`KEY_NOT_FOUND`], anything else non-zero
//! (access denied included) is a read failure.

use std::collections::HashMap;
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::InventoryError;
use crate::powershell::{self, POWERSHELL_EXE};
use crate::store::{ConfigStore, KeyPath};

/// Exit status of the listing script when the key does not exist
pub const KEY_NOT_FOUND: i32 = 3;

/// Lists `{path}`: its own values plus every child's name and values
///
/// A child that cannot be opened is reported with an `Error` message instead
/// of failing the whole listing.
const LIST_KEY_SCRIPT: &str = r"$ErrorActionPreference = 'Stop'
function Read-Values($k) {
    $v = @{}
    foreach ($n in $k.GetValueNames()) { if ($n) { $v[$n] = [string]$k.GetValue($n) } }
    $v
}
try { $key = Get-Item -LiteralPath {path} }
catch [System.Management.Automation.ItemNotFoundException] { exit 3 }
$children = @(foreach ($name in $key.GetSubKeyNames()) {
    try { [pscustomobject]@{ Name = $name; Values = (Read-Values ($key.OpenSubKey($name))) } }
    catch { [pscustomobject]@{ Name = $name; Error = $_.Exception.Message } }
})
ConvertTo-Json -Compress -Depth 4 -InputObject ([pscustomobject]@{ Values = (Read-Values $key); Children = $children })";

/// Script output for one key
#[derive(Debug, Default, Deserialize)]
struct Listing {
    #[serde(rename = "Values", default)]
    values: Option<Map<String, Value>>,
    #[serde(rename = "Children", default)]
    children: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChildListing {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Values", default)]
    values: Option<Map<String, Value>>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

/// Values of one key, as last seen when its parent was listed
#[derive(Debug, Clone, PartialEq, Eq)]
enum CachedKey {
    /// Value names lowercased
    Values(HashMap<String, String>),
    /// The key could not be opened
    Unreadable(String),
}

/// Registry store backed by PowerShell
///
/// Listing a key remembers its children's values until the key is listed
/// again, so reading the fields of an entry needs no further process.
#[derive(Debug)]
pub struct PowerShellStore {
    program: String,
    /// Parent key (lowercased) to its children (lowercased name)
    cache: Mutex<HashMap<String, HashMap<String, CachedKey>>>,
}

impl PowerShellStore {
    /// Store using `powershell.exe` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(POWERSHELL_EXE)
    }

    /// Store using an explicit PowerShell location
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn list(&self, key: &KeyPath) -> Result<Option<Listing>, InventoryError> {
        let literal = powershell::quote(&format!("Registry::{}", key.long_form()));
        let script = LIST_KEY_SCRIPT.replace("{path}", &literal);

        trace!(key = %key, "listing registry key");

        let output = Command::new(&self.program)
            .args(powershell::arguments(&script))
            .output()
            .map_err(|e| InventoryError::StoreUnavailable(format!("{}: {e}", self.program)))?;

        interpret(key, output.status.code(), &output.stdout, &output.stderr)
    }

    /// Replace the cached children of `key` with `listing`'s and return their names
    fn remember(&self, key: &KeyPath, listing: Listing) -> Vec<String> {
        let children = parse_children(listing.children);
        let names = children.iter().map(|(name, _)| name.clone()).collect();

        let cached = children
            .into_iter()
            .map(|(name, state)| (name.to_lowercase(), state))
            .collect();
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_id(key), cached);

        names
    }

    /// `None` when `key` was not part of a listing
    fn cached_value(
        &self,
        key: &KeyPath,
        name: &str,
    ) -> Option<Result<Option<String>, InventoryError>> {
        let id = cache_id(key);
        let (parent, child) = id.rsplit_once('\\')?;

        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.get(parent)?.get(child)? {
            CachedKey::Values(values) => Some(Ok(values.get(&name.to_lowercase()).cloned())),
            CachedKey::Unreadable(message) => Some(Err(InventoryError::ReadFailed {
                key: key.to_string(),
                message: message.clone(),
            })),
        }
    }
}

impl Default for PowerShellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for PowerShellStore {
    fn subkey_names(&self, key: &KeyPath) -> Result<Option<Vec<String>>, InventoryError> {
        Ok(self.list(key)?.map(|listing| self.remember(key, listing)))
    }

    fn value(&self, key: &KeyPath, name: &str) -> Result<Option<String>, InventoryError> {
        if let Some(cached) = self.cached_value(key, name) {
            return cached;
        }

        let Some(listing) = self.list(key)? else {
            return Ok(None);
        };
        let values = lowercase_values(listing.values.unwrap_or_default());
        Ok(values.get(&name.to_lowercase()).cloned())
    }
}

fn cache_id(key: &KeyPath) -> String {
    key.to_string().to_lowercase()
}

/// Map the script's exit status and output to a listing
fn interpret(
    key: &KeyPath,
    status: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<Option<Listing>, InventoryError> {
    match status {
        Some(0) => parse_listing(&powershell::decode_output(stdout))
            .map(Some)
            .map_err(|message| InventoryError::ReadFailed {
                key: key.to_string(),
                message,
            }),
        Some(KEY_NOT_FOUND) => {
            debug!(key = %key, "registry key not found");
            Ok(None)
        }
        status => Err(InventoryError::ReadFailed {
            key: key.to_string(),
            message: format!(
                "powershell exited with {status:?}: {}",
                String::from_utf8_lossy(stderr).trim()
            ),
        }),
    }
}

fn parse_listing(raw: &str) -> Result<Listing, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Listing::default());
    }
    serde_json::from_str(raw).map_err(|e| format!("unexpected listing output: {e}"))
}

/// Children in registry order; a lone child may arrive as a bare object
fn parse_children(children: Option<Value>) -> Vec<(String, CachedKey)> {
    let records = match children {
        Some(Value::Array(records)) => records,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    };

    records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<ChildListing>(record).ok())
        .map(|child| {
            let state = match child.error {
                Some(message) => CachedKey::Unreadable(message),
                None => CachedKey::Values(lowercase_values(child.values.unwrap_or_default())),
            };
            (child.name, state)
        })
        .collect()
}

/// Value names lowercased; non-string data rendered as JSON text, nulls dropped
fn lowercase_values(values: Map<String, Value>) -> HashMap<String, String> {
    values
        .into_iter()
        .filter_map(|(name, value)| {
            let data = match value {
                Value::String(s) => s,
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((name.to_lowercase(), data))
        })
        .collect()
}
