//! Installed software enumeration over a `ConfigStore`

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::catalog::ProductCatalog;
use crate::error::InventoryError;
use crate::store::{ConfigStore, Hive, KeyPath};
use crate::types::{Scope, SoftwareEntry, parse_install_date};

/// Machine-wide uninstall registrations (also the per-user sub-path)
pub const UNINSTALL_PATH: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";

/// 32-bit uninstall registrations on 64-bit Windows
pub const UNINSTALL_PATH_32: &str = r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall";

/// Account identifier to profile directory mapping
pub const PROFILE_LIST_PATH: &str = r"SOFTWARE\Microsoft\Windows NT\CurrentVersion\ProfileList";

const DISPLAY_NAME: &str = "DisplayName";
const PUBLISHER: &str = "Publisher";
const DISPLAY_VERSION: &str = "DisplayVersion";
const INSTALL_DATE: &str = "InstallDate";
const INSTALL_LOCATION: &str = "InstallLocation";
const PROFILE_IMAGE_PATH: &str = "ProfileImagePath";

/// Walks uninstall registrations and extracts software entries
pub struct Enumerator<'a> {
    store: &'a dyn ConfigStore,
    catalog: &'a dyn ProductCatalog,
}

impl<'a> Enumerator<'a> {
    /// Create an enumerator over `store`, using `catalog` for missing install locations
    pub fn new(store: &'a dyn ConfigStore, catalog: &'a dyn ProductCatalog) -> Self {
        Self { store, catalog }
    }

    /// Lazily enumerate every entry, machine scopes first, then users in store order
    ///
    /// A scope root that cannot be listed yields an `Err` item; entry-level
    /// problems never do.
    #[must_use]
    pub fn entries(&self) -> Entries<'a> {
        let pending = VecDeque::from([
            PendingRoot::Scope(
                Scope::Machine,
                KeyPath::new(Hive::LocalMachine, UNINSTALL_PATH),
            ),
            PendingRoot::Scope(
                Scope::Machine32Bit,
                KeyPath::new(Hive::LocalMachine, UNINSTALL_PATH_32),
            ),
            PendingRoot::Users,
        ]);

        Entries {
            store: self.store,
            catalog: self.catalog,
            pending,
            current: None,
        }
    }
}

enum PendingRoot {
    /// Root whose children still have to be listed
    Scope(Scope, KeyPath),
    /// Root whose children are already known
    Listed(Scope, KeyPath, Vec<String>),
    /// Placeholder expanded into one `Listed` root per user account
    Users,
}

struct CurrentRoot {
    scope: Scope,
    key: KeyPath,
    children: std::vec::IntoIter<String>,
}

/// Iterator returned by [`Enumerator::entries`]
pub struct Entries<'a> {
    store: &'a dyn ConfigStore,
    catalog: &'a dyn ProductCatalog,
    pending: VecDeque<PendingRoot>,
    current: Option<CurrentRoot>,
}

impl Entries<'_> {
    fn begin(&mut self, scope: Scope, key: KeyPath, children: Vec<String>) {
        info!(scope = %scope, key = %key, count = children.len(), "processing apps");
        self.current = Some(CurrentRoot {
            scope,
            key,
            children: children.into_iter(),
        });
    }

    /// Expand `HKU` into the user roots that actually contain registrations
    fn user_roots(&self) -> Result<Vec<PendingRoot>, InventoryError> {
        let users = KeyPath::root(Hive::Users);
        let Some(sids) = self.store.subkey_names(&users)? else {
            debug!("no user hive present");
            return Ok(Vec::new());
        };

        let mut roots = Vec::new();
        for sid in sids {
            let key = users.join(&sid).join(UNINSTALL_PATH);
            let children = match self.store.subkey_names(&key) {
                Ok(Some(children)) if !children.is_empty() => children,
                Ok(_) => {
                    debug!(sid = %sid, "no per-user registrations, skipping account");
                    continue;
                }
                Err(e) => {
                    warn!(sid = %sid, error = %e, "failed to list per-user registrations, skipping account");
                    continue;
                }
            };

            let profile = self.profile_name(&sid);
            roots.push(PendingRoot::Listed(Scope::User { sid, profile }, key, children));
        }

        Ok(roots)
    }

    /// Last component of the account's profile directory, or the SID itself
    fn profile_name(&self, sid: &str) -> String {
        let key = KeyPath::new(Hive::LocalMachine, PROFILE_LIST_PATH).join(sid);
        match self.store.value(&key, PROFILE_IMAGE_PATH) {
            Ok(Some(path)) => profile_from_image_path(&path).unwrap_or_else(|| sid.to_string()),
            Ok(None) => sid.to_string(),
            Err(e) => {
                warn!(sid = %sid, error = %e, "profile lookup failed");
                sid.to_string()
            }
        }
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<(Scope, SoftwareEntry), InventoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                for child in current.children.by_ref() {
                    let key = current.key.join(&child);
                    if let Some(entry) = extract_entry(self.store, self.catalog, &key) {
                        return Some(Ok((current.scope.clone(), entry)));
                    }
                }
                self.current = None;
            }

            match self.pending.pop_front()? {
                PendingRoot::Scope(scope, key) => match self.store.subkey_names(&key) {
                    Ok(Some(children)) => self.begin(scope, key, children),
                    Ok(None) => debug!(scope = %scope, key = %key, "uninstall root absent"),
                    Err(e) => return Some(Err(e)),
                },
                PendingRoot::Listed(scope, key, children) => self.begin(scope, key, children),
                PendingRoot::Users => match self.user_roots() {
                    Ok(roots) => {
                        for root in roots.into_iter().rev() {
                            self.pending.push_front(root);
                        }
                    }
                    Err(e) => return Some(Err(e)),
                },
            }
        }
    }
}

/// Build an entry from one uninstall registration, `None` if it has no display name
fn extract_entry(
    store: &dyn ConfigStore,
    catalog: &dyn ProductCatalog,
    key: &KeyPath,
) -> Option<SoftwareEntry> {
    let Some(display_name) = read_field(store, key, DISPLAY_NAME) else {
        debug!(key = %key, "no display name, skipping");
        return None;
    };

    let install_location = read_field(store, key, INSTALL_LOCATION)
        .or_else(|| lookup_install_location(catalog, &display_name));

    Some(SoftwareEntry {
        publisher: read_field(store, key, PUBLISHER),
        version: read_field(store, key, DISPLAY_VERSION),
        install_date: read_field(store, key, INSTALL_DATE)
            .as_deref()
            .and_then(parse_install_date),
        install_location,
        display_name,
    })
}

/// Read a value; blank values and read failures both come back as `None`
fn read_field(store: &dyn ConfigStore, key: &KeyPath, field: &str) -> Option<String> {
    match store.value(key, field) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            let err = InventoryError::FieldError {
                key: key.to_string(),
                field: field.to_string(),
                message: e.to_string(),
            };
            warn!(error = %err, "field degraded to unknown");
            None
        }
    }
}

fn lookup_install_location(catalog: &dyn ProductCatalog, display_name: &str) -> Option<String> {
    match catalog.find_install_location(display_name) {
        Ok(location) => location,
        Err(e) => {
            debug!(name = %display_name, error = %e, "catalog lookup failed");
            None
        }
    }
}

fn profile_from_image_path(path: &str) -> Option<String> {
    path.trim()
        .trim_end_matches(['\\', '/'])
        .rsplit(['\\', '/'])
        .next()
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
}
