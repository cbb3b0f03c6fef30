//! Settings file discovery

use std::path::{Path, PathBuf};

use eyre::eyre;

/// Environment variable naming the settings file
pub const CONFIG_ENV: &str = "APPSLIST_CONFIG";

/// Settings file name looked up next to the executable and in the user config dir
pub const SETTINGS_FILE: &str = "Settings.toml";

/// Pick the settings file to load
///
/// An explicit path wins, then `APPSLIST_CONFIG`, then `Settings.toml` beside
/// the executable, then `<config dir>/appslist/Settings.toml`.
///
/// # Errors
/// Returns error if no candidate exists
pub fn resolve_path(explicit: Option<PathBuf>) -> eyre::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let candidates = candidates(exe_dir.as_deref(), dirs::config_dir().as_deref());

    candidates
        .iter()
        .find(|path| path.exists())
        .cloned()
        .ok_or_else(|| {
            eyre!(
                "no settings file found, looked in: {}",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}

fn candidates(exe_dir: Option<&Path>, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = exe_dir {
        paths.push(dir.join(SETTINGS_FILE));
    }
    if let Some(dir) = config_dir {
        paths.push(dir.join("appslist").join(SETTINGS_FILE));
    }
    paths
}
