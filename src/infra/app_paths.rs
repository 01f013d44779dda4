//! Usage: Resolve the per-user data directory (settings, sqlite, logs).

use crate::shared::error::AppResult;
use std::path::PathBuf;

pub const HOME_ENV_VAR: &str = "DELOCALISE_HOME";
const APP_DIR_NAME: &str = "delocalise";
const LOGS_DIR_NAME: &str = "logs";

pub fn app_data_dir() -> AppResult<PathBuf> {
    let dir = resolve_app_data_dir(std::env::var_os(HOME_ENV_VAR).map(PathBuf::from))?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("SYSTEM_ERROR: failed to create app data dir {}: {e}", dir.display()))?;
    Ok(dir)
}

pub fn logs_dir(app_dir: &std::path::Path) -> AppResult<PathBuf> {
    let dir = app_dir.join(LOGS_DIR_NAME);
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("SYSTEM_ERROR: failed to create logs dir {}: {e}", dir.display()))?;
    Ok(dir)
}

fn resolve_app_data_dir(override_dir: Option<PathBuf>) -> AppResult<PathBuf> {
    if let Some(dir) = override_dir.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(dir);
    }
    let base = dirs::data_dir()
        .ok_or_else(|| "SYSTEM_ERROR: unable to resolve the user data directory".to_string())?;
    Ok(base.join(APP_DIR_NAME))
}
