//! Usage: Persisted application settings (schema + read/write helpers).

use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 2;
const SCHEMA_VERSION_ADD_SILENT_AUTH_TIMEOUT: u32 = 2;
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const CLIENT_ID_ENV_VAR: &str = "DELOCALISE_CLIENT_ID";

pub const DEFAULT_GATEWAY_PORT: u16 = 37170;
pub const MAX_GATEWAY_PORT: u16 = 37179;
pub const DEFAULT_CALLBACK_PORT: u16 = 37180;
const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const DEFAULT_VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const DEFAULT_REFERRER: &str = "https://youtube.com";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";
const DEFAULT_AUTHORIZATION_TIMEOUT_SECONDS: u32 = 300;
const DEFAULT_SILENT_AUTHORIZATION_TIMEOUT_SECONDS: u32 = 20;
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_LOG_RETENTION_DAYS: u32 = 14;
const MAX_AUTHORIZATION_TIMEOUT_SECONDS: u32 = 60 * 60;
const MAX_SILENT_AUTHORIZATION_TIMEOUT_SECONDS: u32 = 5 * 60;
const MAX_LOG_RETENTION_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    pub schema_version: u32,
    // OAuth client registered for the implicit grant with a loopback redirect.
    pub client_id: String,
    pub auth_url: String,
    pub token_info_url: String,
    pub videos_url: String,
    pub referrer: String,
    pub scopes: Vec<String>,
    pub callback_port: u16,
    pub gateway_port: u16,
    pub authorization_timeout_seconds: u32,
    pub silent_authorization_timeout_seconds: u32,
    pub authorize_on_startup: bool,
    pub log_filter: String,
    pub log_retention_days: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            client_id: String::new(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_info_url: DEFAULT_TOKEN_INFO_URL.to_string(),
            videos_url: DEFAULT_VIDEOS_URL.to_string(),
            referrer: DEFAULT_REFERRER.to_string(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            callback_port: DEFAULT_CALLBACK_PORT,
            gateway_port: DEFAULT_GATEWAY_PORT,
            authorization_timeout_seconds: DEFAULT_AUTHORIZATION_TIMEOUT_SECONDS,
            silent_authorization_timeout_seconds: DEFAULT_SILENT_AUTHORIZATION_TIMEOUT_SECONDS,
            authorize_on_startup: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

fn reset_if_blank(value: &mut String, default: &str) -> bool {
    if value.trim().is_empty() {
        *value = default.to_string();
        return true;
    }
    false
}

fn sanitize_endpoints(settings: &mut AppSettings) -> bool {
    let mut changed = false;
    changed |= reset_if_blank(&mut settings.auth_url, DEFAULT_AUTH_URL);
    changed |= reset_if_blank(&mut settings.token_info_url, DEFAULT_TOKEN_INFO_URL);
    changed |= reset_if_blank(&mut settings.videos_url, DEFAULT_VIDEOS_URL);
    changed |= reset_if_blank(&mut settings.referrer, DEFAULT_REFERRER);

    let before = settings.scopes.len();
    settings.scopes.retain(|s| !s.trim().is_empty());
    if settings.scopes.len() != before {
        changed = true;
    }
    if settings.scopes.is_empty() {
        settings.scopes = vec![DEFAULT_SCOPE.to_string()];
        changed = true;
    }
    changed
}

fn sanitize_timeouts(settings: &mut AppSettings) -> bool {
    let mut changed = false;

    if settings.authorization_timeout_seconds == 0 {
        settings.authorization_timeout_seconds = DEFAULT_AUTHORIZATION_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.authorization_timeout_seconds > MAX_AUTHORIZATION_TIMEOUT_SECONDS {
        settings.authorization_timeout_seconds = MAX_AUTHORIZATION_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.silent_authorization_timeout_seconds == 0 {
        settings.silent_authorization_timeout_seconds =
            DEFAULT_SILENT_AUTHORIZATION_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.silent_authorization_timeout_seconds > MAX_SILENT_AUTHORIZATION_TIMEOUT_SECONDS {
        settings.silent_authorization_timeout_seconds = MAX_SILENT_AUTHORIZATION_TIMEOUT_SECONDS;
        changed = true;
    }

    changed
}

fn sanitize_logging(settings: &mut AppSettings) -> bool {
    let mut changed = reset_if_blank(&mut settings.log_filter, DEFAULT_LOG_FILTER);
    if settings.log_retention_days == 0 {
        settings.log_retention_days = DEFAULT_LOG_RETENTION_DAYS;
        changed = true;
    }
    if settings.log_retention_days > MAX_LOG_RETENTION_DAYS {
        settings.log_retention_days = MAX_LOG_RETENTION_DAYS;
        changed = true;
    }
    changed
}

fn migrate_add_silent_auth_timeout(
    settings: &mut AppSettings,
    schema_version_present: bool,
) -> bool {
    // v2: silent (prompt=none) attempts got their own, shorter timeout.
    if schema_version_present && settings.schema_version >= SCHEMA_VERSION_ADD_SILENT_AUTH_TIMEOUT
    {
        return false;
    }
    settings.schema_version = SCHEMA_VERSION_ADD_SILENT_AUTH_TIMEOUT;
    true
}

fn apply_env_overrides(settings: &mut AppSettings, mut get: impl FnMut(&str) -> Option<String>) {
    if let Some(client_id) = get(CLIENT_ID_ENV_VAR)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    {
        settings.client_id = client_id;
    }
}

pub fn settings_path(app_dir: &Path) -> PathBuf {
    app_dir.join(SETTINGS_FILE_NAME)
}

fn parse_settings_json(content: &str) -> AppResult<(AppSettings, bool)> {
    let raw: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("failed to parse settings.json: {e}"))?;
    let schema_version_present = raw.get("schema_version").is_some();
    let settings: AppSettings =
        serde_json::from_value(raw).map_err(|e| format!("failed to parse settings.json: {e}"))?;
    Ok((settings, schema_version_present))
}

pub fn read(app_dir: &Path) -> AppResult<AppSettings> {
    read_with_env(app_dir, |key| std::env::var(key).ok())
}

fn read_with_env(
    app_dir: &Path,
    get: impl FnMut(&str) -> Option<String>,
) -> AppResult<AppSettings> {
    let path = settings_path(app_dir);

    if !path.exists() {
        let mut settings = AppSettings::default();
        // Best-effort: create default settings.json on first read so it is discoverable/editable.
        if let Err(err) = write(app_dir, &settings) {
            tracing::warn!("failed to write default settings: {}", err);
        }
        apply_env_overrides(&mut settings, get);
        return Ok(settings);
    }

    let content =
        std::fs::read_to_string(&path).map_err(|e| format!("failed to read settings: {e}"))?;
    let (mut settings, schema_version_present) = parse_settings_json(&content)?;

    if settings.gateway_port < 1024 {
        return Err(
            "SEC_INVALID_INPUT: invalid settings.json: gateway_port must be between 1024 and 65535"
                .to_string()
                .into(),
        );
    }

    let mut repaired = false;
    repaired |= migrate_add_silent_auth_timeout(&mut settings, schema_version_present);
    repaired |= sanitize_endpoints(&mut settings);
    repaired |= sanitize_timeouts(&mut settings);
    repaired |= sanitize_logging(&mut settings);
    if repaired {
        // Best-effort: persist repaired values while keeping read semantics.
        if let Err(err) = write(app_dir, &settings) {
            tracing::warn!("failed to persist repaired settings: {}", err);
        }
    }

    apply_env_overrides(&mut settings, get);
    Ok(settings)
}

pub fn write(app_dir: &Path, settings: &AppSettings) -> AppResult<AppSettings> {
    if settings.gateway_port < 1024 {
        return Err("SEC_INVALID_INPUT: gateway_port must be between 1024 and 65535".into());
    }
    if settings.log_retention_days == 0 {
        return Err("SEC_INVALID_INPUT: log_retention_days must be >= 1".into());
    }
    if settings.authorization_timeout_seconds == 0
        || settings.authorization_timeout_seconds > MAX_AUTHORIZATION_TIMEOUT_SECONDS
    {
        return Err(format!(
            "SEC_INVALID_INPUT: authorization_timeout_seconds must be within 1..={MAX_AUTHORIZATION_TIMEOUT_SECONDS}"
        )
        .into());
    }

    let path = settings_path(app_dir);
    let tmp_path = path.with_file_name("settings.json.tmp");

    let content = serde_json::to_vec_pretty(settings)
        .map_err(|e| format!("failed to serialize settings: {e}"))?;

    std::fs::write(&tmp_path, content)
        .map_err(|e| format!("failed to write temp settings file: {e}"))?;

    if let Err(e) = std::fs::rename(&tmp_path, &path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(format!("failed to finalize settings: {e}").into());
    }

    Ok(settings.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn read_creates_default_file_on_first_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = read_with_env(dir.path(), no_env).expect("read");

        assert_eq!(settings, AppSettings::default());
        assert!(settings_path(dir.path()).exists());
    }

    #[test]
    fn read_sanitizes_zero_timeouts_and_blank_urls() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            settings_path(dir.path()),
            r#"{"schema_version":2,"authorization_timeout_seconds":0,"videos_url":"  ","scopes":[""]}"#,
        )
        .expect("write settings");

        let settings = read_with_env(dir.path(), no_env).expect("read");
        assert_eq!(
            settings.authorization_timeout_seconds,
            DEFAULT_AUTHORIZATION_TIMEOUT_SECONDS
        );
        assert_eq!(settings.videos_url, DEFAULT_VIDEOS_URL);
        assert_eq!(settings.scopes, vec![DEFAULT_SCOPE.to_string()]);

        let persisted = std::fs::read_to_string(settings_path(dir.path())).expect("re-read");
        assert!(persisted.contains(DEFAULT_VIDEOS_URL));
    }

    #[test]
    fn read_migrates_missing_schema_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(settings_path(dir.path()), r#"{"client_id":"abc"}"#).expect("write");

        let settings = read_with_env(dir.path(), no_env).expect("read");
        assert_eq!(settings.schema_version, SCHEMA_VERSION);
        assert_eq!(settings.client_id, "abc");
    }

    #[test]
    fn read_rejects_privileged_gateway_port() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(settings_path(dir.path()), r#"{"gateway_port":80}"#).expect("write");

        let err = read_with_env(dir.path(), no_env).expect_err("should reject");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
    }

    #[test]
    fn env_client_id_overrides_file_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(settings_path(dir.path()), r#"{"client_id":"from-file"}"#).expect("write");

        let settings = read_with_env(dir.path(), |key| {
            (key == CLIENT_ID_ENV_VAR).then(|| " from-env ".to_string())
        })
        .expect("read");
        assert_eq!(settings.client_id, "from-env");

        let persisted = std::fs::read_to_string(settings_path(dir.path())).expect("re-read");
        assert!(!persisted.contains("from-env"));
    }

    #[test]
    fn sanitize_logging_clamps_retention() {
        let mut settings = AppSettings {
            log_retention_days: 10_000,
            ..AppSettings::default()
        };
        assert!(sanitize_logging(&mut settings));
        assert_eq!(settings.log_retention_days, MAX_LOG_RETENTION_DAYS);
        assert!(!sanitize_logging(&mut settings));
    }
}
