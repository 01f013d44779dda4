//! Usage: SQLite connection setup, schema migrations, and common DB helpers.

mod migrations;

use crate::shared::error::db_err;
use crate::shared::error::AppResult;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE_NAME: &str = "delocalise.db";
const BUSY_TIMEOUT_DEFAULT: Duration = Duration::from_millis(2000);
const POOL_MAX_SIZE_DEFAULT: u32 = 4;
const POOL_CONNECTION_TIMEOUT_DEFAULT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct DbRuntimeConfig {
    busy_timeout: Duration,
    pool_max_size: u32,
}

impl DbRuntimeConfig {
    fn from_env() -> Self {
        Self::from_env_get(|key| env::var(key).ok())
    }

    fn from_env_get(mut get: impl FnMut(&str) -> Option<String>) -> Self {
        let busy_timeout = get("DELOCALISE_DB_BUSY_TIMEOUT_MS")
            .as_deref()
            .and_then(parse_u64_trimmed)
            .filter(|v| *v > 0)
            .map(Duration::from_millis)
            .unwrap_or(BUSY_TIMEOUT_DEFAULT);

        let pool_max_size = get("DELOCALISE_DB_POOL_MAX_SIZE")
            .as_deref()
            .and_then(parse_u64_trimmed)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(POOL_MAX_SIZE_DEFAULT);

        Self {
            busy_timeout,
            pool_max_size,
        }
    }
}

fn parse_u64_trimmed(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u64>().ok()
}

#[derive(Clone)]
pub struct Db {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl Db {
    pub(crate) fn open_connection(
        &self,
    ) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| db_err!("failed to get connection from pool: {e}"))
    }
}

pub fn db_path(app_dir: &Path) -> PathBuf {
    app_dir.join(DB_FILE_NAME)
}

pub fn init(app_dir: &Path) -> AppResult<Db> {
    init_at(&db_path(app_dir))
}

pub fn init_at(path: &Path) -> AppResult<Db> {
    let path_hint = path.to_string_lossy().to_string();

    let config = DbRuntimeConfig::from_env();
    tracing::info!(
        busy_timeout_ms = config.busy_timeout.as_millis(),
        pool_max_size = config.pool_max_size,
        path = %path_hint,
        "sqlite runtime config"
    );

    let manager = SqliteConnectionManager::file(path).with_init({
        let config = config.clone();
        move |conn| {
            conn.busy_timeout(config.busy_timeout)?;
            configure_connection(conn)
        }
    });

    let pool = Pool::builder()
        .max_size(config.pool_max_size)
        .connection_timeout(POOL_CONNECTION_TIMEOUT_DEFAULT)
        .build(manager)
        .map_err(|e| db_err!("failed to create db pool: {e}"))?;
    let mut conn = pool
        .get()
        .map_err(|e| db_err!("failed to get startup connection: {e}"))?;

    migrations::apply_migrations(&mut conn)
        .map_err(|e| db_err!("sqlite migration failed at {path_hint}: {e}"))?;

    Ok(Db { pool })
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#,
    )
}
