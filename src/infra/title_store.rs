//! Usage: Durable video id -> original title records (loaded once, upserted on resolution).

use crate::infra::db::Db;
use crate::shared::error::AppResult;
use rusqlite::{params, Connection};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTitle {
    pub video_id: String,
    pub original_title: Option<String>,
    pub last_seen_unix_ms: i64,
}

pub(crate) fn load_all(conn: &Connection) -> AppResult<HashMap<String, StoredTitle>> {
    let mut stmt = conn
        .prepare("SELECT video_id, original_title, last_seen FROM video_titles")
        .map_err(|e| format!("DB_ERROR: failed to prepare title query: {e}"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredTitle {
                video_id: row.get(0)?,
                original_title: row.get(1)?,
                last_seen_unix_ms: row.get(2)?,
            })
        })
        .map_err(|e| format!("DB_ERROR: failed to query titles: {e}"))?;

    let mut out = HashMap::new();
    for row in rows {
        let entry = row.map_err(|e| format!("DB_ERROR: failed to read title row: {e}"))?;
        out.insert(entry.video_id.clone(), entry);
    }
    Ok(out)
}

pub(crate) fn upsert(conn: &Connection, entry: &StoredTitle) -> AppResult<()> {
    conn.execute(
        r#"
INSERT INTO video_titles (video_id, original_title, last_seen)
VALUES (?1, ?2, ?3)
ON CONFLICT(video_id) DO UPDATE SET
  original_title = COALESCE(excluded.original_title, video_titles.original_title),
  last_seen = excluded.last_seen
"#,
        params![entry.video_id, entry.original_title, entry.last_seen_unix_ms],
    )
    .map_err(|e| format!("DB_ERROR: failed to upsert title: {e}"))?;
    Ok(())
}

pub async fn load_all_async(db: &Db) -> AppResult<HashMap<String, StoredTitle>> {
    let db = db.clone();
    crate::blocking::run("title_store_load", move || {
        let conn = db.open_connection()?;
        load_all(&conn)
    })
    .await
}

pub(crate) async fn upsert_async(db: &Db, entry: StoredTitle) -> AppResult<()> {
    let db = db.clone();
    crate::blocking::run("title_store_upsert", move || {
        let conn = db.open_connection()?;
        upsert(&conn, &entry)
    })
    .await
}
