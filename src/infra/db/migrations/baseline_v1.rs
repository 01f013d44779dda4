//! Usage: Baseline schema (v1): resolved original titles keyed by video id.

use rusqlite::Connection;

pub(super) fn create_baseline_v1(conn: &mut Connection) -> crate::shared::error::AppResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| format!("failed to start sqlite transaction: {e}"))?;

    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS video_titles (
  video_id TEXT PRIMARY KEY,
  original_title TEXT,
  last_seen INTEGER NOT NULL
);
"#,
    )
    .map_err(|e| format!("failed to create baseline schema: {e}"))?;

    super::set_user_version(&tx, 1)?;

    tx.commit()
        .map_err(|e| format!("failed to commit sqlite transaction: {e}"))?;
    Ok(())
}
