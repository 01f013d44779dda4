//! Usage: Process-lifetime video id -> original title map, consulted before any network call.

use crate::api::CredentialedFetcher;
use crate::infra::db::Db;
use crate::infra::title_store::{self, StoredTitle};
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::time::now_unix_millis;
use crate::shared::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Where a missing title comes from.
pub trait TitleSource: Send + Sync {
    fn fetch_title<'a>(&'a self, video_id: &'a str) -> BoxFuture<'a, AppResult<String>>;
}

impl TitleSource for CredentialedFetcher {
    fn fetch_title<'a>(&'a self, video_id: &'a str) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(self.fetch_resource(video_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTitle {
    pub video_id: String,
    pub original_title: Option<String>,
    pub last_seen_unix_ms: i64,
}

impl From<StoredTitle> for CachedTitle {
    fn from(value: StoredTitle) -> Self {
        Self {
            video_id: value.video_id,
            original_title: value.original_title,
            last_seen_unix_ms: value.last_seen_unix_ms,
        }
    }
}

pub struct TitleCache {
    entries: Mutex<HashMap<String, CachedTitle>>,
    // One cell per id being resolved, so concurrent callers share a single fetch.
    in_flight: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
    source: Arc<dyn TitleSource>,
    db: Option<Db>,
}

impl std::fmt::Debug for TitleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleCache")
            .field("entries", &self.len())
            .field("persistent", &self.db.is_some())
            .finish_non_exhaustive()
    }
}

impl TitleCache {
    pub fn new(
        stored: HashMap<String, StoredTitle>,
        source: Arc<dyn TitleSource>,
        db: Option<Db>,
    ) -> Self {
        let entries = stored
            .into_iter()
            .map(|(id, entry)| (id, CachedTitle::from(entry)))
            .collect();
        Self {
            entries: Mutex::new(entries),
            in_flight: Mutex::new(HashMap::new()),
            source,
            db,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock_or_recover().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, video_id: &str) -> Option<CachedTitle> {
        self.entries.lock_or_recover().get(video_id).cloned()
    }

    /// Returns the entry for `video_id`, creating `{title: none, last_seen: now}` on first sighting.
    pub fn get_or_create(&self, video_id: &str) -> CachedTitle {
        self.entries
            .lock_or_recover()
            .entry(video_id.to_string())
            .or_insert_with(|| CachedTitle {
                video_id: video_id.to_string(),
                original_title: None,
                last_seen_unix_ms: now_unix_millis(),
            })
            .clone()
    }

    /// Cached title if known, otherwise one fetch shared by all concurrent callers for this id.
    /// A failed fetch is not remembered; the next call tries again.
    pub async fn resolve(&self, video_id: &str) -> AppResult<String> {
        if let Some(title) = self.get_or_create(video_id).original_title {
            tracing::debug!(video_id, "title cache hit");
            return Ok(title);
        }

        let cell = {
            let mut in_flight = self.in_flight.lock_or_recover();
            Arc::clone(in_flight.entry(video_id.to_string()).or_default())
        };

        let mut fetched_here = false;
        let result = cell
            .get_or_try_init(|| {
                fetched_here = true;
                self.fetch_and_store(video_id)
            })
            .await
            .cloned();

        if fetched_here {
            self.release_in_flight(video_id, &cell);
        }
        result
    }

    /// Drops the shared cell for `video_id` unless another caller has already replaced it.
    fn release_in_flight(&self, video_id: &str, cell: &Arc<OnceCell<String>>) {
        let mut in_flight = self.in_flight.lock_or_recover();
        if in_flight
            .get(video_id)
            .is_some_and(|current| Arc::ptr_eq(current, cell))
        {
            in_flight.remove(video_id);
        }
    }

    async fn fetch_and_store(&self, video_id: &str) -> AppResult<String> {
        // A concurrent resolve may have finished between the cache check and taking the cell.
        if let Some(title) = self.get(video_id).and_then(|entry| entry.original_title) {
            return Ok(title);
        }

        let title = self.source.fetch_title(video_id).await?;
        let entry = {
            let mut entries = self.entries.lock_or_recover();
            let entry = entries
                .entry(video_id.to_string())
                .or_insert_with(|| CachedTitle {
                    video_id: video_id.to_string(),
                    original_title: None,
                    last_seen_unix_ms: now_unix_millis(),
                });
            entry.original_title = Some(title.clone());
            entry.clone()
        };
        tracing::debug!(video_id, "title resolved");

        self.persist(entry).await;
        Ok(title)
    }

    async fn persist(&self, entry: CachedTitle) {
        let Some(db) = self.db.as_ref() else {
            return;
        };
        let video_id = entry.video_id.clone();
        let stored = StoredTitle {
            video_id: entry.video_id,
            original_title: entry.original_title,
            last_seen_unix_ms: entry.last_seen_unix_ms,
        };
        if let Err(err) = title_store::upsert_async(db, stored).await {
            tracing::warn!(video_id = %video_id, error = %err, "failed to persist resolved title");
        }
    }
}
