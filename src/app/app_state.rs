//! Usage: Background-domain wiring (db, auth, fetcher, title cache) built once at startup.

use crate::api::{CredentialedFetcher, HttpTransport, ResourceTransport};
use crate::auth::{
    AuthManager, AuthorizationConfig, AuthorizationFlow, AuthorizationSurface, AuthIndicator,
    HttpTokenVerifier, LoopbackSurface, TokenVerifier,
};
use crate::background::{BackgroundContext, TitleCache, TitleSource};
use crate::infra::settings::AppSettings;
use crate::infra::{db, title_store};
use crate::shared::error::AppResult;
use crate::blocking;
use std::path::Path;
use std::sync::Arc;

const USER_AGENT: &str = concat!("delocalise/", env!("CARGO_PKG_VERSION"));

/// The three network seams of the background domain.
pub struct BackgroundParts {
    pub surface: Arc<dyn AuthorizationSurface>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub transport: Arc<dyn ResourceTransport>,
}

impl BackgroundParts {
    /// Browser surface on the loopback callback port plus real HTTP verifier and transport.
    pub fn from_settings(settings: &AppSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("SYSTEM_ERROR: failed to build http client: {e}"))?;
        Ok(Self {
            surface: Arc::new(LoopbackSurface::new(settings.callback_port)),
            verifier: Arc::new(HttpTokenVerifier::new(
                client.clone(),
                settings.token_info_url.clone(),
            )),
            transport: Arc::new(HttpTransport::new(
                client,
                settings.videos_url.clone(),
                settings.referrer.clone(),
            )),
        })
    }
}

pub async fn init_db(app_dir: &Path) -> AppResult<db::Db> {
    let app_dir = app_dir.to_path_buf();
    blocking::run("db_init", move || db::init(&app_dir)).await
}

#[derive(Debug)]
pub struct AppState {
    auth: Arc<AuthManager>,
    titles: Arc<TitleCache>,
    context: Arc<BackgroundContext>,
}

impl AppState {
    /// Loads persisted titles from `db` (when given) and connects the parts.
    pub async fn build(
        settings: &AppSettings,
        db: Option<db::Db>,
        parts: BackgroundParts,
    ) -> AppResult<Self> {
        let stored = match &db {
            Some(db) => title_store::load_all_async(db).await?,
            None => Default::default(),
        };
        tracing::info!(preloaded = stored.len(), "title cache loaded");

        let flow = AuthorizationFlow::new(
            AuthorizationConfig::from_settings(settings),
            parts.surface,
            parts.verifier,
            Arc::new(AuthIndicator::default()),
        );
        let auth = Arc::new(AuthManager::new(flow));
        auth.mark_unauthorized();

        let fetcher = Arc::new(CredentialedFetcher::new(Arc::clone(&auth), parts.transport));
        let titles = Arc::new(TitleCache::new(stored, fetcher as Arc<dyn TitleSource>, db));
        let context = Arc::new(BackgroundContext::new(Arc::clone(&auth), Arc::clone(&titles)));

        Ok(Self {
            auth,
            titles,
            context,
        })
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn indicator(&self) -> &Arc<AuthIndicator> {
        self.auth.indicator()
    }

    pub fn titles(&self) -> &Arc<TitleCache> {
        &self.titles
    }

    pub fn context(&self) -> &Arc<BackgroundContext> {
        &self.context
    }
}
