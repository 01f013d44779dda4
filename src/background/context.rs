//! Usage: Explicitly owned background-domain state (auth + title cache) and message dispatch.

use crate::auth::AuthManager;
use crate::background::messages::{BackgroundMessage, BackgroundReply};
use crate::background::title_cache::TitleCache;
use crate::shared::error::AppResult;
use std::sync::Arc;

#[derive(Debug)]
pub struct BackgroundContext {
    auth: Arc<AuthManager>,
    titles: Arc<TitleCache>,
}

impl BackgroundContext {
    pub fn new(auth: Arc<AuthManager>, titles: Arc<TitleCache>) -> Self {
        Self { auth, titles }
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn titles(&self) -> &Arc<TitleCache> {
        &self.titles
    }

    pub async fn handle(&self, message: BackgroundMessage) -> AppResult<BackgroundReply> {
        match message {
            BackgroundMessage::OriginalTitle { video_id } => {
                let title = self.titles.resolve(&video_id).await?;
                Ok(BackgroundReply::Title(title))
            }
            BackgroundMessage::Authorize => {
                self.auth.authorize(true).await?;
                Ok(BackgroundReply::Done)
            }
            BackgroundMessage::IsAuthorized => {
                Ok(BackgroundReply::Authorized(self.auth.is_authorized()))
            }
        }
    }

    /// Kicks off a silent authorization so a still-valid grant is picked up without a prompt.
    pub fn spawn_startup_authorization(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            match ctx.auth.authorize(false).await {
                Ok(()) => tracing::info!("startup authorization finished"),
                Err(err) => tracing::warn!(error = %err, "startup authorization failed"),
            }
        })
    }
}
