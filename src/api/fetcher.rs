//! Usage: Fetch a video's canonical title with the current bearer token, re-authorizing once.
//!
//! At most [`MAX_FETCH_ATTEMPTS`] requests are made per call. A 401 or a cancellation caused by a
//! new authorization round consumes an attempt and retries after the round; every other outcome is
//! terminal. The final attempt never falls through: it either succeeds or returns an explicit error.

use crate::api::transport::{ResourceTransport, TransportFailure};
use crate::api::videos::parse_canonical_title;
use crate::auth::AuthManager;
use crate::shared::error::{AppError, AppResult, TRANSPORT_ERROR, UNEXPECTED_RESPONSE};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const MAX_FETCH_ATTEMPTS: u32 = 2;

const STATUS_OK: u16 = 200;
const STATUS_UNAUTHORIZED: u16 = 401;

pub struct CredentialedFetcher {
    auth: Arc<AuthManager>,
    transport: Arc<dyn ResourceTransport>,
}

impl std::fmt::Debug for CredentialedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialedFetcher")
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl CredentialedFetcher {
    pub fn new(auth: Arc<AuthManager>, transport: Arc<dyn ResourceTransport>) -> Self {
        Self { auth, transport }
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Cancellation signal and bearer for a request sent right now. Both are read with the gate
    /// idle and re-checked afterwards, so a round that starts later always cancels this request.
    async fn request_credentials(&self) -> (CancellationToken, Option<String>) {
        let coordinator = self.auth.coordinator();
        loop {
            self.auth.wait_if_busy().await;
            let rounds = coordinator.completed_rounds();
            let cancel = self.auth.cancellation();
            let bearer = self.auth.bearer();
            if !coordinator.is_busy() && coordinator.completed_rounds() == rounds {
                return (cancel, bearer);
            }
        }
    }

    pub async fn fetch_resource(&self, video_id: &str) -> AppResult<String> {
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            let is_last = attempt == MAX_FETCH_ATTEMPTS;

            let (cancel, bearer) = self.request_credentials().await;

            let outcome = self
                .transport
                .get_video(video_id, bearer.as_deref(), &cancel)
                .await;

            match outcome {
                Ok(response) if response.status == STATUS_OK => {
                    tracing::debug!(video_id, attempt, "video metadata fetched");
                    return parse_canonical_title(&response.body);
                }
                Ok(response) if response.status == STATUS_UNAUTHORIZED => {
                    if is_last {
                        return Err(AppError::new(
                            UNEXPECTED_RESPONSE,
                            format!("status 401 for {video_id} after re-authorization"),
                        ));
                    }
                    tracing::info!(video_id, attempt, "token rejected, re-authorizing");
                    if self.auth.bearer() != bearer {
                        // Another round already replaced the token this request carried.
                        continue;
                    }
                    self.auth.authorize(false).await?;
                }
                Ok(response) => {
                    tracing::warn!(video_id, attempt, status = response.status, "unexpected metadata status");
                    return Err(AppError::new(
                        UNEXPECTED_RESPONSE,
                        format!("status {} for {video_id}", response.status),
                    ));
                }
                Err(TransportFailure::Cancelled) => {
                    if is_last {
                        return Err(AppError::new(
                            TRANSPORT_ERROR,
                            format!("request for {video_id} cancelled on final attempt"),
                        ));
                    }
                    tracing::debug!(video_id, attempt, "request superseded by authorization, retrying");
                }
                Err(TransportFailure::Network(message)) => {
                    tracing::warn!(video_id, attempt, error = %message, "metadata request failed");
                    return Err(AppError::new(TRANSPORT_ERROR, message));
                }
            }
        }

        Err(AppError::new(
            UNEXPECTED_RESPONSE,
            format!("retry budget exhausted for {video_id}"),
        ))
    }
}

#[cfg(test)]
mod tests;
