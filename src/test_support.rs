//! Usage: Public test helpers (in-memory fakes for the network seams) for unit and integration tests.

use crate::api::transport::{ResourceTransport, TransportFailure, TransportResponse};
use crate::auth::{
    AuthIndicator, AuthManager, AuthorizationConfig, AuthorizationFlow, AuthorizationRequest,
    AuthorizationSurface, TokenVerifier,
};
use crate::page::engine::TitleResolver;
use crate::shared::error::{AppError, AppResult};
use crate::shared::mutex_ext::MutexExt;
use crate::shared::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const TEST_REDIRECT_URI: &str = "http://127.0.0.1:37180/callback";

#[derive(Debug, Clone)]
enum SurfaceMode {
    Grant { token: String, ttl_seconds: u64 },
    ForgeState { token: String },
    Fail { error: AppError },
    InteractiveOnly { token: String, ttl_seconds: u64 },
}

/// Authorization surface that answers immediately (or after a delay) without a browser.
#[derive(Debug)]
pub struct FakeSurface {
    mode: SurfaceMode,
    delay: Option<Duration>,
    launched: Mutex<Vec<AuthorizationRequest>>,
}

impl FakeSurface {
    fn with_mode(mode: SurfaceMode) -> Self {
        Self {
            mode,
            delay: None,
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Echoes the request's state and grants `token`.
    pub fn granting(token: &str, ttl_seconds: u64) -> Self {
        Self::with_mode(SurfaceMode::Grant {
            token: token.to_string(),
            ttl_seconds,
        })
    }

    /// Answers with a state value that does not match the request.
    pub fn forging_state(token: &str) -> Self {
        Self::with_mode(SurfaceMode::ForgeState {
            token: token.to_string(),
        })
    }

    /// Silent attempts get `error=interaction_required`; interactive ones grant `token`.
    pub fn interactive_only(token: &str, ttl_seconds: u64) -> Self {
        Self::with_mode(SurfaceMode::InteractiveOnly {
            token: token.to_string(),
            ttl_seconds,
        })
    }

    pub fn failing(error: AppError) -> Self {
        Self::with_mode(SurfaceMode::Fail { error })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn launched(&self) -> Vec<AuthorizationRequest> {
        self.launched.lock_or_recover().clone()
    }
}

fn fragment_redirect(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    format!("{TEST_REDIRECT_URI}#{}", serializer.finish())
}

impl AuthorizationSurface for FakeSurface {
    fn launch<'a>(&'a self, request: &'a AuthorizationRequest) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(async move {
            self.launched.lock_or_recover().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.mode {
                SurfaceMode::Grant { token, ttl_seconds } => Ok(fragment_redirect(&[
                    ("state", request.state.as_str()),
                    ("access_token", token.as_str()),
                    ("token_type", "Bearer"),
                    ("expires_in", ttl_seconds.to_string().as_str()),
                ])),
                SurfaceMode::ForgeState { token } => Ok(fragment_redirect(&[
                    ("state", "forged-state"),
                    ("access_token", token.as_str()),
                    ("expires_in", "3600"),
                ])),
                SurfaceMode::Fail { error } => Err(error.clone()),
                SurfaceMode::InteractiveOnly { .. } if !request.interactive => {
                    Ok(fragment_redirect(&[
                        ("state", request.state.as_str()),
                        ("error", "interaction_required"),
                    ]))
                }
                SurfaceMode::InteractiveOnly { token, ttl_seconds } => Ok(fragment_redirect(&[
                    ("state", request.state.as_str()),
                    ("access_token", token.as_str()),
                    ("token_type", "Bearer"),
                    ("expires_in", ttl_seconds.to_string().as_str()),
                ])),
            }
        })
    }
}

#[derive(Debug)]
pub struct FakeVerifier {
    valid: bool,
    calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn accepting() -> Self {
        Self {
            valid: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            valid: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenVerifier for FakeVerifier {
    fn verify<'a>(&'a self, _access_token: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.valid)
        })
    }
}

#[derive(Debug, Clone)]
pub enum FakeReply {
    Status { status: u16, body: String },
    Network(String),
    /// Never answers; resolves as cancelled once the request's token fires.
    HangUntilCancelled,
}

impl FakeReply {
    pub fn status(status: u16, body: &str) -> Self {
        FakeReply::Status {
            status,
            body: body.to_string(),
        }
    }
}

type ReplyFn = dyn Fn(&str, Option<&str>) -> FakeReply + Send + Sync;

/// Metadata transport whose answer is computed from `(video_id, bearer)`.
pub struct FakeTransport {
    reply: Box<ReplyFn>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl std::fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTransport")
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

impl FakeTransport {
    pub fn new(reply: impl Fn(&str, Option<&str>) -> FakeReply + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every id with `{items:[{snippet:{title}}]}` looked up in `titles`.
    pub fn with_titles(titles: &[(&str, &str)]) -> Self {
        let titles: HashMap<String, String> = titles
            .iter()
            .map(|(id, title)| (id.to_string(), title.to_string()))
            .collect();
        Self::new(move |video_id, _| match titles.get(video_id) {
            Some(title) => FakeReply::status(
                200,
                &serde_json::json!({ "items": [{ "snippet": { "title": title } }] }).to_string(),
            ),
            None => FakeReply::status(200, r#"{"items":[]}"#),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock_or_recover().len()
    }

    pub fn bearers(&self) -> Vec<Option<String>> {
        self.requests
            .lock_or_recover()
            .iter()
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    pub fn video_ids(&self) -> Vec<String> {
        self.requests
            .lock_or_recover()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl ResourceTransport for FakeTransport {
    fn get_video<'a>(
        &'a self,
        video_id: &'a str,
        bearer: Option<&'a str>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportFailure>> {
        Box::pin(async move {
            self.requests
                .lock_or_recover()
                .push((video_id.to_string(), bearer.map(str::to_string)));
            match (self.reply)(video_id, bearer) {
                FakeReply::Status { status, body } => Ok(TransportResponse {
                    status,
                    body: body.into_bytes(),
                }),
                FakeReply::Network(message) => Err(TransportFailure::Network(message)),
                FakeReply::HangUntilCancelled => {
                    cancel.cancelled().await;
                    Err(TransportFailure::Cancelled)
                }
            }
        })
    }
}

/// Page-side resolver answering from a fixed map; unknown ids fail with `UNEXPECTED_RESPONSE`.
#[derive(Debug, Default)]
pub struct FakeResolver {
    titles: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn with_titles(titles: &[(&str, &str)]) -> Self {
        Self {
            titles: titles
                .iter()
                .map(|(id, title)| (id.to_string(), title.to_string()))
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock_or_recover().clone()
    }
}

impl TitleResolver for FakeResolver {
    fn resolve_title<'a>(&'a self, video_id: &'a str) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(async move {
            self.requests.lock_or_recover().push(video_id.to_string());
            self.titles.get(video_id).cloned().ok_or_else(|| {
                AppError::new(
                    crate::shared::error::UNEXPECTED_RESPONSE,
                    format!("no title for {video_id}"),
                )
            })
        })
    }
}

pub fn test_authorization_config() -> AuthorizationConfig {
    AuthorizationConfig {
        client_id: "test-client.apps.example.com".to_string(),
        auth_url: "https://accounts.example.com/o/oauth2/v2/auth".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/youtube.readonly".to_string()],
        interactive_timeout: Duration::from_secs(5),
        silent_timeout: Duration::from_secs(1),
    }
}

pub fn auth_manager_with<S, V>(surface: Arc<S>, verifier: Arc<V>) -> AuthManager
where
    S: AuthorizationSurface + 'static,
    V: TokenVerifier + 'static,
{
    let flow = AuthorizationFlow::new(
        test_authorization_config(),
        surface,
        verifier,
        Arc::new(AuthIndicator::default()),
    );
    AuthManager::new(flow)
}
