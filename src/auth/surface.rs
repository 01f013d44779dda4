//! Usage: Authorization surface (where the user grants access) and its loopback implementation.

use crate::auth::callback_server::{bind_callback_listener, wait_for_redirect, CALLBACK_PATH};
use crate::shared::error::AppResult;
use crate::shared::BoxFuture;
use std::process::Command;
use std::time::Duration;
use url::Url;

/// One handshake's worth of request parameters. The redirect address is only known once the
/// surface has picked where to receive the answer, so the URL is built by the surface.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub auth_url: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub state: String,
    pub interactive: bool,
    pub timeout: Duration,
}

impl AuthorizationRequest {
    pub fn to_url(&self, redirect_uri: &str) -> AppResult<Url> {
        let mut url = Url::parse(self.auth_url.trim())
            .map_err(|e| format!("SEC_INVALID_INPUT: invalid auth_url: {e}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", self.client_id.trim());
            query.append_pair("response_type", "token");
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("scope", &self.scopes.join(" "));
            query.append_pair("state", &self.state);
            if !self.interactive {
                // Silent grant: the provider must answer without showing any UI.
                query.append_pair("prompt", "none");
            }
        }
        Ok(url)
    }
}

pub trait AuthorizationSurface: Send + Sync {
    /// Presents the request and resolves to the full redirect address the provider answered with
    /// (the token travels in its fragment).
    fn launch<'a>(&'a self, request: &'a AuthorizationRequest) -> BoxFuture<'a, AppResult<String>>;
}

/// Opens the system browser and receives the redirect on a one-shot loopback listener.
#[derive(Debug, Clone)]
pub struct LoopbackSurface {
    preferred_port: u16,
}

impl LoopbackSurface {
    pub fn new(preferred_port: u16) -> Self {
        Self { preferred_port }
    }
}

impl AuthorizationSurface for LoopbackSurface {
    fn launch<'a>(&'a self, request: &'a AuthorizationRequest) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(async move {
            let listener = bind_callback_listener(self.preferred_port).await?;
            let redirect_uri = format!("http://127.0.0.1:{}{CALLBACK_PATH}", listener.port());
            let url = request.to_url(&redirect_uri)?;

            tracing::info!(
                interactive = request.interactive,
                port = listener.port(),
                "opening authorization surface"
            );
            open_browser(url.as_str())?;

            wait_for_redirect(listener, &redirect_uri, request.timeout).await
        })
    }
}

fn open_browser(url: &str) -> AppResult<()> {
    #[cfg(target_os = "windows")]
    {
        build_windows_open_browser_command(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[allow(unreachable_code)]
    Err("SYSTEM_ERROR: browser open is unsupported on this platform"
        .to_string()
        .into())
}

#[cfg(target_os = "windows")]
fn build_windows_open_browser_command(url: &str) -> Command {
    let mut cmd = Command::new("rundll32.exe");
    // `explorer <url>` may open File Explorer for some URL shapes, the protocol handler does not.
    cmd.arg("url.dll,FileProtocolHandler").arg(url);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(interactive: bool) -> AuthorizationRequest {
        AuthorizationRequest {
            auth_url: "https://accounts.example.com/o/oauth2/v2/auth".to_string(),
            client_id: " client-123 ".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/youtube.readonly".to_string(),
                "openid".to_string(),
            ],
            state: "q+/w==".to_string(),
            interactive,
            timeout: Duration::from_secs(5),
        }
    }

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn interactive_url_carries_identity_scope_redirect_and_state() {
        let url = request(true)
            .to_url("http://127.0.0.1:37180/callback")
            .expect("url");
        let pairs = pairs(&url);

        assert!(pairs.contains(&("client_id".into(), "client-123".into())));
        assert!(pairs.contains(&("response_type".into(), "token".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://127.0.0.1:37180/callback".into()
        )));
        assert!(pairs.contains(&(
            "scope".into(),
            "https://www.googleapis.com/auth/youtube.readonly openid".into()
        )));
        assert!(pairs.contains(&("state".into(), "q+/w==".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "prompt"));
    }

    #[test]
    fn state_is_percent_encoded_on_the_wire() {
        let url = request(true).to_url("http://127.0.0.1/cb").expect("url");
        assert!(url.as_str().contains("state=q%2B%2Fw%3D%3D"));
    }

    #[test]
    fn silent_url_asks_for_no_prompt() {
        let url = request(false).to_url("http://127.0.0.1/cb").expect("url");
        assert!(pairs(&url).contains(&("prompt".into(), "none".into())));
    }

    #[test]
    fn invalid_auth_url_is_rejected() {
        let mut req = request(true);
        req.auth_url = "not a url".to_string();
        let err = req.to_url("http://127.0.0.1/cb").expect_err("should fail");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
    }
}
