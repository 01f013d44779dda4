//! Usage: One-shot localhost listener that receives the implicit-grant redirect.
//!
//! The token comes back in the URL fragment, which browsers never send to a server. The page served
//! at [`CALLBACK_PATH`] therefore relays `location.hash` to [`FRAGMENT_PATH`] as a query string, and
//! the listener rebuilds `<redirect_uri>#<fragment>` from it.

use crate::shared::error::AppResult;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) const CALLBACK_PATH: &str = "/callback";
pub(crate) const FRAGMENT_PATH: &str = "/callback/fragment";

const RELAY_HTML: &str = "<html><body><p>Completing sign-in...</p><script>\
var h = window.location.hash.replace(/^#/, '');\
window.location.replace('/callback/fragment?' + h);\
</script></body></html>";
const SUCCESS_HTML: &str =
    "<html><body><h1>Authorization received</h1><p>You may close this window.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not found</h1></body></html>";

#[derive(Debug)]
pub(crate) struct BoundCallbackListener {
    port: u16,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

impl BoundCallbackListener {
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    async fn accept(&mut self) -> std::io::Result<TcpStream> {
        let (socket, _) = match (self.listener_v4.as_mut(), self.listener_v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result?,
                    result = v6.accept() => result?,
                }
            }
            (Some(v4), None) => v4.accept().await?,
            (None, Some(v6)) => v6.accept().await?,
            (None, None) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "no callback listener bound",
                ))
            }
        };
        Ok(socket)
    }
}

pub(crate) async fn bind_callback_listener(preferred_port: u16) -> AppResult<BoundCallbackListener> {
    match try_bind_on_port(preferred_port).await {
        Ok(bound) => Ok(bound),
        Err(preferred_err) if preferred_port == 0 => Err(format!(
            "SYSTEM_ERROR: authorization callback bind failed: {preferred_err}"
        )
        .into()),
        Err(preferred_err) => {
            tracing::warn!(
                port = preferred_port,
                error = %preferred_err,
                "preferred callback port unavailable, falling back to dynamic port"
            );
            match try_bind_on_port(0).await {
                Ok(bound) => Ok(bound),
                Err(fallback_err) => Err(format!(
                    "SYSTEM_ERROR: authorization callback bind failed: {preferred_err}; fallback_dynamic_port: {fallback_err}"
                )
                .into()),
            }
        }
    }
}

async fn try_bind_on_port(port: u16) -> Result<BoundCallbackListener, String> {
    if port == 0 {
        return try_bind_dynamic_port().await;
    }

    let mut bind_errors: Vec<String> = Vec::new();
    let listener_v4 = match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("127.0.0.1:{port} ({err})"));
            None
        }
    };
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("::1:{port} ({err})"));
            None
        }
    };
    // The redirect URI names 127.0.0.1, so the IPv4 listener is the one that matters.
    if listener_v4.is_none() {
        return Err(bind_errors.join("; "));
    }

    Ok(BoundCallbackListener {
        port,
        listener_v4,
        listener_v6,
    })
}

async fn try_bind_dynamic_port() -> Result<BoundCallbackListener, String> {
    let listener_v4 = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| format!("127.0.0.1:0 ({e})"))?;
    let port = listener_v4
        .local_addr()
        .map_err(|e| format!("127.0.0.1:0 (local_addr failed: {e})"))?
        .port();
    let listener_v6 = TcpListener::bind(("::1", port)).await.ok();

    Ok(BoundCallbackListener {
        port,
        listener_v4: Some(listener_v4),
        listener_v6,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum CallbackRoute {
    /// Redirect landed without a query: serve the page that relays the fragment.
    Relay,
    /// Relay page reported the fragment.
    Fragment(String),
    /// Provider answered with query parameters instead of a fragment.
    Query(String),
    NotFound,
}

/// Serves requests until the redirect answer arrives, then returns it as a full address.
pub(crate) async fn wait_for_redirect(
    mut listener: BoundCallbackListener,
    redirect_uri: &str,
    timeout: Duration,
) -> AppResult<String> {
    tokio::time::timeout(timeout, serve_until_redirect(&mut listener, redirect_uri))
        .await
        .map_err(|_| "TRANSPORT_ERROR: authorization callback timed out".to_string())?
}

async fn serve_until_redirect(
    listener: &mut BoundCallbackListener,
    redirect_uri: &str,
) -> AppResult<String> {
    loop {
        let mut socket = listener
            .accept()
            .await
            .map_err(|e| format!("SYSTEM_ERROR: authorization callback accept failed: {e}"))?;

        let route = match read_request_target(&mut socket).await {
            Ok(target) => route_target(&target),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring unreadable callback request");
                continue;
            }
        };

        match route {
            CallbackRoute::Relay => write_html(&mut socket, "200 OK", RELAY_HTML).await,
            CallbackRoute::NotFound => write_html(&mut socket, "404 Not Found", NOT_FOUND_HTML).await,
            CallbackRoute::Fragment(fragment) => {
                write_html(&mut socket, "200 OK", SUCCESS_HTML).await;
                return Ok(format!("{redirect_uri}#{fragment}"));
            }
            CallbackRoute::Query(query) => {
                write_html(&mut socket, "200 OK", SUCCESS_HTML).await;
                return Ok(format!("{redirect_uri}?{query}"));
            }
        }
    }
}

async fn read_request_target(socket: &mut TcpStream) -> AppResult<String> {
    let mut buffer = vec![0u8; 8192];
    let size = socket
        .read(&mut buffer)
        .await
        .map_err(|e| format!("SYSTEM_ERROR: authorization callback read failed: {e}"))?;
    if size == 0 {
        return Err("SYSTEM_ERROR: authorization callback request is empty"
            .to_string()
            .into());
    }
    let request = String::from_utf8_lossy(&buffer[..size]);
    extract_request_target(request.as_ref()).map(str::to_string)
}

fn extract_request_target(request: &str) -> AppResult<&str> {
    let first = request
        .lines()
        .next()
        .ok_or_else(|| "SYSTEM_ERROR: authorization callback malformed request".to_string())?;
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err("SYSTEM_ERROR: authorization callback must be GET"
            .to_string()
            .into());
    }
    Ok(target)
}

fn route_target(target: &str) -> CallbackRoute {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    match (path, query) {
        (FRAGMENT_PATH, query) => CallbackRoute::Fragment(query.unwrap_or_default().to_string()),
        (CALLBACK_PATH, Some(query)) if !query.is_empty() => {
            CallbackRoute::Query(query.to_string())
        }
        (CALLBACK_PATH, _) => CallbackRoute::Relay,
        _ => CallbackRoute::NotFound,
    }
}

async fn write_html(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("connect");
        stream
            .write_all(format!("GET {target} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").as_bytes())
            .await
            .expect("write");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("read");
        response
    }

    #[test]
    fn routes_relay_fragment_query_and_unknown_paths() {
        assert_eq!(route_target("/callback"), CallbackRoute::Relay);
        assert_eq!(route_target("/callback?"), CallbackRoute::Relay);
        assert_eq!(
            route_target("/callback/fragment?access_token=t&state=s"),
            CallbackRoute::Fragment("access_token=t&state=s".to_string())
        );
        assert_eq!(
            route_target("/callback/fragment"),
            CallbackRoute::Fragment(String::new())
        );
        assert_eq!(
            route_target("/callback?error=access_denied"),
            CallbackRoute::Query("error=access_denied".to_string())
        );
        assert_eq!(route_target("/favicon.ico"), CallbackRoute::NotFound);
    }

    #[test]
    fn extract_request_target_requires_get() {
        assert_eq!(
            extract_request_target("GET /callback HTTP/1.1\r\n\r\n").expect("target"),
            "/callback"
        );
        let err = extract_request_target("POST /callback HTTP/1.1\r\n\r\n").expect_err("post");
        assert_eq!(err.code(), "SYSTEM_ERROR");
    }

    #[tokio::test]
    async fn relays_fragment_and_returns_full_redirect() {
        let listener = bind_callback_listener(0).await.expect("bind");
        let port = listener.port();
        let redirect_uri = format!("http://127.0.0.1:{port}{CALLBACK_PATH}");

        let waiter = tokio::spawn({
            let redirect_uri = redirect_uri.clone();
            async move { wait_for_redirect(listener, &redirect_uri, Duration::from_secs(5)).await }
        });

        let relay = get(port, "/favicon.ico").await;
        assert!(relay.starts_with("HTTP/1.1 404"));
        let relay = get(port, "/callback").await;
        assert!(relay.contains("/callback/fragment?"));
        let done = get(port, "/callback/fragment?state=abc&access_token=tok&expires_in=3599").await;
        assert!(done.starts_with("HTTP/1.1 200"));

        let redirect = waiter.await.expect("join").expect("redirect");
        assert_eq!(
            redirect,
            format!("{redirect_uri}#state=abc&access_token=tok&expires_in=3599")
        );
    }

    #[tokio::test]
    async fn wait_times_out_without_callback() {
        let listener = bind_callback_listener(0).await.expect("bind");
        let err = wait_for_redirect(listener, "http://127.0.0.1/callback", Duration::from_millis(50))
            .await
            .expect_err("should time out");
        assert_eq!(err.code(), crate::shared::error::TRANSPORT_ERROR);
    }

    #[tokio::test]
    async fn occupied_preferred_port_falls_back_to_dynamic_port() {
        let occupied = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let taken = occupied.local_addr().expect("addr").port();

        let bound = bind_callback_listener(taken).await.expect("fallback bind");
        assert_ne!(bound.port(), taken);
    }
}
