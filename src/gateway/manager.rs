//! Usage: Start and stop the loopback gateway server.

use super::listen::{bind_first_available, format_host_port, GATEWAY_BIND_HOST};
use super::routes::{build_router, GatewayState};
use crate::auth::AuthIndicator;
use crate::background::BackgroundHandle;
use crate::shared::error::AppResult;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug)]
pub struct RunningGateway {
    port: u16,
    base_url: String,
    shutdown: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl RunningGateway {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stops accepting connections, lets in-flight requests finish, then waits for the server task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "gateway task ended abnormally");
        }
    }
}

pub async fn start(
    background: BackgroundHandle,
    indicator: Arc<AuthIndicator>,
    preferred_port: Option<u16>,
) -> AppResult<RunningGateway> {
    let (port, std_listener) = bind_first_available(GATEWAY_BIND_HOST, preferred_port)
        .map_err(|e| format!("SYSTEM_ERROR: gateway bind failed: {e}"))?;
    let listener = tokio::net::TcpListener::from_std(std_listener)
        .map_err(|e| format!("SYSTEM_ERROR: gateway listener init failed: {e}"))?;

    let listen_addr = format_host_port(GATEWAY_BIND_HOST, port);
    let base_url = format!("http://{listen_addr}");
    let app = build_router(GatewayState {
        background,
        indicator,
    });
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = serve.await {
            tracing::error!(listen_addr = %listen_addr, error = %err, "gateway server error");
        }
    });

    tracing::info!(port, base_url = %base_url, "gateway listening");
    Ok(RunningGateway {
        port,
        base_url,
        shutdown: shutdown_tx,
        task,
    })
}
