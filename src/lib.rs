pub mod api;
pub mod app;
pub mod auth;
pub mod background;
mod gateway;
pub mod infra;
pub mod page;
pub mod shared;
pub mod test_support;

pub(crate) use shared::blocking;

pub use app::app_state::{AppState, BackgroundParts};
pub use gateway::{start as start_gateway, RunningGateway};
pub use shared::error::{AppError, AppResult};

use infra::{app_paths, settings};
use std::time::Duration;

const SERVICE_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the background service and its loopback gateway until Ctrl-C.
pub async fn run() -> AppResult<()> {
    let app_dir = app_paths::app_data_dir()?;
    let settings = settings::read(&app_dir)?;
    let logs_dir = app_paths::logs_dir(&app_dir)?;
    let _logging = app::logging::init(&logs_dir, &settings)?;

    tracing::info!(
        app_dir = %app_dir.display(),
        version = env!("CARGO_PKG_VERSION"),
        "delocalise starting"
    );
    if settings.client_id.trim().is_empty() {
        tracing::warn!(
            env = settings::CLIENT_ID_ENV_VAR,
            "no OAuth client_id configured; authorization will fail until one is set"
        );
    }

    let db = app::app_state::init_db(&app_dir).await?;
    let parts = BackgroundParts::from_settings(&settings)?;
    let state = AppState::build(&settings, Some(db), parts).await?;

    let (background, service_task) = background::service::spawn(std::sync::Arc::clone(state.context()));
    if settings.authorize_on_startup {
        state.context().spawn_startup_authorization();
    }

    let gateway = gateway::start(
        background,
        std::sync::Arc::clone(state.indicator()),
        Some(settings.gateway_port),
    )
    .await?;

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c; shutting down");
    }
    tracing::info!("shutdown requested");

    gateway.shutdown().await;
    // The gateway held the last sender; the service loop ends once it is gone.
    match tokio::time::timeout(SERVICE_STOP_TIMEOUT, service_task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "background service ended abnormally"),
        Err(_) => tracing::warn!("background service did not stop in time"),
    }
    tracing::info!("delocalise stopped");
    Ok(())
}
