//! Usage: Run blocking work (SQLite, file IO) on the tokio blocking pool with a stable label.

use crate::shared::error::{AppError, AppResult};

pub async fn run<T, E>(
    label: &'static str,
    f: impl FnOnce() -> Result<T, E> + Send + 'static,
) -> AppResult<T>
where
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(f).await.map_err(|join_err| {
        // Only the label is reported: a panic payload may quote a title or a token.
        let outcome = if join_err.is_panic() {
            "panicked"
        } else {
            "cancelled"
        };
        tracing::error!(label, outcome, "blocking task did not complete");
        AppError::new("TASK_JOIN", format!("{label}: task {outcome}"))
    })?;
    joined.map_err(Into::into)
}
