//! Usage: Background-domain actor. Messages arrive as JSON over a bounded queue and each one is
//! handled in its own task, so slow resolutions never block `isAuthorized` or other titles.

use crate::background::context::BackgroundContext;
use crate::background::messages::BackgroundMessage;
use crate::shared::error::{AppError, AppResult};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const MESSAGE_QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
struct Envelope {
    message: Value,
    reply: oneshot::Sender<AppResult<Value>>,
}

/// Sending side of the cross-domain channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<Envelope>,
}

fn service_stopped() -> AppError {
    AppError::new("SYSTEM_ERROR", "background service is not running")
}

impl BackgroundHandle {
    pub async fn send(&self, message: Value) -> AppResult<Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| service_stopped())?;
        reply_rx.await.map_err(|_| service_stopped())?
    }

    pub async fn original_title(&self, video_id: &str) -> AppResult<String> {
        let message = BackgroundMessage::OriginalTitle {
            video_id: video_id.to_string(),
        };
        match self.send(message.to_json()).await? {
            Value::String(title) => Ok(title),
            other => Err(AppError::new(
                "SYSTEM_ERROR",
                format!("unexpected reply to title request: {other}"),
            )),
        }
    }

    pub async fn authorize(&self) -> AppResult<()> {
        self.send(BackgroundMessage::Authorize.to_json()).await?;
        Ok(())
    }

    pub async fn is_authorized(&self) -> AppResult<bool> {
        match self.send(BackgroundMessage::IsAuthorized.to_json()).await? {
            Value::Bool(authorized) => Ok(authorized),
            other => Err(AppError::new(
                "SYSTEM_ERROR",
                format!("unexpected reply to isAuthorized: {other}"),
            )),
        }
    }
}

pub fn spawn(ctx: Arc<BackgroundContext>) -> (BackgroundHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<Envelope>(MESSAGE_QUEUE_CAPACITY);
    let task = tokio::spawn(service_loop(ctx, rx));
    (BackgroundHandle { tx }, task)
}

async fn service_loop(ctx: Arc<BackgroundContext>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let result = dispatch(&ctx, &envelope.message).await;
            if let Err(err) = &result {
                tracing::debug!(code = err.code(), error = %err, "background message failed");
            }
            let _ = envelope.reply.send(result);
        });
    }
    tracing::info!("background service stopped");
}

async fn dispatch(ctx: &BackgroundContext, raw: &Value) -> AppResult<Value> {
    let message = BackgroundMessage::parse(raw)?;
    let reply = ctx.handle(message).await?;
    Ok(reply.to_json())
}
