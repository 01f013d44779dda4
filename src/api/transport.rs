//! Usage: Authenticated request for one video's metadata, interruptible by a cancellation token.

use crate::shared::BoxFuture;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// A new authorization round started while the request was in flight.
    Cancelled,
    Network(String),
}

pub trait ResourceTransport: Send + Sync {
    fn get_video<'a>(
        &'a self,
        video_id: &'a str,
        bearer: Option<&'a str>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportFailure>>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    videos_url: String,
    referrer: String,
}

impl HttpTransport {
    pub fn new(
        client: reqwest::Client,
        videos_url: impl Into<String>,
        referrer: impl Into<String>,
    ) -> Self {
        Self {
            client,
            videos_url: videos_url.into(),
            referrer: referrer.into(),
        }
    }

    async fn send(
        &self,
        video_id: &str,
        bearer: Option<&str>,
    ) -> Result<TransportResponse, reqwest::Error> {
        let mut request = self
            .client
            .get(self.videos_url.trim())
            .query(&[("part", "snippet"), ("id", video_id)])
            .header(reqwest::header::REFERER, self.referrer.as_str());
        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl ResourceTransport for HttpTransport {
    fn get_video<'a>(
        &'a self,
        video_id: &'a str,
        bearer: Option<&'a str>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportFailure>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportFailure::Cancelled),
                result = self.send(video_id, bearer) => {
                    result.map_err(|e| TransportFailure::Network(e.to_string()))
                }
            }
        })
    }
}
