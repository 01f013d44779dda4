//! Usage: Token verification endpoint client (200 = valid, anything else = invalid).

use crate::shared::error::AppResult;
use crate::shared::BoxFuture;

pub trait TokenVerifier: Send + Sync {
    fn verify<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, AppResult<bool>>;
}

#[derive(Debug, Clone)]
pub struct HttpTokenVerifier {
    client: reqwest::Client,
    token_info_url: String,
}

impl HttpTokenVerifier {
    pub fn new(client: reqwest::Client, token_info_url: impl Into<String>) -> Self {
        Self {
            client,
            token_info_url: token_info_url.into(),
        }
    }
}

impl TokenVerifier for HttpTokenVerifier {
    fn verify<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.token_info_url.trim())
                .query(&[("access_token", access_token)])
                .send()
                .await
                .map_err(|e| format!("TRANSPORT_ERROR: token verification request failed: {e}"))?;

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                tracing::warn!(
                    status = status.as_u16(),
                    "token verification endpoint rejected access token"
                );
            }
            Ok(status == reqwest::StatusCode::OK)
        })
    }
}
