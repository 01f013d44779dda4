//! Usage: Decode the video metadata response (`items[0].snippet.title`).

use crate::shared::error::{AppError, AppResult, UNEXPECTED_RESPONSE};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: Option<String>,
}

pub fn parse_canonical_title(body: &[u8]) -> AppResult<String> {
    let response: VideoListResponse = serde_json::from_slice(body).map_err(|e| {
        AppError::new(UNEXPECTED_RESPONSE, format!("invalid video list body: {e}")).with_source(e)
    })?;

    response
        .items
        .into_iter()
        .next()
        .and_then(|item| item.snippet)
        .and_then(|snippet| snippet.title)
        .ok_or_else(|| AppError::new(UNEXPECTED_RESPONSE, "video list has no title"))
}
