//! Usage: The closed set of markup shapes that carry a localised video title.
//!
//! 1. `VideoTitleLink`: `<a id="video-title-link" title=.. href=..><yt-formatted-string id="video-title">`
//!    (home page, channel videos).
//! 2. `VideoTitle`: `<a id="video-title" title=.. href=..>title</a>` (channel features).
//! 3. `WatchMetadata`: `<yt-formatted-string class="style-scope ytd-watch-metadata" title=..>` (main
//!    video on a watch page; the id comes from the page address).
//! 4. `LockupTitle`: `<a class="yt-lockup-metadata-view-model-wiz__title" href=..><span>title</span>`
//!    (watch page recommendations).

use crate::page::dom::{Document, NodeId};
use url::Url;

/// Set on an element once it has been picked up; such elements never match again.
pub const PROCESSED_MARKER: &str = "delocalised";

const FALLBACK_BASE_URL: &str = "https://www.youtube.com/";
const LOCKUP_TITLE_CLASS: &str = "yt-lockup-metadata-view-model-wiz__title";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkupShape {
    VideoTitleLink,
    VideoTitle,
    WatchMetadata,
    LockupTitle,
}

/// Match order; the first shape that matches an element wins.
pub const ALL_SHAPES: [MarkupShape; 4] = [
    MarkupShape::VideoTitleLink,
    MarkupShape::VideoTitle,
    MarkupShape::WatchMetadata,
    MarkupShape::LockupTitle,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub video_id: String,
    pub label: String,
}

impl MarkupShape {
    pub fn name(self) -> &'static str {
        match self {
            MarkupShape::VideoTitleLink => "video_title_link",
            MarkupShape::VideoTitle => "video_title",
            MarkupShape::WatchMetadata => "watch_metadata",
            MarkupShape::LockupTitle => "lockup_title",
        }
    }

    /// First shape matching `node`, ignoring elements already marked processed.
    pub fn classify(doc: &Document, node: NodeId) -> Option<MarkupShape> {
        if !doc.is_element(node) || doc.has_attr(node, PROCESSED_MARKER) {
            return None;
        }
        ALL_SHAPES.into_iter().find(|shape| shape.matches(doc, node))
    }

    pub fn matches(self, doc: &Document, node: NodeId) -> bool {
        let tag = doc.tag_name(node);
        match self {
            MarkupShape::VideoTitleLink => {
                tag == Some("a")
                    && doc.attr(node, "id") == Some("video-title-link")
                    && doc
                        .find_element(node, |doc, id| {
                            id != node && doc.tag_name(id) == Some("yt-formatted-string")
                        })
                        .is_some()
            }
            MarkupShape::VideoTitle => tag == Some("a") && doc.attr(node, "id") == Some("video-title"),
            MarkupShape::WatchMetadata => {
                tag == Some("yt-formatted-string")
                    && doc.has_class(node, "style-scope")
                    && doc.has_class(node, "ytd-watch-metadata")
                    && doc.has_attr(node, "title")
            }
            MarkupShape::LockupTitle => tag == Some("a") && doc.has_class(node, LOCKUP_TITLE_CLASS),
        }
    }

    /// Pulls the video id and the displayed label out of a matched element.
    /// `Err` names the piece that could not be found.
    pub fn extract(self, doc: &Document, node: NodeId) -> Result<Extracted, String> {
        let (video_id, label) = match self {
            MarkupShape::VideoTitleLink | MarkupShape::VideoTitle => (
                video_id_from_href(doc, node),
                doc.attr(node, "title").map(str::to_string),
            ),
            MarkupShape::WatchMetadata => (
                doc.location().and_then(video_id_from_url),
                doc.attr(node, "title").map(str::to_string),
            ),
            MarkupShape::LockupTitle => (
                video_id_from_href(doc, node),
                doc.first_element_child(node)
                    .map(|child| doc.text_content(child).trim().to_string()),
            ),
        };

        let video_id = video_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| format!("{} element has no video id", self.name()))?;
        let label = label
            .filter(|label| !label.is_empty())
            .ok_or_else(|| format!("{} element has no title", self.name()))?;
        Ok(Extracted { video_id, label })
    }

    /// Puts `canonical` where this shape displays its title.
    pub fn rewrite(self, doc: &mut Document, node: NodeId, displayed: &str, canonical: &str) {
        match self {
            MarkupShape::VideoTitleLink => {
                replace_in_aria_label(doc, node, displayed, canonical);
                let title = doc.find_element(node, |doc, id| {
                    doc.tag_name(id) == Some("yt-formatted-string")
                        && doc.attr(id, "id") == Some("video-title")
                });
                if let Some(title) = title {
                    doc.set_text_content(title, canonical);
                }
            }
            MarkupShape::VideoTitle => {
                replace_in_aria_label(doc, node, displayed, canonical);
                doc.set_attr(node, "title", canonical);
                doc.set_text_content(node, canonical);
            }
            MarkupShape::WatchMetadata => {
                doc.set_attr(node, "title", canonical);
                doc.set_text_content(node, canonical);
            }
            MarkupShape::LockupTitle => {
                replace_in_aria_label(doc, node, displayed, canonical);
                if let Some(child) = doc.first_element_child(node) {
                    doc.set_text_content(child, canonical);
                }
            }
        }
    }
}

fn replace_in_aria_label(doc: &mut Document, node: NodeId, displayed: &str, canonical: &str) {
    let Some(aria) = doc.attr(node, "aria-label") else {
        return;
    };
    if !aria.contains(displayed) {
        return;
    }
    let rewritten = aria.replacen(displayed, canonical, 1);
    doc.set_attr(node, "aria-label", &rewritten);
}

fn video_id_from_href(doc: &Document, node: NodeId) -> Option<String> {
    let href = doc.attr(node, "href")?;
    let base = match doc.location() {
        Some(location) => location.clone(),
        None => Url::parse(FALLBACK_BASE_URL).ok()?,
    };
    let url = base.join(href).ok()?;
    video_id_from_url(&url)
}

fn video_id_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
}
