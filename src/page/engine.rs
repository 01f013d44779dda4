//! Usage: classify -> mark -> resolve canonical title -> rewrite, for one inserted subtree.

use crate::background::BackgroundHandle;
use crate::page::classifier::{scan, ClassifiedElement};
use crate::page::dom::{Document, NodeId};
use crate::page::shapes::PROCESSED_MARKER;
use crate::shared::error::{AppError, AppResult};
use crate::shared::mutex_ext::MutexExt;
use crate::shared::BoxFuture;
use std::sync::{Arc, Mutex};

pub type SharedDocument = Arc<Mutex<Document>>;

/// Page-domain end of the `{videoId}` message.
pub trait TitleResolver: Send + Sync {
    fn resolve_title<'a>(&'a self, video_id: &'a str) -> BoxFuture<'a, AppResult<String>>;
}

impl TitleResolver for BackgroundHandle {
    fn resolve_title<'a>(&'a self, video_id: &'a str) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(self.original_title(video_id))
    }
}

#[derive(Debug, Clone)]
pub struct ElementFailure {
    pub node: NodeId,
    pub error: AppError,
}

#[derive(Debug, Clone, Default)]
pub struct DelocalizationReport {
    pub matched: usize,
    pub rewritten: usize,
    pub unchanged: usize,
    pub failures: Vec<ElementFailure>,
}

/// Writes `canonical` into the element when it differs from the displayed label.
/// Returns whether the element was changed.
pub fn apply_canonical_title(doc: &mut Document, element: &ClassifiedElement, canonical: &str) -> bool {
    if element.label == canonical {
        return false;
    }
    element
        .shape
        .rewrite(doc, element.node, &element.label, canonical);
    true
}

pub struct DelocalizationEngine {
    resolver: Arc<dyn TitleResolver>,
}

impl std::fmt::Debug for DelocalizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelocalizationEngine").finish_non_exhaustive()
    }
}

impl DelocalizationEngine {
    pub fn new(resolver: Arc<dyn TitleResolver>) -> Self {
        Self { resolver }
    }

    pub async fn process(&self, document: &SharedDocument, root: NodeId) -> DelocalizationReport {
        let mut report = DelocalizationReport::default();

        // Scan and mark in one critical section, before any await, so a concurrent pass over an
        // overlapping subtree can never pick the same element up.
        let classified: Vec<ClassifiedElement> = {
            let mut doc = document.lock_or_recover();
            let items: Vec<_> = scan(&doc, root).collect();
            let mut classified = Vec::with_capacity(items.len());
            for item in items {
                report.matched += 1;
                match item {
                    Ok(element) => {
                        doc.set_attr(element.node, PROCESSED_MARKER, "");
                        classified.push(element);
                    }
                    Err(err) => {
                        doc.set_attr(err.node, PROCESSED_MARKER, "");
                        tracing::warn!(node = %err.node, shape = err.shape.name(), reason = %err.reason, "title extraction failed");
                        report.failures.push(ElementFailure {
                            node: err.node,
                            error: err.into(),
                        });
                    }
                }
            }
            classified
        };

        if classified.is_empty() {
            return report;
        }

        let resolutions = futures::future::join_all(
            classified
                .iter()
                .map(|element| self.resolver.resolve_title(&element.video_id)),
        )
        .await;

        let mut doc = document.lock_or_recover();
        for (element, resolution) in classified.iter().zip(resolutions) {
            match resolution {
                Ok(canonical) => {
                    if apply_canonical_title(&mut doc, element, &canonical) {
                        tracing::debug!(video_id = %element.video_id, shape = element.shape.name(), "title delocalised");
                        report.rewritten += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
                Err(error) => {
                    tracing::warn!(video_id = %element.video_id, error = %error, "failed to resolve original title");
                    report.failures.push(ElementFailure {
                        node: element.node,
                        error,
                    });
                }
            }
        }
        report
    }
}
