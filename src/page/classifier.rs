//! Usage: Lazily scan an inserted subtree for elements of a known markup shape.

use crate::page::dom::{Descendants, Document, NodeId};
use crate::page::shapes::MarkupShape;
use crate::shared::error::{AppError, EXTRACTION_ERROR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedElement {
    pub node: NodeId,
    pub shape: MarkupShape,
    pub video_id: String,
    pub label: String,
}

/// A matched element whose id or label could not be read; the shape definition has drifted from
/// the real page structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{shape:?} element {node}: {reason}")]
pub struct ExtractionError {
    pub node: NodeId,
    pub shape: MarkupShape,
    pub reason: String,
}

impl From<ExtractionError> for AppError {
    fn from(value: ExtractionError) -> Self {
        AppError::new(EXTRACTION_ERROR, value.to_string())
    }
}

/// Single pass over `root` (inclusive) and its descendants. Elements carrying the processed marker
/// are skipped.
pub fn scan(doc: &Document, root: NodeId) -> Scan<'_> {
    Scan {
        doc,
        walk: doc.descendants(root),
    }
}

pub struct Scan<'a> {
    doc: &'a Document,
    walk: Descendants<'a>,
}

impl Iterator for Scan<'_> {
    type Item = Result<ClassifiedElement, ExtractionError>;

    fn next(&mut self) -> Option<Self::Item> {
        for node in self.walk.by_ref() {
            let Some(shape) = MarkupShape::classify(self.doc, node) else {
                continue;
            };
            let item = match shape.extract(self.doc, node) {
                Ok(extracted) => Ok(ClassifiedElement {
                    node,
                    shape,
                    video_id: extracted.video_id,
                    label: extracted.label,
                }),
                Err(reason) => Err(ExtractionError {
                    node,
                    shape,
                    reason,
                }),
            };
            return Some(item);
        }
        None
    }
}

impl std::iter::FusedIterator for Scan<'_> {}
