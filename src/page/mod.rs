//! Usage: Page domain (DOM model, markup shapes, classifier, delocalisation engine, observer).

pub mod classifier;
pub mod dom;
pub mod engine;
pub mod observer;
pub mod shapes;

pub use classifier::{scan, ClassifiedElement, ExtractionError};
pub use dom::{Document, NodeId};
pub use engine::{DelocalizationEngine, DelocalizationReport, SharedDocument, TitleResolver};
pub use observer::{MutationRecord, ObserverSummary, PageObserver};
pub use shapes::{MarkupShape, PROCESSED_MARKER};
