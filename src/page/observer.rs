//! Usage: Watches structural changes under `<ytd-app>` and runs the engine on every added element.

use crate::page::dom::{Document, NodeId};
use crate::page::engine::{DelocalizationEngine, DelocalizationReport, SharedDocument};
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const OBSERVED_ROOT_TAG: &str = "ytd-app";

/// Nodes added by one structural change, as a page would report them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRecord {
    pub added_nodes: Vec<NodeId>,
}

impl MutationRecord {
    /// Inserts `html` under `parent` and describes the insertion.
    pub fn insert_html(doc: &mut Document, parent: NodeId, html: &str) -> Self {
        Self {
            added_nodes: doc.append_html(parent, html),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverSummary {
    pub subtrees: usize,
    pub matched: usize,
    pub rewritten: usize,
    pub failures: usize,
}

impl ObserverSummary {
    fn absorb(&mut self, report: &DelocalizationReport) {
        self.subtrees += 1;
        self.matched += report.matched;
        self.rewritten += report.rewritten;
        self.failures += report.failures.len();
    }
}

pub struct PageObserver {
    document: SharedDocument,
    engine: Arc<DelocalizationEngine>,
    target: NodeId,
    tasks: JoinSet<DelocalizationReport>,
    summary: ObserverSummary,
}

impl std::fmt::Debug for PageObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageObserver")
            .field("target", &self.target)
            .field("pending", &self.tasks.len())
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl PageObserver {
    /// Refuses to observe a page without the application root element.
    pub fn attach(document: SharedDocument, engine: Arc<DelocalizationEngine>) -> AppResult<Self> {
        let target = {
            let doc = document.lock_or_recover();
            let found = doc.elements_by_tag_name(OBSERVED_ROOT_TAG).next();
            found
        };
        let target = target.ok_or_else(|| {
            format!("SYSTEM_ERROR: element <{OBSERVED_ROOT_TAG}> not found")
        })?;
        tracing::info!(target = %target, "page observer attached");

        Ok(Self {
            document,
            engine,
            target,
            tasks: JoinSet::new(),
            summary: ObserverSummary::default(),
        })
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn summary(&self) -> &ObserverSummary {
        &self.summary
    }

    /// Starts one engine pass per added element inside the observed subtree.
    /// Returns how many passes were started.
    pub fn on_mutations(&mut self, records: &[MutationRecord]) -> usize {
        let roots: Vec<NodeId> = {
            let doc = self.document.lock_or_recover();
            records
                .iter()
                .flat_map(|record| record.added_nodes.iter().copied())
                .filter(|node| doc.is_element(*node))
                .filter(|node| doc.is_inclusive_ancestor(self.target, *node))
                .collect()
        };

        for root in &roots {
            let document = Arc::clone(&self.document);
            let engine = Arc::clone(&self.engine);
            let root = *root;
            self.tasks
                .spawn(async move { engine.process(&document, root).await });
        }
        roots.len()
    }

    /// Waits for every started pass and folds its report into the summary.
    pub async fn settle(&mut self) -> &ObserverSummary {
        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined);
        }
        &self.summary
    }

    fn record(&mut self, joined: Result<DelocalizationReport, tokio::task::JoinError>) {
        match joined {
            Ok(report) => {
                for failure in &report.failures {
                    tracing::debug!(node = %failure.node, error = %failure.error, "element left unmodified");
                }
                self.summary.absorb(&report);
            }
            Err(err) => tracing::error!(error = %err, "delocalisation pass aborted"),
        }
    }

    /// Consumes mutation batches until the sender goes away, then finishes outstanding passes.
    pub async fn run(mut self, mut mutations: mpsc::Receiver<Vec<MutationRecord>>) -> ObserverSummary {
        loop {
            tokio::select! {
                batch = mutations.recv() => match batch {
                    Some(records) => {
                        self.on_mutations(&records);
                    }
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.record(joined);
                }
            }
        }
        self.settle().await;
        tracing::info!(summary = ?self.summary, "page observer detached");
        self.summary
    }
}
