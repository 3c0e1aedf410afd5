//! Import graph with cycle-tolerant readiness tracking
//!
//! Nodes are resolved URLs. Every node carries forward edges (what it
//! imports), reverse edges (who imports it) and the state of its own local
//! scan. Readiness is structural: `when_ready(url)` re-walks the reachable
//! subgraph each time any node changes state, and resolves once every node it
//! reaches has finished scanning locally. Cycles are just visited nodes, so
//! no wait ever depends on itself.
//!
//! Records are shared between forks through `Arc` and copied only when a
//! fork writes to them.

use crate::model::Warning;
use crate::url::ResolvedUrl;
use parking_lot::RwLock;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// State of a node's own (non-transitive) scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanStatus {
    #[default]
    Pending,
    Done,
    Rejected(Warning),
}

impl ScanStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ScanStatus::Pending)
    }
}

#[derive(Debug, Clone, Default)]
struct DocumentRecord {
    dependencies: BTreeSet<ResolvedUrl>,
    dependants: BTreeSet<ResolvedUrl>,
    status: ScanStatus,
}

pub struct DependencyGraph {
    records: RwLock<HashMap<ResolvedUrl, Arc<DocumentRecord>>>,
    /// Bumped on every status change; readiness waiters subscribe to it.
    changes: watch::Sender<u64>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::from_records(HashMap::new())
    }

    fn from_records(records: HashMap<ResolvedUrl, Arc<DocumentRecord>>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            records: RwLock::new(records),
            changes,
        }
    }

    /// Record that `url`'s local scan finished, importing `dependencies`.
    ///
    /// Edges accumulate across calls within one graph.
    pub fn add_document(&self, url: &ResolvedUrl, dependencies: &[ResolvedUrl]) {
        let changed = {
            let mut records = self.records.write();
            for dependency in dependencies {
                let record = records.entry(dependency.clone()).or_default();
                if !record.dependants.contains(url) {
                    Arc::make_mut(record).dependants.insert(url.clone());
                }
            }

            let record = records.entry(url.clone()).or_default();
            let already_known = record.status == ScanStatus::Done
                && dependencies.iter().all(|dep| record.dependencies.contains(dep));
            if !already_known {
                let record = Arc::make_mut(record);
                record.dependencies.extend(dependencies.iter().cloned());
                record.status = ScanStatus::Done;
            }
            !already_known
        };

        if changed {
            debug!(url = %url, dependencies = dependencies.len(), "document added to graph");
            self.notify();
        }
    }

    /// Record that `url`'s local scan failed
    pub fn reject_document(&self, url: &ResolvedUrl, warning: Warning) {
        {
            let mut records = self.records.write();
            let record = Arc::make_mut(records.entry(url.clone()).or_default());
            record.status = ScanStatus::Rejected(warning);
        }
        debug!(url = %url, "document rejected in graph");
        self.notify();
    }

    /// Resolve once `url` and everything reachable from it has finished its
    /// local scan, successfully or not.
    pub async fn when_ready(&self, url: &ResolvedUrl) {
        let mut changes = self.changes.subscribe();
        loop {
            if self.is_stabilized(url) {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Whether every node reachable from `url` (itself included) is settled
    pub fn is_stabilized(&self, url: &ResolvedUrl) -> bool {
        let records = self.records.read();
        let mut visited = HashSet::new();
        let mut stack = vec![url];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(record) = records.get(current) else {
                return false;
            };
            if !record.status.is_settled() {
                return false;
            }
            stack.extend(record.dependencies.iter());
        }
        true
    }

    /// New graph without the given nodes.
    ///
    /// Edges from removed nodes to their dependencies go with them. A removed
    /// node that other nodes import comes back as a pending placeholder that
    /// keeps those reverse edges, so dependants still wait for its rescan.
    pub fn invalidate_paths(&self, urls: &[ResolvedUrl]) -> DependencyGraph {
        let mut records = self.records.read().clone();
        for url in urls {
            let Some(removed) = records.remove(url) else {
                continue;
            };
            for dependency in &removed.dependencies {
                if let Some(record) = records.get_mut(dependency) {
                    Arc::make_mut(record).dependants.remove(url);
                }
            }
            if !removed.dependants.is_empty() {
                records.insert(
                    url.clone(),
                    Arc::new(DocumentRecord {
                        dependants: removed.dependants.clone(),
                        ..Default::default()
                    }),
                );
            }
        }
        DependencyGraph::from_records(records)
    }

    /// Structural copy; records are shared until either side writes
    pub fn fork(&self) -> DependencyGraph {
        DependencyGraph::from_records(self.records.read().clone())
    }

    /// Every node that transitively imports `url`
    pub fn get_all_dependants_of(&self, url: &ResolvedUrl) -> HashSet<ResolvedUrl> {
        let records = self.records.read();
        let mut result = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(url.clone());
        while let Some(current) = queue.pop_front() {
            if let Some(record) = records.get(&current) {
                for dependant in &record.dependants {
                    if result.insert(dependant.clone()) {
                        queue.push_back(dependant.clone());
                    }
                }
            }
        }
        result
    }

    pub fn get_dependencies_of(&self, url: &ResolvedUrl) -> Vec<ResolvedUrl> {
        self.records
            .read()
            .get(url)
            .map(|record| record.dependencies.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn status(&self, url: &ResolvedUrl) -> Option<ScanStatus> {
        self.records.read().get(url).map(|record| record.status.clone())
    }

    pub fn is_locally_done(&self, url: &ResolvedUrl) -> bool {
        self.status(url).map(|status| status.is_settled()).unwrap_or(false)
    }

    /// The warning `url` was rejected with, if its local scan failed
    pub fn rejection(&self, url: &ResolvedUrl) -> Option<Warning> {
        match self.status(url)? {
            ScanStatus::Rejected(warning) => Some(warning),
            _ => None,
        }
    }

    /// Groups of documents that import each other, found with Tarjan's SCC.
    /// Self-imports count as a group of one.
    pub fn import_cycles(&self) -> Vec<Vec<ResolvedUrl>> {
        let records = self.records.read();
        let mut graph: DiGraph<ResolvedUrl, ()> = DiGraph::new();
        let mut indices: HashMap<&ResolvedUrl, NodeIndex> = HashMap::new();

        for url in records.keys() {
            indices.insert(url, graph.add_node(url.clone()));
        }
        for (url, record) in records.iter() {
            for dependency in &record.dependencies {
                if let (Some(&from), Some(&to)) = (indices.get(url), indices.get(dependency)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut cycles: Vec<Vec<ResolvedUrl>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .map(|&node| graph.contains_edge(node, node))
                        .unwrap_or(false)
            })
            .map(|component| {
                let mut urls: Vec<ResolvedUrl> =
                    component.into_iter().map(|node| graph[node].clone()).collect();
                urls.sort();
                urls
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("nodes", &self.len())
            .finish()
    }
}
