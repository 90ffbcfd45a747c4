//! Assembled graph snapshots and the swappable store that publishes them.
//!
//! A [`Snapshot`] holds all five graphs (file, symbol, route, DI, job) as
//! flat records keyed by stable string identities, plus the adjacency
//! indexes traversal needs. Snapshots are immutable once published; the
//! [`SnapshotStore`] swaps the current pointer atomically so readers either
//! see the old graph or the new one, never a mix.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    BuildStats, CallEdge, DiEdge, FileRecord, FrameworkHint, Job, Route, Symbol, SymbolId,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, RwLock};

pub mod assemble;
pub mod resolve;

/// Bumped when assembled structure changes shape; part of the snapshot id so
/// stale ids never alias a new layout.
pub const GRAPH_SCHEMA_VERSION: u32 = 1;

/// Snapshot identity: blake3 over the sorted (path, content hash) pairs, the
/// framework hint, and the schema version. Unchanged source hashes to the
/// same id, which is what lets `build_graphs` short-circuit.
pub fn snapshot_digest(file_hashes: &[(String, String)], hint: FrameworkHint) -> String {
    let mut sorted: Vec<&(String, String)> = file_hashes.iter().collect();
    sorted.sort();
    let mut hasher = blake3::Hasher::new();
    hasher.update(GRAPH_SCHEMA_VERSION.to_le_bytes().as_slice());
    hasher.update(hint.as_str().as_bytes());
    for (path, hash) in sorted {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\0");
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug)]
pub struct Snapshot {
    pub id: String,
    pub hint: FrameworkHint,
    pub files: BTreeMap<String, FileRecord>,
    pub symbols: BTreeMap<SymbolId, Symbol>,
    pub call_edges: Vec<CallEdge>,
    pub routes: BTreeMap<String, Route>,
    pub di_edges: Vec<DiEdge>,
    pub jobs: BTreeMap<String, Job>,
    pub stats: BuildStats,

    callers_of: BTreeMap<SymbolId, Vec<usize>>,
    callees_of: BTreeMap<SymbolId, Vec<usize>>,
    consumers_of: BTreeMap<SymbolId, Vec<usize>>,
    providers_of: BTreeMap<SymbolId, Vec<usize>>,
    routes_of: BTreeMap<SymbolId, Vec<String>>,
    jobs_of: BTreeMap<SymbolId, Vec<String>>,
    imported_by: BTreeMap<String, Vec<String>>,
}

impl Snapshot {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        hint: FrameworkHint,
        files: BTreeMap<String, FileRecord>,
        symbols: BTreeMap<SymbolId, Symbol>,
        call_edges: Vec<CallEdge>,
        routes: BTreeMap<String, Route>,
        di_edges: Vec<DiEdge>,
        jobs: BTreeMap<String, Job>,
        stats: BuildStats,
    ) -> Self {
        let mut callers_of: BTreeMap<SymbolId, Vec<usize>> = BTreeMap::new();
        let mut callees_of: BTreeMap<SymbolId, Vec<usize>> = BTreeMap::new();
        for (idx, edge) in call_edges.iter().enumerate() {
            callees_of.entry(edge.caller.clone()).or_default().push(idx);
            if let Some(id) = edge.target.symbol_id() {
                callers_of.entry(id.clone()).or_default().push(idx);
            }
        }

        let mut consumers_of: BTreeMap<SymbolId, Vec<usize>> = BTreeMap::new();
        let mut providers_of: BTreeMap<SymbolId, Vec<usize>> = BTreeMap::new();
        for (idx, edge) in di_edges.iter().enumerate() {
            if let Some(id) = edge.provider.symbol_id() {
                consumers_of.entry(id.clone()).or_default().push(idx);
            }
            if let Some(id) = edge.consumer.symbol_id() {
                providers_of.entry(id.clone()).or_default().push(idx);
            }
        }

        let mut routes_of: BTreeMap<SymbolId, Vec<String>> = BTreeMap::new();
        for route in routes.values() {
            for member in route
                .handler
                .symbol_id()
                .into_iter()
                .chain(route.middleware.iter().filter_map(|m| m.symbol_id()))
            {
                let ids = routes_of.entry(member.clone()).or_default();
                if !ids.contains(&route.id) {
                    ids.push(route.id.clone());
                }
            }
        }

        let mut jobs_of: BTreeMap<SymbolId, Vec<String>> = BTreeMap::new();
        for job in jobs.values() {
            for member in job
                .handler
                .symbol_id()
                .into_iter()
                .chain(job.dependencies.iter())
            {
                let names = jobs_of.entry(member.clone()).or_default();
                if !names.contains(&job.name) {
                    names.push(job.name.clone());
                }
            }
        }

        let mut imported_by: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for file in files.values() {
            for import in &file.imports {
                if let Some(resolved) = &import.resolved {
                    imported_by
                        .entry(resolved.clone())
                        .or_default()
                        .insert(file.path.clone());
                }
            }
        }
        let imported_by = imported_by
            .into_iter()
            .map(|(path, set)| (path, set.into_iter().collect()))
            .collect();

        Snapshot {
            id,
            hint,
            files,
            symbols,
            call_edges,
            routes,
            di_edges,
            jobs,
            stats,
            callers_of,
            callees_of,
            consumers_of,
            providers_of,
            routes_of,
            jobs_of,
            imported_by,
        }
    }

    /// Every edge endpoint must name a symbol present in this snapshot (or
    /// the external sentinel / unresolved flag, which carry no identity).
    pub(crate) fn verify(&self) -> Result<()> {
        for edge in &self.call_edges {
            if !self.symbols.contains_key(&edge.caller) {
                return Err(Error::AssemblyInvariant(format!(
                    "call edge caller {} not in snapshot",
                    edge.caller
                )));
            }
            if let Some(id) = edge.target.symbol_id() {
                if !self.symbols.contains_key(id) {
                    return Err(Error::AssemblyInvariant(format!(
                        "call edge target {id} not in snapshot"
                    )));
                }
            }
        }
        for route in self.routes.values() {
            for member in route
                .handler
                .symbol_id()
                .into_iter()
                .chain(route.middleware.iter().filter_map(|m| m.symbol_id()))
            {
                if !self.symbols.contains_key(member) {
                    return Err(Error::AssemblyInvariant(format!(
                        "route {} references {} not in snapshot",
                        route.id, member
                    )));
                }
            }
        }
        for edge in &self.di_edges {
            for member in edge
                .provider
                .symbol_id()
                .into_iter()
                .chain(edge.consumer.symbol_id())
            {
                if !self.symbols.contains_key(member) {
                    return Err(Error::AssemblyInvariant(format!(
                        "di edge references {member} not in snapshot"
                    )));
                }
            }
        }
        for job in self.jobs.values() {
            for member in job
                .handler
                .symbol_id()
                .into_iter()
                .chain(job.dependencies.iter())
            {
                if !self.symbols.contains_key(member) {
                    return Err(Error::AssemblyInvariant(format!(
                        "job {} references {} not in snapshot",
                        job.name, member
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get_symbol(&self, id: &SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// Call edges whose resolved target is `id`.
    pub fn caller_edges(&self, id: &SymbolId) -> impl Iterator<Item = &CallEdge> {
        self.callers_of
            .get(id)
            .into_iter()
            .flatten()
            .map(|idx| &self.call_edges[*idx])
    }

    /// Call edges leaving `id`, external sentinels included.
    pub fn callee_edges(&self, id: &SymbolId) -> impl Iterator<Item = &CallEdge> {
        self.callees_of
            .get(id)
            .into_iter()
            .flatten()
            .map(|idx| &self.call_edges[*idx])
    }

    /// DI edges where `id` is the provider.
    pub fn consumer_edges(&self, id: &SymbolId) -> impl Iterator<Item = &DiEdge> {
        self.consumers_of
            .get(id)
            .into_iter()
            .flatten()
            .map(|idx| &self.di_edges[*idx])
    }

    /// DI edges where `id` is the consumer.
    pub fn provider_edges(&self, id: &SymbolId) -> impl Iterator<Item = &DiEdge> {
        self.providers_of
            .get(id)
            .into_iter()
            .flatten()
            .map(|idx| &self.di_edges[*idx])
    }

    /// Route ids whose handler chain contains `id`.
    pub fn routes_containing(&self, id: &SymbolId) -> &[String] {
        self.routes_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Job names whose handler or dependency set contains `id`.
    pub fn jobs_containing(&self, id: &SymbolId) -> &[String] {
        self.jobs_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Files that import `path`, sorted.
    pub fn importers_of(&self, path: &str) -> &[String] {
        self.imported_by.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All five graphs as one JSON document for external persistence or
    /// presentation layers.
    pub fn export_json(&self) -> serde_json::Value {
        json!({
            "snapshot_id": self.id,
            "schema_version": GRAPH_SCHEMA_VERSION,
            "stats": self.stats,
            "files": self.files.values().collect::<Vec<_>>(),
            "symbols": self.symbols.values().collect::<Vec<_>>(),
            "call_edges": self.call_edges,
            "routes": self.routes.values().collect::<Vec<_>>(),
            "di_edges": self.di_edges,
            "jobs": self.jobs.values().collect::<Vec<_>>(),
        })
    }
}

#[derive(Default)]
struct StoreState {
    current: Option<Arc<Snapshot>>,
    superseded: VecDeque<Arc<Snapshot>>,
}

/// Versioned snapshot store. Queries acquire an `Arc` to one snapshot and
/// keep using it even while a rebuild publishes a newer one; a bounded
/// history keeps recently superseded snapshots addressable by id.
#[derive(Default)]
pub struct SnapshotStore {
    state: RwLock<StoreState>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published snapshot, if any rebuild has completed.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.state.read().unwrap().current.clone()
    }

    /// Current snapshot or [`Error::NoSnapshot`].
    pub fn acquire(&self) -> Result<Arc<Snapshot>> {
        self.current().ok_or(Error::NoSnapshot)
    }

    /// Look up by id across the current snapshot and retained history.
    pub fn get(&self, id: &str) -> Result<Arc<Snapshot>> {
        let state = self.state.read().unwrap();
        if let Some(current) = &state.current {
            if current.id == id {
                return Ok(Arc::clone(current));
            }
        }
        state
            .superseded
            .iter()
            .find(|snapshot| snapshot.id == id)
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(id.to_string()))
    }

    /// Publish a new snapshot: single pointer swap, previous snapshot moves
    /// into the retained history.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let retained = Config::get().retained_snapshots;
        let snapshot = Arc::new(snapshot);
        let mut state = self.state.write().unwrap();
        if let Some(previous) = state.current.replace(Arc::clone(&snapshot)) {
            if previous.id != snapshot.id {
                state.superseded.push_front(previous);
                state.superseded.truncate(retained);
            }
        }
        snapshot
    }
}
