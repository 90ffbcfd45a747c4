//! Engine facade over the parse/assemble/query pipeline.
//!
//! Owns the snapshot store and a per-file fact cache. `build_graphs` runs a
//! full scan, reparses only files whose content hash changed, assembles a
//! fresh snapshot, and publishes it atomically; every query operation
//! acquires one snapshot up front and works against it for its whole
//! duration, so a concurrent rebuild never changes an answer mid-flight.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info};

use crate::config::Config;
use crate::drift;
use crate::error::{Error, Result};
use crate::graph::{assemble, snapshot_digest, Snapshot, SnapshotStore};
use crate::impact;
use crate::model::{
    BlastRadius, ChangeKind, DriftReport, FrameworkHint, SpecSnapshot, Symbol, SymbolId,
    SymbolRef, SymbolSummary,
};
use crate::parser;
use crate::parser::facts::FileFacts;
use crate::parser::scan::{self, ScannedFile};
use crate::summary;

/// Cached parse output, keyed by path, valid for one content hash and the
/// hint it was extracted under. Framework gating happens at extraction time,
/// so a hint switch drops every entry.
#[derive(Default)]
struct FactCache {
    hint: Option<FrameworkHint>,
    by_path: HashMap<String, (String, FileFacts)>,
}

pub struct Engine {
    config: Config,
    store: SnapshotStore,
    fact_cache: Mutex<FactCache>,
}

impl Engine {
    pub fn new() -> Self {
        Engine::with_config(Config::get().clone())
    }

    pub fn with_config(config: Config) -> Self {
        Engine {
            config,
            store: SnapshotStore::new(),
            fact_cache: Mutex::new(FactCache::default()),
        }
    }

    /// Scan `repo_root`, parse what changed, assemble, and publish.
    ///
    /// Returns the published snapshot id. Unchanged source short-circuits:
    /// the digest over (path, content hash) pairs equals the current
    /// snapshot's id, and that snapshot stays published untouched. A failed
    /// assembly leaves the prior snapshot serving queries.
    pub fn build_graphs(&self, repo_root: &Path, hint: FrameworkHint) -> Result<String> {
        let started = Instant::now();
        let scanned = scan::scan_repo(repo_root).map_err(Error::parse)?;

        let digest = snapshot_digest(
            &scanned
                .iter()
                .map(|file| (file.rel_path.clone(), file.hash.clone()))
                .collect::<Vec<_>>(),
            hint,
        );
        if let Some(current) = self.store.current() {
            if current.id == digest {
                debug!(snapshot = %digest, "source unchanged, keeping published snapshot");
                return Ok(digest);
            }
        }

        let total = scanned.len();
        let (reused, to_parse) = self.split_cached(scanned, hint);
        let reused_count = reused.len();
        let parsed_count = to_parse.len();

        let parsed = parser::parse_repo(to_parse, hint).map_err(Error::parse)?;

        let mut facts = reused;
        facts.extend(parsed);
        facts.sort_by(|a, b| a.path.cmp(&b.path));

        let mut snapshot = assemble::assemble(&facts, hint, digest.clone())?;
        snapshot.stats.parsed = parsed_count;
        snapshot.stats.reused = reused_count;
        snapshot.stats.duration_ms = started.elapsed().as_millis() as u64;

        self.remember(&facts);
        let published = self.store.publish(snapshot);
        info!(
            snapshot = %published.id,
            files = total,
            parsed = parsed_count,
            reused = reused_count,
            symbols = published.stats.symbols,
            duration_ms = published.stats.duration_ms,
            "graphs rebuilt"
        );
        Ok(digest)
    }

    /// Partition scanned files into cached facts (hash unchanged since the
    /// last build) and files that need a fresh parse. Cache entries for
    /// paths that no longer exist are dropped.
    fn split_cached(
        &self,
        scanned: Vec<ScannedFile>,
        hint: FrameworkHint,
    ) -> (Vec<FileFacts>, Vec<ScannedFile>) {
        let mut cache = self.fact_cache.lock().unwrap();
        if cache.hint != Some(hint) {
            cache.by_path.clear();
            cache.hint = Some(hint);
        }
        let live: BTreeSet<&str> = scanned.iter().map(|file| file.rel_path.as_str()).collect();
        cache.by_path.retain(|path, _| live.contains(path.as_str()));

        let mut reused = Vec::new();
        let mut to_parse = Vec::new();
        for file in scanned {
            match cache.by_path.get(&file.rel_path) {
                Some((hash, facts)) if *hash == file.hash => reused.push(facts.clone()),
                _ => to_parse.push(file),
            }
        }
        (reused, to_parse)
    }

    fn remember(&self, facts: &[FileFacts]) {
        let mut cache = self.fact_cache.lock().unwrap();
        for fact in facts {
            cache
                .by_path
                .insert(fact.path.clone(), (fact.hash.clone(), fact.clone()));
        }
    }

    /// The currently published snapshot, for export and inspection.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.store.acquire()
    }

    pub fn get_symbol(&self, id: &SymbolId) -> Result<Symbol> {
        let snapshot = self.store.acquire()?;
        snapshot
            .get_symbol(id)
            .cloned()
            .ok_or_else(|| Error::SymbolNotFound(id.clone()))
    }

    /// Resolved callers of `id`, ordered by (file path, declaration line,
    /// qualified name).
    pub fn who_calls(&self, id: &SymbolId) -> Result<Vec<SymbolRef>> {
        let snapshot = self.store.acquire()?;
        if snapshot.get_symbol(id).is_none() {
            return Err(Error::SymbolNotFound(id.clone()));
        }
        let unique: BTreeSet<&SymbolId> =
            snapshot.caller_edges(id).map(|edge| &edge.caller).collect();
        let mut callers: Vec<SymbolRef> = unique
            .into_iter()
            .filter_map(|caller| snapshot.get_symbol(caller))
            .map(SymbolRef::from)
            .collect();
        callers.sort_by(|a, b| {
            (&a.file_path, a.start_line, &a.qualname).cmp(&(&b.file_path, b.start_line, &b.qualname))
        });
        Ok(callers)
    }

    /// Forward closure over resolved call edges up to `depth` hops, the
    /// queried symbol excluded. External references are not symbols and are
    /// omitted here; they surface through summaries and blast-radius gaps.
    pub fn list_dependencies(&self, id: &SymbolId, depth: usize) -> Result<Vec<SymbolRef>> {
        let snapshot = self.store.acquire()?;
        if snapshot.get_symbol(id).is_none() {
            return Err(Error::SymbolNotFound(id.clone()));
        }
        let depth = self.clamp_depth(depth);

        let mut visited: BTreeSet<SymbolId> = BTreeSet::new();
        visited.insert(id.clone());
        let mut frontier = vec![id.clone()];
        let mut collected: BTreeSet<SymbolId> = BTreeSet::new();
        for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                for edge in snapshot.callee_edges(node) {
                    if let Some(target) = edge.target.symbol_id() {
                        if visited.insert(target.clone()) {
                            collected.insert(target.clone());
                            next.push(target.clone());
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut dependencies: Vec<SymbolRef> = collected
            .iter()
            .filter_map(|dep| snapshot.get_symbol(dep))
            .map(SymbolRef::from)
            .collect();
        dependencies.sort_by(|a, b| {
            (&a.file_path, a.start_line, &a.qualname).cmp(&(&b.file_path, b.start_line, &b.qualname))
        });
        Ok(dependencies)
    }

    pub fn compute_blast_radius(
        &self,
        seeds: &[SymbolId],
        change_kind: ChangeKind,
        depth: usize,
    ) -> Result<BlastRadius> {
        let snapshot = self.store.acquire()?;
        let depth = self.clamp_depth(depth);
        impact::compute_blast_radius(&snapshot, seeds, change_kind, depth, &self.config)
    }

    /// Drift against the current snapshot, or a retained one when
    /// `snapshot_id` names it.
    pub fn diff_spec_vs_code(
        &self,
        spec: &SpecSnapshot,
        snapshot_id: Option<&str>,
    ) -> Result<Vec<DriftReport>> {
        let snapshot = match snapshot_id {
            Some(id) => self.store.get(id)?,
            None => self.store.acquire()?,
        };
        Ok(drift::diff(spec, &snapshot))
    }

    pub fn summarize(&self, id: &SymbolId) -> Result<SymbolSummary> {
        let snapshot = self.store.acquire()?;
        summary::summarize(&snapshot, id, &self.config)
    }

    /// Zero means "use the configured default"; anything else is clamped to
    /// `[1, max_depth]`.
    fn clamp_depth(&self, requested: usize) -> usize {
        if requested == 0 {
            self.config.default_depth
        } else {
            requested.clamp(1, self.config.max_depth)
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
