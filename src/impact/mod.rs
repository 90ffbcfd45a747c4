//! Blast-radius computation over an assembled snapshot.
//!
//! Answers "what breaks if I change this?" by walking reverse call edges and
//! dependency-injection edges outward from the changed symbols, then reading
//! route, job, test, and data-store membership off the reached set. Every
//! list in the result is sorted so repeated queries over the same snapshot
//! produce identical output.

pub mod confidence;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::Snapshot;
use crate::model::{
    BlastRadius, CallTarget, ChangeKind, HandlerRef, ImpactedSymbol, RiskLevel, Symbol, SymbolId,
    SymbolKind, SymbolRef,
};
use crate::util::{file_stem_lower, is_test_path, to_snake_case};

/// When a symbol's class or file matches one of these data-access suffixes,
/// the stripped prefix names the store object it manages.
const DB_NAME_PATTERNS: &[&str] = &["repository", "model", "entity", "dao", "schema"];

/// Routes at or above this count push the risk to High.
const HIGH_RISK_ROUTE_COUNT: usize = 3;

/// Injection consumers at or above this count push the risk to Medium.
const MEDIUM_RISK_CONSUMER_COUNT: usize = 2;

struct Visit {
    distance: usize,
    confidence: f32,
}

/// Walk outward from `seeds` up to `depth` hops and derive the blast radius.
///
/// Traversal follows reverse call edges (who calls the node) and
/// provider-to-consumer injection edges. Each node is expanded once at its
/// minimal hop and keeps the best path confidence seen on any in-edge. The
/// walk stops early when the wall-clock budget or node limit runs out, which
/// marks the result truncated and discounts its confidence.
pub fn compute_blast_radius(
    snapshot: &Snapshot,
    seeds: &[SymbolId],
    change_kind: ChangeKind,
    depth: usize,
    config: &Config,
) -> Result<BlastRadius> {
    let mut seed_ids: Vec<SymbolId> = seeds.to_vec();
    seed_ids.sort();
    seed_ids.dedup();

    // An added symbol has no dependents by definition, and may not exist in
    // the snapshot yet, so it skips seed validation too.
    if change_kind == ChangeKind::Addition {
        return Ok(empty_radius(seed_ids, change_kind, depth));
    }

    for seed in &seed_ids {
        if snapshot.get_symbol(seed).is_none() {
            return Err(Error::SymbolNotFound(seed.clone()));
        }
    }

    let budget = Duration::from_millis(config.blast_budget_ms);
    let started = Instant::now();
    let mut truncated = false;

    let mut visited: BTreeMap<SymbolId, Visit> = BTreeMap::new();
    let mut di_consumers: BTreeSet<SymbolId> = BTreeSet::new();
    for seed in &seed_ids {
        visited.insert(
            seed.clone(),
            Visit {
                distance: 0,
                confidence: 1.0,
            },
        );
    }

    let mut frontier: Vec<SymbolId> = seed_ids.clone();
    let mut distance = 0usize;

    'walk: while !frontier.is_empty() && distance < depth {
        let hop = distance + 1;
        let mut next: BTreeSet<SymbolId> = BTreeSet::new();
        for node in &frontier {
            if started.elapsed() > budget {
                truncated = true;
                break 'walk;
            }
            if visited.len() >= config.node_limit {
                truncated = true;
                break 'walk;
            }
            let parent_confidence = match visited.get(node) {
                Some(visit) => visit.confidence,
                None => continue,
            };
            for edge in snapshot.caller_edges(node) {
                let step = confidence::step_confidence(parent_confidence, edge.confidence, hop);
                relax(&mut visited, &mut next, edge.caller.clone(), hop, step);
            }
            for edge in snapshot.consumer_edges(node) {
                let HandlerRef::Resolved {
                    id,
                    confidence: edge_confidence,
                } = &edge.consumer
                else {
                    continue;
                };
                let step = confidence::step_confidence(parent_confidence, *edge_confidence, hop);
                di_consumers.insert(id.clone());
                relax(&mut visited, &mut next, id.clone(), hop, step);
            }
        }
        frontier = next.into_iter().collect();
        distance += 1;
    }

    di_consumers.retain(|id| seed_ids.binary_search(id).is_err());

    let mut reached: Vec<ImpactedSymbol> = Vec::new();
    for (id, visit) in &visited {
        if visit.distance == 0 {
            continue;
        }
        let Some(symbol) = snapshot.get_symbol(id) else {
            continue;
        };
        reached.push(ImpactedSymbol {
            symbol: SymbolRef::from(symbol),
            distance: visit.distance,
            confidence: visit.confidence,
        });
    }
    reached.sort_by(|a, b| {
        (a.distance, &a.symbol.file_path, a.symbol.start_line, &a.symbol.qualname).cmp(&(
            b.distance,
            &b.symbol.file_path,
            b.symbol.start_line,
            &b.symbol.qualname,
        ))
    });

    // Route and job membership covers the seeds themselves: changing a
    // handler affects its route even when nothing calls the handler.
    let mut affected_routes: BTreeSet<String> = BTreeSet::new();
    let mut affected_jobs: BTreeSet<String> = BTreeSet::new();
    for id in visited.keys() {
        affected_routes.extend(snapshot.routes_containing(id).iter().cloned());
        affected_jobs.extend(snapshot.jobs_containing(id).iter().cloned());
    }

    let test_references: Vec<SymbolId> = reached
        .iter()
        .filter(|entry| is_test_path(&entry.symbol.file_path))
        .map(|entry| entry.symbol.id.clone())
        .collect();

    let mut db_objects: BTreeSet<String> = BTreeSet::new();
    for entry in &reached {
        if let Some(symbol) = snapshot.get_symbol(&entry.symbol.id) {
            if let Some(name) = db_object_name(symbol) {
                db_objects.insert(name);
            }
        }
    }

    let mut overall = confidence::mean_confidence(reached.iter().map(|entry| entry.confidence));
    if truncated {
        overall = confidence::apply_truncation(overall);
    }

    let (risk, factors) = classify_risk(affected_routes.len(), di_consumers.len(), &db_objects);
    let gaps = collect_gaps(snapshot, &seed_ids, truncated);

    debug!(
        seeds = seed_ids.len(),
        reached = reached.len(),
        routes = affected_routes.len(),
        truncated,
        "blast radius computed"
    );

    Ok(BlastRadius {
        seeds: seed_ids,
        change_kind,
        depth,
        reached,
        affected_routes: affected_routes.into_iter().collect(),
        di_consumers: di_consumers.into_iter().collect(),
        affected_jobs: affected_jobs.into_iter().collect(),
        test_references,
        db_objects: db_objects.into_iter().collect(),
        confidence: overall,
        risk,
        factors,
        gaps,
        truncated,
    })
}

fn empty_radius(seeds: Vec<SymbolId>, change_kind: ChangeKind, depth: usize) -> BlastRadius {
    BlastRadius {
        seeds,
        change_kind,
        depth,
        reached: Vec::new(),
        affected_routes: Vec::new(),
        di_consumers: Vec::new(),
        affected_jobs: Vec::new(),
        test_references: Vec::new(),
        db_objects: Vec::new(),
        confidence: 1.0,
        risk: RiskLevel::Low,
        factors: vec!["additions have no dependents yet".to_string()],
        gaps: Vec::new(),
        truncated: false,
    }
}

/// Record `id` at `hop` if unseen, or lift its confidence if a better path
/// arrived. Nodes are only queued the first time they are seen.
fn relax(
    visited: &mut BTreeMap<SymbolId, Visit>,
    next: &mut BTreeSet<SymbolId>,
    id: SymbolId,
    hop: usize,
    confidence: f32,
) {
    match visited.entry(id) {
        Entry::Occupied(mut entry) => {
            let visit = entry.get_mut();
            if confidence > visit.confidence {
                visit.confidence = confidence;
            }
        }
        Entry::Vacant(entry) => {
            next.insert(entry.key().clone());
            entry.insert(Visit {
                distance: hop,
                confidence,
            });
        }
    }
}

fn classify_risk(
    route_count: usize,
    di_consumer_count: usize,
    db_objects: &BTreeSet<String>,
) -> (RiskLevel, Vec<String>) {
    let mut risk = RiskLevel::Low;
    let mut factors = Vec::new();

    if route_count >= HIGH_RISK_ROUTE_COUNT {
        risk = RiskLevel::High;
        factors.push(format!("{route_count} routes depend on the change"));
    } else if route_count > 0 {
        risk = risk.max(RiskLevel::Medium);
        factors.push(format!("{route_count} route(s) depend on the change"));
    }
    if !db_objects.is_empty() {
        risk = RiskLevel::High;
        let names: Vec<&str> = db_objects.iter().map(String::as_str).collect();
        factors.push(format!("data-store objects in the radius: {}", names.join(", ")));
    }
    if di_consumer_count >= MEDIUM_RISK_CONSUMER_COUNT {
        risk = risk.max(RiskLevel::Medium);
        factors.push(format!(
            "{di_consumer_count} injection consumers depend on the change"
        ));
    }
    if factors.is_empty() {
        factors.push("no routes or data-store objects in the radius".to_string());
    }
    (risk, factors)
}

/// Named sources of undercounting, so a caller can tell a small radius from
/// a blind one.
fn collect_gaps(snapshot: &Snapshot, seed_ids: &[SymbolId], truncated: bool) -> Vec<String> {
    let mut gaps = Vec::new();

    let seed_names: BTreeSet<&str> = seed_ids
        .iter()
        .filter_map(|id| snapshot.get_symbol(id))
        .map(|symbol| symbol.name.as_str())
        .collect();
    let unresolved_matches = snapshot
        .call_edges
        .iter()
        .filter(|edge| match &edge.target {
            CallTarget::External { reference } => {
                let last = reference.rsplit('.').next().unwrap_or(reference);
                seed_names.contains(last)
            }
            CallTarget::Symbol { .. } => false,
        })
        .count();
    if unresolved_matches > 0 {
        gaps.push(format!(
            "{unresolved_matches} unresolved reference(s) share a seed name and may be uncounted callers"
        ));
    }

    let unresolved_handlers = snapshot
        .routes
        .values()
        .filter(|route| !route.handler.is_resolved())
        .count();
    if unresolved_handlers > 0 {
        gaps.push(format!(
            "{unresolved_handlers} route handler(s) are unresolved; route impact may be undercounted"
        ));
    }

    let failed_files = snapshot
        .files
        .values()
        .filter(|file| file.parse_failed)
        .count();
    if failed_files > 0 {
        gaps.push(format!(
            "{failed_files} file(s) failed to parse and are missing from the graphs"
        ));
    }

    if truncated {
        gaps.push("traversal stopped at the node or time budget; the radius is a lower bound".to_string());
    }
    gaps
}

/// Derive the plural store-object name a symbol manages, when its class or
/// file follows a data-access naming convention: `UserRepository` and
/// `order_model.py` both qualify, as does `class User` inside `models.py`.
pub fn db_object_name(symbol: &Symbol) -> Option<String> {
    let head = symbol.qualname.split('.').next().unwrap_or(&symbol.qualname);
    let head_snake = to_snake_case(head);
    for pattern in DB_NAME_PATTERNS {
        if let Some(prefix) = head_snake.strip_suffix(&format!("_{pattern}")) {
            if !prefix.is_empty() {
                return Some(pluralize(prefix));
            }
        }
    }
    let stem = file_stem_lower(&symbol.file_path);
    for pattern in DB_NAME_PATTERNS {
        if let Some(prefix) = stem.strip_suffix(&format!("_{pattern}")) {
            if !prefix.is_empty() {
                return Some(pluralize(prefix));
            }
        }
        let module_layout = stem == *pattern || stem == pluralize(pattern);
        if module_layout && matches!(symbol.kind, SymbolKind::Class) && !head_snake.is_empty() {
            return Some(pluralize(&head_snake));
        }
    }
    None
}

fn pluralize(word: &str) -> String {
    if word.ends_with('s') {
        word.to_string()
    } else if let Some(stem) = word.strip_suffix('y') {
        format!("{stem}ies")
    } else {
        format!("{word}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::assemble::assemble;
    use crate::model::{BindingScope, Framework, FrameworkHint, Language, TriggerSpec};
    use crate::parser::facts::{
        CallSiteFact, DiDraft, FileFacts, ImportFact, RouteDraft, SymbolFact,
    };

    fn python_file(path: &str) -> FileFacts {
        FileFacts::new(path.to_string(), Language::Python, format!("hash:{path}"))
    }

    fn symbol_fact(qualname: &str, kind: SymbolKind, line: u32) -> SymbolFact {
        SymbolFact {
            qualname: qualname.to_string(),
            name: qualname.rsplit('.').next().unwrap_or(qualname).to_string(),
            kind,
            start_line: line,
            end_line: line + 1,
            exported: true,
            signature: None,
        }
    }

    fn module_import(specifier: &str) -> ImportFact {
        ImportFact {
            specifier: specifier.to_string(),
            imported: None,
            local_name: Some(specifier.to_string()),
            line: 1,
        }
    }

    fn call(caller: &str, reference: &str, line: u32) -> CallSiteFact {
        CallSiteFact {
            caller: caller.to_string(),
            reference: reference.to_string(),
            line,
        }
    }

    fn snapshot_from(facts: Vec<FileFacts>) -> Snapshot {
        assemble(&facts, FrameworkHint::Auto, "snap".to_string()).unwrap()
    }

    fn id(file: &str, qualname: &str) -> SymbolId {
        SymbolId::new(file, qualname)
    }

    /// lib.py::load_config called from app.py::refresh over an exact import.
    fn caller_pair() -> Vec<FileFacts> {
        let mut lib = python_file("lib.py");
        lib.symbols.push(symbol_fact("load_config", SymbolKind::Function, 1));
        let mut app = python_file("app.py");
        app.symbols.push(symbol_fact("refresh", SymbolKind::Function, 3));
        app.imports.push(module_import("lib"));
        app.calls.push(call("refresh", "lib.load_config", 5));
        vec![lib, app]
    }

    #[test]
    fn direct_caller_reached_with_full_confidence() {
        let snapshot = snapshot_from(caller_pair());
        let radius = compute_blast_radius(
            &snapshot,
            &[id("lib.py", "load_config")],
            ChangeKind::SignatureChange,
            3,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.reached.len(), 1);
        assert_eq!(radius.reached[0].symbol.id, id("app.py", "refresh"));
        assert_eq!(radius.reached[0].distance, 1);
        assert!((radius.reached[0].confidence - 1.0).abs() < 0.001);
        assert!((radius.confidence - 1.0).abs() < 0.001);
        assert!(!radius.truncated);
        assert_eq!(radius.risk, RiskLevel::Low);
    }

    #[test]
    fn decay_compounds_along_chain() {
        let mut base = python_file("base.py");
        base.symbols.push(symbol_fact("origin", SymbolKind::Function, 1));
        let mut mid = python_file("mid.py");
        mid.symbols.push(symbol_fact("relay", SymbolKind::Function, 1));
        mid.imports.push(module_import("base"));
        mid.calls.push(call("relay", "base.origin", 2));
        let mut top = python_file("top.py");
        top.symbols.push(symbol_fact("entry", SymbolKind::Function, 1));
        top.imports.push(module_import("mid"));
        top.calls.push(call("entry", "mid.relay", 2));

        let snapshot = snapshot_from(vec![base, mid, top]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("base.py", "origin")],
            ChangeKind::SignatureChange,
            3,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.reached.len(), 2);
        let relay = &radius.reached[0];
        assert_eq!(relay.symbol.id, id("mid.py", "relay"));
        assert!((relay.confidence - 1.0).abs() < 0.001);
        let entry = &radius.reached[1];
        assert_eq!(entry.symbol.id, id("top.py", "entry"));
        assert_eq!(entry.distance, 2);
        assert!((entry.confidence - 0.9).abs() < 0.001);
        assert!((radius.confidence - 0.95).abs() < 0.001);
    }

    #[test]
    fn cycle_terminates_and_counts_each_node_once() {
        let mut a = python_file("a.py");
        a.symbols.push(symbol_fact("alpha", SymbolKind::Function, 1));
        a.imports.push(module_import("b"));
        a.calls.push(call("alpha", "b.beta", 2));
        let mut b = python_file("b.py");
        b.symbols.push(symbol_fact("beta", SymbolKind::Function, 1));
        b.imports.push(module_import("a"));
        b.calls.push(call("beta", "a.alpha", 2));

        let snapshot = snapshot_from(vec![a, b]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("a.py", "alpha")],
            ChangeKind::Removal,
            5,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.reached.len(), 1);
        assert_eq!(radius.reached[0].symbol.id, id("b.py", "beta"));
        assert_eq!(radius.reached[0].distance, 1);
        assert!(!radius.truncated);
    }

    #[test]
    fn best_path_confidence_wins_over_longer_routes() {
        // near calls the seed directly; far calls the seed through near, so
        // near gets a second in-edge at hop 2 that must not lower its score.
        let mut lib = python_file("lib.py");
        lib.symbols.push(symbol_fact("seed", SymbolKind::Function, 1));
        let mut near = python_file("near.py");
        near.symbols.push(symbol_fact("direct", SymbolKind::Function, 1));
        near.imports.push(module_import("lib"));
        near.calls.push(call("direct", "lib.seed", 2));
        let mut far = python_file("far.py");
        far.symbols.push(symbol_fact("indirect", SymbolKind::Function, 1));
        far.imports.push(module_import("lib"));
        far.imports.push(module_import("near"));
        far.calls.push(call("indirect", "lib.seed", 2));
        far.calls.push(call("indirect", "near.direct", 3));

        let snapshot = snapshot_from(vec![lib, near, far]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("lib.py", "seed")],
            ChangeKind::SignatureChange,
            4,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.reached.len(), 2);
        for entry in &radius.reached {
            assert_eq!(entry.distance, 1);
            assert!((entry.confidence - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn relaxed_edge_lowers_node_confidence() {
        let mut widgets = python_file("widgets.py");
        widgets.symbols.push(symbol_fact("Panel", SymbolKind::Class, 1));
        widgets.symbols.push(symbol_fact("Panel.render", SymbolKind::Method, 2));
        let mut view = python_file("view.py");
        view.symbols.push(symbol_fact("show", SymbolKind::Function, 1));
        view.imports.push(module_import("widgets"));
        view.calls.push(call("show", "render", 2));

        let snapshot = snapshot_from(vec![widgets, view]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("widgets.py", "Panel.render")],
            ChangeKind::SignatureChange,
            2,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.reached.len(), 1);
        assert!((radius.reached[0].confidence - 0.7).abs() < 0.001);
        assert!((radius.confidence - 0.7).abs() < 0.001);
    }

    #[test]
    fn addition_has_empty_radius() {
        let snapshot = snapshot_from(caller_pair());
        let radius = compute_blast_radius(
            &snapshot,
            &[id("lib.py", "brand_new")],
            ChangeKind::Addition,
            3,
            &Config::default(),
        )
        .unwrap();

        assert!(radius.reached.is_empty());
        assert!((radius.confidence - 1.0).abs() < 0.001);
        assert_eq!(radius.risk, RiskLevel::Low);
        assert!(!radius.truncated);
    }

    #[test]
    fn unknown_seed_is_rejected() {
        let snapshot = snapshot_from(caller_pair());
        let err = compute_blast_radius(
            &snapshot,
            &[id("ghost.py", "nope")],
            ChangeKind::SignatureChange,
            3,
            &Config::default(),
        )
        .unwrap_err();

        match err {
            Error::SymbolNotFound(missing) => {
                assert_eq!(missing, id("ghost.py", "nope"));
            }
            other => panic!("expected SymbolNotFound, got {other:?}"),
        }
    }

    fn routed_facts(route_count: usize) -> Vec<FileFacts> {
        let mut service = python_file("service.py");
        service.symbols.push(symbol_fact("Service", SymbolKind::Class, 1));
        service
            .symbols
            .push(symbol_fact("Service.create", SymbolKind::Method, 2));
        let mut api = python_file("api.py");
        api.imports.push(module_import("service"));
        for n in 0..route_count {
            let handler = format!("handler_{n}");
            api.symbols
                .push(symbol_fact(&handler, SymbolKind::RouteHandler, 10 + n as u32));
            api.calls
                .push(call(&handler, "service.Service.create", 11 + n as u32));
            api.routes.push(RouteDraft {
                method: "POST".to_string(),
                path: format!("/things{n}"),
                handler: handler.clone(),
                middleware: Vec::new(),
                framework: Framework::Fastapi,
                line: 10 + n as u32,
            });
        }
        vec![service, api]
    }

    #[test]
    fn single_route_in_radius_is_medium_risk() {
        let snapshot = snapshot_from(routed_facts(1));
        let radius = compute_blast_radius(
            &snapshot,
            &[id("service.py", "Service.create")],
            ChangeKind::SignatureChange,
            3,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.affected_routes, vec!["POST /things0".to_string()]);
        assert_eq!(radius.risk, RiskLevel::Medium);
        assert!(radius.factors.iter().any(|f| f.contains("route")));
    }

    #[test]
    fn three_routes_in_radius_are_high_risk() {
        let snapshot = snapshot_from(routed_facts(3));
        let radius = compute_blast_radius(
            &snapshot,
            &[id("service.py", "Service.create")],
            ChangeKind::SignatureChange,
            3,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.affected_routes.len(), 3);
        assert_eq!(radius.risk, RiskLevel::High);
    }

    #[test]
    fn changed_route_handler_affects_its_own_route() {
        let snapshot = snapshot_from(routed_facts(1));
        let radius = compute_blast_radius(
            &snapshot,
            &[id("api.py", "handler_0")],
            ChangeKind::SignatureChange,
            2,
            &Config::default(),
        )
        .unwrap();

        assert!(radius.reached.is_empty());
        assert_eq!(radius.affected_routes, vec!["POST /things0".to_string()]);
        assert_eq!(radius.risk, RiskLevel::Medium);
    }

    #[test]
    fn repository_in_radius_flags_data_store_and_high_risk() {
        let mut util = python_file("util.py");
        util.symbols.push(symbol_fact("hash_key", SymbolKind::Function, 1));
        let mut repo = python_file("user_repository.py");
        repo.symbols
            .push(symbol_fact("UserRepository", SymbolKind::Class, 1));
        repo.symbols
            .push(symbol_fact("UserRepository.save", SymbolKind::Method, 2));
        repo.imports.push(module_import("util"));
        repo.calls
            .push(call("UserRepository.save", "util.hash_key", 3));

        let snapshot = snapshot_from(vec![util, repo]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("util.py", "hash_key")],
            ChangeKind::SignatureChange,
            3,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.db_objects, vec!["users".to_string()]);
        assert_eq!(radius.risk, RiskLevel::High);
        assert!(radius.factors.iter().any(|f| f.contains("users")));
    }

    #[test]
    fn two_injection_consumers_raise_risk_to_medium() {
        let mut services = python_file("services.py");
        services.symbols.push(symbol_fact("Service", SymbolKind::Class, 1));
        let mut alpha = python_file("alpha.py");
        alpha.symbols.push(symbol_fact("AlphaController", SymbolKind::Class, 1));
        alpha.imports.push(module_import("services"));
        alpha.di.push(DiDraft {
            provider: "services.Service".to_string(),
            consumer: "AlphaController".to_string(),
            scope: BindingScope::Singleton,
            line: 2,
        });
        let mut beta = python_file("beta.py");
        beta.symbols.push(symbol_fact("BetaController", SymbolKind::Class, 1));
        beta.imports.push(module_import("services"));
        beta.di.push(DiDraft {
            provider: "services.Service".to_string(),
            consumer: "BetaController".to_string(),
            scope: BindingScope::Singleton,
            line: 2,
        });

        let snapshot = snapshot_from(vec![services, alpha, beta]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("services.py", "Service")],
            ChangeKind::SignatureChange,
            3,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.di_consumers.len(), 2);
        assert_eq!(radius.reached.len(), 2);
        assert_eq!(radius.risk, RiskLevel::Medium);
    }

    #[test]
    fn node_limit_truncates_and_discounts_confidence() {
        let config = Config {
            node_limit: 2,
            ..Config::default()
        };
        let mut base = python_file("base.py");
        base.symbols.push(symbol_fact("origin", SymbolKind::Function, 1));
        let mut mid = python_file("mid.py");
        mid.symbols.push(symbol_fact("relay", SymbolKind::Function, 1));
        mid.imports.push(module_import("base"));
        mid.calls.push(call("relay", "base.origin", 2));
        let mut top = python_file("top.py");
        top.symbols.push(symbol_fact("entry", SymbolKind::Function, 1));
        top.imports.push(module_import("mid"));
        top.calls.push(call("entry", "mid.relay", 2));

        let snapshot = snapshot_from(vec![base, mid, top]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("base.py", "origin")],
            ChangeKind::SignatureChange,
            5,
            &config,
        )
        .unwrap();

        assert!(radius.truncated);
        assert_eq!(radius.reached.len(), 1);
        assert!((radius.confidence - 0.8).abs() < 0.001);
        assert!(radius.gaps.iter().any(|g| g.contains("lower bound")));
    }

    #[test]
    fn callers_in_test_files_are_listed_as_test_references() {
        let mut lib = python_file("lib.py");
        lib.symbols.push(symbol_fact("load_config", SymbolKind::Function, 1));
        let mut test = python_file("tests/test_config.py");
        test.symbols
            .push(symbol_fact("test_load", SymbolKind::Function, 1));
        test.imports.push(module_import("lib"));
        test.calls.push(call("test_load", "lib.load_config", 2));

        let snapshot = snapshot_from(vec![lib, test]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("lib.py", "load_config")],
            ChangeKind::SignatureChange,
            2,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(
            radius.test_references,
            vec![id("tests/test_config.py", "test_load")]
        );
    }

    #[test]
    fn scheduled_job_membership_is_reported() {
        let mut tasks = python_file("tasks.py");
        tasks.symbols.push(symbol_fact("nightly", SymbolKind::Function, 1));
        tasks.jobs.push(crate::parser::facts::JobDraft {
            name: "nightly".to_string(),
            trigger: TriggerSpec::Cron {
                expr: "0 2 * * *".to_string(),
            },
            handler: "nightly".to_string(),
            line: 1,
        });
        tasks.imports.push(module_import("lib"));
        tasks.calls.push(call("nightly", "lib.load_config", 2));
        let mut lib = python_file("lib.py");
        lib.symbols.push(symbol_fact("load_config", SymbolKind::Function, 1));

        let snapshot = snapshot_from(vec![tasks, lib]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("lib.py", "load_config")],
            ChangeKind::SignatureChange,
            2,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(radius.affected_jobs, vec!["nightly".to_string()]);
    }

    #[test]
    fn external_references_to_seed_names_surface_as_gaps() {
        let mut lib = python_file("lib.py");
        lib.symbols.push(symbol_fact("load_config", SymbolKind::Function, 1));
        let mut dynamic = python_file("dynamic.py");
        dynamic
            .symbols
            .push(symbol_fact("boot", SymbolKind::Function, 1));
        // No import of lib, so the reference stays unresolved.
        dynamic.calls.push(call("boot", "cfg.load_config", 2));

        let snapshot = snapshot_from(vec![lib, dynamic]);
        let radius = compute_blast_radius(
            &snapshot,
            &[id("lib.py", "load_config")],
            ChangeKind::SignatureChange,
            2,
            &Config::default(),
        )
        .unwrap();

        assert!(radius.reached.is_empty());
        assert!(radius.gaps.iter().any(|g| g.contains("uncounted callers")));
    }

    #[test]
    fn store_object_names_derive_from_naming_conventions() {
        let repo = Symbol {
            id: SymbolId::new("app/user_repository.py", "UserRepository.save"),
            file_path: "app/user_repository.py".to_string(),
            qualname: "UserRepository.save".to_string(),
            name: "save".to_string(),
            kind: SymbolKind::Method,
            start_line: 2,
            end_line: 3,
            exported: true,
            signature: None,
        };
        assert_eq!(db_object_name(&repo).as_deref(), Some("users"));

        let model_class = Symbol {
            id: SymbolId::new("app/models.py", "Order"),
            file_path: "app/models.py".to_string(),
            qualname: "Order".to_string(),
            name: "Order".to_string(),
            kind: SymbolKind::Class,
            start_line: 1,
            end_line: 9,
            exported: true,
            signature: None,
        };
        assert_eq!(db_object_name(&model_class).as_deref(), Some("orders"));

        let plain = Symbol {
            id: SymbolId::new("app/util.py", "helper"),
            file_path: "app/util.py".to_string(),
            qualname: "helper".to_string(),
            name: "helper".to_string(),
            kind: SymbolKind::Function,
            start_line: 1,
            end_line: 2,
            exported: true,
            signature: None,
        };
        assert_eq!(db_object_name(&plain), None);
    }
}
