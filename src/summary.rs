//! Per-symbol structured summaries.
//!
//! Read-only derivation over one snapshot: a symbol's edges across all five
//! graphs plus a depth-1 blast radius, flattened into a single record for
//! presentation and planning layers. Nothing in here mutates graph state.

use std::collections::BTreeSet;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::Snapshot;
use crate::impact::{self, db_object_name};
use crate::model::{CallTarget, ChangeKind, Symbol, SymbolId, SymbolRef, SymbolSummary};

pub fn summarize(snapshot: &Snapshot, id: &SymbolId, config: &Config) -> Result<SymbolSummary> {
    let symbol = snapshot
        .get_symbol(id)
        .ok_or_else(|| Error::SymbolNotFound(id.clone()))?;

    let callers = collect_refs(snapshot, snapshot.caller_edges(id).map(|edge| &edge.caller));
    let callees = collect_refs(
        snapshot,
        snapshot
            .callee_edges(id)
            .filter_map(|edge| edge.target.symbol_id()),
    );
    let external_calls: Vec<String> = snapshot
        .callee_edges(id)
        .filter_map(|edge| match &edge.target {
            CallTarget::External { reference } => Some(reference.clone()),
            CallTarget::Symbol { .. } => None,
        })
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();

    let routes = snapshot.routes_containing(id).to_vec();
    let jobs = snapshot.jobs_containing(id).to_vec();
    let provides_to = collect_refs(
        snapshot,
        snapshot
            .consumer_edges(id)
            .filter_map(|edge| edge.consumer.symbol_id()),
    );
    let injected_with = collect_refs(
        snapshot,
        snapshot
            .provider_edges(id)
            .filter_map(|edge| edge.provider.symbol_id()),
    );

    let file_imports: Vec<String> = snapshot
        .files
        .get(&symbol.file_path)
        .map(|file| {
            file.imports
                .iter()
                .filter_map(|import| import.resolved.clone())
                .collect::<BTreeSet<String>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default();
    let imported_by = snapshot.importers_of(&symbol.file_path).to_vec();

    let side_effects = derive_side_effects(snapshot, symbol);
    let description = describe(symbol, &routes, &jobs, callers.len(), provides_to.len());
    let blast = impact::compute_blast_radius(
        snapshot,
        std::slice::from_ref(id),
        ChangeKind::SignatureChange,
        1,
        config,
    )?;

    Ok(SymbolSummary {
        symbol: symbol.clone(),
        description,
        callers,
        callees,
        external_calls,
        routes,
        provides_to,
        injected_with,
        jobs,
        file_imports,
        imported_by,
        side_effects,
        blast,
    })
}

fn collect_refs<'a>(
    snapshot: &Snapshot,
    ids: impl Iterator<Item = &'a SymbolId>,
) -> Vec<SymbolRef> {
    let unique: BTreeSet<&SymbolId> = ids.collect();
    let mut refs: Vec<SymbolRef> = unique
        .into_iter()
        .filter_map(|id| snapshot.get_symbol(id))
        .map(SymbolRef::from)
        .collect();
    refs.sort_by(|a, b| {
        (&a.file_path, a.start_line, &a.qualname).cmp(&(&b.file_path, b.start_line, &b.qualname))
    });
    refs
}

fn describe(
    symbol: &Symbol,
    routes: &[String],
    jobs: &[String],
    caller_count: usize,
    consumer_count: usize,
) -> String {
    let kind = symbol.kind.as_str().replace('_', " ");
    let mut text = format!("{kind} {} in {}", symbol.qualname, symbol.file_path);
    if !routes.is_empty() {
        text.push_str(&format!(", serving {}", routes.join(", ")));
    }
    if !jobs.is_empty() {
        text.push_str(&format!(", scheduled as {}", jobs.join(", ")));
    }
    if consumer_count > 0 {
        text.push_str(&format!(", injected into {consumer_count} consumer(s)"));
    }
    if caller_count > 0 {
        text.push_str(&format!(", called by {caller_count} caller(s)"));
    }
    text
}

/// Coarse side-effect inference: data-store naming on the symbol or its
/// resolved callees, and recognizable external references. Heuristic by
/// nature; absence of a finding never means the symbol is pure.
fn derive_side_effects(snapshot: &Snapshot, symbol: &Symbol) -> Vec<String> {
    let mut effects: BTreeSet<String> = BTreeSet::new();
    if let Some(object) = db_object_name(symbol) {
        effects.insert(format!("touches data store {object}"));
    }
    for edge in snapshot.callee_edges(&symbol.id) {
        match &edge.target {
            CallTarget::Symbol { id } => {
                if let Some(callee) = snapshot.get_symbol(id) {
                    if let Some(object) = db_object_name(callee) {
                        effects.insert(format!("touches data store {object}"));
                    }
                }
            }
            CallTarget::External { reference } => {
                if let Some(effect) = external_effect(reference) {
                    effects.insert(effect.to_string());
                }
            }
        }
    }
    effects.into_iter().collect()
}

fn external_effect(reference: &str) -> Option<&'static str> {
    let lower = reference.to_ascii_lowercase();
    let last = lower.rsplit('.').next().unwrap_or(&lower);
    if lower.contains("http")
        || lower.starts_with("fetch")
        || lower.starts_with("axios.")
        || lower.starts_with("requests.")
    {
        return Some("performs outbound http calls");
    }
    if matches!(
        last,
        "publish" | "emit" | "dispatch" | "enqueue" | "produce" | "send"
    ) {
        return Some("publishes events or messages");
    }
    if lower.starts_with("fs.") || matches!(last, "open" | "read" | "write") {
        return Some("reads or writes the filesystem");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::assemble::assemble;
    use crate::model::{BindingScope, Framework, FrameworkHint, Language, SymbolKind};
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

    fn service_snapshot() -> Snapshot {
        let mut service = python_file("service.py");
        service
            .symbols
            .push(symbol_fact("UserService", SymbolKind::Class, 1));
        service
            .symbols
            .push(symbol_fact("UserService.create", SymbolKind::Method, 2));
        service.imports.push(module_import("user_repository"));
        service.calls.push(CallSiteFact {
            caller: "UserService.create".to_string(),
            reference: "user_repository.UserRepository.save".to_string(),
            line: 3,
        });
        service.calls.push(CallSiteFact {
            caller: "UserService.create".to_string(),
            reference: "requests.post".to_string(),
            line: 4,
        });

        let mut repo = python_file("user_repository.py");
        repo.symbols
            .push(symbol_fact("UserRepository", SymbolKind::Class, 1));
        repo.symbols
            .push(symbol_fact("UserRepository.save", SymbolKind::Method, 2));

        let mut api = python_file("api.py");
        api.symbols
            .push(symbol_fact("create_user", SymbolKind::RouteHandler, 5));
        api.imports.push(module_import("service"));
        api.calls.push(CallSiteFact {
            caller: "create_user".to_string(),
            reference: "service.UserService.create".to_string(),
            line: 6,
        });
        api.routes.push(RouteDraft {
            method: "POST".to_string(),
            path: "/users".to_string(),
            handler: "create_user".to_string(),
            middleware: Vec::new(),
            framework: Framework::Fastapi,
            line: 5,
        });
        api.di.push(DiDraft {
            provider: "service.UserService".to_string(),
            consumer: "create_user".to_string(),
            scope: BindingScope::RequestScoped,
            line: 5,
        });

        assemble(&[service, repo, api], FrameworkHint::Auto, "snap".to_string()).unwrap()
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let snapshot = service_snapshot();
        let err = summarize(
            &snapshot,
            &SymbolId::new("ghost.py", "nope"),
            &Config::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SymbolNotFound(_)));
    }

    #[test]
    fn summary_collects_edges_across_graphs() {
        let snapshot = service_snapshot();
        let summary = summarize(
            &snapshot,
            &SymbolId::new("service.py", "UserService.create"),
            &Config::default(),
        )
        .unwrap();

        assert_eq!(summary.callers.len(), 1);
        assert_eq!(
            summary.callers[0].id,
            SymbolId::new("api.py", "create_user")
        );
        assert_eq!(summary.callees.len(), 1);
        assert_eq!(
            summary.callees[0].id,
            SymbolId::new("user_repository.py", "UserRepository.save")
        );
        assert_eq!(summary.external_calls, vec!["requests.post".to_string()]);
        assert_eq!(
            summary.file_imports,
            vec!["user_repository.py".to_string()]
        );
        assert_eq!(summary.imported_by, vec!["api.py".to_string()]);
        assert_eq!(summary.blast.depth, 1);
        assert_eq!(summary.blast.reached.len(), 1);
    }

    #[test]
    fn route_handler_summary_names_its_route() {
        let snapshot = service_snapshot();
        let summary = summarize(
            &snapshot,
            &SymbolId::new("api.py", "create_user"),
            &Config::default(),
        )
        .unwrap();

        assert_eq!(summary.routes, vec!["POST /users".to_string()]);
        assert!(summary.description.contains("route handler"));
        assert!(summary.description.contains("POST /users"));
        assert_eq!(summary.injected_with.len(), 1);
        assert_eq!(
            summary.injected_with[0].id,
            SymbolId::new("service.py", "UserService")
        );
    }

    #[test]
    fn provider_summary_lists_consumers() {
        let snapshot = service_snapshot();
        let summary = summarize(
            &snapshot,
            &SymbolId::new("service.py", "UserService"),
            &Config::default(),
        )
        .unwrap();

        assert_eq!(summary.provides_to.len(), 1);
        assert_eq!(
            summary.provides_to[0].id,
            SymbolId::new("api.py", "create_user")
        );
        assert!(summary.description.contains("injected into 1 consumer(s)"));
    }

    #[test]
    fn side_effects_cover_stores_and_external_io() {
        let snapshot = service_snapshot();
        let summary = summarize(
            &snapshot,
            &SymbolId::new("service.py", "UserService.create"),
            &Config::default(),
        )
        .unwrap();
        assert!(summary
            .side_effects
            .contains(&"touches data store users".to_string()));
        assert!(summary
            .side_effects
            .contains(&"performs outbound http calls".to_string()));

        let repo_summary = summarize(
            &snapshot,
            &SymbolId::new("user_repository.py", "UserRepository.save"),
            &Config::default(),
        )
        .unwrap();
        assert!(repo_summary
            .side_effects
            .contains(&"touches data store users".to_string()));
    }
}
