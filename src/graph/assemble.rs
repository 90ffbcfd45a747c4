//! Facts → snapshot assembly: import resolution against the scanned file
//! set, call-site and framework-construct resolution through the two-tier
//! resolver, and construction of one verified [`Snapshot`].
//!
//! Assembly is the serialized step after the parse barrier. All collections
//! are keyed maps ordered by identity, so identical fact sets always produce
//! an identical snapshot regardless of input order.

use crate::error::Result;
use crate::graph::resolve::{
    ExportIndex, ReferenceResolver, ResolvedImport, EXTERNAL_CONFIDENCE,
};
use crate::graph::Snapshot;
use crate::model::{
    BindingScope, BuildStats, CallEdge, CallTarget, DiEdge, FileRecord, FrameworkHint, HandlerRef,
    ImportRecord, Job, Route, Symbol, SymbolId,
};
use crate::parser::facts::{FileFacts, ImportFact, JobDraft};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const JS_SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

pub fn assemble(facts: &[FileFacts], hint: FrameworkHint, snapshot_id: String) -> Result<Snapshot> {
    let mut ordered: Vec<&FileFacts> = facts.iter().collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    let file_set: BTreeSet<String> = ordered.iter().map(|file| file.path.clone()).collect();
    let index = ExportIndex::build(facts);

    let mut symbols: BTreeMap<SymbolId, Symbol> = BTreeMap::new();
    for file in &ordered {
        for fact in &file.symbols {
            let id = SymbolId::new(&file.path, &fact.qualname);
            symbols.insert(
                id.clone(),
                Symbol {
                    id,
                    file_path: file.path.clone(),
                    qualname: fact.qualname.clone(),
                    name: fact.name.clone(),
                    kind: fact.kind,
                    start_line: fact.start_line,
                    end_line: fact.end_line,
                    exported: fact.exported,
                    signature: fact.signature.clone(),
                },
            );
        }
    }

    // Provider-declared scopes override the scope recorded at the injection
    // site.
    let mut provider_scopes: BTreeMap<SymbolId, BindingScope> = BTreeMap::new();
    for file in &ordered {
        for provider in &file.providers {
            let id = SymbolId::new(&file.path, &provider.qualname);
            if symbols.contains_key(&id) {
                provider_scopes.insert(id, provider.scope);
            }
        }
    }

    let mut files: BTreeMap<String, FileRecord> = BTreeMap::new();
    let mut call_map: BTreeMap<(SymbolId, u8, String), CallEdge> = BTreeMap::new();
    let mut routes: BTreeMap<String, Route> = BTreeMap::new();
    let mut di_map: BTreeMap<(String, String), DiEdge> = BTreeMap::new();
    let mut pending_jobs: Vec<(JobDraft, HandlerRef)> = Vec::new();
    let mut exact = 0usize;
    let mut relaxed = 0usize;
    let mut external = 0usize;

    for file in &ordered {
        let (import_records, resolved_imports) = resolve_file_imports(file, &file_set);
        let resolver = ReferenceResolver::new(&index, &file.path, resolved_imports);

        for site in &file.calls {
            let caller = SymbolId::new(&file.path, &site.caller);
            let edge = match resolver.resolve(&site.reference) {
                Some(target) => {
                    if target.confidence >= 1.0 {
                        exact += 1;
                    } else {
                        relaxed += 1;
                    }
                    CallEdge {
                        caller: caller.clone(),
                        target: CallTarget::Symbol {
                            id: SymbolId::new(&target.file, &target.qualname),
                        },
                        confidence: target.confidence,
                        line: site.line,
                    }
                }
                None => {
                    external += 1;
                    CallEdge {
                        caller: caller.clone(),
                        target: CallTarget::External {
                            reference: site.reference.clone(),
                        },
                        confidence: EXTERNAL_CONFIDENCE,
                        line: site.line,
                    }
                }
            };
            insert_call_edge(&mut call_map, edge);
        }

        for draft in &file.routes {
            let id = crate::parser::http::route_id(&draft.method, &draft.path);
            match routes.entry(id.clone()) {
                Entry::Occupied(_) => {
                    warn!(route = %id, path = %file.path, "duplicate route declaration skipped");
                }
                Entry::Vacant(slot) => {
                    let handler = resolve_handler(&resolver, &draft.handler);
                    if !handler.is_resolved() {
                        warn!(route = %id, reference = %draft.handler, "route handler unresolved");
                    }
                    let middleware = draft
                        .middleware
                        .iter()
                        .map(|reference| resolve_handler(&resolver, reference))
                        .collect();
                    slot.insert(Route {
                        id,
                        method: draft.method.clone(),
                        path: draft.path.clone(),
                        handler,
                        middleware,
                        framework: draft.framework,
                    });
                }
            }
        }

        for draft in &file.di {
            let provider = resolve_handler(&resolver, &draft.provider);
            let consumer = resolve_handler(&resolver, &draft.consumer);
            let scope = provider
                .symbol_id()
                .and_then(|id| provider_scopes.get(id).copied())
                .unwrap_or(draft.scope);
            let key = (handler_key(&provider), handler_key(&consumer));
            di_map.entry(key).or_insert(DiEdge {
                provider,
                consumer,
                scope,
            });
        }

        for draft in &file.jobs {
            let handler = resolve_handler(&resolver, &draft.handler);
            if !handler.is_resolved() {
                warn!(job = %draft.name, reference = %draft.handler, "job handler unresolved");
            }
            pending_jobs.push((draft.clone(), handler));
        }

        let mut file_symbols: Vec<SymbolId> = file
            .symbols
            .iter()
            .map(|fact| SymbolId::new(&file.path, &fact.qualname))
            .collect();
        file_symbols.sort();
        file_symbols.dedup();
        files.insert(
            file.path.clone(),
            FileRecord {
                path: file.path.clone(),
                language: file.language,
                hash: file.hash.clone(),
                imports: import_records,
                symbols: file_symbols,
                parse_failed: file.parse_failed,
                parse_error: file.parse_error.clone(),
            },
        );
    }
    debug!(exact, relaxed, external, "call reference resolution");

    let call_edges: Vec<CallEdge> = call_map.values().cloned().collect();

    // Job dependencies are the handler's resolved callees, which need the
    // full call map.
    let mut jobs: BTreeMap<String, Job> = BTreeMap::new();
    for (draft, handler) in pending_jobs {
        match jobs.entry(draft.name.clone()) {
            Entry::Occupied(_) => {
                warn!(job = %draft.name, "duplicate job name skipped");
            }
            Entry::Vacant(slot) => {
                let dependencies = match handler.symbol_id() {
                    Some(handler_id) => call_edges
                        .iter()
                        .filter(|edge| &edge.caller == handler_id)
                        .filter_map(|edge| edge.target.symbol_id())
                        .filter(|id| *id != handler_id)
                        .cloned()
                        .collect::<BTreeSet<SymbolId>>()
                        .into_iter()
                        .collect(),
                    None => Vec::new(),
                };
                slot.insert(Job {
                    name: draft.name,
                    trigger: draft.trigger,
                    handler,
                    dependencies,
                });
            }
        }
    }

    let stats = BuildStats {
        files: ordered.len(),
        failed: ordered.iter().filter(|file| file.parse_failed).count(),
        symbols: symbols.len(),
        call_edges: call_edges.len(),
        routes: routes.len(),
        di_edges: di_map.len(),
        jobs: jobs.len(),
        ..BuildStats::default()
    };

    let snapshot = Snapshot::new(
        snapshot_id,
        hint,
        files,
        symbols,
        call_edges,
        routes,
        di_map.into_values().collect(),
        jobs,
        stats,
    );
    snapshot.verify()?;
    Ok(snapshot)
}

/// Same (caller, target) pair keeps the best evidence: highest confidence,
/// then earliest line.
fn insert_call_edge(map: &mut BTreeMap<(SymbolId, u8, String), CallEdge>, edge: CallEdge) {
    let key = match &edge.target {
        CallTarget::Symbol { id } => (edge.caller.clone(), 0u8, id.as_str().to_string()),
        CallTarget::External { reference } => (edge.caller.clone(), 1u8, reference.clone()),
    };
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(edge);
        }
        Entry::Occupied(mut slot) => {
            let existing = slot.get_mut();
            if edge.confidence > existing.confidence
                || (edge.confidence == existing.confidence && edge.line < existing.line)
            {
                *existing = edge;
            }
        }
    }
}

fn resolve_handler(resolver: &ReferenceResolver<'_>, reference: &str) -> HandlerRef {
    match resolver.resolve(reference) {
        Some(target) => HandlerRef::Resolved {
            id: SymbolId::new(&target.file, &target.qualname),
            confidence: target.confidence,
        },
        None => HandlerRef::Unresolved {
            reference: reference.to_string(),
        },
    }
}

fn handler_key(handler: &HandlerRef) -> String {
    match handler {
        HandlerRef::Resolved { id, .. } => format!("s:{id}"),
        HandlerRef::Unresolved { reference } => format!("x:{reference}"),
    }
}

fn resolve_file_imports(
    file: &FileFacts,
    file_set: &BTreeSet<String>,
) -> (Vec<ImportRecord>, Vec<ResolvedImport>) {
    let mut records = Vec::with_capacity(file.imports.len());
    let mut resolved_imports = Vec::new();
    for import in &file.imports {
        let resolution = match file.language {
            crate::model::Language::Python => resolve_python_import(import, file_set),
            _ => resolve_js_import(&file.path, import, file_set),
        };
        records.push(ImportRecord {
            specifier: import.specifier.clone(),
            imported: import.imported.clone(),
            local_name: import.local_name.clone(),
            resolved: resolution.as_ref().map(|r| r.file.clone()),
            line: import.line,
        });
        if let Some(resolved) = resolution {
            resolved_imports.push(resolved);
        }
    }
    (records, resolved_imports)
}

/// `from pkg import name` first tries `pkg/name` as a module of its own;
/// otherwise `name` is an export of the `pkg` module file.
fn resolve_python_import(
    import: &ImportFact,
    file_set: &BTreeSet<String>,
) -> Option<ResolvedImport> {
    if let Some(imported) = &import.imported {
        let submodule = if import.specifier.is_empty() {
            imported.clone()
        } else {
            format!("{}.{imported}", import.specifier)
        };
        if let Some(file) = python_module_file(&submodule, file_set) {
            return Some(ResolvedImport {
                local: import
                    .local_name
                    .clone()
                    .or_else(|| Some(imported.clone())),
                imported: None,
                file,
            });
        }
    }
    let file = python_module_file(&import.specifier, file_set)?;
    Some(ResolvedImport {
        local: import.local_name.clone(),
        imported: import.imported.clone(),
        file,
    })
}

fn python_module_file(specifier: &str, file_set: &BTreeSet<String>) -> Option<String> {
    if specifier.is_empty() {
        return None;
    }
    let base = specifier.replace('.', "/");
    let candidates = [
        format!("{base}.py"),
        format!("{base}/__init__.py"),
        format!("{base}.pyi"),
    ];
    candidates
        .into_iter()
        .find(|candidate| file_set.contains(candidate))
}

fn resolve_js_import(
    importer: &str,
    import: &ImportFact,
    file_set: &BTreeSet<String>,
) -> Option<ResolvedImport> {
    let file = js_module_file(importer, &import.specifier, file_set)?;
    Some(ResolvedImport {
        local: import.local_name.clone(),
        imported: import.imported.clone(),
        file,
    })
}

/// Relative specifiers only; bare package names are external. Probes the
/// scanned set for the literal path, source extensions, and index files.
fn js_module_file(
    importer: &str,
    specifier: &str,
    file_set: &BTreeSet<String>,
) -> Option<String> {
    if !(specifier.starts_with("./") || specifier.starts_with("../"))
        && specifier != "."
        && specifier != ".."
    {
        return None;
    }
    let joined = join_relative(importer, specifier)?;
    if file_set.contains(&joined) {
        return Some(joined);
    }
    // TS sources get imported with a .js suffix under Node-style resolution.
    let mut bases = vec![joined.clone()];
    if let Some((head, ext)) = joined.rsplit_once('.') {
        if matches!(ext, "js" | "mjs" | "cjs") {
            bases.push(head.to_string());
        }
    }
    for base in &bases {
        for ext in JS_SOURCE_EXTENSIONS {
            let candidate = format!("{base}.{ext}");
            if file_set.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
    for ext in JS_SOURCE_EXTENSIONS {
        let candidate = format!("{joined}/index.{ext}");
        if file_set.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn join_relative(importer: &str, specifier: &str) -> Option<String> {
    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
