//! Spec-vs-code drift detection.
//!
//! Takes a declared-intent artifact (expected routes, data-object names, test
//! references) and reports where the assembled graphs disagree with it. One
//! report per mismatch, no auto-resolution; severity orders the findings for
//! a reviewer. A category the artifact leaves empty is treated as "no intent
//! recorded" and skipped, not as a promise that the repo contains nothing.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::Snapshot;
use crate::impact::db_object_name;
use crate::model::{DriftKind, DriftReport, HandlerRef, Route, Severity, SpecRoute, SpecSnapshot};
use crate::parser::http::{normalize_method, normalize_path, route_id};
use crate::util::is_test_path;

/// Path-item keys that carry operations in an OpenAPI document.
const OPENAPI_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

impl SpecSnapshot {
    /// Parse a YAML intent artifact: either the native
    /// `routes`/`data_objects`/`tests` shape or an OpenAPI document with a
    /// `paths:` section.
    pub fn from_yaml(text: &str) -> Result<SpecSnapshot> {
        let value: serde_json::Value = serde_yaml_ng::from_str(text)
            .map_err(|err| Error::InvalidSpec(format!("yaml parse: {err}")))?;
        SpecSnapshot::from_value(value)
    }

    /// JSON counterpart of [`SpecSnapshot::from_yaml`].
    pub fn from_json(text: &str) -> Result<SpecSnapshot> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| Error::InvalidSpec(format!("json parse: {err}")))?;
        SpecSnapshot::from_value(value)
    }

    fn from_value(value: serde_json::Value) -> Result<SpecSnapshot> {
        if value.is_null() {
            return Ok(SpecSnapshot::default());
        }
        if let Some(paths) = value.get("paths").and_then(|paths| paths.as_object()) {
            let mut routes = Vec::new();
            for (path, item) in paths {
                let Some(operations) = item.as_object() else {
                    continue;
                };
                for method in operations.keys() {
                    if OPENAPI_METHODS.contains(&method.to_ascii_lowercase().as_str()) {
                        routes.push(SpecRoute {
                            method: method.clone(),
                            path: path.clone(),
                        });
                    }
                }
            }
            return Ok(SpecSnapshot {
                routes,
                data_objects: string_list(&value, "data_objects"),
                tests: string_list(&value, "tests"),
            });
        }
        serde_json::from_value(value)
            .map_err(|err| Error::InvalidSpec(format!("spec shape: {err}")))
    }
}

fn string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|entry| entry.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Compare declared intent against the current snapshot.
///
/// Routes compare by normalized `METHOD path` id, so `/users/{id}` in an API
/// contract matches `/users/:id` in code. Reports come back sorted by
/// severity (highest first), then detail text.
pub fn diff(spec: &SpecSnapshot, snapshot: &Snapshot) -> Vec<DriftReport> {
    let mut reports = Vec::new();

    let spec_routes: BTreeMap<String, &SpecRoute> = spec
        .routes
        .iter()
        .map(|route| {
            (
                route_id(
                    &normalize_method(&route.method),
                    &normalize_path(&route.path),
                ),
                route,
            )
        })
        .collect();

    for id in spec_routes.keys() {
        if !snapshot.routes.contains_key(id) {
            reports.push(DriftReport {
                kind: DriftKind::MissingInCode,
                severity: Severity::High,
                spec_ref: Some(id.clone()),
                code_ref: None,
                detail: format!("declared route {id} has no implementation"),
            });
        }
    }
    if !spec_routes.is_empty() {
        for (id, route) in &snapshot.routes {
            if !spec_routes.contains_key(id) {
                reports.push(DriftReport {
                    kind: DriftKind::MissingInSpec,
                    severity: Severity::Medium,
                    spec_ref: None,
                    code_ref: Some(route_code_ref(route)),
                    detail: format!("route {id} is not declared"),
                });
            }
        }
    }

    let derived: BTreeSet<String> = snapshot.symbols.values().filter_map(db_object_name).collect();
    let declared: BTreeSet<String> = spec
        .data_objects
        .iter()
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    for name in &declared {
        if !derived.contains(name) {
            reports.push(DriftReport {
                kind: DriftKind::SchemaMismatch,
                severity: Severity::High,
                spec_ref: Some(name.clone()),
                code_ref: None,
                detail: format!("declared data object {name} is not backed by any data-access symbol"),
            });
        }
    }
    if !declared.is_empty() {
        for name in &derived {
            if !declared.contains(name) {
                reports.push(DriftReport {
                    kind: DriftKind::MissingInSpec,
                    severity: Severity::Medium,
                    spec_ref: None,
                    code_ref: Some(name.clone()),
                    detail: format!("data object {name} exists in code but is not declared"),
                });
            }
        }
    }

    let test_symbols: BTreeSet<&str> = snapshot
        .symbols
        .values()
        .filter(|symbol| is_test_path(&symbol.file_path))
        .map(|symbol| symbol.name.as_str())
        .collect();
    for reference in &spec.tests {
        let needle = reference.trim();
        if needle.is_empty() {
            continue;
        }
        let satisfied = test_symbols.contains(needle)
            || snapshot
                .files
                .keys()
                .any(|path| is_test_path(path) && path.contains(needle));
        if !satisfied {
            reports.push(DriftReport {
                kind: DriftKind::TestGap,
                severity: Severity::Low,
                spec_ref: Some(needle.to_string()),
                code_ref: None,
                detail: format!("declared test {needle} was not found in any test file"),
            });
        }
    }

    reports.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.detail.cmp(&b.detail))
    });
    debug!(reports = reports.len(), "drift diff computed");
    reports
}

fn route_code_ref(route: &Route) -> String {
    match &route.handler {
        HandlerRef::Resolved { id, .. } => id.to_string(),
        HandlerRef::Unresolved { reference } => reference.clone(),
    }
}
