use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable symbol identity: `"{file_path}::{qualified_name}"`.
///
/// The file path is repo-relative with `/` separators; the qualified name is
/// container-relative (`foo`, `Foo.bar`, `outer.inner`). Identity survives
/// rebuilds as long as neither part changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    pub fn new(file_path: &str, qualname: &str) -> Self {
        SymbolId(format!("{file_path}::{qualname}"))
    }

    /// Parse a raw identity string; requires the `::` separator.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.contains("::").then(|| SymbolId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_path(&self) -> &str {
        match self.0.split_once("::") {
            Some((path, _)) => path,
            None => &self.0,
        }
    }

    pub fn qualname(&self) -> &str {
        match self.0.split_once("::") {
            Some((_, qualname)) => qualname,
            None => &self.0,
        }
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    RouteHandler,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::RouteHandler => "route_handler",
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub file_path: String,
    pub qualname: String,
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub exported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Compact symbol projection used in result lists.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SymbolRef {
    pub id: SymbolId,
    pub kind: SymbolKind,
    pub qualname: String,
    pub file_path: String,
    pub start_line: u32,
}

impl From<&Symbol> for SymbolRef {
    fn from(s: &Symbol) -> Self {
        SymbolRef {
            id: s.id.clone(),
            kind: s.kind,
            qualname: s.qualname.clone(),
            file_path: s.file_path.clone(),
            start_line: s.start_line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Tsx,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Tsx => "tsx",
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ImportRecord {
    /// Module specifier as written (`pkg.mod`, `./user.service`).
    pub specifier: String,
    /// Original exported name for named imports (`from a import x as y`
    /// carries `x`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported: Option<String>,
    /// Name the import binds in the importing file (alias or last segment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    /// Repo-relative path of the imported file, when the specifier resolves
    /// against the scanned file set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    pub line: u32,
}

#[derive(Debug, Serialize, Clone)]
pub struct FileRecord {
    pub path: String,
    pub language: Language,
    pub hash: String,
    pub imports: Vec<ImportRecord>,
    pub symbols: Vec<SymbolId>,
    pub parse_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Resolved callee, or the external sentinel carrying the raw reference text
/// for callees that could not be matched to a known symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallTarget {
    Symbol { id: SymbolId },
    External { reference: String },
}

impl CallTarget {
    pub fn symbol_id(&self) -> Option<&SymbolId> {
        match self {
            CallTarget::Symbol { id } => Some(id),
            CallTarget::External { .. } => None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct CallEdge {
    pub caller: SymbolId,
    pub target: CallTarget,
    pub confidence: f32,
    pub line: u32,
}

/// Route handler or DI endpoint after assembly: resolved to a symbol, or kept
/// with the raw reference and flagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HandlerRef {
    Resolved { id: SymbolId, confidence: f32 },
    Unresolved { reference: String },
}

impl HandlerRef {
    pub fn symbol_id(&self) -> Option<&SymbolId> {
        match self {
            HandlerRef::Resolved { id, .. } => Some(id),
            HandlerRef::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, HandlerRef::Resolved { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Nextjs,
    Nestjs,
    Express,
    Fastapi,
    Flask,
    Django,
    Generic,
}

/// Repo-level hint passed to `build_graphs`. `Auto` lets every detector run;
/// a specific framework restricts construct extraction to that family;
/// `Generic` disables framework constructs entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameworkHint {
    #[default]
    Auto,
    Nextjs,
    Nestjs,
    Express,
    Fastapi,
    Flask,
    Django,
    Generic,
}

impl FrameworkHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkHint::Auto => "auto",
            FrameworkHint::Nextjs => "nextjs",
            FrameworkHint::Nestjs => "nestjs",
            FrameworkHint::Express => "express",
            FrameworkHint::Fastapi => "fastapi",
            FrameworkHint::Flask => "flask",
            FrameworkHint::Django => "django",
            FrameworkHint::Generic => "generic",
        }
    }

    pub fn allows(&self, framework: Framework) -> bool {
        match self {
            FrameworkHint::Auto => true,
            FrameworkHint::Generic => false,
            FrameworkHint::Nextjs => framework == Framework::Nextjs,
            FrameworkHint::Nestjs => framework == Framework::Nestjs,
            FrameworkHint::Express => framework == Framework::Express,
            FrameworkHint::Fastapi => framework == Framework::Fastapi,
            FrameworkHint::Flask => framework == Framework::Flask,
            FrameworkHint::Django => framework == Framework::Django,
        }
    }

    /// Job decorators are not all tied to a web framework; Python task
    /// runners stay active under any Python-side hint.
    pub fn allows_python_jobs(&self) -> bool {
        matches!(
            self,
            FrameworkHint::Auto
                | FrameworkHint::Fastapi
                | FrameworkHint::Flask
                | FrameworkHint::Django
        )
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Route {
    /// `"METHOD /path"`, the Route Graph key.
    pub id: String,
    pub method: String,
    pub path: String,
    pub handler: HandlerRef,
    pub middleware: Vec<HandlerRef>,
    pub framework: Framework,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingScope {
    Singleton,
    Transient,
    RequestScoped,
}

#[derive(Debug, Serialize, Clone)]
pub struct DiEdge {
    pub provider: HandlerRef,
    pub consumer: HandlerRef,
    pub scope: BindingScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
    Cron { expr: String },
    Event { name: String },
}

#[derive(Debug, Serialize, Clone)]
pub struct Job {
    pub name: String,
    pub trigger: TriggerSpec,
    pub handler: HandlerRef,
    pub dependencies: Vec<SymbolId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    SignatureChange,
    Removal,
    Addition,
}

/// Variant order is the severity order; `Ord` gives Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Serialize, Clone)]
pub struct ImpactedSymbol {
    pub symbol: SymbolRef,
    pub distance: usize,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Clone)]
pub struct BlastRadius {
    pub seeds: Vec<SymbolId>,
    pub change_kind: ChangeKind,
    pub depth: usize,
    /// Reached symbols, ordered by (distance, file path, declaration line).
    pub reached: Vec<ImpactedSymbol>,
    pub affected_routes: Vec<String>,
    pub di_consumers: Vec<SymbolId>,
    pub affected_jobs: Vec<String>,
    pub test_references: Vec<SymbolId>,
    pub db_objects: Vec<String>,
    pub confidence: f32,
    pub risk: RiskLevel,
    pub factors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<String>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    MissingInCode,
    MissingInSpec,
    SchemaMismatch,
    TestGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Serialize, Clone)]
pub struct DriftReport {
    pub kind: DriftKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRoute {
    pub method: String,
    pub path: String,
}

/// Declared intent handed over by the planning layer for drift comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecSnapshot {
    #[serde(default)]
    pub routes: Vec<SpecRoute>,
    #[serde(default)]
    pub data_objects: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct SymbolSummary {
    pub symbol: Symbol,
    pub description: String,
    pub callers: Vec<SymbolRef>,
    pub callees: Vec<SymbolRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_calls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provides_to: Vec<SymbolRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub injected_with: Vec<SymbolRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_imports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imported_by: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub side_effects: Vec<String>,
    pub blast: BlastRadius,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct BuildStats {
    pub files: usize,
    pub parsed: usize,
    pub reused: usize,
    pub failed: usize,
    pub symbols: usize,
    pub call_edges: usize,
    pub routes: usize,
    pub di_edges: usize,
    pub jobs: usize,
    pub duration_ms: u64,
}
