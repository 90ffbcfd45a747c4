use crate::model::{BindingScope, Framework, Language, SymbolKind, TriggerSpec};

/// Per-file extraction output. Everything in here is local to one file:
/// symbol names are container-relative qualnames, call and handler
/// references are raw text. Cross-file resolution happens at assembly.
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub path: String,
    pub language: Language,
    pub hash: String,
    pub symbols: Vec<SymbolFact>,
    pub imports: Vec<ImportFact>,
    pub calls: Vec<CallSiteFact>,
    pub routes: Vec<RouteDraft>,
    pub di: Vec<DiDraft>,
    pub providers: Vec<ProviderFact>,
    pub jobs: Vec<JobDraft>,
    /// Qualname of the default-exported symbol, when the file has one.
    pub default_export: Option<String>,
    pub parse_failed: bool,
    pub parse_error: Option<String>,
}

impl FileFacts {
    pub fn new(path: String, language: Language, hash: String) -> Self {
        FileFacts {
            path,
            language,
            hash,
            symbols: Vec::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            routes: Vec::new(),
            di: Vec::new(),
            providers: Vec::new(),
            jobs: Vec::new(),
            default_export: None,
            parse_failed: false,
            parse_error: None,
        }
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.parse_failed = true;
        self.parse_error = Some(error.into());
    }
}

#[derive(Debug, Clone)]
pub struct SymbolFact {
    pub qualname: String,
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub exported: bool,
    pub signature: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportFact {
    /// Module specifier as written (`./user.service`, `app.repo`), with
    /// Python relative dots already absolutized against the importing file's
    /// package.
    pub specifier: String,
    /// Original exported name for named imports (`from a import x as y`
    /// carries `x`); `None` when the binding covers the whole module or the
    /// import is a star/side-effect import.
    pub imported: Option<String>,
    /// Local binding name the import introduces, when there is one.
    pub local_name: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct CallSiteFact {
    /// Qualname of the enclosing symbol in this file.
    pub caller: String,
    /// Callee text as written, after `self.`/`cls.`/`this.` rewriting to the
    /// enclosing container's qualname.
    pub reference: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct RouteDraft {
    pub method: String,
    pub path: String,
    /// Handler qualname in this file.
    pub handler: String,
    /// Raw middleware references in registration order.
    pub middleware: Vec<String>,
    pub framework: Framework,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct DiDraft {
    /// Raw provider reference (type name or call target).
    pub provider: String,
    /// Consumer qualname in this file.
    pub consumer: String,
    /// Scope seen at the injection site; a scope declared on the provider
    /// itself overrides this during assembly.
    pub scope: BindingScope,
    pub line: u32,
}

/// Provider declaration with its binding scope, e.g. an `@Injectable` class.
#[derive(Debug, Clone)]
pub struct ProviderFact {
    pub qualname: String,
    pub scope: BindingScope,
}

#[derive(Debug, Clone)]
pub struct JobDraft {
    pub name: String,
    pub trigger: TriggerSpec,
    /// Handler qualname in this file.
    pub handler: String,
    pub line: u32,
}
