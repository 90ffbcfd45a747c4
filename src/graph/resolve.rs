//! Two-tier resolution of raw call references against the scanned file set.
//!
//! Tier one matches exact qualified names through import bindings, module
//! exports, and same-file symbols; tier two relaxes to last-segment equality.
//! Anything else stays external. Ties are broken by lexicographically
//! smallest (file path, qualified name) so assembly output never depends on
//! input iteration order.

use crate::parser::facts::FileFacts;
use std::collections::{BTreeMap, BTreeSet};

pub const EXACT_CONFIDENCE: f32 = 1.0;
pub const RELAXED_CONFIDENCE: f32 = 0.7;
pub const EXTERNAL_CONFIDENCE: f32 = 0.3;

/// An import edge whose specifier already resolved to a scanned file.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    /// Local binding in the importing file; `None` for star and side-effect
    /// imports, which bind nothing but still make the file's exports visible.
    pub local: Option<String>,
    /// Export name in the target file. `None` binds the module itself;
    /// `"default"` goes through the target's default export.
    pub imported: Option<String>,
    /// Resolved target path.
    pub file: String,
}

/// Exported and declared qualified names per file, for candidate lookup.
#[derive(Debug, Default)]
pub struct ExportIndex {
    exports: BTreeMap<String, BTreeSet<String>>,
    symbols: BTreeMap<String, BTreeSet<String>>,
    defaults: BTreeMap<String, String>,
}

impl ExportIndex {
    pub fn build(facts: &[FileFacts]) -> Self {
        let mut index = ExportIndex::default();
        for file in facts {
            let mut exports = BTreeSet::new();
            let mut symbols = BTreeSet::new();
            for symbol in &file.symbols {
                symbols.insert(symbol.qualname.clone());
                if symbol.exported {
                    exports.insert(symbol.qualname.clone());
                }
            }
            index.exports.insert(file.path.clone(), exports);
            index.symbols.insert(file.path.clone(), symbols);
            if let Some(default) = &file.default_export {
                index.defaults.insert(file.path.clone(), default.clone());
            }
        }
        index
    }

    pub fn default_export(&self, file: &str) -> Option<&str> {
        self.defaults.get(file).map(String::as_str)
    }

    fn has_export(&self, file: &str, qualname: &str) -> bool {
        self.exports
            .get(file)
            .is_some_and(|set| set.contains(qualname))
    }

    fn has_symbol(&self, file: &str, qualname: &str) -> bool {
        self.symbols
            .get(file)
            .is_some_and(|set| set.contains(qualname))
    }

    fn exports_of(&self, file: &str) -> impl Iterator<Item = &String> {
        self.exports.get(file).into_iter().flatten()
    }

    fn symbols_of(&self, file: &str) -> impl Iterator<Item = &String> {
        self.symbols.get(file).into_iter().flatten()
    }
}

/// A reference resolved to a concrete symbol with the tier's confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub file: String,
    pub qualname: String,
    pub confidence: f32,
}

/// Resolves raw references for one file against its resolved imports.
pub struct ReferenceResolver<'a> {
    index: &'a ExportIndex,
    file: &'a str,
    imports: Vec<ResolvedImport>,
    /// Distinct imported files, sorted for deterministic candidate order.
    imported_files: Vec<String>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(index: &'a ExportIndex, file: &'a str, imports: Vec<ResolvedImport>) -> Self {
        let imported_files: BTreeSet<String> =
            imports.iter().map(|imp| imp.file.clone()).collect();
        Self {
            index,
            file,
            imports,
            imported_files: imported_files.into_iter().collect(),
        }
    }

    /// Returns `None` when neither tier matches; the caller records an
    /// external sentinel with [`EXTERNAL_CONFIDENCE`].
    pub fn resolve(&self, raw: &str) -> Option<ResolvedTarget> {
        if let Some((file, qualname)) = self.exact_binding_match(raw) {
            return Some(ResolvedTarget {
                file,
                qualname,
                confidence: EXACT_CONFIDENCE,
            });
        }
        if let Some((file, qualname)) = self.exact_export_match(raw) {
            return Some(ResolvedTarget {
                file,
                qualname,
                confidence: EXACT_CONFIDENCE,
            });
        }
        if self.index.has_symbol(self.file, raw) {
            return Some(ResolvedTarget {
                file: self.file.to_string(),
                qualname: raw.to_string(),
                confidence: EXACT_CONFIDENCE,
            });
        }
        if let Some((file, qualname)) = self.relaxed_match(raw) {
            return Some(ResolvedTarget {
                file,
                qualname,
                confidence: RELAXED_CONFIDENCE,
            });
        }
        None
    }

    /// The raw reference goes through an import's local binding: either the
    /// binding itself (`save()` after `from repo import save`) or a dotted
    /// member of it (`repo.save()` after `import repo`).
    fn exact_binding_match(&self, raw: &str) -> Option<(String, String)> {
        let mut candidates: BTreeSet<(String, String)> = BTreeSet::new();
        for imp in &self.imports {
            let Some(local) = imp.local.as_deref() else {
                continue;
            };
            if raw == local {
                let qualname = match imp.imported.as_deref() {
                    Some("default") => self.index.default_export(&imp.file)?.to_string(),
                    Some(orig) => orig.to_string(),
                    // The binding names the module itself, not a symbol.
                    None => continue,
                };
                if self.index.has_export(&imp.file, &qualname) {
                    candidates.insert((imp.file.clone(), qualname));
                }
                continue;
            }
            let Some(remainder) = raw
                .strip_prefix(local)
                .and_then(|rest| rest.strip_prefix('.'))
            else {
                continue;
            };
            let qualname = match imp.imported.as_deref() {
                None => remainder.to_string(),
                Some("default") => match self.index.default_export(&imp.file) {
                    Some(default) => format!("{default}.{remainder}"),
                    None => continue,
                },
                Some(orig) => format!("{orig}.{remainder}"),
            };
            if self.index.has_export(&imp.file, &qualname) {
                candidates.insert((imp.file.clone(), qualname));
            }
        }
        candidates.into_iter().next()
    }

    /// The raw reference equals an export of a directly imported file,
    /// without going through a binding (star imports, re-export chains).
    fn exact_export_match(&self, raw: &str) -> Option<(String, String)> {
        for file in &self.imported_files {
            if self.index.has_export(file, raw) {
                return Some((file.clone(), raw.to_string()));
            }
        }
        None
    }

    /// Last-segment equality over the pooled candidate set: exports of every
    /// imported file plus all same-file symbols.
    fn relaxed_match(&self, raw: &str) -> Option<(String, String)> {
        let last = last_segment(raw);
        let mut candidates: BTreeSet<(String, String)> = BTreeSet::new();
        for file in &self.imported_files {
            for qualname in self.index.exports_of(file) {
                if last_segment(qualname) == last {
                    candidates.insert((file.clone(), qualname.clone()));
                }
            }
        }
        for qualname in self.index.symbols_of(self.file) {
            if last_segment(qualname) == last {
                candidates.insert((self.file.to_string(), qualname.clone()));
            }
        }
        candidates.into_iter().next()
    }
}

fn last_segment(reference: &str) -> &str {
    reference.rsplit('.').next().unwrap_or(reference)
}
