//! Source parsing: repository scan, tree-sitter fact extraction, and the
//! parallel driver that turns scanned files into [`FileFacts`].

use crate::config::Config;
use crate::model::{FrameworkHint, Language};
use crate::parser::facts::FileFacts;
use crate::parser::scan::ScannedFile;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::warn;

pub mod facts;
pub mod http;
pub mod javascript;
pub mod python;
pub mod scan;

/// One extractor per language. Implementations own their tree-sitter parser
/// and append facts for a single file; a parse failure is recorded on the
/// facts rather than returned as an error.
pub trait Extractor {
    fn extract(&mut self, source: &str, facts: &mut FileFacts, hint: FrameworkHint) -> Result<()>;
}

type ExtractorSet = HashMap<Language, Box<dyn Extractor + Send>>;

fn extractor_set() -> Result<ExtractorSet> {
    let mut extractors: ExtractorSet = HashMap::new();
    extractors.insert(
        Language::Python,
        Box::new(python::PythonExtractor::new()?),
    );
    extractors.insert(
        Language::Javascript,
        Box::new(javascript::JavascriptExtractor::new()?),
    );
    extractors.insert(
        Language::Typescript,
        Box::new(javascript::TypescriptExtractor::new()?),
    );
    extractors.insert(Language::Tsx, Box::new(javascript::TsxExtractor::new()?));
    Ok(extractors)
}

/// Parse every scanned file and return facts sorted by path. Files that fail
/// to read or parse come back with `parse_failed` set; the build continues
/// without them.
pub fn parse_repo(files: Vec<ScannedFile>, hint: FrameworkHint) -> Result<Vec<FileFacts>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }
    let workers = Config::get().parse_workers.min(files.len()).max(1);
    if workers == 1 {
        let mut extractors = extractor_set()?;
        let mut out: Vec<FileFacts> = files
            .iter()
            .map(|file| parse_one(file, &mut extractors, hint))
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        return Ok(out);
    }

    let chunk_size = files.len().div_ceil(workers);
    let results: Arc<Mutex<Vec<FileFacts>>> = Arc::new(Mutex::new(Vec::with_capacity(files.len())));
    let mut handles = Vec::new();
    for chunk in files.chunks(chunk_size) {
        let chunk = chunk.to_vec();
        let results = Arc::clone(&results);
        handles.push(thread::spawn(move || {
            let mut extractors = match extractor_set() {
                Ok(set) => set,
                Err(err) => {
                    warn!(error = %err, "failed to construct extractors");
                    let failed: Vec<FileFacts> = chunk
                        .iter()
                        .map(|file| {
                            let mut facts = FileFacts::new(
                                file.rel_path.clone(),
                                file.language,
                                file.hash.clone(),
                            );
                            facts.mark_failed(err.to_string());
                            facts
                        })
                        .collect();
                    results.lock().unwrap().extend(failed);
                    return;
                }
            };
            let parsed: Vec<FileFacts> = chunk
                .iter()
                .map(|file| parse_one(file, &mut extractors, hint))
                .collect();
            results.lock().unwrap().extend(parsed);
        }));
    }
    for handle in handles {
        if handle.join().is_err() {
            warn!("parse worker panicked");
        }
    }

    let mut out = Arc::try_unwrap(results)
        .map(|mutex| mutex.into_inner().unwrap())
        .unwrap_or_else(|arc| arc.lock().unwrap().clone());
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn parse_one(file: &ScannedFile, extractors: &mut ExtractorSet, hint: FrameworkHint) -> FileFacts {
    let mut facts = FileFacts::new(file.rel_path.clone(), file.language, file.hash.clone());
    let source = match crate::util::read_to_string(&file.abs_path) {
        Ok(source) => source,
        Err(err) => {
            warn!(path = %file.rel_path, error = %err, "read failed");
            facts.mark_failed(format!("read failed: {err}"));
            return facts;
        }
    };
    let Some(extractor) = extractors.get_mut(&file.language) else {
        facts.mark_failed(format!("no extractor for {}", file.language.as_str()));
        return facts;
    };
    if let Err(err) = extractor.extract(&source, &mut facts, hint) {
        warn!(path = %file.rel_path, error = %err, "extract failed");
        facts.mark_failed(err.to_string());
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn parse_repo_returns_sorted_facts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.py"), "def beta():\n    pass\n").unwrap();
        fs::write(dir.path().join("a.py"), "def alpha():\n    pass\n").unwrap();
        let scanned = scan::scan_repo(dir.path()).unwrap();
        let facts = parse_repo(scanned, FrameworkHint::Auto).unwrap();
        let paths: Vec<&str> = facts.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
        assert_eq!(facts[0].symbols[0].qualname, "alpha");
        assert!(!facts[0].parse_failed);
    }

    #[test]
    fn unreadable_file_marked_failed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.py"), "x = 1\n").unwrap();
        let mut scanned = scan::scan_repo(dir.path()).unwrap();
        scanned[0].abs_path = dir.path().join("missing.py");
        let facts = parse_repo(scanned, FrameworkHint::Auto).unwrap();
        assert!(facts[0].parse_failed);
        assert!(facts[0].parse_error.as_deref().unwrap().contains("read failed"));
    }
}
