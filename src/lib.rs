//! Multi-level dependency graphs and blast-radius analysis for polyglot
//! repositories.
//!
//! ripple parses Python and JS/TS sources with tree-sitter, assembles five
//! graphs over a shared symbol-identity space (file imports, calls, HTTP
//! routes, dependency injection, scheduled jobs), and answers structural
//! questions about change impact: who calls this symbol, what breaks if it
//! changes, where code and declared intent drift apart.
//!
//! The [`Engine`] facade is the entry point:
//!
//! ```no_run
//! use ripple::{ChangeKind, Engine, FrameworkHint, SymbolId};
//!
//! # fn main() -> ripple::Result<()> {
//! let engine = Engine::new();
//! engine.build_graphs(std::path::Path::new("."), FrameworkHint::Auto)?;
//! let radius = engine.compute_blast_radius(
//!     &[SymbolId::new("app/service.py", "UserService.create")],
//!     ChangeKind::SignatureChange,
//!     3,
//! )?;
//! println!("risk {:?}, {} symbols affected", radius.risk, radius.reached.len());
//! # Ok(())
//! # }
//! ```
//!
//! Rebuilds publish immutable snapshots through an atomic swap; queries
//! acquire one snapshot and never observe a half-assembled graph.

pub mod config;
pub mod drift;
pub mod engine;
pub mod error;
pub mod graph;
pub mod impact;
pub mod model;
pub mod parser;
pub mod summary;
pub mod util;

pub use engine::Engine;
pub use error::{Error, Result};
pub use model::{
    BlastRadius, ChangeKind, DriftKind, DriftReport, FrameworkHint, RiskLevel, Severity,
    SpecSnapshot, Symbol, SymbolId, SymbolRef, SymbolSummary,
};
