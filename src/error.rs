use crate::model::SymbolId;
use thiserror::Error;

/// Failure conditions surfaced to callers.
///
/// Per-file and per-reference problems never appear here: an unparseable file
/// becomes a fact record flagged `parse_failed`, an unresolvable reference
/// becomes a low-confidence external edge, and a traversal that hits its
/// depth or wall-clock budget returns a truncated result. Only snapshot-level
/// failures and bad caller input are errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A query named a symbol identity absent from the snapshot.
    #[error("symbol not found: {0}")]
    SymbolNotFound(SymbolId),

    /// A query named a snapshot id that is neither current nor retained.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// A query arrived before the first successful build.
    #[error("no snapshot has been published yet")]
    NoSnapshot,

    /// Assembly produced an internally inconsistent graph; the rebuild was
    /// aborted and the prior snapshot is still live.
    #[error("assembly invariant violated: {0}")]
    AssemblyInvariant(String),

    /// A parser could not be constructed or the scan itself failed. Per-file
    /// parse problems are absorbed into `FileFacts::parse_failed` instead.
    #[error("parse failure: {0}")]
    Parse(String),

    /// The spec snapshot handed to the drift detector could not be decoded.
    #[error("invalid spec snapshot: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(err: anyhow::Error) -> Self {
        Error::Parse(format!("{err:#}"))
    }
}
