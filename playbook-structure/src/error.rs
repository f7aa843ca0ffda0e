use thiserror::Error;

/// Errors raised while building or driving market-structure detectors.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StructureError {
    /// A `StructureDecl.kind` string did not match any registered detector kind.
    #[error("unknown structure kind: {0}")]
    UnknownStructureKind(String),

    /// A detector's `DEPENDS_ON` name was not present in its `StructureDecl.deps` map.
    #[error("structure {key} is missing required dependency: {dep_name}")]
    MissingDependency { key: String, dep_name: String },

    /// Topological sort over a TF role's structure declarations found a cycle.
    #[error("circular structure dependency involving: {0}")]
    CircularDependency(String),

    /// A detector observed a `bar_idx` at or before one already processed.
    #[error("non-monotonic bar index: saw {got}, expected > {last_seen}")]
    NonMonotonicBarIndex { got: u64, last_seen: u64 },
}
