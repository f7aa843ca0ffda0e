use thiserror::Error;

/// Errors raised while canonicalizing or hashing a value (§6 Hashing contract).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum HashError {
    /// A value contained `NaN`/`Infinity`, which canonical JSON rejects outright rather than
    /// ever serializing (the DSL's MISSING sentinel exists precisely so this never has to
    /// represent a non-finite number; encountering one this late is a bug upstream).
    #[error("cannot canonicalize non-finite number at {path}")]
    NonFiniteNumber { path: String },

    /// The value could not be serialized to JSON at all.
    #[error("json serialization failed: {0}")]
    Serialization(String),
}
