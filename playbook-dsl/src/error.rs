use thiserror::Error;

/// Errors raised while parsing, compiling or evaluating a Play's DSL (§4.4, §7).
///
/// Parse/compile errors are the spec's `ConfigError` kind: caught at load time, reported with
/// location context, never silently swallowed. `EvalError` would be a contradiction in terms
/// under the three-valued semantics (§4.4 Evaluation) — anything that would otherwise be a
/// runtime evaluation error resolves to `MISSING` instead, which is why this enum only has
/// compile-time variants.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DslError {
    #[error("{location}: unknown condition key: {key}")]
    UnknownConditionKey { location: String, key: String },

    #[error("{location}: unknown operator: {op}")]
    UnknownOperator { location: String, op: String },

    #[error("{location}: unknown enum literal: {literal}")]
    UnknownEnumLiteral { location: String, literal: String },

    #[error("{location}: malformed condition shorthand: {detail}")]
    MalformedShorthand { location: String, detail: String },

    #[error("{location}: legacy alias is prohibited: {alias}")]
    LegacyAliasProhibited { location: String, alias: String },

    #[error("{location}: unresolved feature reference: {reference}")]
    UnresolvedFeatureRef { location: String, reference: String },

    #[error("{location}: unresolved structure reference: {reference}")]
    UnresolvedStructRef { location: String, reference: String },

    #[error("{location}: operator {op} is not compatible with operand types")]
    IncompatibleOperandTypes { location: String, op: String },

    #[error("circular setup reference involving: {0}")]
    CircularSetupRef(String),

    #[error("{location}: missing required key: {key}")]
    MissingKey { location: String, key: String },

    #[error("play YAML is malformed: {0}")]
    Yaml(String),

    #[error("play content could not be canonicalized: {0}")]
    Json(String),

    #[error("play_hash computation failed: {0}")]
    Hash(String),
}
