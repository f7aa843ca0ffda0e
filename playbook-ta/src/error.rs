use thiserror::Error;

/// Errors raised while building or driving indicators.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TaError {
    /// A `FeatureDecl.indicator` string did not match any registered indicator kind.
    #[error("unknown indicator kind: {0}")]
    UnknownIndicatorKind(String),
}
