use thiserror::Error;

use crate::destination::DestinationKey;

/// Misuse of the selection API.
///
/// These are programming errors reported to the caller, never data problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("destination {0} is provisional and must be resolved before selection")]
    Provisional(DestinationKey),

    #[error("destination {0} is not registered")]
    Unknown(DestinationKey),

    #[error("cannot clear the selection while an auto-select rule is pending")]
    DanglingRule,

    #[error("destination {0} is not provisional")]
    NotProvisional(DestinationKey),
}

/// Invalid default-selection configuration.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("default selection rules are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field} pattern: {source}")]
    Pattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("unknown destination kind: {0}")]
    UnknownKind(String),
}
