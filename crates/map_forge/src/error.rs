//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid configuration, graph construction and wiring failures, pipeline phase violations,
//! fan-out exhaustion, failed operations, IO, and generic errors.
use thiserror::Error;

use crate::mask::MaskKind;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("graph compile error: {0}")]
    Compile(String),

    #[error("graph '{graph}' has no vertex '{vertex}'")]
    MissingVertex { graph: String, vertex: String },

    #[error("endpoint '{endpoint}' of graph '{graph}' is not wired")]
    UnwiredEndpoint { graph: String, endpoint: String },

    #[error("wiring error: {0}")]
    Wiring(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown mask #{0}")]
    UnknownMask(usize),

    #[error("expected a {expected:?} mask but found {found:?}")]
    MaskKind { expected: MaskKind, found: MaskKind },

    #[error("entry #{index} has no result left for mask '{requester}'")]
    FanOutExhausted { index: usize, requester: String },

    #[error("entry #{index} ({label}) failed: {message}")]
    OperationFailed {
        index: usize,
        label: String,
        message: String,
    },

    #[error("entry #{index} skipped because dependency #{dependency} failed")]
    DependencyFailed { index: usize, dependency: usize },

    #[error("worker pool error: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(value: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string_uses_other_variant() {
        let err: Error = String::from("boom").into();
        matches!(err, Error::Other(_))
            .then_some(())
            .expect("expected Other variant");
    }

    #[test]
    fn mask_kind_message_names_both_kinds() {
        let err = Error::MaskKind {
            expected: MaskKind::Float,
            found: MaskKind::Boolean,
        };
        assert_eq!(
            err.to_string(),
            "expected a Float mask but found Boolean"
        );
    }

    #[test]
    fn operation_failure_mentions_label() {
        let err = Error::OperationFailed {
            index: 3,
            label: "terrain::slope".into(),
            message: "bad input".into(),
        };
        assert!(err.to_string().contains("terrain::slope"));
    }
}
