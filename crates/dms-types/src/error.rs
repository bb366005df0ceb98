use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid version string: {0}")]
    InvalidVersion(String),
}

/// Coarse classification of every error the store can surface.
///
/// Each crate keeps its own error enum; `kind()` on those enums maps onto
/// this set so callers can decide retry and reporting policy without
/// matching on crate-specific variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unknown object, content record, or store id.
    NotFound,
    /// The operation is not valid for the current state of the target.
    InvalidState,
    /// The operation would break a reference held by another record.
    Conflict,
    /// The underlying filesystem failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not-found"),
            Self::InvalidState => write!(f, "invalid-state"),
            Self::Conflict => write!(f, "conflict"),
            Self::Io => write!(f, "io"),
        }
    }
}

