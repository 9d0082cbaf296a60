//! Error types for data parsing in omnik-types.

use thiserror::Error;

/// Errors that can occur when parsing inverter data.
///
/// This error type is transport-agnostic and does not include
/// socket errors (those belong in omnik-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// Failed to parse data due to insufficient bytes.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A direction string other than `before` or `after`.
    #[error("Unknown adjacency '{0}': expected 'before' or 'after'")]
    InvalidAdjacency(String),
}

/// Result type alias using omnik-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
