//! Error types for omnik-core.
//!
//! This module defines the errors that can occur while talking to an Omnik
//! inverter over TCP.
//!
//! # Error Classification
//!
//! | Error Type | Cause | Poller behaviour |
//! |------------|-------|------------------|
//! | [`Error::Connection`] | TCP dial failed or timed out | Reported, retried on next tick |
//! | [`Error::Read`] | Send failed, socket closed, or reply timed out before the newline | Reported, retried on next tick |
//! | [`Error::InvalidPayload`] | Reply arrived but could not be decoded | Reported, retried on next tick |
//! | [`Error::InvalidConfig`] | Options rejected before any I/O | Not retried |
//!
//! No error is retried inside a single exchange; the caller (or the
//! [`crate::Poller`]) decides what happens next.

use std::io;

use thiserror::Error;

use omnik_types::ParseError;

use crate::session::SessionState;

/// Errors that can occur when communicating with an Omnik inverter.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Could not open a TCP connection to the inverter.
    #[error("Failed to connect to {endpoint}: {source}")]
    Connection {
        /// `host:port` that was dialled.
        endpoint: String,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The exchange failed after the connection was established.
    #[error("Failed to read from {endpoint} ({state}): {source}")]
    Read {
        /// `host:port` of the inverter.
        endpoint: String,
        /// Session state when the failure happened.
        state: SessionState,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The reply could not be decoded into a sample.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error happened before a connection was established.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Whether this error is a socket failure during the exchange.
    pub fn is_read(&self) -> bool {
        matches!(self, Error::Read { .. })
    }

    /// Whether the exchange gave up waiting.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Connection { source, .. } | Error::Read { source, .. } => {
                source.kind() == io::ErrorKind::TimedOut
            }
            _ => false,
        }
    }
}

/// Result type alias using omnik-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
