//! Store error types.

use std::path::PathBuf;

use crate::domain::{BusId, ConnectionId, DomainError};

/// Errors from the booking store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection with this id
    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// A connection refers to a bus the store does not know
    #[error("bus {0} not found")]
    BusNotFound(BusId),

    /// A bus or connection with this id already exists
    #[error("duplicate {kind} {id}")]
    Duplicate { kind: &'static str, id: String },

    /// A fleet fixture could not be read
    #[error("failed to read fleet fixture {path}: {source}")]
    FixtureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A fleet fixture is not valid JSON for the expected shape
    #[error("failed to parse fleet fixture: {0}")]
    FixtureJson(#[from] serde_json::Error),

    /// A fixture row violates a domain invariant
    #[error("invalid fleet data: {0}")]
    Domain(#[from] DomainError),
}
