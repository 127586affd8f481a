//! Error taxonomy for graph loading, CPD construction and queries.
//!
//! Unreachable targets and cutoff terminations are *not* errors: they are
//! regular query outcomes carried in the solution's stop reason. Everything
//! here is a genuine failure of the requested operation.

use std::fmt;
use std::io;

/// Errors surfaced by the pangolin libraries.
#[derive(Debug)]
pub enum Error {
    /// Missing or unreadable file, malformed header, checksum mismatch.
    /// Fatal for the current operation; a long-running service may continue.
    Io(String),

    /// The loaded graph violates a structural invariant: negative edge
    /// weights, a weight below the Euclidean gap when the embedding is
    /// Euclidean, or an out-degree beyond what first-move sets can index.
    /// Fatal at load.
    InvalidGraph(String),

    /// A per-query problem: start or target id out of range, or
    /// contradictory search options. Returned per query; never kills a
    /// service.
    InvalidArgument(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(msg) => write!(f, "i/o error: {}", msg),
            Error::InvalidGraph(msg) => write!(f, "invalid graph: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
