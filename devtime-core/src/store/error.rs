use std::fmt;

use thiserror::Error;

/// Whether retrying a failed store operation can be expected to help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-class failure; the update is kept and retried later.
    Transient,
    /// Validation, authorization or schema failure; retrying cannot succeed.
    Permanent,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// A classified failure from a remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} store error: {message}")]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Classifies unstructured error text with [`classify_message`].
    ///
    /// Only for transports that give no structured signal.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_message(&message),
            message,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

/// Substrings of a lowercased error description that indicate a
/// network-class failure.
const TRANSIENT_MARKERS: &[&str] = &[
    // name resolution
    "enotfound",
    "eai_again",
    "dns",
    "name resolution",
    "failed to lookup address",
    // connection refused or dropped
    "econnrefused",
    "econnreset",
    "connection refused",
    "connection reset",
    "connection closed",
    // timeouts
    "etimedout",
    "timeout",
    "timed out",
    // generic
    "network",
    "socket",
];

/// Heuristic classification of an error description.
///
/// Misses here are costly both ways: a transient error read as permanent is
/// dropped, a permanent one read as transient is requeued forever.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ErrorKind::Transient
    } else {
        ErrorKind::Permanent
    }
}
