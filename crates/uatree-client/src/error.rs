// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the discovery client.
//!
//! Errors are grouped by domain, with one umbrella type at the top:
//!
//! ```text
//! ClientError
//! ├── Connect    - Endpoint discovery and session creation failures
//! ├── Browse     - Reference browsing failures
//! ├── Read       - Attribute read failures
//! ├── Traversal  - First browse/read failure that aborted a tree walk
//! └── Output     - JSON serialization / file write failures
//! ```
//!
//! Browse and read failures inside a traversal are fatal for that
//! traversal and are never retried inline; session recovery is the
//! coordinator's independent concern. Certificate rejections are a
//! decision, not a failure: [`CertificateTrustError`] is logged by the
//! trust policy and never propagated.

use std::io;

use thiserror::Error;

use crate::trust::TrustDefect;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

// =============================================================================
// ClientError - Umbrella Type
// =============================================================================

/// The umbrella error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection establishment failed.
    #[error("{0}")]
    Connect(#[from] ConnectError),

    /// A browse call failed.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// An attribute read failed.
    #[error("{0}")]
    Read(#[from] ReadError),

    /// A tree walk was aborted.
    #[error("{0}")]
    Traversal(#[from] TraversalError),

    /// Writing the output document failed.
    #[error("{0}")]
    Output(#[from] OutputError),
}

impl ClientError {
    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Browse(_) => "browse",
            Self::Read(_) => "read",
            Self::Traversal(_) => "traversal",
            Self::Output(_) => "output",
        }
    }

    /// Returns `true` if retrying the whole operation may succeed once the
    /// session has been restored.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(e) => e.is_retryable(),
            Self::Browse(_) | Self::Read(_) | Self::Traversal(_) => true,
            Self::Output(_) => false,
        }
    }
}

// =============================================================================
// ConnectError
// =============================================================================

/// Errors raised while establishing a session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The endpoint URL is malformed.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending URL.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No server answered at the endpoint.
    #[error("endpoint '{endpoint}' unreachable: {reason}")]
    Unreachable {
        /// The endpoint that was tried.
        endpoint: String,
        /// Transport-level failure description.
        reason: String,
    },

    /// Endpoint discovery did not complete within the discovery timeout.
    #[error("endpoint discovery for '{endpoint}' timed out after {timeout_ms}ms")]
    DiscoveryTimeout {
        /// The endpoint that was tried.
        endpoint: String,
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The server advertised no endpoint this client can use.
    #[error("no acceptable endpoint advertised by '{endpoint}'")]
    NoAcceptableEndpoint {
        /// The discovery endpoint.
        endpoint: String,
    },

    /// The server refused session creation or activation.
    #[error("session rejected by server: {reason}")]
    SessionRejected {
        /// Server-reported rejection reason.
        reason: String,
    },
}

impl ConnectError {
    /// Creates an invalid-endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unreachable-endpoint error.
    pub fn unreachable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a discovery-timeout error.
    pub fn discovery_timeout(endpoint: impl Into<String>, timeout_ms: u64) -> Self {
        Self::DiscoveryTimeout {
            endpoint: endpoint.into(),
            timeout_ms,
        }
    }

    /// Creates a no-acceptable-endpoint error.
    pub fn no_acceptable_endpoint(endpoint: impl Into<String>) -> Self {
        Self::NoAcceptableEndpoint {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a session-rejected error.
    pub fn session_rejected(reason: impl Into<String>) -> Self {
        Self::SessionRejected {
            reason: reason.into(),
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::DiscoveryTimeout { .. } | Self::SessionRejected { .. }
        )
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Errors raised by the reference browser.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// No live session is available.
    #[error("cannot browse: session is not connected")]
    NotConnected,

    /// The server failed the browse service call.
    #[error("browse of {node_id} failed: {reason}")]
    BrowseFailed {
        /// The node being browsed.
        node_id: String,
        /// Server- or transport-reported reason.
        reason: String,
    },
}

impl BrowseError {
    /// Creates a browse-failed error.
    pub fn browse_failed(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// ReadError
// =============================================================================

/// Errors raised by the attribute batch reader.
#[derive(Debug, Error)]
pub enum ReadError {
    /// No live session is available.
    #[error("cannot read: session is not connected")]
    NotConnected,

    /// The server failed the read service call.
    #[error("attribute read of {node_id} failed: {reason}")]
    ReadFailed {
        /// The node being read.
        node_id: String,
        /// Server- or transport-reported reason.
        reason: String,
    },

    /// The server returned the wrong number of results for a batched read.
    #[error("attribute read returned {actual} values, expected {expected}")]
    CountMismatch {
        /// Number of attributes requested.
        expected: usize,
        /// Number of values returned.
        actual: usize,
    },
}

impl ReadError {
    /// Creates a read-failed error.
    pub fn read_failed(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a count-mismatch error.
    pub fn count_mismatch(expected: usize, actual: usize) -> Self {
        Self::CountMismatch { expected, actual }
    }
}

// =============================================================================
// TraversalError
// =============================================================================

/// The first failure encountered during a tree walk.
///
/// Any browse or read failure anywhere in the walk aborts the whole
/// traversal; there is no partial-result mode.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// A browse call failed at the given node.
    #[error("traversal aborted while browsing {node_id}: {source}")]
    Browse {
        /// The node whose browse failed.
        node_id: String,
        /// The underlying browse error.
        #[source]
        source: BrowseError,
    },

    /// An attribute read failed at the given node.
    #[error("traversal aborted while reading {node_id}: {source}")]
    Read {
        /// The node whose read failed.
        node_id: String,
        /// The underlying read error.
        #[source]
        source: ReadError,
    },
}

impl TraversalError {
    /// Wraps a browse failure.
    pub fn browse(node_id: impl Into<String>, source: BrowseError) -> Self {
        Self::Browse {
            node_id: node_id.into(),
            source,
        }
    }

    /// Wraps a read failure.
    pub fn read(node_id: impl Into<String>, source: ReadError) -> Self {
        Self::Read {
            node_id: node_id.into(),
            source,
        }
    }

    /// Returns the node at which the walk aborted.
    pub fn node_id(&self) -> &str {
        match self {
            Self::Browse { node_id, .. } | Self::Read { node_id, .. } => node_id,
        }
    }
}

// =============================================================================
// CertificateTrustError
// =============================================================================

/// A certificate rejection decision.
///
/// Never propagated as a failure: the trust policy logs it and session
/// establishment proceeds (and typically fails) through the normal
/// [`ConnectError`] path.
#[derive(Debug, Error)]
#[error("certificate '{subject}' rejected: {defect}")]
pub struct CertificateTrustError {
    /// Subject of the rejected certificate.
    pub subject: String,

    /// The defect that caused the rejection.
    pub defect: TrustDefect,
}

// =============================================================================
// OutputError
// =============================================================================

/// Errors raised while writing the output document.
#[derive(Debug, Error)]
pub enum OutputError {
    /// JSON serialization failed.
    #[error("failed to serialize node tree: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing the file failed.
    #[error("failed to write '{path}': {source}")]
    Io {
        /// Destination path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl OutputError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let err = ConnectError::discovery_timeout("opc.tcp://plc:4840", 15_000);
        assert_eq!(
            err.to_string(),
            "endpoint discovery for 'opc.tcp://plc:4840' timed out after 15000ms"
        );
        assert!(err.is_retryable());

        let err = ConnectError::invalid_endpoint("ftp://x", "endpoint URL must use the opc.tcp scheme");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_traversal_error_keeps_failing_node() {
        let err = TraversalError::browse("ns=2;i=7", BrowseError::NotConnected);
        assert_eq!(err.node_id(), "ns=2;i=7");
        assert!(err.to_string().contains("ns=2;i=7"));
    }

    #[test]
    fn test_umbrella_categories() {
        let err: ClientError = BrowseError::NotConnected.into();
        assert_eq!(err.category(), "browse");
        assert!(err.is_retryable());

        let err: ClientError = OutputError::io(
            "NodesTree.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        )
        .into();
        assert_eq!(err.category(), "output");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_read_count_mismatch_display() {
        let err = ReadError::count_mismatch(5, 3);
        assert_eq!(err.to_string(), "attribute read returned 3 values, expected 5");
    }
}
