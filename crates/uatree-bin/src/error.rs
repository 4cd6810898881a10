// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the uatree binary.

use thiserror::Error;

use uatree_client::ClientError;

/// Result type alias for binary operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the uatree binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Initialization failure (bad configuration, missing transport).
    #[error("initialization error: {0}")]
    Initialization(String),

    /// A client operation failed.
    #[error("{0}")]
    Client(#[from] ClientError),
}

impl BinError {
    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Initialization(_) => 2,
            Self::Client(e) => match e.category() {
                "connect" => 1,
                "traversal" | "browse" | "read" => 3,
                "output" => 4,
                _ => 1,
            },
        }
    }
}

/// Reports an error with its cause chain.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with the matching code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uatree_client::{BrowseError, ConnectError, OutputError, TraversalError};

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::init("no transport").exit_code(), 2);

        let connect: BinError = ClientError::from(ConnectError::unreachable("opc.tcp://x", "refused")).into();
        assert_eq!(connect.exit_code(), 1);

        let traversal: BinError =
            ClientError::from(TraversalError::browse("i=85", BrowseError::NotConnected)).into();
        assert_eq!(traversal.exit_code(), 3);

        let output: BinError = ClientError::from(OutputError::io(
            "NodesTree.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        ))
        .into();
        assert_eq!(output.exit_code(), 4);
    }
}
