// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing.
//!
//! The surface is deliberately small: the server endpoint and the output
//! file base name. Log filtering is controlled through the standard
//! `RUST_LOG` environment variable rather than flags.

use clap::Parser;

// =============================================================================
// Cli
// =============================================================================

/// uatree - dump an OPC UA server's node tree as JSON.
///
/// Connects to the given endpoint, walks the hierarchical references from
/// the Objects folder, and writes the discovered tree to
/// `<cwd>/<file-name>.json`.
#[derive(Parser, Debug)]
#[command(
    name = "uatree",
    author = "Sylvex <contact@sylvex.io>",
    version = uatree_client::VERSION,
    about = "Dump an OPC UA server's node tree as JSON",
    long_about = None
)]
pub struct Cli {
    /// Endpoint of the machine server (opc.tcp://host:port)
    #[arg(short = 'u', long = "server-url")]
    pub server_url: Option<String>,

    /// Base name of the saved file
    #[arg(short = 'n', long = "file-name", default_value = "NodesTree")]
    pub file_name: String,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

// =============================================================================
// Tests
// =============================================================================
