// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uatree-bin
//!
//! CLI binary for the uatree OPC UA node-tree dumper:
//!
//! - CLI argument parsing with clap
//! - Logging initialization
//! - Discovery run orchestration with guaranteed session release
//!
//! ## Usage
//!
//! ```bash
//! # Dump the tree of a server to NodesTree.json
//! uatree -u opc.tcp://192.168.0.10:4840
//!
//! # Custom output name
//! uatree -u opc.tcp://192.168.0.10:4840 -n MachineTree
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod run;

pub use cli::Cli;
pub use error::{BinError, BinResult};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
