// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uatree - dump an OPC UA server's node tree as JSON.

use uatree_bin::cli::Cli;
use uatree_bin::error::report_error_and_exit;
use uatree_bin::{init_logging, run};

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse_args();

    let Some(endpoint) = cli.server_url else {
        // Missing endpoint is a usage message, not an error.
        println!("Machine endpoint missing!");
        return;
    };

    if let Err(error) = run::run(&endpoint, &cli.file_name).await {
        report_error_and_exit(error);
    }
}
