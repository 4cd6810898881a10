// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Discovery run orchestration.
//!
//! Connects, walks the tree from the Objects folder, disconnects, and
//! writes the output document. The session is released on every exit path:
//! the walk's result is captured first and only inspected after
//! `disconnect` has run.

use std::sync::Arc;

use tracing::info;

use uatree_client::{
    forest_node_count, ClientConfig, ClientError, NodeId, SessionCoordinator, TreeWalker,
    TreeWriter, UaConnector,
};

use crate::error::{BinError, BinResult};

/// Runs one discovery: endpoint to JSON file.
///
/// Prints the created file's path on success.
pub async fn run(endpoint: &str, file_stem: &str) -> BinResult<()> {
    let config = ClientConfig::builder()
        .endpoint(endpoint)
        .build()
        .map_err(ClientError::from)?;

    let coordinator = SessionCoordinator::new(config, connector()?);
    coordinator.connect().await.map_err(ClientError::from)?;

    // Guaranteed release: disconnect runs before the walk result is
    // inspected, on the success and the failure path alike.
    let walk = {
        let walker = TreeWalker::over_session(Arc::clone(&coordinator));
        walker.traverse(&NodeId::OBJECTS_FOLDER).await
    };
    coordinator.disconnect().await;

    let forest = walk.map_err(ClientError::from)?;
    info!(nodes = forest_node_count(&forest), "discovery complete");

    let path = TreeWriter::new(file_stem)
        .write(&forest)
        .map_err(ClientError::from)?;
    println!("File created {}", path.display());

    Ok(())
}

#[cfg(feature = "real-transport")]
fn connector() -> BinResult<Arc<dyn UaConnector>> {
    Ok(Arc::new(uatree_client::RealConnector::new()))
}

#[cfg(not(feature = "real-transport"))]
fn connector() -> BinResult<Arc<dyn UaConnector>> {
    Err(BinError::init(
        "this build has no OPC UA transport; rebuild with --features real-transport",
    ))
}
