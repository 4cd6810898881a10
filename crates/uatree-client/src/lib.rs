// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA address-space discovery client.
//!
//! This crate connects to an OPC UA server, walks the hierarchical
//! reference graph from the Objects folder, and materializes the result as
//! a nested tree of node records ready to serialize as JSON.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    SessionCoordinator                    │
//! │   (discovery, trust, keep-alive, reconnect, disconnect)  │
//! └──────────────┬───────────────────────────┬───────────────┘
//!                │ current_session()         │ current_session()
//!                ▼                           ▼
//!       ┌─────────────────┐        ┌──────────────────┐
//!       │ ReferenceBrowser│        │ AttributeReader  │
//!       │ (continuation-  │        │ (one batched read│
//!       │  point draining)│        │  per node)       │
//!       └────────┬────────┘        └────────┬─────────┘
//!                │                          │
//!                └──────────┬───────────────┘
//!                           ▼
//!                  ┌────────────────┐
//!                  │   TreeWalker   │
//!                  │ (worklist walk,│
//!                  │  visited table,│
//!                  │  depth bound)  │
//!                  └───────┬────────┘
//!                          ▼
//!                NodeRecord forest → TreeWriter
//! ```
//!
//! The keep-alive/reconnect machinery runs concurrently with, and
//! independently of, the traversal; the walker only ever touches the
//! session through the coordinator's accessor.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uatree_client::{ClientConfig, NodeId, SessionCoordinator, TreeWalker, TreeWriter};
//!
//! # async fn run(connector: Arc<dyn uatree_client::UaConnector>) -> anyhow::Result<()> {
//! let config = ClientConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .build()?;
//!
//! let coordinator = SessionCoordinator::new(config, connector);
//! coordinator.connect().await?;
//!
//! let walker = TreeWalker::over_session(Arc::clone(&coordinator));
//! let forest = walker.traverse(&NodeId::OBJECTS_FOLDER).await?;
//!
//! TreeWriter::default().write(&forest)?;
//! coordinator.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod error;
pub mod output;
pub mod read;
pub mod session;
pub mod transport;
pub mod traverse;
pub mod tree;
pub mod trust;
pub mod types;

#[cfg(feature = "real-transport")]
pub mod real;

// Re-export the main entry points.
pub use browse::{Browse, ReferenceBrowser, TREE_NODE_CLASS_MASK};
pub use error::{
    BrowseError, CertificateTrustError, ClientError, ClientResult, ConnectError, OutputError,
    ReadError, TraversalError,
};
pub use output::{TreeWriter, DEFAULT_FILE_STEM};
pub use read::{AttributeReader, NodeFacts, ReadBatch};
pub use session::{DisconnectOutcome, SessionCoordinator, SessionStats};
pub use transport::{
    select_endpoint, AttributeValue, BrowseChunk, ContinuationPoint, EndpointInfo, KeepAliveSink,
    KeepAliveStatus, UaConnector, UaReference, UaSession, UaValue,
};
pub use traverse::{ReferenceKey, TreeWalker, VisitedTable};
pub use tree::{forest_node_count, NodeRecord};
pub use trust::{
    auto_accept_policy, CertificateSummary, TrustDecision, TrustDefect, TrustPolicy,
};
pub use types::{
    data_type_name, AttributeId, ClientConfig, ClientConfigBuilder, NodeClass, NodeId,
    NodeIdParseError, NodeIdentifier, SecurityMode, SecurityPolicy, TREE_ATTRIBUTES,
};

#[cfg(feature = "real-transport")]
pub use real::RealConnector;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
