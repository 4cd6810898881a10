// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reference browsing.
//!
//! [`ReferenceBrowser`] turns the paginated browse service into one logical
//! call per node: forward hierarchical references (subtypes included),
//! filtered to Object, Variable, and Method targets, with server-issued
//! continuation points drained transparently. Reference order is the
//! server's browse order and is preserved.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::BrowseError;
use crate::session::SessionCoordinator;
use crate::transport::UaReference;
use crate::types::{NodeClass, NodeId};

/// Node-class mask for tree discovery: Object | Variable | Method.
pub const TREE_NODE_CLASS_MASK: u32 =
    NodeClass::Object as u32 | NodeClass::Variable as u32 | NodeClass::Method as u32;

// =============================================================================
// Browse Trait
// =============================================================================

/// Browsing seam used by the traversal engine.
///
/// Lets tests drive the engine with a scripted graph instead of a session.
#[async_trait]
pub trait Browse: Send + Sync {
    /// Returns the full set of outgoing hierarchical references of
    /// `node_id`, in server browse order.
    async fn browse(&self, node_id: &NodeId) -> Result<Vec<UaReference>, BrowseError>;
}

// =============================================================================
// ReferenceBrowser
// =============================================================================

/// Browses references through the coordinator's current session.
pub struct ReferenceBrowser {
    coordinator: Arc<SessionCoordinator>,
    node_class_mask: u32,
}

impl ReferenceBrowser {
    /// Creates a browser with the tree-discovery node-class filter.
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self {
            coordinator,
            node_class_mask: TREE_NODE_CLASS_MASK,
        }
    }

    /// Creates a browser with a custom node-class mask (0 = all classes).
    pub fn with_node_class_mask(coordinator: Arc<SessionCoordinator>, mask: u32) -> Self {
        Self {
            coordinator,
            node_class_mask: mask,
        }
    }
}

#[async_trait]
impl Browse for ReferenceBrowser {
    async fn browse(&self, node_id: &NodeId) -> Result<Vec<UaReference>, BrowseError> {
        // One handle per logical call; continuation pages belong to the
        // session that issued the continuation point.
        let session = self
            .coordinator
            .current_session()
            .ok_or(BrowseError::NotConnected)?;

        let mut chunk = session.browse_first(node_id, self.node_class_mask).await?;
        let mut references = std::mem::take(&mut chunk.references);

        let mut pages = 1u32;
        while let Some(continuation) = chunk.continuation.take() {
            chunk = session.browse_next(continuation).await?;
            references.append(&mut chunk.references);
            pages += 1;
        }

        trace!(
            node_id = %node_id,
            count = references.len(),
            pages,
            "browsed references"
        );

        Ok(references)
    }
}

// =============================================================================
// Tests
// =============================================================================
