// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batched attribute reading.
//!
//! A full tree walk reads attributes for thousands of nodes; issuing one
//! service call per attribute would quintuple the round trips. The reader
//! therefore sends exactly one batched read request per node, and the
//! result comes back aligned to the requested attribute order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::ReadError;
use crate::session::SessionCoordinator;
use crate::transport::{AttributeValue, UaValue};
use crate::types::{data_type_name, AttributeId, NodeClass, NodeId};

// =============================================================================
// ReadBatch Trait
// =============================================================================

/// Attribute-reading seam used by the traversal engine.
#[async_trait]
pub trait ReadBatch: Send + Sync {
    /// Reads `attributes` of `node_id` in one request.
    ///
    /// The returned values are aligned to `attributes` order and the
    /// sequence has the same length.
    async fn read_attributes(
        &self,
        node_id: &NodeId,
        attributes: &[AttributeId],
    ) -> Result<Vec<AttributeValue>, ReadError>;
}

// =============================================================================
// AttributeReader
// =============================================================================

/// Reads attributes through the coordinator's current session.
pub struct AttributeReader {
    coordinator: Arc<SessionCoordinator>,
}

impl AttributeReader {
    /// Creates a reader.
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ReadBatch for AttributeReader {
    async fn read_attributes(
        &self,
        node_id: &NodeId,
        attributes: &[AttributeId],
    ) -> Result<Vec<AttributeValue>, ReadError> {
        let session = self
            .coordinator
            .current_session()
            .ok_or(ReadError::NotConnected)?;

        let values = session.read_attributes(node_id, attributes).await?;

        if values.len() != attributes.len() {
            return Err(ReadError::count_mismatch(attributes.len(), values.len()));
        }

        trace!(node_id = %node_id, count = values.len(), "read attributes");
        Ok(values)
    }
}

// =============================================================================
// NodeFacts
// =============================================================================

/// The typed interpretation of one node's tree-attribute batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFacts {
    /// Node class, `Unspecified` when the attribute did not resolve.
    pub node_class: NodeClass,

    /// Browse name, empty when the attribute did not resolve.
    pub browse_name: String,

    /// Display name, empty when the attribute did not resolve.
    pub display_name: String,

    /// Data-type name; empty for nodes without a DataType attribute
    /// (Objects and Methods report a bad status there).
    pub data_type: String,
}

impl NodeFacts {
    /// Interprets a batch read in [`TREE_ATTRIBUTES`] order.
    ///
    /// Bad-status items degrade to the field defaults rather than failing:
    /// the walk records what the server answered.
    pub fn from_values(values: &[AttributeValue]) -> Self {
        let mut facts = Self {
            node_class: NodeClass::Unspecified,
            browse_name: String::new(),
            display_name: String::new(),
            data_type: String::new(),
        };

        for value in values {
            if !value.is_good() {
                continue;
            }
            match (value.attribute, &value.value) {
                (AttributeId::NodeClass, UaValue::Int32(raw)) => {
                    facts.node_class =
                        NodeClass::from_value(*raw as u32).unwrap_or(NodeClass::Unspecified);
                }
                (AttributeId::BrowseName, UaValue::Text(text)) => {
                    facts.browse_name = text.clone();
                }
                (AttributeId::DisplayName, UaValue::Text(text)) => {
                    facts.display_name = text.clone();
                }
                (AttributeId::DataType, UaValue::Id(id)) => {
                    facts.data_type = match data_type_name(id) {
                        Some(name) => name.to_string(),
                        None => id.to_opc_string(),
                    };
                }
                _ => {}
            }
        }

        facts
    }
}

// =============================================================================
// Tests
// =============================================================================
