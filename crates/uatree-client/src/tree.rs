// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The discovered node tree.
//!
//! [`NodeRecord`] is the output shape of a traversal: one record per
//! discovered node, children nested in browse order, owned exclusively by
//! the parent. The serde field names are the output document schema and
//! must not change.

use serde::{Deserialize, Serialize};

use crate::read::NodeFacts;
use crate::types::{NodeClass, NodeId};

// =============================================================================
// NodeRecord
// =============================================================================

/// One node in the discovered tree.
///
/// Immutable once attached to its parent; plain tree ownership with no
/// back-references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node class name (e.g. `Object`, `Variable`, `Method`).
    #[serde(rename = "NodeType")]
    pub node_type: String,

    /// String form of the node identifier.
    #[serde(rename = "NodeId")]
    pub node_id: String,

    /// Namespace-qualified browse name.
    #[serde(rename = "BrowseName")]
    pub browse_name: String,

    /// Localized display name.
    #[serde(rename = "DisplayName")]
    pub display_name: String,

    /// Data-type name; empty when the node has none.
    #[serde(rename = "Datatype")]
    pub data_type: String,

    /// Child records in browse order.
    #[serde(rename = "Child")]
    pub children: Vec<NodeRecord>,
}

impl NodeRecord {
    /// Builds a record from a node's identity, its read attributes, and
    /// its already-built children.
    pub fn from_facts(node_id: &NodeId, facts: NodeFacts, children: Vec<NodeRecord>) -> Self {
        Self {
            node_type: facts.node_class.name().to_string(),
            node_id: node_id.to_opc_string(),
            browse_name: facts.browse_name,
            display_name: facts.display_name,
            data_type: facts.data_type,
            children,
        }
    }

    /// Returns the number of records in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeRecord::node_count).sum::<usize>()
    }

    /// Returns the depth of this subtree (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(NodeRecord::depth)
            .max()
            .unwrap_or(0)
    }
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self {
            node_type: NodeClass::Unspecified.name().to_string(),
            node_id: NodeId::null().to_opc_string(),
            browse_name: String::new(),
            display_name: String::new(),
            data_type: String::new(),
            children: Vec::new(),
        }
    }
}

/// Total record count across a forest of root-level records.
pub fn forest_node_count(records: &[NodeRecord]) -> usize {
    records.iter().map(NodeRecord::node_count).sum()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> NodeRecord {
        NodeRecord {
            node_type: "Variable".to_string(),
            node_id: format!("ns=2;s={}", name),
            browse_name: format!("2:{}", name),
            display_name: name.to_string(),
            data_type: "Double".to_string(),
            children: Vec::new(),
        }
    }

    #[test]
    fn test_default_matches_unspecified_shape() {
        let record = NodeRecord::default();
        assert_eq!(record.node_type, "Unspecified");
        assert_eq!(record.node_id, "i=0");
        assert!(record.browse_name.is_empty());
        assert!(record.children.is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let record = leaf("Speed");
        let json = serde_json::to_value(&record).unwrap();

        let object = json.as_object().unwrap();
        for field in ["NodeType", "NodeId", "BrowseName", "DisplayName", "Datatype", "Child"] {
            assert!(object.contains_key(field), "missing field {}", field);
        }
        assert_eq!(object.len(), 6);
        assert_eq!(json["Datatype"], "Double");
    }

    #[test]
    fn test_json_round_trip_preserves_tree() {
        let mut parent = leaf("Axis");
        parent.node_type = "Object".to_string();
        parent.data_type = String::new();
        parent.children = vec![leaf("Speed"), leaf("Torque")];
        let forest = vec![parent, leaf("Status")];

        let json = serde_json::to_string_pretty(&forest).unwrap();
        let parsed: Vec<NodeRecord> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, forest);
        assert_eq!(forest_node_count(&parsed), 4);
    }

    #[test]
    fn test_counts_and_depth() {
        let mut root = leaf("Root");
        root.children = vec![leaf("A"), leaf("B")];
        root.children[0].children = vec![leaf("A1")];

        assert_eq!(root.node_count(), 4);
        assert_eq!(root.depth(), 3);
        assert_eq!(leaf("X").depth(), 1);
    }
}
