// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The traversal engine.
//!
//! [`TreeWalker`] drives a depth-bounded, cycle-safe walk of the address
//! space from a root node, assembling a [`NodeRecord`] forest. Instead of
//! call-stack recursion it runs an explicit worklist (a stack of
//! visit/build frames) plus an index-addressed visited table, so the depth
//! bound and the cycle check are testable without a network layer — the
//! browser and reader are injected through the [`Browse`] and [`ReadBatch`]
//! seams.
//!
//! # Algorithm
//!
//! For each reference on the frontier:
//!
//! 1. If the reference's identity is already in the visited table, or its
//!    recursion depth exceeds the configured maximum, do not descend; the
//!    node still gets a record (attributes are read) with an empty child
//!    list.
//! 2. Otherwise mark the reference visited, browse its target, and process
//!    the children first; the record is built after its children are known
//!    (post-order) from one batched read of the five tree attributes.
//! 3. Records are appended to the parent's child list in browse order.
//!
//! The visited key is the *reference*'s identity (source, reference type,
//! target) — NOT the target node id. Two distinct references to the same
//! target are each traversed once; only a literal repeat of the same
//! reference within one traversal is skipped. This is deliberate and must
//! not be "fixed" to key on the target id: the dedup key shapes the output
//! tree, and termination is guaranteed by the depth bound regardless.
//!
//! Any browse or read failure aborts the entire walk with a single
//! [`TraversalError`]; there is no partial-result mode. A walk does not
//! observe session replacement: each remote call goes through the
//! coordinator accessor, and a call landing while the session is dead
//! simply fails the walk.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use tracing::{debug, info};

use crate::browse::Browse;
use crate::error::TraversalError;
use crate::read::{NodeFacts, ReadBatch};
use crate::session::SessionCoordinator;
use crate::transport::UaReference;
use crate::tree::{forest_node_count, NodeRecord};
use crate::types::{NodeId, TREE_ATTRIBUTES};

// =============================================================================
// ReferenceKey / VisitedTable
// =============================================================================

/// Identity of one traversed reference: the edge, not its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    source: NodeId,
    reference_type: NodeId,
    target: NodeId,
}

impl ReferenceKey {
    /// Builds the key for a reference browsed from `source`.
    pub fn of(source: &NodeId, reference: &UaReference) -> Self {
        Self {
            source: source.clone(),
            reference_type: reference.reference_type_id.clone(),
            target: reference.target_id.clone(),
        }
    }
}

/// Index-addressed visited table, scoped to one traversal.
///
/// Keys are interned to dense indices; the flags live in a plain vector.
#[derive(Debug, Default)]
pub struct VisitedTable {
    index: HashMap<ReferenceKey, usize>,
    visited: Vec<bool>,
}

impl VisitedTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a reference visited. Returns `true` on the first visit,
    /// `false` if it was already marked.
    pub fn mark(&mut self, key: ReferenceKey) -> bool {
        let slot = *self.index.entry(key).or_insert_with(|| {
            self.visited.push(false);
            self.visited.len() - 1
        });

        if self.visited[slot] {
            false
        } else {
            self.visited[slot] = true;
            true
        }
    }

    /// Number of marked references.
    pub fn len(&self) -> usize {
        self.visited.iter().filter(|v| **v).count()
    }

    /// Returns `true` if nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// TreeWalker
// =============================================================================

/// Walks the address space and assembles the node tree.
pub struct TreeWalker<B, R> {
    browser: B,
    reader: R,
    max_depth: u32,
}

/// One worklist frame.
///
/// `Visit` decides whether to descend through a reference and expands its
/// target; `Build` runs after the subtree below `slot` is complete and
/// constructs the record.
enum Frame {
    Visit {
        source: NodeId,
        reference: UaReference,
        depth: u32,
        parent_slot: usize,
    },
    Build {
        reference: UaReference,
        slot: usize,
        parent_slot: usize,
    },
}

impl<B: Browse, R: ReadBatch> TreeWalker<B, R> {
    /// Creates a walker with the given depth bound.
    pub fn new(browser: B, reader: R, max_depth: u32) -> Self {
        Self {
            browser,
            reader,
            max_depth,
        }
    }

    /// Walks the tree below `root` and returns the root's child records in
    /// browse order. The root itself gets no record.
    pub async fn traverse(&self, root: &NodeId) -> Result<Vec<NodeRecord>, TraversalError> {
        let mut visited = VisitedTable::new();
        let mut buffers: Vec<Vec<NodeRecord>> = vec![Vec::new()];
        let mut stack: Vec<Frame> = Vec::new();

        debug!(root = %root, max_depth = self.max_depth, "starting traversal");

        let root_references = self
            .browser
            .browse(root)
            .await
            .map_err(|e| TraversalError::browse(root.to_opc_string(), e))?;

        // Reversed so the stack pops references in browse order.
        for reference in root_references.into_iter().rev() {
            stack.push(Frame::Visit {
                source: root.clone(),
                reference,
                depth: 1,
                parent_slot: 0,
            });
        }

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Visit {
                    source,
                    reference,
                    depth,
                    parent_slot,
                } => {
                    self.visit(
                        source,
                        reference,
                        depth,
                        parent_slot,
                        &mut visited,
                        &mut buffers,
                        &mut stack,
                    )
                    .await?;
                }
                Frame::Build {
                    reference,
                    slot,
                    parent_slot,
                } => {
                    let children = mem::take(&mut buffers[slot]);
                    let record = self.build_record(&reference, children).await?;
                    buffers[parent_slot].push(record);
                }
            }
        }

        let forest = mem::take(&mut buffers[0]);
        info!(
            root = %root,
            nodes = forest_node_count(&forest),
            references_visited = visited.len(),
            "traversal complete"
        );
        Ok(forest)
    }

    /// Expands one reference: allocates its child buffer, schedules its
    /// build, and — when the depth bound and the visited table allow —
    /// browses the target and schedules its children.
    #[allow(clippy::too_many_arguments)]
    async fn visit(
        &self,
        source: NodeId,
        reference: UaReference,
        depth: u32,
        parent_slot: usize,
        visited: &mut VisitedTable,
        buffers: &mut Vec<Vec<NodeRecord>>,
        stack: &mut Vec<Frame>,
    ) -> Result<(), TraversalError> {
        // Depth check first: a reference past the bound is not marked
        // visited, exactly as in the recursive formulation.
        let descend = depth <= self.max_depth && visited.mark(ReferenceKey::of(&source, &reference));

        let slot = buffers.len();
        buffers.push(Vec::new());
        let target = reference.target_id.clone();
        stack.push(Frame::Build {
            reference,
            slot,
            parent_slot,
        });

        if !descend {
            return Ok(());
        }

        let child_references = self
            .browser
            .browse(&target)
            .await
            .map_err(|e| TraversalError::browse(target.to_opc_string(), e))?;

        for child in child_references.into_iter().rev() {
            stack.push(Frame::Visit {
                source: target.clone(),
                reference: child,
                depth: depth + 1,
                parent_slot: slot,
            });
        }

        Ok(())
    }

    /// Reads the five tree attributes in one batch and assembles the
    /// record around the already-built children.
    async fn build_record(
        &self,
        reference: &UaReference,
        children: Vec<NodeRecord>,
    ) -> Result<NodeRecord, TraversalError> {
        let target = &reference.target_id;
        let values = self
            .reader
            .read_attributes(target, &TREE_ATTRIBUTES)
            .await
            .map_err(|e| TraversalError::read(target.to_opc_string(), e))?;

        // The record's NodeId comes from the reference, not from the read
        // NodeId attribute; the attribute is still part of the fixed batch.
        let facts = NodeFacts::from_values(&values);
        Ok(NodeRecord::from_facts(target, facts, children))
    }
}

impl TreeWalker<crate::browse::ReferenceBrowser, crate::read::AttributeReader> {
    /// Builds a walker over a live session, with the browser, reader, and
    /// depth bound taken from the coordinator's configuration.
    pub fn over_session(coordinator: Arc<SessionCoordinator>) -> Self {
        let max_depth = coordinator.config().max_depth;
        Self::new(
            crate::browse::ReferenceBrowser::new(Arc::clone(&coordinator)),
            crate::read::AttributeReader::new(coordinator),
            max_depth,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{BrowseError, ReadError};
    use crate::transport::{AttributeValue, UaValue};
    use crate::types::{AttributeId, NodeClass};

    fn organizes() -> NodeId {
        NodeId::numeric(0, 35)
    }

    fn node(name: &str) -> NodeId {
        NodeId::string(2, name)
    }

    fn reference(target: &NodeId) -> UaReference {
        UaReference::new(
            organizes(),
            target.clone(),
            NodeClass::Object,
            format!("2:{}", target),
        )
    }

    /// Scripted graph; browsing an absent node yields no references.
    struct FakeGraph {
        edges: HashMap<NodeId, Vec<UaReference>>,
        fail_on: Option<NodeId>,
    }

    impl FakeGraph {
        fn new(edges: &[(&NodeId, &[&NodeId])]) -> Self {
            let mut map = HashMap::new();
            for (source, targets) in edges {
                map.insert(
                    (*source).clone(),
                    targets.iter().map(|t| reference(t)).collect(),
                );
            }
            Self {
                edges: map,
                fail_on: None,
            }
        }

        fn failing_at(mut self, node: NodeId) -> Self {
            self.fail_on = Some(node);
            self
        }
    }

    #[async_trait]
    impl Browse for FakeGraph {
        async fn browse(&self, node_id: &NodeId) -> Result<Vec<UaReference>, BrowseError> {
            if self.fail_on.as_ref() == Some(node_id) {
                return Err(BrowseError::browse_failed(
                    node_id.to_opc_string(),
                    "scripted failure",
                ));
            }
            Ok(self.edges.get(node_id).cloned().unwrap_or_default())
        }
    }

    /// Answers every batch with a full good attribute set derived from the
    /// node id.
    struct FakeReader {
        fail_on: Option<NodeId>,
    }

    impl FakeReader {
        fn new() -> Self {
            Self { fail_on: None }
        }

        fn failing_at(node: NodeId) -> Self {
            Self { fail_on: Some(node) }
        }
    }

    #[async_trait]
    impl ReadBatch for FakeReader {
        async fn read_attributes(
            &self,
            node_id: &NodeId,
            attributes: &[AttributeId],
        ) -> Result<Vec<AttributeValue>, ReadError> {
            if self.fail_on.as_ref() == Some(node_id) {
                return Err(ReadError::read_failed(
                    node_id.to_opc_string(),
                    "scripted failure",
                ));
            }
            let name = node_id.to_opc_string();
            Ok(attributes
                .iter()
                .map(|a| match a {
                    AttributeId::NodeId => {
                        AttributeValue::good(*a, UaValue::Id(node_id.clone()))
                    }
                    AttributeId::NodeClass => AttributeValue::good(*a, UaValue::Int32(1)),
                    AttributeId::BrowseName => {
                        AttributeValue::good(*a, UaValue::Text(format!("2:{}", name)))
                    }
                    AttributeId::DisplayName => {
                        AttributeValue::good(*a, UaValue::Text(name.clone()))
                    }
                    AttributeId::DataType => AttributeValue::bad(*a, 0x8035_0000),
                })
                .collect())
        }
    }

    fn walker(graph: FakeGraph) -> TreeWalker<FakeGraph, FakeReader> {
        TreeWalker::new(graph, FakeReader::new(), 10)
    }

    #[tokio::test]
    async fn test_two_children_in_browse_order() {
        let (root, a, b) = (node("Root"), node("A"), node("B"));
        let graph = FakeGraph::new(&[(&root, &[&a, &b][..])]);

        let forest = walker(graph).traverse(&root).await.unwrap();

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].node_id, a.to_opc_string());
        assert_eq!(forest[1].node_id, b.to_opc_string());
        assert!(forest[0].children.is_empty());
        assert!(forest[1].children.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        // A -> B -> A: the second expansion of A re-encounters the same
        // A -> B reference, which the visited table skips.
        let (root, a, b) = (node("Root"), node("A"), node("B"));
        let graph = FakeGraph::new(&[
            (&root, &[&a][..]),
            (&a, &[&b][..]),
            (&b, &[&a][..]),
        ]);

        let forest = walker(graph).traverse(&root).await.unwrap();

        // Root -> A -> B -> A (distinct reference B->A) -> B (skipped).
        assert_eq!(forest.len(), 1);
        let a1 = &forest[0];
        let b1 = &a1.children[0];
        let a2 = &b1.children[0];
        let b2 = &a2.children[0];
        assert_eq!(a2.node_id, a.to_opc_string());
        assert!(b2.children.is_empty());
    }

    #[tokio::test]
    async fn test_self_loop_not_re_expanded() {
        let (root, a) = (node("Root"), node("A"));
        let graph = FakeGraph::new(&[(&root, &[&a][..]), (&a, &[&a][..])]);

        let forest = walker(graph).traverse(&root).await.unwrap();

        // The A -> A reference repeats identically and is skipped on the
        // second encounter.
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children.len(), 1);
        assert!(forest[0].children[0].children.is_empty());
    }

    #[tokio::test]
    async fn test_depth_bound_stops_descent() {
        // Linear chain deeper than the bound.
        let chain: Vec<NodeId> = (0..20).map(|i| node(&format!("N{}", i))).collect();
        let root = node("Root");
        let mut edges: Vec<(&NodeId, &[&NodeId])> = Vec::new();
        let singles: Vec<[&NodeId; 1]> = chain.iter().map(|n| [n]).collect();
        edges.push((&root, &singles[0][..]));
        for i in 0..chain.len() - 1 {
            edges.push((&chain[i], &singles[i + 1][..]));
        }
        let graph = FakeGraph::new(&edges);

        let forest = walker(graph).traverse(&root).await.unwrap();

        // References at depths 1..=10 descend; the reference at depth 11
        // still gets a record but contributes an empty child list.
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].depth(), 11);
    }

    #[tokio::test]
    async fn test_browse_failure_aborts_whole_walk() {
        let (root, a, b) = (node("Root"), node("A"), node("B"));
        let graph =
            FakeGraph::new(&[(&root, &[&a, &b][..])]).failing_at(b.clone());

        let err = walker(graph).traverse(&root).await.unwrap_err();
        assert_eq!(err.node_id(), b.to_opc_string());
    }

    #[tokio::test]
    async fn test_read_failure_aborts_whole_walk() {
        let (root, a) = (node("Root"), node("A"));
        let graph = FakeGraph::new(&[(&root, &[&a][..])]);
        let reader = FakeReader::failing_at(a.clone());

        let err = TreeWalker::new(graph, reader, 10)
            .traverse(&root)
            .await
            .unwrap_err();
        assert!(matches!(err, TraversalError::Read { .. }));
    }

    #[tokio::test]
    async fn test_post_order_preserves_nested_browse_order() {
        let (root, a, b, a1, a2) = (node("Root"), node("A"), node("B"), node("A1"), node("A2"));
        let graph = FakeGraph::new(&[
            (&root, &[&a, &b][..]),
            (&a, &[&a1, &a2][..]),
        ]);

        let forest = walker(graph).traverse(&root).await.unwrap();

        assert_eq!(forest.len(), 2);
        let children: Vec<&str> = forest[0]
            .children
            .iter()
            .map(|c| c.node_id.as_str())
            .collect();
        assert_eq!(children, vec!["ns=2;s=A1", "ns=2;s=A2"]);
    }

    #[test]
    fn test_visited_table_marks_once() {
        let mut table = VisitedTable::new();
        let key = ReferenceKey::of(&node("A"), &reference(&node("B")));

        assert!(table.is_empty());
        assert!(table.mark(key.clone()));
        assert!(!table.mark(key));
        assert_eq!(table.len(), 1);

        // A different edge to the same target is a distinct key.
        let other = ReferenceKey::of(&node("C"), &reference(&node("B")));
        assert!(table.mark(other));
        assert_eq!(table.len(), 2);
    }
}
