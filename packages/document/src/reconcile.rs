//! # Structure Reconciliation
//!
//! Re-derives every block's parent and schema node after block types change.
//!
//! Single forward pass. Block 0 is bound to the schema root with no parent.
//! For each later block, scan backwards over the preceding blocks (down to
//! index 1); the nearest one whose schema node has a child admitting this
//! block's type becomes the parent, and that child becomes the block's node.
//! Nearest wins, not best fit. Without a match the parent is block 0 and the
//! node is the root's child for the type, or the root itself.
//!
//! Worst case O(n²). Only structural edits run it, never plain typing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::block::Block;
use crate::collection::{BlockSequence, CollectionWriteGuard};
use crate::events::EventQueue;
use crate::keys::BlockKey;
use crate::schema::{BlockStructureSchema, SchemaNodeId};

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub blocks_scanned: usize,
    pub parents_changed: usize,
    pub nodes_changed: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.parents_changed > 0 || self.nodes_changed > 0
    }
}

/// A schema node whose occurrence bounds are not met under some parent block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceViolation {
    pub parent: BlockKey,
    pub node: SchemaNodeId,
    pub block_type: String,
    pub count: u32,
    pub min: u32,
    pub max: Option<u32>,
}

pub struct StructureReconciler;

impl StructureReconciler {
    /// Reconcile the collection held by `guard`
    pub fn reconcile(guard: &mut CollectionWriteGuard<'_>) -> ReconcileReport {
        guard.reconcile()
    }

    pub(crate) fn reconcile_sequence(
        sequence: &BlockSequence,
        schema: &BlockStructureSchema,
        events: &EventQueue,
    ) -> ReconcileReport {
        let cells = sequence.cells();
        let root = schema.root();

        let (keys, types): (Vec<BlockKey>, Vec<String>) = cells
            .iter()
            .map(|cell| {
                let block = cell.read();
                (block.key(), block.type_name().to_string())
            })
            .unzip();

        let mut nodes: Vec<SchemaNodeId> = Vec::with_capacity(cells.len());
        let mut report = ReconcileReport {
            blocks_scanned: cells.len(),
            ..Default::default()
        };

        for (i, cell) in cells.iter().enumerate() {
            let (parent, node) = if i == 0 {
                (None, root)
            } else {
                let nearest = (1..i).rev().find_map(|j| {
                    schema
                        .child_for_type(nodes[j], &types[i])
                        .map(|child| (keys[j], child))
                });
                match nearest {
                    Some((parent, child)) => (Some(parent), child),
                    None => (
                        Some(keys[0]),
                        schema.child_for_type(root, &types[i]).unwrap_or(root),
                    ),
                }
            };
            nodes.push(node);
            apply(cell, parent, node, events, &mut report);
        }

        tracing::debug!(
            blocks = report.blocks_scanned,
            parents_changed = report.parents_changed,
            nodes_changed = report.nodes_changed,
            "Reconciled block structure"
        );
        report
    }

    /// Count children per parent block and report schema nodes whose
    /// occurrence bounds are not met. Bounds are advisory; nothing is repaired.
    pub fn occurrence_violations(
        sequence: &BlockSequence,
        schema: &BlockStructureSchema,
    ) -> Vec<OccurrenceViolation> {
        let mut counts: HashMap<(BlockKey, SchemaNodeId), u32> = HashMap::new();
        let mut bound: Vec<(BlockKey, SchemaNodeId)> = Vec::new();

        for block in sequence.iter() {
            if let Some(node) = block.structure_node() {
                bound.push((block.key(), node));
                if let Some(parent) = block.parent() {
                    *counts.entry((parent, node)).or_default() += 1;
                }
            }
        }

        let mut violations = Vec::new();
        for (key, node) in bound {
            let Ok(parent_node) = schema.node(node) else {
                continue;
            };
            for &child in parent_node.children() {
                let Ok(child_node) = schema.node(child) else {
                    continue;
                };
                let count = counts.get(&(key, child)).copied().unwrap_or(0);
                if !child_node.admits(count) {
                    violations.push(OccurrenceViolation {
                        parent: key,
                        node: child,
                        block_type: child_node.block_type.clone(),
                        count,
                        min: child_node.min_occurrences,
                        max: child_node.max_occurrences,
                    });
                }
            }
        }
        violations
    }
}

fn apply(
    cell: &Arc<RwLock<Block>>,
    parent: Option<BlockKey>,
    node: SchemaNodeId,
    events: &EventQueue,
    report: &mut ReconcileReport,
) {
    let mut block = cell.write();
    if block.set_parent(parent) {
        report.parents_changed += 1;
    }
    if block.set_structure_node(Some(node)) {
        report.nodes_changed += 1;
    }
    events.extend(block.take_events());
}
