//! # Block Structure Schema
//!
//! A tree describing which block types may nest under which, with occurrence
//! bounds. The project owns one schema; it is edited by configuration, never
//! by normal editing commands.
//!
//! Nodes live in an arena and refer to each other by `SchemaNodeId`, so blocks
//! can hold a node id without borrowing the schema.
//!
//! ```text
//! Chapter (root)
//! ├── Epigraph   0..1
//! └── Scene      0..*
//!     └── Paragraph 0..*
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaNodeId(usize);

impl SchemaNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SchemaNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// One node of the schema tree
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// Name of the block type this node admits
    pub block_type: String,
    pub min_occurrences: u32,
    /// `None` means unbounded
    pub max_occurrences: Option<u32>,
    children: Vec<SchemaNodeId>,
    parent: Option<SchemaNodeId>,
}

impl SchemaNode {
    pub fn children(&self) -> &[SchemaNodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<SchemaNodeId> {
        self.parent
    }

    /// Whether `count` siblings of this node are within bounds
    pub fn admits(&self, count: u32) -> bool {
        count >= self.min_occurrences && self.max_occurrences.map_or(true, |max| count <= max)
    }
}

#[derive(Debug, Clone)]
pub struct BlockStructureSchema {
    nodes: Vec<SchemaNode>,
}

impl BlockStructureSchema {
    /// Create a schema whose root admits `root_type`
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            nodes: vec![SchemaNode {
                block_type: root_type.into(),
                min_occurrences: 1,
                max_occurrences: Some(1),
                children: Vec::new(),
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> SchemaNodeId {
        SchemaNodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: SchemaNodeId) -> Result<&SchemaNode> {
        self.nodes
            .get(id.0)
            .ok_or(DocumentError::UnknownSchemaNode(id))
    }

    /// Create a node that is not yet part of the tree
    pub fn create_node(
        &mut self,
        block_type: impl Into<String>,
        min_occurrences: u32,
        max_occurrences: Option<u32>,
    ) -> SchemaNodeId {
        let id = SchemaNodeId(self.nodes.len());
        self.nodes.push(SchemaNode {
            block_type: block_type.into(),
            min_occurrences,
            max_occurrences,
            children: Vec::new(),
            parent: None,
        });
        id
    }

    /// Attach a detached node under `parent`
    pub fn attach_child(&mut self, parent: SchemaNodeId, child: SchemaNodeId) -> Result<()> {
        self.node(parent)?;
        let child_node = self.node(child)?;

        if child_node.parent.is_some() || child == self.root() {
            return Err(DocumentError::SchemaNodeAlreadyAttached(child));
        }
        if parent == child || self.ancestors(parent).contains(&child) {
            return Err(DocumentError::SchemaCycle(child));
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Create a node and attach it under `parent` in one step
    pub fn add_child(
        &mut self,
        parent: SchemaNodeId,
        block_type: impl Into<String>,
        min_occurrences: u32,
        max_occurrences: Option<u32>,
    ) -> Result<SchemaNodeId> {
        self.node(parent)?;
        let child = self.create_node(block_type, min_occurrences, max_occurrences);
        self.attach_child(parent, child)?;
        Ok(child)
    }

    /// The first child of `node` admitting `block_type`
    pub fn child_for_type(&self, node: SchemaNodeId, block_type: &str) -> Option<SchemaNodeId> {
        self.nodes.get(node.0)?.children.iter().copied().find(|child| {
            self.nodes
                .get(child.0)
                .is_some_and(|n| n.block_type == block_type)
        })
    }

    /// Parent chain of `node`, nearest first
    pub fn ancestors(&self, node: SchemaNodeId) -> Vec<SchemaNodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.nodes.get(node.0).and_then(|n| n.parent);
        while let Some(id) = current {
            if ancestors.len() >= self.nodes.len() {
                break;
            }
            ancestors.push(id);
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        ancestors
    }

    /// Whether `node` is the root or hangs off it
    pub fn is_attached(&self, node: SchemaNodeId) -> bool {
        node == self.root() || self.ancestors(node).last() == Some(&self.root())
    }

    /// Whether `node` is a direct child of `parent`
    pub fn is_child_of(&self, node: SchemaNodeId, parent: SchemaNodeId) -> bool {
        self.nodes
            .get(node.0)
            .is_some_and(|n| n.parent == Some(parent))
    }

    /// Nodes reachable from the root, depth first
    pub fn walk(&self) -> Vec<SchemaNodeId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.nodes.get(id.0) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }
}
