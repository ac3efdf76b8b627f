//! # Block
//!
//! The atomic unit of document text. A block has an immutable key, a mutable
//! type and text, and a version counter that advances on every text mutation.
//!
//! Blocks are only reachable through collection guards (see `collection.rs`),
//! so every `&mut Block` implies the caller holds that block's write lock and
//! at least a read lock on its collection.
//!
//! Mutators record `DocumentEvent`s in the block; the guard that handed the
//! block out drains them when it is dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::block_type::BlockType;
use crate::error::{DocumentError, Result};
use crate::events::DocumentEvent;
use crate::keys::BlockKey;
use crate::schema::SchemaNodeId;

/// Slash-separated property name, e.g. `analysis/spelling/ignored`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HierarchicalPath(Vec<String>);

impl HierarchicalPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        match self.0.split_last() {
            Some((_, rest)) if !rest.is_empty() => Some(Self(rest.to_vec())),
            _ => None,
        }
    }

    pub fn starts_with(&self, prefix: &HierarchicalPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl FromStr for HierarchicalPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s.split('/').filter(|segment| !segment.is_empty())))
    }
}

impl fmt::Display for HierarchicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Opaque identity of the plugin that owns a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub u64);

/// Plugin annotation over a character range of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub controller: ControllerId,
    pub payload: serde_json::Value,
}

impl TextSpan {
    pub fn new(start: usize, end: usize, controller: ControllerId, payload: serde_json::Value) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            start,
            end,
            controller,
            payload,
        }
    }
}

/// The `(type, text)` pair the persistence layer reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSnapshot {
    pub block_type: String,
    pub text: String,
}

impl BlockSnapshot {
    pub fn new(block_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            text: text.into(),
        }
    }
}

pub struct Block {
    key: BlockKey,
    block_type: BlockType,
    text: String,
    version: u64,
    parent: Option<BlockKey>,
    structure_node: Option<SchemaNodeId>,
    properties: BTreeMap<HierarchicalPath, String>,
    text_spans: Vec<TextSpan>,
    events: Vec<DocumentEvent>,
}

impl Block {
    pub fn new(key: BlockKey, block_type: BlockType) -> Self {
        Self::with_text(key, block_type, String::new())
    }

    pub fn with_text(key: BlockKey, block_type: BlockType, text: impl Into<String>) -> Self {
        Self {
            key,
            block_type,
            text: text.into(),
            version: 0,
            parent: None,
            structure_node: None,
            properties: BTreeMap::new(),
            text_spans: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn key(&self) -> BlockKey {
        self.key
    }

    pub fn block_type(&self) -> &BlockType {
        &self.block_type
    }

    pub fn type_name(&self) -> &str {
        &self.block_type.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn parent(&self) -> Option<BlockKey> {
        self.parent
    }

    pub fn structure_node(&self) -> Option<SchemaNodeId> {
        self.structure_node
    }

    /// Whether the text has changed since a reader observed `observed_version`
    pub fn is_stale(&self, observed_version: u64) -> bool {
        self.version != observed_version
    }

    /// Replace the whole text. Always bumps the version and raises
    /// `TextChanged`, even when the new text equals the old one.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.text_spans.clear();
        self.touch();
    }

    /// Splice `text` in at character `index`
    pub fn insert_text(&mut self, index: usize, text: &str) -> Result<()> {
        let at = byte_offset(&self.text, index)?;
        self.text.insert_str(at, text);

        let inserted = text.chars().count();
        for span in &mut self.text_spans {
            if span.start >= index {
                span.start += inserted;
            }
            if span.end > index {
                span.end += inserted;
            }
        }
        self.touch();
        Ok(())
    }

    /// Remove the characters between `start` and `end` (either order) and
    /// return them
    pub fn delete_text(&mut self, start: usize, end: usize) -> Result<String> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let from = byte_offset(&self.text, start)?;
        let to = byte_offset(&self.text, end)?;
        let removed: String = self.text.drain(from..to).collect();

        let width = end - start;
        self.text_spans.retain_mut(|span| {
            span.start = shift_after_delete(span.start, start, end, width);
            span.end = shift_after_delete(span.end, start, end, width);
            span.start < span.end
        });
        self.touch();
        Ok(removed)
    }

    /// Returns true if the type changed. Reconciliation is the caller's job
    /// (`CollectionWriteGuard::set_type`).
    pub(crate) fn set_type(&mut self, block_type: BlockType) -> bool {
        if self.block_type == block_type {
            return false;
        }
        let old = std::mem::replace(&mut self.block_type, block_type);
        self.events.push(DocumentEvent::TypeChanged {
            key: self.key,
            old: old.name,
            new: self.block_type.name.clone(),
        });
        true
    }

    /// Returns true if the parent changed
    pub fn set_parent(&mut self, parent: Option<BlockKey>) -> bool {
        if self.parent == parent {
            return false;
        }
        let old = std::mem::replace(&mut self.parent, parent);
        self.events.push(DocumentEvent::ParentChanged {
            key: self.key,
            old,
            new: parent,
        });
        true
    }

    /// Returns true if the schema binding changed
    pub fn set_structure_node(&mut self, node: Option<SchemaNodeId>) -> bool {
        if self.structure_node == node {
            return false;
        }
        self.structure_node = node;
        true
    }

    pub fn property(&self, path: &HierarchicalPath) -> Option<&str> {
        self.properties.get(path).map(String::as_str)
    }

    pub fn set_property(&mut self, path: HierarchicalPath, value: impl Into<String>) -> Option<String> {
        self.properties.insert(path, value.into())
    }

    pub fn remove_property(&mut self, path: &HierarchicalPath) -> Option<String> {
        self.properties.remove(path)
    }

    pub fn properties(&self) -> &BTreeMap<HierarchicalPath, String> {
        &self.properties
    }

    pub fn text_spans(&self) -> &[TextSpan] {
        &self.text_spans
    }

    /// Add a span, keeping the list ordered by start offset
    pub fn add_text_span(&mut self, span: TextSpan) -> Result<()> {
        let len = self.char_len();
        if span.end > len {
            return Err(DocumentError::PositionOutOfBounds { pos: span.end, len });
        }
        let at = self
            .text_spans
            .partition_point(|existing| (existing.start, existing.end) <= (span.start, span.end));
        self.text_spans.insert(at, span);
        Ok(())
    }

    /// Drop every span owned by `controller`, returning how many went
    pub fn remove_spans_for(&mut self, controller: ControllerId) -> usize {
        let before = self.text_spans.len();
        self.text_spans.retain(|span| span.controller != controller);
        before - self.text_spans.len()
    }

    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot::new(self.block_type.name.clone(), self.text.clone())
    }

    /// Continue counting from `floor` if this block's version is behind it
    pub(crate) fn resume_version(&mut self, floor: u64) {
        self.version = self.version.max(floor);
    }

    pub(crate) fn take_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.events)
    }

    fn touch(&mut self) {
        self.version += 1;
        self.events.push(DocumentEvent::TextChanged {
            key: self.key,
            version: self.version,
        });
    }
}

// Pending events belong to the lock scope that raised them, so clones start clean.
impl Clone for Block {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            block_type: self.block_type.clone(),
            text: self.text.clone(),
            version: self.version,
            parent: self.parent,
            structure_node: self.structure_node,
            properties: self.properties.clone(),
            text_spans: self.text_spans.clone(),
            events: Vec::new(),
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("key", &self.key)
            .field("type", &self.block_type.name)
            .field("text", &self.text)
            .field("version", &self.version)
            .field("parent", &self.parent)
            .field("structure_node", &self.structure_node)
            .finish()
    }
}

/// Byte offset of character `index` in `text`. `index == len` is the end.
pub fn byte_offset(text: &str, index: usize) -> Result<usize> {
    if index == 0 {
        return Ok(0);
    }
    let mut count = 0;
    for (byte, _) in text.char_indices() {
        if count == index {
            return Ok(byte);
        }
        count += 1;
    }
    if count == index {
        Ok(text.len())
    } else {
        Err(DocumentError::PositionOutOfBounds { pos: index, len: count })
    }
}

fn shift_after_delete(offset: usize, start: usize, end: usize, width: usize) -> usize {
    if offset >= end {
        offset - width
    } else if offset > start {
        start
    } else {
        offset
    }
}
