//! Error types for the document model

use thiserror::Error;

use crate::keys::BlockKey;
use crate::schema::SchemaNodeId;

#[derive(Error, Debug)]
pub enum DocumentError {
    /// A key was looked up that is not in the collection. Keys are only handed
    /// out for live blocks, so callers should treat this as a bug.
    #[error("Block not found: {0}")]
    BlockNotFound(BlockKey),

    #[error("Block index {index} out of bounds for collection of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Text position {pos} out of bounds for block text of length {len}")]
    PositionOutOfBounds { pos: usize, len: usize },

    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    #[error("Cannot remove system block type: {0}")]
    SystemTypeRemoval(String),

    #[error("Schema node {0} is already attached to a parent")]
    SchemaNodeAlreadyAttached(SchemaNodeId),

    #[error("Attaching schema node {0} would create a cycle")]
    SchemaCycle(SchemaNodeId),

    #[error("Unknown schema node: {0}")]
    UnknownSchemaNode(SchemaNodeId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the document crate
pub type Result<T> = std::result::Result<T, DocumentError>;
