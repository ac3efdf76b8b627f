//! Block types and the per-project registry

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};

/// Name of the system type every registry carries
pub const PARAGRAPH: &str = "Paragraph";

/// A named category of block (Chapter, Scene, Paragraph, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockType {
    pub name: String,

    /// May have other blocks logically nested beneath it
    #[serde(default, rename = "structural")]
    pub is_structural: bool,

    /// Cannot be removed by the user
    #[serde(default, rename = "system")]
    pub is_system: bool,
}

impl BlockType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_structural: false,
            is_system: false,
        }
    }

    pub fn structural(name: impl Into<String>) -> Self {
        Self {
            is_structural: true,
            ..Self::new(name)
        }
    }

    pub fn paragraph() -> Self {
        Self {
            name: PARAGRAPH.to_string(),
            is_structural: false,
            is_system: true,
        }
    }

    pub fn with_system(mut self, is_system: bool) -> Self {
        self.is_system = is_system;
        self
    }
}

/// Name-keyed store of the block types a project knows about
#[derive(Debug, Clone)]
pub struct BlockTypeRegistry {
    types: BTreeMap<String, BlockType>,
}

impl BlockTypeRegistry {
    /// Registry holding only the system paragraph type
    pub fn new() -> Self {
        let mut types = BTreeMap::new();
        let paragraph = BlockType::paragraph();
        types.insert(paragraph.name.clone(), paragraph);
        Self { types }
    }

    /// Add a type, replacing any type with the same name
    pub fn add(&mut self, block_type: BlockType) {
        self.types.insert(block_type.name.clone(), block_type);
    }

    pub fn remove(&mut self, name: &str) -> Result<BlockType> {
        match self.types.get(name) {
            None => Err(DocumentError::UnknownBlockType(name.to_string())),
            Some(block_type) if block_type.is_system => {
                Err(DocumentError::SystemTypeRemoval(name.to_string()))
            }
            Some(_) => self
                .types
                .remove(name)
                .ok_or_else(|| DocumentError::UnknownBlockType(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&BlockType> {
        self.types.get(name)
    }

    /// Like `get`, but an absent name is an error
    pub fn resolve(&self, name: &str) -> Result<&BlockType> {
        self.get(name)
            .ok_or_else(|| DocumentError::UnknownBlockType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The system paragraph type
    pub fn paragraph(&self) -> BlockType {
        self.types
            .get(PARAGRAPH)
            .cloned()
            .unwrap_or_else(BlockType::paragraph)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for BlockTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
