//! # Project
//!
//! Everything a document shares with its siblings: the block type registry,
//! the structure schema, and the key generator.
//!
//! Lock order: a collection guard is always taken before the project's
//! registry or schema locks, never the other way round.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::block_type::{BlockType, BlockTypeRegistry};
use crate::config::{ProjectConfig, StructureConfig};
use crate::error::Result;
use crate::keys::{BlockKey, KeyGenerator};
use crate::schema::{BlockStructureSchema, SchemaNodeId};

#[derive(Debug)]
pub struct Project {
    registry: RwLock<BlockTypeRegistry>,
    schema: RwLock<BlockStructureSchema>,
    keys: KeyGenerator,
    default_block_type: String,
    undo_limit: usize,
}

impl Project {
    pub fn new(registry: BlockTypeRegistry, schema: BlockStructureSchema) -> Self {
        let defaults = ProjectConfig::default();
        Self {
            registry: RwLock::new(registry),
            schema: RwLock::new(schema),
            keys: KeyGenerator::new(),
            default_block_type: defaults.default_block_type,
            undo_limit: defaults.undo_limit,
        }
    }

    /// Build registry and schema from configuration
    pub fn from_config(config: &ProjectConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = BlockTypeRegistry::new();
        for block_type in &config.block_types {
            registry.add(block_type.clone());
        }

        let mut schema = BlockStructureSchema::new(config.structure.block_type.clone());
        let root = schema.root();
        add_structure_children(&mut schema, root, &config.structure)?;

        tracing::debug!(
            block_types = registry.len(),
            schema_nodes = schema.len(),
            "Built project from config"
        );

        Ok(Self {
            registry: RwLock::new(registry),
            schema: RwLock::new(schema),
            keys: KeyGenerator::new(),
            default_block_type: config.default_block_type.clone(),
            undo_limit: config.undo_limit,
        })
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, BlockTypeRegistry> {
        self.registry.read_recursive()
    }

    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, BlockTypeRegistry> {
        self.registry.write()
    }

    pub fn schema(&self) -> RwLockReadGuard<'_, BlockStructureSchema> {
        self.schema.read_recursive()
    }

    pub fn schema_mut(&self) -> RwLockWriteGuard<'_, BlockStructureSchema> {
        self.schema.write()
    }

    pub fn keys(&self) -> &KeyGenerator {
        &self.keys
    }

    pub fn next_key(&self) -> BlockKey {
        self.keys.next_key()
    }

    /// Type given to new and placeholder blocks
    pub fn default_block_type(&self) -> BlockType {
        let registry = self.registry();
        registry
            .get(&self.default_block_type)
            .cloned()
            .unwrap_or_else(|| registry.paragraph())
    }

    /// Resolve a type name against the registry
    pub fn block_type(&self, name: &str) -> Result<BlockType> {
        self.registry().resolve(name).cloned()
    }

    pub fn undo_limit(&self) -> usize {
        self.undo_limit
    }
}

impl Default for Project {
    fn default() -> Self {
        let registry = BlockTypeRegistry::new();
        let schema = BlockStructureSchema::new(registry.paragraph().name);
        Self::new(registry, schema)
    }
}

fn add_structure_children(
    schema: &mut BlockStructureSchema,
    parent: SchemaNodeId,
    config: &StructureConfig,
) -> Result<()> {
    for child in &config.children {
        let id = schema.add_child(
            parent,
            child.block_type.clone(),
            child.min_occurrences,
            child.max_occurrences,
        )?;
        add_structure_children(schema, id, child)?;
    }
    Ok(())
}
