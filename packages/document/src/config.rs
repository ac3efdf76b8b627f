use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::block_type::{BlockType, PARAGRAPH};
use crate::error::{DocumentError, Result};

pub const DEFAULT_CONFIG_NAME: &str = "quire.project.json";

/// Project configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Block types in addition to the built-in paragraph
    #[serde(default)]
    pub block_types: Vec<BlockType>,

    /// Root of the structure schema
    #[serde(default = "default_structure")]
    pub structure: StructureConfig,

    /// Maximum undo levels kept by a supervisor (0 = unlimited)
    #[serde(default = "default_undo_limit")]
    pub undo_limit: usize,

    /// Type given to new blocks
    #[serde(default = "default_block_type")]
    pub default_block_type: String,
}

/// One node of the configured structure tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureConfig {
    pub block_type: String,

    #[serde(default)]
    pub min_occurrences: u32,

    /// Absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<u32>,

    #[serde(default)]
    pub children: Vec<StructureConfig>,
}

impl StructureConfig {
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            min_occurrences: 0,
            max_occurrences: None,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: StructureConfig) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_bounds(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_occurrences = min;
        self.max_occurrences = max;
        self
    }
}

fn default_structure() -> StructureConfig {
    StructureConfig::new(PARAGRAPH)
}

fn default_undo_limit() -> usize {
    100
}

fn default_block_type() -> String {
    PARAGRAPH.to_string()
}

impl ProjectConfig {
    /// Load config from a directory, falling back to defaults if absent
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config = Self::from_json(&content)?;
            tracing::info!(path = %config_path.display(), "Loaded project config");
            Ok(config)
        } else {
            tracing::debug!(path = %config_path.display(), "No project config, using defaults");
            Ok(ProjectConfig::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: ProjectConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every type named in the structure tree must be declared
    pub fn validate(&self) -> Result<()> {
        let known = |name: &str| name == PARAGRAPH || self.block_types.iter().any(|t| t.name == name);

        if !known(&self.default_block_type) {
            return Err(DocumentError::Config(format!(
                "default block type '{}' is not declared",
                self.default_block_type
            )));
        }

        let mut stack = vec![&self.structure];
        while let Some(node) = stack.pop() {
            if !known(&node.block_type) {
                return Err(DocumentError::Config(format!(
                    "structure references undeclared block type '{}'",
                    node.block_type
                )));
            }
            if let Some(max) = node.max_occurrences {
                if max < node.min_occurrences {
                    return Err(DocumentError::Config(format!(
                        "'{}' has maxOccurrences {} below minOccurrences {}",
                        node.block_type, max, node.min_occurrences
                    )));
                }
            }
            stack.extend(node.children.iter());
        }
        Ok(())
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            block_types: vec![],
            structure: default_structure(),
            undo_limit: default_undo_limit(),
            default_block_type: default_block_type(),
        }
    }
}
