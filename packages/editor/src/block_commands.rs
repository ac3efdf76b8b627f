//! # Block Commands
//!
//! Undoable changes to the block sequence itself: retyping, deleting and
//! inserting whole blocks. Every command here reconciles the structure after
//! it changes the sequence.
//!
//! Commands that mint keys (placeholders, inserted blocks) keep them and
//! reuse them when executed again, so redo recreates the same blocks.

use quire_document::{Block, BlockKey, BlockPosition, BlockRemoval};

use crate::command::{BlockCommand, BlockCommandContext, LockScope};
use crate::composite::CompositeCommand;
use crate::errors::{CommandError, CommandResult};

/// Change a block's type by registry name
#[derive(Debug, Clone)]
pub struct SetBlockTypeCommand {
    key: BlockKey,
    block_type: String,
    previous: Option<String>,
}

impl SetBlockTypeCommand {
    pub fn new(key: BlockKey, block_type: impl Into<String>) -> Self {
        Self {
            key,
            block_type: block_type.into(),
            previous: None,
        }
    }
}

impl BlockCommand for SetBlockTypeCommand {
    fn name(&self) -> &'static str {
        "SetBlockType"
    }

    fn lock_scope(&self) -> LockScope {
        // Reconciliation may reparent any later block
        LockScope::MultipleBlocks
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let block_type = ctx.project().block_type(&self.block_type)?;
        let guard = ctx.collection();
        let previous = guard.block(self.key)?.type_name().to_string();
        let changed = guard.set_type(self.key, block_type)?;

        tracing::debug!(key = %self.key, from = %previous, to = %self.block_type, changed, "Set block type");
        self.previous = Some(previous);
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        let previous = self
            .previous
            .clone()
            .ok_or(CommandError::NotExecuted(self.name()))?;
        Ok(Box::new(SetBlockTypeCommand::new(self.key, previous)))
    }
}

/// Remove one block. Deleting the only block leaves a paragraph placeholder.
#[derive(Debug, Clone)]
pub struct DeleteBlockCommand {
    key: BlockKey,
    placeholder_key: Option<BlockKey>,
    removed: Option<BlockRemoval>,
}

impl DeleteBlockCommand {
    pub fn new(key: BlockKey) -> Self {
        Self {
            key,
            placeholder_key: None,
            removed: None,
        }
    }

    /// Delete that reuses `placeholder` as the placeholder's key if one is needed
    pub fn with_placeholder(key: BlockKey, placeholder: Option<BlockKey>) -> Self {
        Self {
            placeholder_key: placeholder,
            ..Self::new(key)
        }
    }

    /// What the last execution took out
    pub fn removed(&self) -> Option<&BlockRemoval> {
        self.removed.as_ref()
    }
}

impl BlockCommand for DeleteBlockCommand {
    fn name(&self) -> &'static str {
        "DeleteBlock"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::MultipleBlocks
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let guard = ctx.collection();
        let index = guard.index_of(self.key)?;
        let removal = guard.remove_at_with(index, self.placeholder_key)?;
        guard.reconcile();

        // The block that slid into the deleted slot, or the new last block
        let focus = guard.key_at(index.min(guard.len() - 1))?;

        tracing::debug!(key = %self.key, index, placeholder = ?removal.placeholder, "Deleted block");
        self.placeholder_key = removal.placeholder.or(self.placeholder_key);
        self.removed = Some(removal);
        ctx.set_position(BlockPosition::start_of(focus));
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        let removal = self
            .removed
            .as_ref()
            .ok_or(CommandError::NotExecuted(self.name()))?;
        Ok(Box::new(RestoreBlockCommand::new(removal.clone())))
    }
}

/// Put a removed block back where it was, dropping the placeholder that
/// stood in for it
#[derive(Debug, Clone)]
pub struct RestoreBlockCommand {
    block: Block,
    index: usize,
    placeholder: Option<BlockKey>,
}

impl RestoreBlockCommand {
    pub fn new(removal: BlockRemoval) -> Self {
        Self {
            block: removal.block,
            index: removal.index,
            placeholder: removal.placeholder,
        }
    }
}

impl BlockCommand for RestoreBlockCommand {
    fn name(&self) -> &'static str {
        "RestoreBlock"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::MultipleBlocks
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let guard = ctx.collection();
        let key = guard.insert(self.index, self.block.clone())?;
        // Insert first so the collection never empties
        if let Some(placeholder) = self.placeholder {
            guard.remove(placeholder)?;
        }
        guard.reconcile();
        let end = guard.block(key)?.char_len();

        tracing::debug!(%key, index = self.index, "Restored block");
        ctx.set_position(BlockPosition::new(key, end));
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        Ok(Box::new(DeleteBlockCommand::with_placeholder(
            self.block.key(),
            self.placeholder,
        )))
    }
}

/// Insert `count` empty blocks of the default type right after a block
#[derive(Debug, Clone)]
pub struct InsertAfterBlockCommand {
    key: BlockKey,
    count: usize,
    created: Vec<BlockKey>,
}

impl InsertAfterBlockCommand {
    pub fn new(key: BlockKey, count: usize) -> Self {
        Self {
            key,
            count,
            created: Vec::new(),
        }
    }

    /// Keys of the inserted blocks, in document order
    pub fn created(&self) -> &[BlockKey] {
        &self.created
    }
}

impl BlockCommand for InsertAfterBlockCommand {
    fn name(&self) -> &'static str {
        "InsertAfterBlock"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::MultipleBlocks
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let guard = ctx.collection();
        let at = guard.index_of(self.key)? + 1;
        if self.created.len() != self.count {
            let project = guard.project();
            self.created = (0..self.count).map(|_| project.next_key()).collect();
        }

        let block_type = guard.project().default_block_type();
        for (offset, key) in self.created.iter().enumerate() {
            guard.insert(at + offset, Block::new(*key, block_type.clone()))?;
        }
        if !self.created.is_empty() {
            guard.reconcile();
        }

        tracing::debug!(after = %self.key, count = self.count, "Inserted blocks");
        let focus = self.created.last().copied().unwrap_or(self.key);
        ctx.set_position(BlockPosition::start_of(focus));
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        if self.created.len() != self.count {
            return Err(CommandError::NotExecuted(self.name()));
        }
        Ok(Box::new(
            RemoveBlocksCommand::new(self.created.clone()).with_focus(self.key),
        ))
    }
}

/// Remove a set of blocks by key
#[derive(Debug, Clone)]
pub struct RemoveBlocksCommand {
    keys: Vec<BlockKey>,
    focus: Option<BlockKey>,
    placeholder_key: Option<BlockKey>,
    removed: Vec<BlockRemoval>,
}

impl RemoveBlocksCommand {
    pub fn new(keys: Vec<BlockKey>) -> Self {
        Self {
            keys,
            focus: None,
            placeholder_key: None,
            removed: Vec::new(),
        }
    }

    /// Leave the cursor at the end of `key` afterwards
    pub fn with_focus(mut self, key: BlockKey) -> Self {
        self.focus = Some(key);
        self
    }
}

impl BlockCommand for RemoveBlocksCommand {
    fn name(&self) -> &'static str {
        "RemoveBlocks"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::MultipleBlocks
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let guard = ctx.collection();
        // Fail before touching anything if a key is gone
        for key in &self.keys {
            guard.index_of(*key)?;
        }

        let mut removed = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let index = guard.index_of(*key)?;
            let removal = guard.remove_at_with(index, self.placeholder_key)?;
            self.placeholder_key = removal.placeholder.or(self.placeholder_key);
            removed.push(removal);
        }
        guard.reconcile();

        let position = match self.focus.filter(|key| guard.contains(*key)) {
            Some(key) => BlockPosition::new(key, guard.block(key)?.char_len()),
            None => {
                let first = removed.first().map_or(0, |removal| removal.index);
                BlockPosition::start_of(guard.key_at(first.min(guard.len() - 1))?)
            }
        };

        tracing::debug!(count = removed.len(), "Removed blocks");
        self.removed = removed;
        ctx.set_position(position);
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        if self.removed.len() != self.keys.len() {
            return Err(CommandError::NotExecuted(self.name()));
        }
        let mut restore = CompositeCommand::named("RestoreBlocks");
        for removal in self.removed.iter().rev() {
            restore.push(RestoreBlockCommand::new(removal.clone()));
        }
        Ok(Box::new(restore))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quire_document::{
        BlockCollection, BlockSnapshot, BlockType, DocumentError, Project, ProjectConfig,
        StructureConfig, PARAGRAPH,
    };

    fn paragraphs(texts: &[&str]) -> BlockCollection {
        let snapshots: Vec<_> = texts.iter().map(|t| BlockSnapshot::new(PARAGRAPH, *t)).collect();
        BlockCollection::from_snapshots(Arc::new(Project::default()), &snapshots).unwrap()
    }

    fn novel(blocks: &[(&str, &str)]) -> BlockCollection {
        let config = ProjectConfig {
            block_types: vec![BlockType::structural("Chapter"), BlockType::structural("Scene")],
            structure: StructureConfig::new("Chapter")
                .with_child(StructureConfig::new("Scene").with_child(StructureConfig::new(PARAGRAPH))),
            ..ProjectConfig::default()
        };
        let project = Arc::new(Project::from_config(&config).unwrap());
        let snapshots: Vec<_> = blocks.iter().map(|(t, text)| BlockSnapshot::new(*t, *text)).collect();
        BlockCollection::from_snapshots(project, &snapshots).unwrap()
    }

    #[test]
    fn test_set_block_type_reparents_and_inverts() {
        let collection = novel(&[("Chapter", "One"), (PARAGRAPH, "a"), (PARAGRAPH, "b")]);
        let mut guard = collection.write();
        let keys = guard.keys();
        let mut ctx = BlockCommandContext::new(&mut guard);

        let mut retype = SetBlockTypeCommand::new(keys[1], "Scene");
        retype.execute(&mut ctx).unwrap();
        assert_eq!(ctx.collection().block(keys[2]).unwrap().parent(), Some(keys[1]));

        retype.undo(&mut ctx).unwrap();
        assert_eq!(ctx.collection().block(keys[1]).unwrap().type_name(), PARAGRAPH);
        assert_eq!(ctx.collection().block(keys[2]).unwrap().parent(), Some(keys[0]));
    }

    #[test]
    fn test_set_unknown_type() {
        let collection = paragraphs(&["a"]);
        let mut guard = collection.write();
        let key = guard.key_at(0).unwrap();
        let mut ctx = BlockCommandContext::new(&mut guard);

        let result = SetBlockTypeCommand::new(key, "Interlude").execute(&mut ctx);
        assert!(matches!(
            result,
            Err(CommandError::Document(DocumentError::UnknownBlockType(_)))
        ));
    }

    #[test]
    fn test_delete_middle_block() {
        let collection = paragraphs(&["a", "b", "c"]);
        let mut guard = collection.write();
        let keys = guard.keys();
        let mut ctx = BlockCommandContext::new(&mut guard);

        let mut delete = DeleteBlockCommand::new(keys[1]);
        delete.execute(&mut ctx).unwrap();
        assert_eq!(ctx.last_position, Some(BlockPosition::start_of(keys[2])));
        assert_eq!(ctx.collection().texts(), vec!["a", "c"]);

        delete.undo(&mut ctx).unwrap();
        assert_eq!(ctx.collection().keys(), keys);
        assert_eq!(ctx.last_position, Some(BlockPosition::new(keys[1], 1)));
    }

    #[test]
    fn test_delete_last_block_focuses_new_last() {
        let collection = paragraphs(&["a", "b"]);
        let mut guard = collection.write();
        let keys = guard.keys();
        let mut ctx = BlockCommandContext::new(&mut guard);

        DeleteBlockCommand::new(keys[1]).execute(&mut ctx).unwrap();
        assert_eq!(ctx.last_position, Some(BlockPosition::start_of(keys[0])));
    }

    #[test]
    fn test_delete_only_block_reuses_placeholder_on_redo() {
        let collection = paragraphs(&["only"]);
        let mut guard = collection.write();
        let original = guard.key_at(0).unwrap();
        let mut ctx = BlockCommandContext::new(&mut guard);

        let mut delete = DeleteBlockCommand::new(original);
        delete.execute(&mut ctx).unwrap();
        let placeholder = delete.removed().unwrap().placeholder.unwrap();
        assert_eq!(ctx.collection().keys(), vec![placeholder]);

        delete.undo(&mut ctx).unwrap();
        assert_eq!(ctx.collection().keys(), vec![original]);
        assert_eq!(ctx.collection().texts(), vec!["only"]);

        delete.redo(&mut ctx).unwrap();
        assert_eq!(ctx.collection().keys(), vec![placeholder]);
    }

    #[test]
    fn test_insert_after_block_round_trip() {
        let collection = paragraphs(&["a", "b"]);
        let mut guard = collection.write();
        let keys = guard.keys();
        let mut ctx = BlockCommandContext::new(&mut guard);

        let mut insert = InsertAfterBlockCommand::new(keys[0], 2);
        insert.execute(&mut ctx).unwrap();
        let created = insert.created().to_vec();
        assert_eq!(ctx.collection().keys(), vec![keys[0], created[0], created[1], keys[1]]);
        assert_eq!(ctx.last_position, Some(BlockPosition::start_of(created[1])));

        insert.undo(&mut ctx).unwrap();
        assert_eq!(ctx.collection().keys(), keys);
        assert_eq!(ctx.last_position, Some(BlockPosition::new(keys[0], 1)));

        insert.redo(&mut ctx).unwrap();
        assert_eq!(ctx.collection().keys(), vec![keys[0], created[0], created[1], keys[1]]);
    }

    #[test]
    fn test_remove_blocks_restores_in_order() {
        let collection = paragraphs(&["a", "b", "c", "d"]);
        let mut guard = collection.write();
        let keys = guard.keys();
        let mut ctx = BlockCommandContext::new(&mut guard);

        let mut remove = RemoveBlocksCommand::new(vec![keys[1], keys[3]]);
        remove.execute(&mut ctx).unwrap();
        assert_eq!(ctx.collection().texts(), vec!["a", "c"]);

        remove.undo(&mut ctx).unwrap();
        assert_eq!(ctx.collection().keys(), keys);
    }

    #[test]
    fn test_remove_blocks_with_missing_key_changes_nothing() {
        let collection = paragraphs(&["a", "b"]);
        let stranger = collection.project().next_key();
        let mut guard = collection.write();
        let keys = guard.keys();
        let mut ctx = BlockCommandContext::new(&mut guard);

        let result = RemoveBlocksCommand::new(vec![keys[0], stranger]).execute(&mut ctx);
        assert!(matches!(
            result,
            Err(CommandError::Document(DocumentError::BlockNotFound(_)))
        ));
        assert_eq!(ctx.collection().keys(), keys);
    }
}
