//! # Text Commands
//!
//! Undoable edits to the text of a single block.
//!
//! ## Semantics
//!
//! ### InsertText
//! - Splices text in at a character index
//! - Runs immediate editors unless built as an inverse
//! - Undo deletes the inserted range, or restores the prior text when an
//!   immediate editor changed the block
//! - Cursor: after the inserted text; undo puts it back at the insert point
//!
//! ### DeleteText
//! - Range endpoints may come in either order
//! - Cursor: start of the range; undo puts it at the end
//!
//! ### SetText
//! - Whole-text replacement, always bumps the version
//!
//! ### ReplaceText
//! - Delete then insert at the same position, undone as one step

use quire_document::{BlockKey, BlockPosition};

use crate::command::{BlockCommand, BlockCommandContext, LockScope};
use crate::composite::CompositeCommand;
use crate::errors::{CommandError, CommandResult};

/// Insert text at a position inside one block
#[derive(Debug, Clone)]
pub struct InsertTextCommand {
    position: BlockPosition,
    text: String,
    immediate_edits: bool,
    executed: bool,
    /// Block text before the splice, kept when an immediate editor rewrote it
    rewritten_from: Option<String>,
}

impl InsertTextCommand {
    pub fn new(position: BlockPosition, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
            immediate_edits: true,
            executed: false,
            rewritten_from: None,
        }
    }

    /// Same insert, but immediate editors are skipped
    pub fn without_immediate_edits(mut self) -> Self {
        self.immediate_edits = false;
        self
    }

    pub fn position(&self) -> BlockPosition {
        self.position
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn end_index(&self) -> usize {
        self.position.text_index + self.text.chars().count()
    }
}

impl BlockCommand for InsertTextCommand {
    fn name(&self) -> &'static str {
        "InsertText"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::SingleBlock(self.position.key)
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let BlockPosition { key, text_index } = self.position;
        let editors = ctx.immediate_editors();

        let (cursor, rewritten_from) = {
            let mut block = ctx.collection().block_mut(key)?;
            let run_editors = self.immediate_edits && !editors.is_empty();
            let previous = run_editors.then(|| block.text().to_string());
            block.insert_text(text_index, &self.text)?;
            match previous {
                Some(previous) => {
                    let spliced = block.text().to_string();
                    let cursor = editors.process(&mut block, text_index, &self.text);
                    let rewritten = block.text() != spliced;
                    (cursor, rewritten.then_some(previous))
                }
                None => (self.end_index(), None),
            }
        };

        tracing::debug!(
            %key,
            index = text_index,
            chars = self.text.chars().count(),
            rewritten = rewritten_from.is_some(),
            "Inserted text"
        );
        self.executed = true;
        self.rewritten_from = rewritten_from;
        ctx.set_position(BlockPosition::new(key, cursor));
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        if !self.executed {
            return Err(CommandError::NotExecuted(self.name()));
        }
        if let Some(previous) = &self.rewritten_from {
            let restore = SetTextCommand::new(self.position.key, previous.clone())
                .with_cursor(self.position.text_index);
            return Ok(Box::new(restore));
        }
        Ok(Box::new(DeleteTextCommand::new(self.position, self.end_index())))
    }
}

/// Delete the characters between a position and an end index
#[derive(Debug, Clone)]
pub struct DeleteTextCommand {
    position: BlockPosition,
    end: usize,
    removed: Option<String>,
}

impl DeleteTextCommand {
    pub fn new(position: BlockPosition, end: usize) -> Self {
        Self {
            position,
            end,
            removed: None,
        }
    }

    /// Text taken out by the last execution
    pub fn removed(&self) -> Option<&str> {
        self.removed.as_deref()
    }

    fn range(&self) -> (usize, usize) {
        let start = self.position.text_index;
        if start <= self.end {
            (start, self.end)
        } else {
            (self.end, start)
        }
    }
}

impl BlockCommand for DeleteTextCommand {
    fn name(&self) -> &'static str {
        "DeleteText"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::SingleBlock(self.position.key)
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let key = self.position.key;
        let (start, end) = self.range();
        let removed = ctx.collection().delete_text(key, start, end)?;

        tracing::debug!(%key, start, end, "Deleted text");
        self.removed = Some(removed);
        ctx.set_position(BlockPosition::new(key, start));
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        let removed = self
            .removed
            .clone()
            .ok_or(CommandError::NotExecuted(self.name()))?;
        let (start, _) = self.range();
        let insert = InsertTextCommand::new(self.position.with_index(start), removed);
        Ok(Box::new(insert.without_immediate_edits()))
    }
}

/// Replace a block's whole text
#[derive(Debug, Clone)]
pub struct SetTextCommand {
    key: BlockKey,
    text: String,
    previous: Option<String>,
    cursor: Option<usize>,
}

impl SetTextCommand {
    pub fn new(key: BlockKey, text: impl Into<String>) -> Self {
        Self {
            key,
            text: text.into(),
            previous: None,
            cursor: None,
        }
    }

    /// Put the cursor at `index` instead of the end of the new text
    pub fn with_cursor(mut self, index: usize) -> Self {
        self.cursor = Some(index);
        self
    }
}

impl BlockCommand for SetTextCommand {
    fn name(&self) -> &'static str {
        "SetText"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::SingleBlock(self.key)
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let previous = {
            let mut block = ctx.collection().block_mut(self.key)?;
            let previous = block.text().to_string();
            block.set_text(self.text.clone());
            previous
        };

        self.previous = Some(previous);
        let cursor = self.cursor.unwrap_or_else(|| self.text.chars().count());
        ctx.set_position(BlockPosition::new(self.key, cursor));
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        let previous = self
            .previous
            .clone()
            .ok_or(CommandError::NotExecuted(self.name()))?;
        Ok(Box::new(SetTextCommand::new(self.key, previous)))
    }
}

/// Replace `length` characters at a position with new text
#[derive(Debug)]
pub struct ReplaceTextCommand {
    key: BlockKey,
    inner: CompositeCommand,
}

impl ReplaceTextCommand {
    pub fn new(position: BlockPosition, length: usize, text: impl Into<String>) -> Self {
        let mut inner = CompositeCommand::named("ReplaceText");
        inner.push(DeleteTextCommand::new(position, position.text_index + length));
        inner.push(InsertTextCommand::new(position, text).without_immediate_edits());
        Self {
            key: position.key,
            inner: inner.with_undo_position(move |_| Some(position)),
        }
    }
}

impl BlockCommand for ReplaceTextCommand {
    fn name(&self) -> &'static str {
        "ReplaceText"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::SingleBlock(self.key)
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        self.inner.execute(ctx)
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        self.inner.inverse()
    }

    fn undo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        self.inner.undo(ctx)
    }
}
