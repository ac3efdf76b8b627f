//! Pasting text that spans several lines.
//!
//! The first line goes in at the cursor, each further line gets a new block
//! after the cursor's block, and whatever followed the cursor moves to the end
//! of the last new block. `\r\n`, `\n` and `\r` all end a line.
//!
//! The composite is assembled while Do runs, since the new blocks' keys only
//! exist once they are inserted. Later Do/Redo calls replay it.

use quire_document::{BlockPosition, DocumentError};

use crate::block_commands::InsertAfterBlockCommand;
use crate::command::{BlockCommand, BlockCommandContext, LockScope};
use crate::composite::CompositeCommand;
use crate::errors::{CommandError, CommandResult};
use crate::text_commands::{DeleteTextCommand, InsertTextCommand};

#[derive(Debug)]
pub struct InsertMultilineTextCommand {
    position: BlockPosition,
    text: String,
    composite: Option<CompositeCommand>,
}

impl InsertMultilineTextCommand {
    pub fn new(position: BlockPosition, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
            composite: None,
        }
    }

    /// Build and run the composite; returns the cursor after the paste
    fn assemble(
        &self,
        composite: &mut CompositeCommand,
        ctx: &mut BlockCommandContext<'_, '_>,
    ) -> CommandResult<BlockPosition> {
        let BlockPosition { key, text_index } = self.position;
        let lines = split_lines(&self.text);
        let (first, rest) = match lines.split_first() {
            Some((first, rest)) if !rest.is_empty() => (*first, rest),
            _ => {
                let insert = InsertTextCommand::new(self.position, self.text.as_str());
                composite.push_and_execute(insert.without_immediate_edits(), ctx)?;
                return Ok(ctx.last_position.unwrap_or(self.position));
            }
        };

        let (len, trailing) = {
            let block = ctx.collection().block(key)?;
            let len = block.char_len();
            if text_index > len {
                return Err(DocumentError::PositionOutOfBounds { pos: text_index, len }.into());
            }
            (len, block.text().chars().skip(text_index).collect::<String>())
        };

        if !trailing.is_empty() {
            composite.push_and_execute(DeleteTextCommand::new(self.position, len), ctx)?;
        }
        if !first.is_empty() {
            let insert = InsertTextCommand::new(self.position, first).without_immediate_edits();
            composite.push_and_execute(insert, ctx)?;
        }
        composite.push_and_execute(InsertAfterBlockCommand::new(key, rest.len()), ctx)?;

        let new_keys = {
            let guard = ctx.collection();
            let at = guard.index_of(key)? + 1;
            (at..at + rest.len())
                .map(|index| guard.key_at(index))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut cursor = self.position;
        for (i, (line, new_key)) in rest.iter().zip(&new_keys).enumerate() {
            let mut line = line.to_string();
            cursor = BlockPosition::new(*new_key, line.chars().count());
            if i + 1 == rest.len() {
                line.push_str(&trailing);
            }
            if !line.is_empty() {
                let insert = InsertTextCommand::new(BlockPosition::start_of(*new_key), line);
                composite.push_and_execute(insert.without_immediate_edits(), ctx)?;
            }
        }
        Ok(cursor)
    }
}

impl BlockCommand for InsertMultilineTextCommand {
    fn name(&self) -> &'static str {
        "InsertMultilineText"
    }

    fn lock_scope(&self) -> LockScope {
        LockScope::MultipleBlocks
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        if let Some(composite) = &mut self.composite {
            return composite.execute(ctx);
        }

        let mut composite = CompositeCommand::named("InsertMultilineText");
        let cursor = match self.assemble(&mut composite, ctx) {
            Ok(cursor) => cursor,
            Err(err) => {
                composite.rollback(ctx);
                return Err(err);
            }
        };

        tracing::debug!(at = %self.position, steps = composite.len(), "Inserted multi-line text");
        let origin = self.position;
        self.composite = Some(
            composite
                .with_position(move |_| Some(cursor))
                .with_undo_position(move |_| Some(origin)),
        );
        ctx.set_position(cursor);
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        self.composite
            .as_ref()
            .ok_or(CommandError::NotExecuted(self.name()))?
            .inverse()
    }

    fn undo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        match &mut self.composite {
            Some(composite) => composite.undo(ctx),
            None => Err(CommandError::NotExecuted(self.name())),
        }
    }
}

/// Split on `\r\n`, `\n` or `\r`. Always at least one (possibly empty) line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&text[start..]);
    lines
}
