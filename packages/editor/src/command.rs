use std::fmt;
use std::sync::Arc;

use quire_document::{BlockKey, BlockPosition, CollectionWriteGuard, Project};

use crate::errors::{CommandError, CommandResult};
use crate::immediate::ImmediateEditorEngine;

/// Which locks a command touches while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// The collection write lock plus one block's write lock
    SingleBlock(BlockKey),
    /// The collection write lock plus whichever blocks the command reaches
    MultipleBlocks,
}

/// `Created → Done → (Undone ⇄ Redone)*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Done,
    Undone,
    Redone,
}

impl CommandState {
    /// Whether the command's effect is currently in the document
    pub fn is_applied(self) -> bool {
        matches!(self, CommandState::Done | CommandState::Redone)
    }
}

/// Everything a command may touch while it runs
///
/// Holds the collection write guard for the whole Do/Undo/Redo. Nested
/// commands reuse the same guard instead of locking again.
pub struct BlockCommandContext<'g, 'c> {
    collection: &'g mut CollectionWriteGuard<'c>,
    immediate_editors: &'g ImmediateEditorEngine,

    /// Cursor position reported by the last command to run
    pub last_position: Option<BlockPosition>,
}

static NO_IMMEDIATE_EDITORS: ImmediateEditorEngine = ImmediateEditorEngine::empty();

impl<'g, 'c> BlockCommandContext<'g, 'c> {
    pub fn new(collection: &'g mut CollectionWriteGuard<'c>) -> Self {
        Self::with_immediate_editors(collection, &NO_IMMEDIATE_EDITORS)
    }

    pub fn with_immediate_editors(
        collection: &'g mut CollectionWriteGuard<'c>,
        immediate_editors: &'g ImmediateEditorEngine,
    ) -> Self {
        Self {
            collection,
            immediate_editors,
            last_position: None,
        }
    }

    pub fn collection(&mut self) -> &mut CollectionWriteGuard<'c> {
        self.collection
    }

    pub fn project(&self) -> &Arc<Project> {
        self.collection.project()
    }

    pub fn immediate_editors(&self) -> &'g ImmediateEditorEngine {
        self.immediate_editors
    }

    pub fn set_position(&mut self, position: BlockPosition) {
        self.last_position = Some(position);
    }
}

/// Trait for undoable block commands
///
/// Each command implements:
/// - `execute`: the forward action (Do), recording whatever it needs to invert
/// - `inverse`: a command that exactly undoes the last execution
/// - `undo` / `redo`: default to running the inverse / running `execute` again
///
/// Commands that mint keys reuse them when executed again, so an inverse built
/// after the first execution stays valid across undo/redo cycles.
pub trait BlockCommand: Send + Sync + fmt::Debug {
    /// Debug name for this command
    fn name(&self) -> &'static str;

    fn lock_scope(&self) -> LockScope;

    /// Do
    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()>;

    /// Command that undoes the most recent `execute`
    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>>;

    fn undo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let mut inverse = self.inverse()?;
        inverse.execute(ctx)
    }

    fn redo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        self.execute(ctx)
    }

    fn can_undo(&self) -> bool {
        true
    }

    fn description(&self) -> Option<&str> {
        None
    }
}

/// A command plus its lifecycle state
#[derive(Debug)]
pub struct TrackedCommand {
    command: Box<dyn BlockCommand>,
    state: CommandState,
}

impl TrackedCommand {
    pub fn new(command: Box<dyn BlockCommand>) -> Self {
        Self {
            command,
            state: CommandState::Created,
        }
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn name(&self) -> &'static str {
        self.command.name()
    }

    pub fn description(&self) -> Option<&str> {
        self.command.description()
    }

    pub fn command(&self) -> &dyn BlockCommand {
        self.command.as_ref()
    }

    pub fn into_inner(self) -> Box<dyn BlockCommand> {
        self.command
    }

    pub fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        self.expect_state(CommandState::Created)?;
        self.command.execute(ctx)?;
        self.state = CommandState::Done;
        Ok(())
    }

    /// For commands that already ran outside this wrapper (batched commands)
    pub(crate) fn mark_done(&mut self) {
        if self.state == CommandState::Created {
            self.state = CommandState::Done;
        }
    }

    pub fn undo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        if self.state == CommandState::Created {
            return Err(CommandError::NotExecuted(self.name()));
        }
        if !self.state.is_applied() {
            return Err(self.invalid());
        }
        if !self.command.can_undo() {
            return Err(CommandError::NotUndoable(self.name()));
        }
        self.command.undo(ctx)?;
        self.state = CommandState::Undone;
        Ok(())
    }

    pub fn redo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        self.expect_state(CommandState::Undone)?;
        self.command.redo(ctx)?;
        self.state = CommandState::Redone;
        Ok(())
    }

    fn expect_state(&self, expected: CommandState) -> CommandResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid())
        }
    }

    fn invalid(&self) -> CommandError {
        CommandError::InvalidState {
            command: self.name(),
            state: self.state,
        }
    }
}
