//! # Composite Commands
//!
//! An ordered list of sub-commands that runs, undoes and redoes as one step.
//!
//! ## Design
//!
//! - Do runs sub-commands in order. If one fails, the ones that already ran
//!   are inverted in reverse order and the error is returned.
//! - Undo runs the inverse composite: each sub-command's inverse, in reverse
//!   order. It is built on first use and cached in an [`InverseMemo`].
//! - Redo re-runs every sub-command in order.
//! - Optional position functions override the cursor the last sub-command
//!   reported, for Do and for Undo separately.

use std::fmt;
use std::sync::Arc;

use quire_document::BlockPosition;

use crate::command::{BlockCommand, BlockCommandContext, LockScope};
use crate::errors::CommandResult;

/// Maps the cursor reported by the last sub-command to the composite's cursor
pub type PositionFn = Arc<dyn Fn(Option<BlockPosition>) -> Option<BlockPosition> + Send + Sync>;

/// Lazily built, cached inverse of a composite
#[derive(Debug, Default)]
pub struct InverseMemo {
    built: Option<Box<CompositeCommand>>,
    builds: usize,
}

impl InverseMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached inverse, running `build` only if there is none yet
    pub fn get_or_try_build(
        &mut self,
        build: impl FnOnce() -> CommandResult<CompositeCommand>,
    ) -> CommandResult<&mut CompositeCommand> {
        let built = match self.built.take() {
            Some(built) => built,
            None => {
                let built = Box::new(build()?);
                self.builds += 1;
                built
            }
        };
        Ok(&mut **self.built.insert(built))
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// How many times an inverse has been built
    pub fn build_count(&self) -> usize {
        self.builds
    }

    pub fn invalidate(&mut self) {
        self.built = None;
    }
}

pub struct CompositeCommand {
    name: &'static str,
    description: Option<String>,
    commands: Vec<Box<dyn BlockCommand>>,
    position: Option<PositionFn>,
    undo_position: Option<PositionFn>,
    inverse: InverseMemo,
}

impl CompositeCommand {
    pub fn new() -> Self {
        Self::named("Composite")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            description: None,
            commands: Vec::new(),
            position: None,
            undo_position: None,
            inverse: InverseMemo::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Cursor after Do
    pub fn with_position<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<BlockPosition>) -> Option<BlockPosition> + Send + Sync + 'static,
    {
        self.position = Some(Arc::new(f));
        self
    }

    /// Cursor after Undo
    pub fn with_undo_position<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<BlockPosition>) -> Option<BlockPosition> + Send + Sync + 'static,
    {
        self.undo_position = Some(Arc::new(f));
        self
    }

    pub fn push(&mut self, command: impl BlockCommand + 'static) {
        self.push_boxed(Box::new(command));
    }

    pub fn push_boxed(&mut self, command: Box<dyn BlockCommand>) {
        self.commands.push(command);
        self.inverse.invalidate();
    }

    /// Run `command` now and append it. A failed command is not appended;
    /// the caller decides whether to `rollback` the rest.
    pub fn push_and_execute(
        &mut self,
        command: impl BlockCommand + 'static,
        ctx: &mut BlockCommandContext<'_, '_>,
    ) -> CommandResult<()> {
        let mut command = Box::new(command);
        command.execute(ctx)?;
        self.push_boxed(command);
        Ok(())
    }

    /// Invert every sub-command, newest first. For a composite whose
    /// sub-commands have all run.
    pub fn rollback(&self, ctx: &mut BlockCommandContext<'_, '_>) {
        self.rollback_first(self.commands.len(), ctx);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Box<dyn BlockCommand>] {
        &self.commands
    }

    pub fn inverse_memo(&self) -> &InverseMemo {
        &self.inverse
    }

    fn build_inverse(&self) -> CommandResult<CompositeCommand> {
        invert(
            self.name,
            self.description.as_deref(),
            &self.commands,
            &self.position,
            &self.undo_position,
        )
    }

    /// Invert the first `done` sub-commands, newest first
    fn rollback_first(&self, done: usize, ctx: &mut BlockCommandContext<'_, '_>) {
        for command in self.commands[..done].iter().rev() {
            let undone = command.inverse().and_then(|mut inverse| inverse.execute(ctx));
            if let Err(err) = undone {
                tracing::warn!(command = command.name(), error = %err, "Rollback step failed");
            }
        }
    }

    fn apply_position(position: Option<&PositionFn>, ctx: &mut BlockCommandContext<'_, '_>) {
        if let Some(f) = position {
            ctx.last_position = f(ctx.last_position);
        }
    }
}

impl Default for CompositeCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockCommand for CompositeCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    fn lock_scope(&self) -> LockScope {
        match self.commands.as_slice() {
            [only] => only.lock_scope(),
            _ => LockScope::MultipleBlocks,
        }
    }

    fn execute(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        for i in 0..self.commands.len() {
            if let Err(err) = self.commands[i].execute(ctx) {
                self.rollback_first(i, ctx);
                return Err(err);
            }
        }
        Self::apply_position(self.position.as_ref(), ctx);
        Ok(())
    }

    fn inverse(&self) -> CommandResult<Box<dyn BlockCommand>> {
        Ok(Box::new(self.build_inverse()?))
    }

    fn undo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        let Self {
            name,
            description,
            commands,
            position,
            undo_position,
            inverse,
        } = self;
        let (name, description, commands) = (*name, description.as_deref(), &commands[..]);
        let inverse = inverse.get_or_try_build(|| {
            tracing::debug!(command = name, steps = commands.len(), "Building composite inverse");
            invert(name, description, commands, position, undo_position)
        })?;
        inverse.execute(ctx)
    }

    fn redo(&mut self, ctx: &mut BlockCommandContext<'_, '_>) -> CommandResult<()> {
        for command in &mut self.commands {
            command.redo(ctx)?;
        }
        Self::apply_position(self.position.as_ref(), ctx);
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.commands.iter().all(|command| command.can_undo())
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Each command's inverse, newest first, with the cursor functions swapped
fn invert(
    name: &'static str,
    description: Option<&str>,
    commands: &[Box<dyn BlockCommand>],
    position: &Option<PositionFn>,
    undo_position: &Option<PositionFn>,
) -> CommandResult<CompositeCommand> {
    let mut inverse = CompositeCommand::named(name);
    inverse.description = description.map(str::to_string);
    inverse.position = undo_position.clone();
    inverse.undo_position = position.clone();
    for command in commands.iter().rev() {
        inverse.commands.push(command.inverse()?);
    }
    Ok(inverse)
}

impl fmt::Debug for CompositeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCommand")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("commands", &self.commands)
            .field("inverse_built", &self.inverse.is_built())
            .finish()
    }
}
