//! # Command Supervisor
//!
//! Runs commands against a collection and tracks undo/redo history.
//!
//! ## Design
//!
//! - Each Do/Undo/Redo holds the collection write lock for its whole run;
//!   change events go out once it is released
//! - Undo runs the command's inverse and moves it to the redo stack
//! - Redo re-runs the command and moves it back
//! - New commands clear the redo stack
//! - Batches group several commands into one undo level
//! - History beyond `max_levels` is dropped oldest first
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quire_document::{BlockCollection, BlockPosition, Project};
//! use quire_editor::{BlockCommandSupervisor, InsertTextCommand};
//!
//! let collection = BlockCollection::new(Arc::new(Project::default()));
//! let key = collection.read().key_at(0)?;
//! let mut supervisor = BlockCommandSupervisor::new(collection.clone());
//!
//! supervisor.execute(InsertTextCommand::new(BlockPosition::start_of(key), "Hello"))?;
//! assert_eq!(supervisor.last_position(), Some(BlockPosition::new(key, 5)));
//!
//! supervisor.undo()?;
//! assert_eq!(collection.texts(), vec![""]);
//!
//! supervisor.redo()?;
//! assert_eq!(collection.texts(), vec!["Hello"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use quire_document::{BlockCollection, BlockPosition};

use crate::command::{BlockCommand, BlockCommandContext, TrackedCommand};
use crate::composite::CompositeCommand;
use crate::errors::CommandResult;
use crate::immediate::ImmediateEditorEngine;

/// Undo/redo history for one collection
#[derive(Debug)]
pub struct BlockCommandSupervisor {
    collection: BlockCollection,

    immediate_editors: ImmediateEditorEngine,

    /// Applied commands (most recent last)
    undo_stack: Vec<TrackedCommand>,

    /// Undone commands (most recent last)
    redo_stack: Vec<TrackedCommand>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    /// Currently building a batch
    current_batch: Option<CompositeCommand>,

    last_position: Option<BlockPosition>,
}

impl BlockCommandSupervisor {
    /// Supervisor keeping as many levels as the project's undo limit
    pub fn new(collection: BlockCollection) -> Self {
        let max_levels = collection.project().undo_limit();
        Self::with_max_levels(collection, max_levels)
    }

    pub fn with_max_levels(collection: BlockCollection, max_levels: usize) -> Self {
        Self {
            collection,
            immediate_editors: ImmediateEditorEngine::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
            last_position: None,
        }
    }

    /// Replace the immediate editors run on typed text
    pub fn with_immediate_editors(mut self, editors: ImmediateEditorEngine) -> Self {
        self.immediate_editors = editors;
        self
    }

    pub fn collection(&self) -> &BlockCollection {
        &self.collection
    }

    pub fn immediate_editors_mut(&mut self) -> &mut ImmediateEditorEngine {
        &mut self.immediate_editors
    }

    /// Cursor reported by the most recent Do/Undo/Redo that reported one
    pub fn last_position(&self) -> Option<BlockPosition> {
        self.last_position
    }

    /// Run a command and record it for undo
    pub fn execute(&mut self, command: impl BlockCommand + 'static) -> CommandResult<()> {
        self.execute_boxed(Box::new(command))
    }

    pub fn execute_boxed(&mut self, command: Box<dyn BlockCommand>) -> CommandResult<()> {
        let mut tracked = TrackedCommand::new(command);
        let position = {
            let mut guard = self.collection.write();
            let mut ctx = BlockCommandContext::with_immediate_editors(&mut guard, &self.immediate_editors);
            tracked.execute(&mut ctx)?;
            ctx.last_position
        };
        tracing::debug!(command = tracked.name(), scope = ?tracked.command().lock_scope(), "Executed command");
        self.record_position(position);

        if !tracked.command().can_undo() {
            return Ok(());
        }
        match &mut self.current_batch {
            Some(batch) => batch.push_boxed(tracked.into_inner()),
            None => self.push(tracked),
        }
        Ok(())
    }

    /// Start a batch of commands (will be undone/redone together)
    pub fn begin_batch(&mut self) {
        self.end_batch();
        self.current_batch = Some(CompositeCommand::named("Batch"));
    }

    /// End the current batch and push it to the undo stack
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.is_empty() {
                let mut tracked = TrackedCommand::new(Box::new(batch));
                tracked.mark_done();
                self.push(tracked);
            }
        }
    }

    /// Set description for current batch (if batching)
    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.set_description(description);
        }
    }

    pub fn is_batching(&self) -> bool {
        self.current_batch.is_some()
    }

    fn push(&mut self, tracked: TrackedCommand) {
        self.undo_stack.push(tracked);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            let dropped = self.undo_stack.remove(0);
            tracing::warn!(
                command = dropped.name(),
                max_levels = self.max_levels,
                "Undo history full, dropped oldest level"
            );
        }

        // New action invalidates future
        self.redo_stack.clear();
    }

    /// Undo the most recent command/batch. Returns false if there was nothing
    /// to undo.
    pub fn undo(&mut self) -> CommandResult<bool> {
        self.end_batch();
        let Some(mut tracked) = self.undo_stack.pop() else {
            tracing::warn!("Nothing to undo");
            return Ok(false);
        };

        let result = {
            let mut guard = self.collection.write();
            let mut ctx = BlockCommandContext::with_immediate_editors(&mut guard, &self.immediate_editors);
            match tracked.undo(&mut ctx) {
                Ok(()) => Ok(ctx.last_position),
                Err(err) => Err(err),
            }
        };
        match result {
            Ok(position) => {
                tracing::info!(command = tracked.name(), levels = self.undo_stack.len(), "Undid command");
                self.record_position(position);
                self.redo_stack.push(tracked);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(command = tracked.name(), error = %err, "Undo failed");
                self.undo_stack.push(tracked);
                Err(err)
            }
        }
    }

    /// Redo the most recently undone command/batch
    pub fn redo(&mut self) -> CommandResult<bool> {
        self.end_batch();
        let Some(mut tracked) = self.redo_stack.pop() else {
            tracing::warn!("Nothing to redo");
            return Ok(false);
        };

        let result = {
            let mut guard = self.collection.write();
            let mut ctx = BlockCommandContext::with_immediate_editors(&mut guard, &self.immediate_editors);
            match tracked.redo(&mut ctx) {
                Ok(()) => Ok(ctx.last_position),
                Err(err) => Err(err),
            }
        };
        match result {
            Ok(position) => {
                tracing::info!(command = tracked.name(), levels = self.redo_stack.len(), "Redid command");
                self.record_position(position);
                self.undo_stack.push(tracked);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(command = tracked.name(), error = %err, "Redo failed");
                self.redo_stack.push(tracked);
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    /// Description of the next undo, falling back to the command name
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .map(|tracked| tracked.description().unwrap_or(tracked.name()))
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .map(|tracked| tracked.description().unwrap_or(tracked.name()))
    }

    fn record_position(&mut self, position: Option<BlockPosition>) {
        if let Some(position) = position {
            self.last_position = Some(position);
        }
    }
}
