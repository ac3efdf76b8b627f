//! # Quire Editor
//!
//! Undoable editing commands over a `quire-document` block collection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ quire-document: blocks, schema, collection  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: commands + history                  │
//! │  - Atomic text and block commands           │
//! │  - Composites with cached inverses          │
//! │  - Immediate editors on typed text          │
//! │  - Supervisor: Do / Undo / Redo, batching   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Every command has an inverse**: undo runs it, redo runs Do again
//! 2. **One lock per step**: Do/Undo/Redo hold the collection write lock
//!    throughout, and observers hear about it afterwards
//! 3. **Stable keys**: redoing a command recreates blocks with the keys they
//!    had before
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use quire_document::{BlockCollection, BlockPosition, BlockSnapshot, Project};
//! use quire_editor::{BlockCommandSupervisor, InsertMultilineTextCommand};
//!
//! let collection = BlockCollection::from_snapshots(
//!     Arc::new(Project::default()),
//!     &[BlockSnapshot::new("Paragraph", "Line 1")],
//! )?;
//! let key = collection.read().key_at(0)?;
//! let mut supervisor = BlockCommandSupervisor::new(collection.clone());
//!
//! supervisor.execute(InsertMultilineTextCommand::new(
//!     BlockPosition::new(key, 5),
//!     "AAA\nBBB\nCCC",
//! ))?;
//! assert_eq!(collection.texts(), vec!["Line AAA", "BBB", "CCC1"]);
//!
//! supervisor.undo()?;
//! assert_eq!(collection.texts(), vec!["Line 1"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod block_commands;
mod command;
mod composite;
mod errors;
mod immediate;
mod multiline;
mod supervisor;
mod text_commands;

pub use block_commands::{
    DeleteBlockCommand, InsertAfterBlockCommand, RemoveBlocksCommand, RestoreBlockCommand,
    SetBlockTypeCommand,
};
pub use command::{BlockCommand, BlockCommandContext, CommandState, LockScope, TrackedCommand};
pub use composite::{CompositeCommand, InverseMemo, PositionFn};
pub use errors::{CommandError, CommandResult};
pub use immediate::{CollapseDoubleSpaces, ImmediateEditor, ImmediateEditorEngine, InsertedText};
pub use multiline::{split_lines, InsertMultilineTextCommand};
pub use supervisor::BlockCommandSupervisor;
pub use text_commands::{DeleteTextCommand, InsertTextCommand, ReplaceTextCommand, SetTextCommand};
