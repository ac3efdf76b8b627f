//! # Immediate Editors
//!
//! Plugins that react to typed text while the insert command still holds the
//! block's write lock, e.g. collapsing a doubled space.
//!
//! ## Contract
//!
//! - Editors run in registration order after `InsertText` applies its text.
//! - An editor may mutate the block and move the cursor.
//! - Their edits are not recorded separately. When an editor changed the
//!   block, undoing the insert restores the whole text from before it.
//! - Inverse and multi-line inserts never run editors.

use std::fmt;
use std::sync::Arc;

use quire_document::Block;

/// What the insert just put into the block
#[derive(Debug, Clone, Copy)]
pub struct InsertedText<'a> {
    /// Character index the text went in at
    pub start: usize,
    pub text: &'a str,
    /// Cursor after the insert and any earlier editors
    pub cursor: usize,
}

/// Plugin hook run on freshly inserted text
pub trait ImmediateEditor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Edit the block in place. Returns the new cursor index if it moved.
    fn process(&self, block: &mut Block, inserted: &InsertedText<'_>) -> Option<usize>;
}

/// Typing a space right after a space keeps only one
#[derive(Debug, Default)]
pub struct CollapseDoubleSpaces;

impl ImmediateEditor for CollapseDoubleSpaces {
    fn name(&self) -> &'static str {
        "CollapseDoubleSpaces"
    }

    fn process(&self, block: &mut Block, inserted: &InsertedText<'_>) -> Option<usize> {
        if inserted.text != " " || inserted.cursor < 2 {
            return None;
        }
        let before = block.text().chars().nth(inserted.cursor - 2)?;
        if before != ' ' {
            return None;
        }
        block.delete_text(inserted.cursor - 1, inserted.cursor).ok()?;
        Some(inserted.cursor - 1)
    }
}

/// Runs every registered editor over an insert
#[derive(Debug)]
pub struct ImmediateEditorEngine {
    editors: Vec<Arc<dyn ImmediateEditor>>,
}

impl ImmediateEditorEngine {
    /// Engine with no editors
    pub const fn empty() -> Self {
        Self { editors: Vec::new() }
    }

    /// Engine with the built-in editors
    pub fn new() -> Self {
        Self {
            editors: vec![Arc::new(CollapseDoubleSpaces)],
        }
    }

    pub fn register(&mut self, editor: Arc<dyn ImmediateEditor>) {
        tracing::debug!(editor = editor.name(), "Registered immediate editor");
        self.editors.push(editor);
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }

    /// Run all editors over `text` just inserted at `start`; returns the
    /// final cursor index
    pub fn process(&self, block: &mut Block, start: usize, text: &str) -> usize {
        let mut cursor = start + text.chars().count();
        for editor in &self.editors {
            let inserted = InsertedText { start, text, cursor };
            if let Some(moved) = editor.process(block, &inserted) {
                tracing::debug!(editor = editor.name(), key = %block.key(), cursor = moved, "Immediate edit");
                cursor = moved;
            }
        }
        cursor
    }
}

impl Default for ImmediateEditorEngine {
    fn default() -> Self {
        Self::new()
    }
}
