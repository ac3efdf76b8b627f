//! # Quire Document
//!
//! In-memory document model for long-form writing: an ordered sequence of
//! typed text blocks (chapters, scenes, paragraphs, epigraphs) kept
//! conformant with a project's structure schema.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Project: type registry + schema + key gen   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ BlockCollection                             │
//! │  - collection RwLock → per-block RwLocks    │
//! │  - never empty                              │
//! │  - reconciles parents after type changes    │
//! │  - post-commit change events                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ quire-editor: undoable commands             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use quire_document::{BlockCollection, BlockSnapshot, Project};
//!
//! let collection = BlockCollection::from_snapshots(
//!     Arc::new(Project::default()),
//!     &[BlockSnapshot::new("Paragraph", "It was a dark and stormy night.")],
//! )?;
//!
//! {
//!     let mut guard = collection.write();
//!     let key = guard.key_at(0)?;
//!     guard.insert_text(key, 0, "Again: ")?;
//! } // events are delivered here, after the lock is released
//!
//! assert_eq!(collection.texts(), vec!["Again: It was a dark and stormy night."]);
//! # Ok::<(), quire_document::DocumentError>(())
//! ```

mod block;
mod block_type;
mod collection;
mod config;
mod error;
mod events;
mod keys;
mod project;
mod reconcile;
mod schema;

pub use block::{byte_offset, Block, BlockSnapshot, ControllerId, HierarchicalPath, TextSpan};
pub use block_type::{BlockType, BlockTypeRegistry, PARAGRAPH};
pub use collection::{
    BlockCollection, BlockReadGuard, BlockRemoval, BlockSequence, BlockWriteGuard,
    CollectionReadGuard, CollectionWriteGuard,
};
pub use config::{ProjectConfig, StructureConfig, DEFAULT_CONFIG_NAME};
pub use error::{DocumentError, Result};
pub use events::{CollectionChange, DocumentEvent, DocumentObserver, ObserverId, ObserverList};
pub use keys::{BlockKey, BlockPosition, KeyGenerator};
pub use project::Project;
pub use reconcile::{OccurrenceViolation, ReconcileReport, StructureReconciler};
pub use schema::{BlockStructureSchema, SchemaNode, SchemaNodeId};
