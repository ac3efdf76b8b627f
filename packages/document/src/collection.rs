//! # Block Collection
//!
//! The ordered sequence of blocks that makes up one document.
//!
//! ## Locking
//!
//! ```text
//! BlockCollection ── RwLock<BlockSequence> ──┬── Arc<RwLock<Block>>
//!                                            ├── Arc<RwLock<Block>>
//!                                            └── ...
//! ```
//!
//! - `read()` / `write()` lock the whole sequence.
//! - Block guards are only handed out by a collection guard and borrow it, so
//!   a block lock can never be held without the collection lock, and the
//!   collection lock is always taken first.
//! - Text edits on one block need only a collection *read* guard plus that
//!   block's write lock; structural edits need the collection write guard.
//! - Events raised under a guard are delivered after the guard has released
//!   the collection lock.
//!
//! ## Never empty
//!
//! A collection always holds at least one block. Removing the last block
//! synthesizes a paragraph placeholder in the same operation.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::block::{Block, BlockSnapshot};
use crate::block_type::BlockType;
use crate::error::{DocumentError, Result};
use crate::events::{CollectionChange, DocumentEvent, DocumentObserver, EventQueue, ObserverId, ObserverList};
use crate::keys::BlockKey;
use crate::project::Project;
use crate::reconcile::{ReconcileReport, StructureReconciler};

pub type BlockReadGuard<'a> = RwLockReadGuard<'a, Block>;

/// Shared handle to a document's blocks
#[derive(Clone)]
pub struct BlockCollection {
    shared: Arc<Shared>,
}

struct Shared {
    sequence: RwLock<BlockSequence>,
    project: Arc<Project>,
    observers: ObserverList,
}

impl BlockCollection {
    /// Collection holding a single empty block of the project's default type
    pub fn new(project: Arc<Project>) -> Self {
        let mut block = Block::new(project.next_key(), project.default_block_type());
        block.set_structure_node(Some(project.schema().root()));
        Self::from_blocks(project, vec![block])
    }

    /// Bulk-load `(type, text)` pairs, reconciling once at the end
    pub fn from_snapshots(project: Arc<Project>, snapshots: &[BlockSnapshot]) -> Result<Self> {
        if snapshots.is_empty() {
            return Ok(Self::new(project));
        }

        let blocks = {
            let registry = project.registry();
            snapshots
                .iter()
                .map(|snapshot| {
                    let block_type = registry.resolve(&snapshot.block_type)?.clone();
                    Ok(Block::with_text(project.next_key(), block_type, snapshot.text.clone()))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let collection = Self::from_blocks(project, blocks);
        let report = collection.write().reconcile();
        tracing::info!(
            blocks = snapshots.len(),
            parents_changed = report.parents_changed,
            "Loaded block collection"
        );
        Ok(collection)
    }

    fn from_blocks(project: Arc<Project>, blocks: Vec<Block>) -> Self {
        let mut sequence = BlockSequence {
            blocks: blocks.into_iter().map(|b| Arc::new(RwLock::new(b))).collect(),
            index: HashMap::new(),
            retired: HashMap::new(),
        };
        sequence.rebuild_index();

        Self {
            shared: Arc::new(Shared {
                sequence: RwLock::new(sequence),
                project,
                observers: ObserverList::new(),
            }),
        }
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.shared.project
    }

    /// Shared lock on the sequence. Re-entrant for readers on the same thread.
    pub fn read(&self) -> CollectionReadGuard<'_> {
        CollectionReadGuard {
            sequence: self.shared.sequence.read_recursive(),
            project: &self.shared.project,
            dispatch: Dispatcher::new(&self.shared.observers),
        }
    }

    /// Exclusive lock on the sequence
    pub fn write(&self) -> CollectionWriteGuard<'_> {
        CollectionWriteGuard {
            sequence: self.shared.sequence.write(),
            project: &self.shared.project,
            dispatch: Dispatcher::new(&self.shared.observers),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn DocumentObserver>) -> ObserverId {
        self.shared.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.shared.observers.unsubscribe(id)
    }

    /// Block texts in order (takes a read lock)
    pub fn texts(&self) -> Vec<String> {
        self.read().texts()
    }

    pub fn snapshot(&self) -> Vec<BlockSnapshot> {
        self.read().snapshot()
    }
}

impl fmt::Debug for BlockCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCollection")
            .field("observers", &self.shared.observers)
            .finish_non_exhaustive()
    }
}

/// The block arena, reachable through either guard
pub struct BlockSequence {
    blocks: Vec<Arc<RwLock<Block>>>,
    index: HashMap<BlockKey, usize>,
    /// Last version of every removed key, so a key that comes back never
    /// reports an older version
    retired: HashMap<BlockKey, u64>,
}

impl BlockSequence {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false outside of a removal in progress
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, key: BlockKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn index_of(&self, key: BlockKey) -> Result<usize> {
        self.index
            .get(&key)
            .copied()
            .ok_or(DocumentError::BlockNotFound(key))
    }

    pub fn key_at(&self, index: usize) -> Result<BlockKey> {
        Ok(self.block_at(index)?.key())
    }

    pub fn keys(&self) -> Vec<BlockKey> {
        self.iter().map(|block| block.key()).collect()
    }

    pub fn block(&self, key: BlockKey) -> Result<BlockReadGuard<'_>> {
        let index = self.index_of(key)?;
        self.block_at(index)
    }

    pub fn block_at(&self, index: usize) -> Result<BlockReadGuard<'_>> {
        self.blocks
            .get(index)
            .map(|block| block.read_recursive())
            .ok_or(DocumentError::IndexOutOfBounds {
                index,
                len: self.blocks.len(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockReadGuard<'_>> {
        self.blocks.iter().map(|block| block.read_recursive())
    }

    pub fn text(&self, key: BlockKey) -> Result<String> {
        Ok(self.block(key)?.text().to_string())
    }

    pub fn texts(&self) -> Vec<String> {
        self.iter().map(|block| block.text().to_string()).collect()
    }

    pub fn snapshot(&self) -> Vec<BlockSnapshot> {
        self.iter().map(|block| block.snapshot()).collect()
    }

    pub(crate) fn cells(&self) -> &[Arc<RwLock<Block>>] {
        &self.blocks
    }

    fn cell(&self, key: BlockKey) -> Result<&Arc<RwLock<Block>>> {
        let index = self.index_of(key)?;
        Ok(&self.blocks[index])
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (block.read().key(), i))
            .collect();
    }
}

/// Exclusive access to one block, obtained through a collection guard
pub struct BlockWriteGuard<'a> {
    block: RwLockWriteGuard<'a, Block>,
    events: &'a EventQueue,
}

impl Deref for BlockWriteGuard<'_> {
    type Target = Block;

    fn deref(&self) -> &Block {
        &self.block
    }
}

impl DerefMut for BlockWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Block {
        &mut self.block
    }
}

impl Drop for BlockWriteGuard<'_> {
    fn drop(&mut self) {
        self.events.extend(self.block.take_events());
    }
}

/// Delivers queued events when dropped. Guards declare it last so the
/// collection lock is already released by then.
struct Dispatcher<'a> {
    observers: &'a ObserverList,
    queue: EventQueue,
}

impl<'a> Dispatcher<'a> {
    fn new(observers: &'a ObserverList) -> Self {
        Self {
            observers,
            queue: EventQueue::default(),
        }
    }
}

impl Drop for Dispatcher<'_> {
    fn drop(&mut self) {
        let events = self.queue.take();
        self.observers.dispatch(&events);
    }
}

/// Shared lock on a collection
pub struct CollectionReadGuard<'a> {
    sequence: RwLockReadGuard<'a, BlockSequence>,
    project: &'a Arc<Project>,
    dispatch: Dispatcher<'a>,
}

impl CollectionReadGuard<'_> {
    pub fn project(&self) -> &Arc<Project> {
        self.project
    }

    /// Write lock on a single block for a text edit
    pub fn block_mut(&mut self, key: BlockKey) -> Result<BlockWriteGuard<'_>> {
        let cell = self.sequence.cell(key)?;
        Ok(BlockWriteGuard {
            block: cell.write(),
            events: &self.dispatch.queue,
        })
    }
}

impl Deref for CollectionReadGuard<'_> {
    type Target = BlockSequence;

    fn deref(&self) -> &BlockSequence {
        &self.sequence
    }
}

/// What `remove_at` took out of the collection
#[derive(Debug, Clone)]
pub struct BlockRemoval {
    pub index: usize,
    pub block: Block,
    /// Key of the placeholder synthesized because the collection emptied
    pub placeholder: Option<BlockKey>,
}

/// Exclusive lock on a collection
pub struct CollectionWriteGuard<'a> {
    sequence: RwLockWriteGuard<'a, BlockSequence>,
    project: &'a Arc<Project>,
    dispatch: Dispatcher<'a>,
}

impl CollectionWriteGuard<'_> {
    pub fn project(&self) -> &Arc<Project> {
        self.project
    }

    pub fn block_mut(&mut self, key: BlockKey) -> Result<BlockWriteGuard<'_>> {
        let cell = self.sequence.cell(key)?;
        Ok(BlockWriteGuard {
            block: cell.write(),
            events: &self.dispatch.queue,
        })
    }

    /// New detached block with a fresh key
    pub fn create_block(&self, block_type: BlockType) -> Block {
        Block::new(self.project.next_key(), block_type)
    }

    /// New detached block of the project's default type
    pub fn create_default_block(&self) -> Block {
        self.create_block(self.project.default_block_type())
    }

    pub fn insert(&mut self, index: usize, mut block: Block) -> Result<BlockKey> {
        let len = self.sequence.len();
        if index > len {
            return Err(DocumentError::IndexOutOfBounds { index, len });
        }
        let key = block.key();
        if let Some(floor) = self.sequence.retired.remove(&key) {
            block.resume_version(floor);
        }
        self.sequence.blocks.insert(index, Arc::new(RwLock::new(block)));
        self.sequence.rebuild_index();
        self.raise(DocumentEvent::CollectionChanged(CollectionChange::Inserted { index, key }));
        Ok(key)
    }

    pub fn push(&mut self, block: Block) -> Result<BlockKey> {
        let len = self.sequence.len();
        self.insert(len, block)
    }

    /// Remove the block at `index`. If that empties the collection a fresh
    /// paragraph placeholder takes its place.
    pub fn remove_at(&mut self, index: usize) -> Result<BlockRemoval> {
        self.remove_at_with(index, None)
    }

    /// Like `remove_at`, but a needed placeholder gets `placeholder_key`
    /// instead of a fresh key. Redo paths pass the key they were given the
    /// first time so keys stay stable.
    pub fn remove_at_with(
        &mut self,
        index: usize,
        placeholder_key: Option<BlockKey>,
    ) -> Result<BlockRemoval> {
        let len = self.sequence.len();
        if index >= len {
            return Err(DocumentError::IndexOutOfBounds { index, len });
        }

        let cell = self.sequence.blocks.remove(index);
        let block = match Arc::try_unwrap(cell) {
            Ok(lock) => lock.into_inner(),
            Err(shared) => shared.read().clone(),
        };
        self.sequence.retired.insert(block.key(), block.version());
        self.sequence.rebuild_index();
        self.raise(DocumentEvent::CollectionChanged(CollectionChange::Removed {
            index,
            key: block.key(),
        }));

        let placeholder = if self.sequence.is_empty() {
            let key = placeholder_key.unwrap_or_else(|| self.project.next_key());
            let mut placeholder = Block::new(key, self.project.registry().paragraph());
            placeholder.set_structure_node(Some(self.project.schema().root()));
            tracing::debug!(removed = %block.key(), placeholder = %placeholder.key(), "Collection emptied, synthesized placeholder");
            Some(self.insert(0, placeholder)?)
        } else {
            None
        };

        Ok(BlockRemoval {
            index,
            block,
            placeholder,
        })
    }

    pub fn remove(&mut self, key: BlockKey) -> Result<BlockRemoval> {
        let index = self.sequence.index_of(key)?;
        self.remove_at(index)
    }

    /// Drop every block, leaving a single paragraph placeholder
    pub fn clear(&mut self) -> BlockKey {
        let sequence = &mut *self.sequence;
        for cell in sequence.blocks.drain(..) {
            let block = cell.read();
            sequence.retired.insert(block.key(), block.version());
        }
        self.raise(DocumentEvent::CollectionChanged(CollectionChange::Cleared));

        let mut placeholder = Block::new(self.project.next_key(), self.project.registry().paragraph());
        placeholder.set_structure_node(Some(self.project.schema().root()));
        let key = placeholder.key();
        self.sequence.blocks.push(Arc::new(RwLock::new(placeholder)));
        self.sequence.rebuild_index();
        self.raise(DocumentEvent::CollectionChanged(CollectionChange::Inserted { index: 0, key }));
        key
    }

    /// Replace a block's whole text; returns the new version
    pub fn set_text(&mut self, key: BlockKey, text: impl Into<String>) -> Result<u64> {
        let mut block = self.block_mut(key)?;
        block.set_text(text);
        Ok(block.version())
    }

    pub fn insert_text(&mut self, key: BlockKey, index: usize, text: &str) -> Result<()> {
        self.block_mut(key)?.insert_text(index, text)
    }

    pub fn delete_text(&mut self, key: BlockKey, start: usize, end: usize) -> Result<String> {
        self.block_mut(key)?.delete_text(start, end)
    }

    /// Change a block's type. A real change triggers a reconciliation pass
    /// over the whole collection.
    pub fn set_type(&mut self, key: BlockKey, block_type: BlockType) -> Result<bool> {
        let changed = self.block_mut(key)?.set_type(block_type);
        if changed {
            self.reconcile();
        }
        Ok(changed)
    }

    /// `set_type` by registry name
    pub fn set_type_named(&mut self, key: BlockKey, name: &str) -> Result<bool> {
        let block_type = self.project.block_type(name)?;
        self.set_type(key, block_type)
    }

    /// Re-derive every block's parent and schema node
    pub fn reconcile(&mut self) -> ReconcileReport {
        let schema = self.project.schema();
        StructureReconciler::reconcile_sequence(&self.sequence, &schema, &self.dispatch.queue)
    }

    fn raise(&self, event: DocumentEvent) {
        self.dispatch.queue.push(event);
    }
}

impl Deref for CollectionWriteGuard<'_> {
    type Target = BlockSequence;

    fn deref(&self) -> &BlockSequence {
        &self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collection_with(texts: &[&str]) -> BlockCollection {
        let snapshots: Vec<_> = texts.iter().map(|t| BlockSnapshot::new("Paragraph", *t)).collect();
        BlockCollection::from_snapshots(Arc::new(Project::default()), &snapshots).unwrap()
    }

    fn recorder(collection: &BlockCollection) -> Arc<Mutex<Vec<DocumentEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        collection.subscribe(Arc::new(move |e: &DocumentEvent| sink.lock().push(e.clone())));
        seen
    }

    #[test]
    fn test_new_collection_has_one_block() {
        let collection = BlockCollection::new(Arc::new(Project::default()));
        let guard = collection.read();
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.block_at(0).unwrap().type_name(), "Paragraph");
    }

    #[test]
    fn test_index_of_unknown_key() {
        let collection = collection_with(&["a", "b"]);
        let project = Arc::clone(collection.project());
        let stranger = project.next_key();

        let guard = collection.read();
        assert!(matches!(guard.index_of(stranger), Err(DocumentError::BlockNotFound(_))));
        let second = guard.key_at(1).unwrap();
        assert_eq!(guard.index_of(second).unwrap(), 1);
    }

    #[test]
    fn test_insert_and_remove_raise_events() {
        let collection = collection_with(&["a", "b"]);
        let seen = recorder(&collection);

        {
            let mut guard = collection.write();
            let block = guard.create_default_block();
            let key = guard.insert(1, block).unwrap();
            assert_eq!(guard.index_of(key).unwrap(), 1);
            guard.remove_at(0).unwrap();
            // Nothing delivered while the lock is held
            assert!(seen.lock().is_empty());
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            seen[0],
            DocumentEvent::CollectionChanged(CollectionChange::Inserted { index: 1, .. })
        ));
        assert!(matches!(
            seen[1],
            DocumentEvent::CollectionChanged(CollectionChange::Removed { index: 0, .. })
        ));
        assert_eq!(collection.texts(), vec!["", "b"]);
    }

    #[test]
    fn test_removing_last_block_synthesizes_placeholder() {
        let collection = collection_with(&["only"]);
        let mut guard = collection.write();
        let removal = guard.remove_at(0).unwrap();

        assert_eq!(removal.block.text(), "only");
        let placeholder = removal.placeholder.unwrap();
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.key_at(0).unwrap(), placeholder);
        let block = guard.block_at(0).unwrap();
        assert_eq!(block.type_name(), "Paragraph");
        assert!(block.block_type().is_system);
        assert_eq!(block.parent(), None);
        assert_eq!(block.structure_node(), Some(collection.project().schema().root()));
    }

    #[test]
    fn test_reinserted_key_keeps_its_version() {
        let collection = collection_with(&["a", "b"]);
        let mut guard = collection.write();
        let key = guard.key_at(1).unwrap();
        guard.set_text(key, "bb").unwrap();
        guard.set_text(key, "bbb").unwrap();

        let removal = guard.remove_at(1).unwrap();
        assert_eq!(removal.block.version(), 2);

        // A fresh block under the same key picks up where the old one stopped
        let fresh = Block::new(key, removal.block.block_type().clone());
        guard.insert(1, fresh).unwrap();
        assert_eq!(guard.block(key).unwrap().version(), 2);
        guard.set_text(key, "again").unwrap();
        assert_eq!(guard.block(key).unwrap().version(), 3);
    }

    #[test]
    fn test_out_of_range_insert() {
        let collection = collection_with(&["a"]);
        let mut guard = collection.write();
        let block = guard.create_default_block();
        assert!(matches!(
            guard.insert(5, block),
            Err(DocumentError::IndexOutOfBounds { index: 5, len: 1 })
        ));
    }

    #[test]
    fn test_text_edit_under_read_guard() {
        let collection = collection_with(&["draft"]);
        let seen = recorder(&collection);
        {
            let mut guard = collection.read();
            let key = guard.key_at(0).unwrap();
            let mut block = guard.block_mut(key).unwrap();
            block.insert_text(5, " two").unwrap();
        }
        assert_eq!(collection.texts(), vec!["draft two"]);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_observer_can_relock() {
        let collection = collection_with(&["a"]);
        let inner = collection.clone();
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);
        collection.subscribe(Arc::new(move |_: &DocumentEvent| {
            sink.lock().push(inner.read().len());
        }));

        {
            let mut guard = collection.write();
            let block = guard.create_default_block();
            guard.push(block).unwrap();
        }
        assert_eq!(*lengths.lock(), vec![2]);
    }

    #[test]
    fn test_clear_leaves_placeholder() {
        let collection = collection_with(&["a", "b", "c"]);
        let seen = recorder(&collection);
        let key = collection.write().clear();

        assert_eq!(collection.texts(), vec![""]);
        assert_eq!(collection.read().key_at(0).unwrap(), key);
        let seen = seen.lock();
        assert_eq!(seen[0], DocumentEvent::CollectionChanged(CollectionChange::Cleared));
    }

    #[test]
    fn test_unknown_type_in_snapshot() {
        let result = BlockCollection::from_snapshots(
            Arc::new(Project::default()),
            &[BlockSnapshot::new("Chapter", "One")],
        );
        assert!(matches!(result, Err(DocumentError::UnknownBlockType(_))));
    }
}
