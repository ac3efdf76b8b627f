//! # Block identity
//!
//! `BlockKey` names a block for the lifetime of the process. `BlockPosition`
//! pairs a key with a character offset into that block's text.
//!
//! Keys are minted by a `KeyGenerator` owned by the project rather than a
//! global counter, so every test (and every open project) gets its own
//! sequence. Keys are never persisted: loading a document mints fresh ones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-unique identifier of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey(u64);

impl BlockKey {
    /// Reserved key that never names a live block
    pub const NONE: BlockKey = BlockKey(0);

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of `BlockKey`s
#[derive(Debug)]
pub struct KeyGenerator {
    next: AtomicU64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Mint a key that has never been returned by this generator
    pub fn next_key(&self) -> BlockKey {
        BlockKey(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of keys minted so far
    pub fn minted(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A character offset inside a specific block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPosition {
    pub key: BlockKey,
    pub text_index: usize,
}

impl BlockPosition {
    /// "No position"
    pub const EMPTY: BlockPosition = BlockPosition {
        key: BlockKey::NONE,
        text_index: 0,
    };

    pub fn new(key: BlockKey, text_index: usize) -> Self {
        Self { key, text_index }
    }

    pub fn start_of(key: BlockKey) -> Self {
        Self::new(key, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_none()
    }

    /// Same block, different offset
    pub fn with_index(self, text_index: usize) -> Self {
        Self::new(self.key, text_index)
    }
}

impl Default for BlockPosition {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for BlockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.text_index)
    }
}
