//! Concurrent access through collection and block guards

use std::sync::Arc;
use std::thread;

use quire_document::{BlockCollection, BlockSnapshot, Project};

fn collection_with(count: usize) -> BlockCollection {
    let snapshots: Vec<_> = (0..count)
        .map(|i| BlockSnapshot::new("Paragraph", format!("Line {}", i + 1)))
        .collect();
    BlockCollection::from_snapshots(Arc::new(Project::default()), &snapshots).unwrap()
}

#[test]
fn test_parallel_edits_on_distinct_blocks() {
    let collection = collection_with(4);
    let keys = collection.read().keys();

    let handles: Vec<_> = keys
        .iter()
        .copied()
        .map(|key| {
            let collection = collection.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let mut guard = collection.read();
                    let mut block = guard.block_mut(key).unwrap();
                    let end = block.char_len();
                    block.insert_text(end, ".").unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let guard = collection.read();
    for block in guard.iter() {
        assert!(block.text().ends_with(&".".repeat(50)));
        assert_eq!(block.version(), 50);
    }
}

#[test]
fn test_readers_and_structural_writer() {
    let collection = collection_with(2);

    let writer = {
        let collection = collection.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                let mut guard = collection.write();
                let block = guard.create_default_block();
                guard.push(block).unwrap();
            }
        })
    };

    let reader = {
        let collection = collection.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                let guard = collection.read();
                // Keys and index always agree inside one guard
                for (index, key) in guard.keys().into_iter().enumerate() {
                    assert_eq!(guard.index_of(key).unwrap(), index);
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(collection.read().len(), 102);
}

#[test]
fn test_cached_copy_detects_staleness() {
    let collection = collection_with(1);
    let key = collection.read().key_at(0).unwrap();

    // A renderer caches the text and version outside any lock
    let (cached_text, cached_version) = {
        let guard = collection.read();
        let block = guard.block(key).unwrap();
        (block.text().to_string(), block.version())
    };

    {
        let mut guard = collection.write();
        guard.set_text(key, "Line 1 revised").unwrap();
    }

    let guard = collection.read();
    let block = guard.block(key).unwrap();
    assert!(block.is_stale(cached_version));
    assert_ne!(block.text(), cached_text);
}

#[test]
fn test_nested_read_guards() {
    let collection = collection_with(3);
    let outer = collection.read();
    let inner = collection.read();
    assert_eq!(outer.len(), inner.len());
}
