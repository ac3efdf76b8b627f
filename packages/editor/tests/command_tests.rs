//! Command behavior through the supervisor
//!
//! This tests:
//! - Block deletion and restore, including the placeholder block
//! - Multi-line paste across blocks
//! - Cursor positions after Do and Undo
//! - Version counters and post-commit events
//! - Undo of typing that an immediate editor rewrote

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use quire_document::{
    BlockCollection, BlockPosition, BlockSnapshot, BlockType, CollectionChange, DocumentEvent,
    Project, ProjectConfig, StructureConfig, PARAGRAPH,
};
use quire_editor::{
    BlockCommandSupervisor, CommandError, DeleteBlockCommand, ImmediateEditorEngine,
    InsertAfterBlockCommand, InsertMultilineTextCommand, InsertTextCommand, ReplaceTextCommand,
    SetBlockTypeCommand, SetTextCommand,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn lines(count: usize) -> BlockCollection {
    let snapshots: Vec<_> = (1..=count)
        .map(|i| BlockSnapshot::new(PARAGRAPH, format!("Line {}", i)))
        .collect();
    BlockCollection::from_snapshots(Arc::new(Project::default()), &snapshots).unwrap()
}

fn recorder(collection: &BlockCollection) -> Arc<Mutex<Vec<DocumentEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    collection.subscribe(Arc::new(move |e: &DocumentEvent| sink.lock().push(e.clone())));
    seen
}

#[test]
fn test_delete_first_block_and_undo() -> Result<()> {
    init_tracing();
    let collection = lines(4);
    let keys = collection.read().keys();
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(DeleteBlockCommand::new(keys[0]))?;
    assert_eq!(collection.texts(), vec!["Line 2", "Line 3", "Line 4"]);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::start_of(keys[1])));

    supervisor.undo()?;
    assert_eq!(collection.texts(), vec!["Line 1", "Line 2", "Line 3", "Line 4"]);
    assert_eq!(collection.read().keys(), keys);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::new(keys[0], 6)));
    Ok(())
}

#[test]
fn test_multiline_paste_and_undo() -> Result<()> {
    init_tracing();
    let collection = lines(2);
    let keys = collection.read().keys();
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(InsertMultilineTextCommand::new(
        BlockPosition::new(keys[0], 5),
        "AAA\nBBB\nCCC",
    ))?;
    assert_eq!(collection.texts(), vec!["Line AAA", "BBB", "CCC1", "Line 2"]);
    let last_new = collection.read().key_at(2)?;
    assert_eq!(supervisor.last_position(), Some(BlockPosition::new(last_new, 3)));

    supervisor.undo()?;
    assert_eq!(collection.texts(), vec!["Line 1", "Line 2"]);
    assert_eq!(collection.read().keys(), keys);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::new(keys[0], 5)));

    // Redo brings back the same blocks
    supervisor.redo()?;
    assert_eq!(collection.texts(), vec!["Line AAA", "BBB", "CCC1", "Line 2"]);
    assert_eq!(collection.read().key_at(2)?, last_new);
    Ok(())
}

#[test]
fn test_multiline_paste_with_windows_line_endings() -> Result<()> {
    let collection = lines(1);
    let key = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(InsertMultilineTextCommand::new(
        BlockPosition::new(key, 0),
        "Title\r\n\r\n",
    ))?;
    assert_eq!(collection.texts(), vec!["Title", "", "Line 1"]);
    Ok(())
}

#[test]
fn test_deleting_only_block_leaves_placeholder() -> Result<()> {
    let collection = lines(1);
    let original = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(DeleteBlockCommand::new(original))?;
    let placeholder = collection.read().key_at(0)?;
    assert_ne!(placeholder, original);
    assert_eq!(collection.texts(), vec![""]);
    assert!(collection.read().block_at(0)?.block_type().is_system);

    supervisor.undo()?;
    assert_eq!(collection.read().keys(), vec![original]);
    assert_eq!(collection.texts(), vec!["Line 1"]);

    supervisor.redo()?;
    assert_eq!(collection.read().keys(), vec![placeholder]);
    Ok(())
}

#[test]
fn test_versions_only_increase() -> Result<()> {
    let collection = lines(1);
    let key = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());
    let version = || collection.read().block(key).map(|b| b.version());

    let mut seen = vec![version()?];
    supervisor.execute(InsertTextCommand::new(BlockPosition::new(key, 6), "!"))?;
    seen.push(version()?);
    supervisor.undo()?;
    seen.push(version()?);
    supervisor.redo()?;
    seen.push(version()?);
    // Identical text still bumps the version
    supervisor.execute(SetTextCommand::new(key, "Line 1!"))?;
    seen.push(version()?);

    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_events_arrive_after_lock_release() -> Result<()> {
    let collection = lines(2);
    let keys = collection.read().keys();
    let seen = recorder(&collection);

    // An observer that takes the collection lock must not deadlock
    let probe = collection.clone();
    let lengths = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lengths);
    collection.subscribe(Arc::new(move |_: &DocumentEvent| sink.lock().push(probe.read().len())));

    let mut supervisor = BlockCommandSupervisor::new(collection.clone());
    supervisor.execute(InsertAfterBlockCommand::new(keys[0], 1))?;

    let seen = seen.lock();
    assert!(matches!(
        seen[0],
        DocumentEvent::CollectionChanged(CollectionChange::Inserted { index: 1, .. })
    ));
    assert!(lengths.lock().iter().all(|len| *len == 3));
    Ok(())
}

#[test]
fn test_set_block_type_through_supervisor() -> Result<()> {
    let config = ProjectConfig {
        block_types: vec![BlockType::structural("Chapter"), BlockType::structural("Scene")],
        structure: StructureConfig::new("Chapter")
            .with_child(StructureConfig::new("Scene").with_child(StructureConfig::new(PARAGRAPH))),
        ..ProjectConfig::default()
    };
    let project = Arc::new(Project::from_config(&config)?);
    let collection = BlockCollection::from_snapshots(
        project,
        &[
            BlockSnapshot::new("Chapter", "One"),
            BlockSnapshot::new(PARAGRAPH, "opening"),
            BlockSnapshot::new(PARAGRAPH, "body"),
        ],
    )?;
    let keys = collection.read().keys();
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(SetBlockTypeCommand::new(keys[1], "Scene"))?;
    assert_eq!(collection.read().block(keys[2])?.parent(), Some(keys[1]));

    supervisor.undo()?;
    assert_eq!(collection.read().block(keys[2])?.parent(), Some(keys[0]));
    Ok(())
}

#[test]
fn test_replace_text_is_one_undo_level() -> Result<()> {
    let collection = lines(1);
    let key = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(ReplaceTextCommand::new(BlockPosition::start_of(key), 4, "Verse"))?;
    assert_eq!(collection.texts(), vec!["Verse 1"]);
    assert_eq!(supervisor.undo_levels(), 1);

    supervisor.undo()?;
    assert_eq!(collection.texts(), vec!["Line 1"]);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::start_of(key)));
    Ok(())
}

#[test]
fn test_immediate_editor_runs_on_typing() -> Result<()> {
    let collection = BlockCollection::from_snapshots(
        Arc::new(Project::default()),
        &[BlockSnapshot::new(PARAGRAPH, "one ")],
    )?;
    let key = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(InsertTextCommand::new(BlockPosition::new(key, 4), " "))?;
    assert_eq!(collection.texts(), vec!["one "]);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::new(key, 4)));

    let mut plain = BlockCommandSupervisor::new(collection.clone())
        .with_immediate_editors(ImmediateEditorEngine::empty());
    plain.execute(InsertTextCommand::new(BlockPosition::new(key, 4), " "))?;
    assert_eq!(collection.texts(), vec!["one  "]);
    Ok(())
}

#[test]
fn test_undo_collapsed_space_at_end_of_block() -> Result<()> {
    let collection = BlockCollection::from_snapshots(
        Arc::new(Project::default()),
        &[BlockSnapshot::new(PARAGRAPH, "one ")],
    )?;
    let key = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(InsertTextCommand::new(BlockPosition::new(key, 4), " "))?;
    assert_eq!(collection.texts(), vec!["one "]);

    assert!(supervisor.undo()?);
    assert_eq!(collection.texts(), vec!["one "]);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::new(key, 4)));
    assert!(!supervisor.can_undo());

    assert!(supervisor.redo()?);
    assert_eq!(collection.texts(), vec!["one "]);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::new(key, 4)));
    Ok(())
}

#[test]
fn test_undo_collapsed_space_before_text() -> Result<()> {
    let collection = BlockCollection::from_snapshots(
        Arc::new(Project::default()),
        &[BlockSnapshot::new(PARAGRAPH, "ab cd")],
    )?;
    let key = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(InsertTextCommand::new(BlockPosition::new(key, 0), ">"))?;
    supervisor.execute(InsertTextCommand::new(BlockPosition::new(key, 4), " "))?;
    assert_eq!(collection.texts(), vec![">ab cd"]);

    // Both edits come back off cleanly, user text intact
    supervisor.undo()?;
    assert_eq!(collection.texts(), vec![">ab cd"]);
    assert_eq!(supervisor.last_position(), Some(BlockPosition::new(key, 4)));
    supervisor.undo()?;
    assert_eq!(collection.texts(), vec!["ab cd"]);

    supervisor.redo()?;
    supervisor.redo()?;
    assert_eq!(collection.texts(), vec![">ab cd"]);
    Ok(())
}

#[test]
fn test_inserted_block_versions_survive_undo_redo() -> Result<()> {
    let collection = lines(1);
    let key = collection.read().key_at(0)?;
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    supervisor.execute(InsertAfterBlockCommand::new(key, 1))?;
    let created = collection.read().key_at(1)?;
    supervisor.execute(SetTextCommand::new(created, "x"))?;

    let version = || collection.read().block(created).map(|b| b.version());
    let mut last = version()?;
    supervisor.undo()?;
    assert!(version()? >= last);
    last = version()?;
    supervisor.undo()?;
    supervisor.redo()?;
    assert_eq!(collection.read().key_at(1)?, created);
    assert!(version()? >= last);
    last = version()?;
    supervisor.redo()?;
    assert!(version()? > last);
    assert_eq!(collection.texts(), vec!["Line 1", "x"]);
    Ok(())
}

#[test]
fn test_unknown_key_is_an_error() {
    let collection = lines(1);
    let stranger = collection.project().next_key();
    let mut supervisor = BlockCommandSupervisor::new(collection.clone());

    let result = supervisor.execute(DeleteBlockCommand::new(stranger));
    assert!(matches!(result, Err(CommandError::Document(_))));
    assert_eq!(collection.texts(), vec!["Line 1"]);
    assert!(!supervisor.can_undo());
}
