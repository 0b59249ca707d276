//! Content pipeline behavior: command routing, error contract, index feed.

use std::sync::Arc;

use xiphos::content::{
    Command, CommandOutput, ContentPipeline, ContentReader, EntryUpdate, InMemoryContentStore,
    IndexingInterceptor, InvocationContext, ObjectSummary, PropertyValue, StoredObject,
    WriteCommand,
};
use xiphos::error::XiphosError;
use xiphos::index::{IndexLookup, NoAggregationPolicy, SegmentManager, SegmentManagerConfig};
use xiphos::schema::BaseType;
use xiphos::storage::MemoryStorage;

fn store_with_tree() -> Arc<InMemoryContentStore> {
    let store = Arc::new(InMemoryContentStore::new());
    store.put(StoredObject::new(
        ObjectSummary {
            id: "root".to_string(),
            parent_id: None,
            name: "root".to_string(),
            type_name: "folder".to_string(),
            base: BaseType::Folder,
        },
        vec![],
    ));
    store.put(StoredObject::new(
        ObjectSummary {
            id: "doc1".to_string(),
            parent_id: Some("root".to_string()),
            name: "doc1.txt".to_string(),
            type_name: "document".to_string(),
            base: BaseType::Document,
        },
        vec![(
            "title".to_string(),
            PropertyValue::Text("First".to_string()),
        )],
    ));
    store
}

fn manager() -> Arc<SegmentManager> {
    Arc::new(
        SegmentManager::new(
            SegmentManagerConfig::default(),
            Arc::new(MemoryStorage::new()),
            Box::new(NoAggregationPolicy),
        )
        .unwrap(),
    )
}

fn pipeline(store: Arc<InMemoryContentStore>, manager: Arc<SegmentManager>) -> ContentPipeline {
    ContentPipeline::new(vec![
        Arc::new(IndexingInterceptor::new(manager)),
        Arc::new(ContentReader::new(store)),
    ])
}

#[test]
fn test_child_entries_of_non_folder_is_empty_sequence() {
    let pipeline = pipeline(store_with_tree(), manager());

    let output = pipeline
        .execute(
            &InvocationContext::new(),
            &Command::get_child_entries("doc1"),
        )
        .unwrap();
    let entries = output.into_entries().unwrap();
    assert!(entries.is_empty());
}

#[test]
fn test_child_entries_of_missing_id_is_not_found() {
    let pipeline = pipeline(store_with_tree(), manager());

    let result = pipeline.execute(
        &InvocationContext::new(),
        &Command::get_child_entries("no-such-id"),
    );
    assert!(matches!(result, Err(XiphosError::NotFound(_))));
}

#[test]
fn test_entry_properties_load_lazily() {
    let pipeline = pipeline(store_with_tree(), manager());

    let output = pipeline
        .execute(
            &InvocationContext::new(),
            &Command::get_content_entry("doc1"),
        )
        .unwrap();
    let entry = output.into_entry().unwrap();

    assert_eq!(entry.type_name(), "document");
    assert_eq!(
        entry.property("title").unwrap(),
        Some(PropertyValue::Text("First".to_string()))
    );
    assert_eq!(entry.property("unset").unwrap(), None);
}

#[test]
fn test_write_commands_update_the_index() {
    let manager = manager();
    let pipeline = pipeline(store_with_tree(), manager.clone());

    let command = Command::Write(WriteCommand::IndexEntries {
        entries: vec![EntryUpdate {
            id: "new1".to_string(),
            parent_id: Some("root".to_string()),
            name: "new1.txt".to_string(),
            type_name: "document".to_string(),
            base: BaseType::Document,
            properties: vec![(
                "title".to_string(),
                PropertyValue::Text("Fresh entry".to_string()),
            )],
        }],
    });
    let output = pipeline.execute(&InvocationContext::new(), &command).unwrap();
    assert!(matches!(output, CommandOutput::Accepted));
    assert!(manager.snapshot().contains("new1"));

    let command = Command::Write(WriteCommand::RemoveEntries {
        ids: vec!["new1".to_string()],
    });
    pipeline.execute(&InvocationContext::new(), &command).unwrap();
    assert!(!manager.snapshot().contains("new1"));
}

#[test]
fn test_read_observation_feeds_the_index() {
    let manager = manager();
    let pipeline = pipeline(store_with_tree(), manager.clone());
    assert!(!manager.snapshot().contains("doc1"));

    pipeline
        .execute(
            &InvocationContext::new(),
            &Command::get_content_entry("doc1"),
        )
        .unwrap();

    // The observed entry is now queryable.
    let snapshot = manager.snapshot();
    assert!(snapshot.contains("doc1"));
    let hits = snapshot.evaluate(&IndexLookup::FullText {
        property: None,
        terms: vec!["first".to_string()],
    });
    assert!(hits.contains("doc1"));
}
