//! Terminal interceptor adapting stored objects into content entries.

use std::sync::Arc;

use crate::content::command::{Command, CommandOutput, InvocationContext, ReadCommand};
use crate::content::entry::{ContentEntry, PropertyLoader};
use crate::content::pipeline::{Interceptor, NextInterceptor};
use crate::content::store::{ContentStore, ObjectSummary};
use crate::content::value::PropertyValue;
use crate::error::{Result, XiphosError};
use crate::schema::BaseType;

/// Terminal interceptor of the pipeline; the only element that touches the
/// backing storage.
#[derive(Debug)]
pub struct ContentReader {
    store: Arc<dyn ContentStore>,
}

impl ContentReader {
    /// Create a reader over a content store.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        ContentReader { store }
    }

    fn adapt(&self, summary: ObjectSummary) -> ContentEntry {
        let loader = Arc::new(StoreLoader {
            store: self.store.clone(),
        });
        ContentEntry::new(
            summary.id,
            summary.parent_id,
            summary.name,
            summary.type_name,
            summary.base,
            loader,
        )
    }
}

impl Interceptor for ContentReader {
    fn invoke(
        &self,
        _context: &InvocationContext,
        command: &Command,
        _next: NextInterceptor<'_>,
    ) -> Result<CommandOutput> {
        match command {
            Command::Read(ReadCommand::GetContentEntry { entry_id }) => {
                let summary = self
                    .store
                    .summary(entry_id)?
                    .ok_or_else(|| XiphosError::not_found(format!("object '{entry_id}'")))?;
                Ok(CommandOutput::Entry(self.adapt(summary)))
            }
            Command::Read(ReadCommand::GetChildEntries { parent_id }) => {
                let summary = self
                    .store
                    .summary(parent_id)?
                    .ok_or_else(|| XiphosError::not_found(format!("object '{parent_id}'")))?;
                // Children of a non-folder are an empty listing, not an error.
                if summary.base != BaseType::Folder {
                    return Ok(CommandOutput::Entries(Vec::new()));
                }
                let entries = self
                    .store
                    .children(parent_id)?
                    .into_iter()
                    .map(|child| self.adapt(child))
                    .collect();
                Ok(CommandOutput::Entries(entries))
            }
            Command::Write(_) => Err(XiphosError::execution(
                "write command reached the terminal content reader",
            )),
        }
    }
}

/// Property loader reading through the content store, one value at a time.
struct StoreLoader {
    store: Arc<dyn ContentStore>,
}

impl PropertyLoader for StoreLoader {
    fn load(&self, entry_id: &str, property: &str) -> Result<Option<PropertyValue>> {
        self.store.property(entry_id, property)
    }

    fn load_all(&self, entry_id: &str) -> Result<Vec<(String, PropertyValue)>> {
        self.store.properties(entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::pipeline::ContentPipeline;
    use crate::content::store::{InMemoryContentStore, StoredObject};

    fn fixture_store() -> Arc<InMemoryContentStore> {
        let store = Arc::new(InMemoryContentStore::new());
        store.put(StoredObject::new(
            ObjectSummary {
                id: "root".to_string(),
                parent_id: None,
                name: "root".to_string(),
                type_name: "folder".to_string(),
                base: BaseType::Folder,
            },
            Vec::new(),
        ));
        store.put(StoredObject::new(
            ObjectSummary {
                id: "doc1".to_string(),
                parent_id: Some("root".to_string()),
                name: "report".to_string(),
                type_name: "document".to_string(),
                base: BaseType::Document,
            },
            vec![(
                "title".to_string(),
                PropertyValue::Text("Quarterly report".to_string()),
            )],
        ));
        store
    }

    fn pipeline(store: Arc<InMemoryContentStore>) -> ContentPipeline {
        ContentPipeline::new(vec![Arc::new(ContentReader::new(store))])
    }

    #[test]
    fn test_get_content_entry() {
        let pipeline = pipeline(fixture_store());
        let output = pipeline
            .execute(
                &InvocationContext::new(),
                &Command::get_content_entry("doc1"),
            )
            .unwrap();

        let entry = output.into_entry().unwrap();
        assert_eq!(entry.id(), "doc1");
        assert_eq!(entry.parent_id(), Some("root"));
        assert_eq!(
            entry.property("title").unwrap(),
            Some(PropertyValue::Text("Quarterly report".to_string()))
        );
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let pipeline = pipeline(fixture_store());
        let result = pipeline.execute(
            &InvocationContext::new(),
            &Command::get_content_entry("ghost"),
        );

        assert!(matches!(result, Err(XiphosError::NotFound(_))));
    }

    #[test]
    fn test_children_of_folder() {
        let pipeline = pipeline(fixture_store());
        let output = pipeline
            .execute(
                &InvocationContext::new(),
                &Command::get_child_entries("root"),
            )
            .unwrap();

        let entries = output.into_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id(), "doc1");
    }

    #[test]
    fn test_children_of_non_folder_is_empty() {
        let pipeline = pipeline(fixture_store());
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
    fn test_children_of_missing_id_is_not_found() {
        let pipeline = pipeline(fixture_store());
        let result = pipeline.execute(
            &InvocationContext::new(),
            &Command::get_child_entries("ghost"),
        );

        assert!(matches!(result, Err(XiphosError::NotFound(_))));
    }
}
