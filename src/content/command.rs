//! Commands flowing through the content access pipeline.

use serde::{Deserialize, Serialize};

use crate::content::entry::ContentEntry;
use crate::content::value::PropertyValue;
use crate::schema::BaseType;

/// Indexable projection of one stored object, carried by write-side
/// commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryUpdate {
    /// Object identifier.
    pub id: String,
    /// Parent object identifier, `None` for the root.
    pub parent_id: Option<String>,
    /// Object name within its parent.
    pub name: String,
    /// Content-type name.
    pub type_name: String,
    /// Base kind.
    pub base: BaseType,
    /// Property values to index.
    pub properties: Vec<(String, PropertyValue)>,
}

/// Read-side commands; these travel the whole chain to the terminal reader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReadCommand {
    /// List the child entries of a folder object.
    GetChildEntries {
        /// The folder object id.
        parent_id: String,
    },
    /// Fetch one content entry.
    GetContentEntry {
        /// The object id.
        entry_id: String,
    },
}

/// Write-side commands; consumed by the indexing interceptor, never by the
/// terminal reader.
#[derive(Debug, Clone)]
pub enum WriteCommand {
    /// Add or replace entries in the index.
    IndexEntries {
        /// The entries to index.
        entries: Vec<EntryUpdate>,
    },
    /// Remove entries from the index.
    RemoveEntries {
        /// The object ids to remove.
        ids: Vec<String>,
    },
}

/// A command travelling the interceptor chain. Immutable value object.
#[derive(Debug, Clone)]
pub enum Command {
    /// Read-side command.
    Read(ReadCommand),
    /// Write-side command.
    Write(WriteCommand),
}

impl Command {
    /// Shorthand for a child-listing command.
    pub fn get_child_entries(parent_id: impl Into<String>) -> Self {
        Command::Read(ReadCommand::GetChildEntries {
            parent_id: parent_id.into(),
        })
    }

    /// Shorthand for a single-entry fetch command.
    pub fn get_content_entry(entry_id: impl Into<String>) -> Self {
        Command::Read(ReadCommand::GetContentEntry {
            entry_id: entry_id.into(),
        })
    }
}

/// Per-request ambient data carried alongside a command.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    /// Authenticated principal issuing the request, if any.
    pub principal: Option<String>,
    /// Transaction token the request runs under, if any.
    pub transaction: Option<String>,
}

impl InvocationContext {
    /// Create an empty context.
    pub fn new() -> Self {
        InvocationContext::default()
    }

    /// Attach a principal.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Attach a transaction token.
    pub fn with_transaction(mut self, transaction: impl Into<String>) -> Self {
        self.transaction = Some(transaction.into());
        self
    }
}

/// Result of executing a command against the pipeline.
#[derive(Debug)]
pub enum CommandOutput {
    /// A single content entry.
    Entry(ContentEntry),
    /// A sequence of content entries.
    Entries(Vec<ContentEntry>),
    /// A write command was consumed.
    Accepted,
}

impl CommandOutput {
    /// Unwrap a single-entry output.
    pub fn into_entry(self) -> Option<ContentEntry> {
        match self {
            CommandOutput::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// Unwrap a multi-entry output.
    pub fn into_entries(self) -> Option<Vec<ContentEntry>> {
        match self {
            CommandOutput::Entries(entries) => Some(entries),
            _ => None,
        }
    }
}
