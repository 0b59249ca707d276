//! Interceptor feeding the index-update path.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

use crate::content::command::{Command, CommandOutput, EntryUpdate, InvocationContext, WriteCommand};
use crate::content::entry::ContentEntry;
use crate::content::pipeline::{Interceptor, NextInterceptor};
use crate::error::Result;

/// Receiver of index updates produced by the pipeline.
pub trait IndexFeed: Send + Sync + Debug {
    /// Apply entry additions/replacements to the index.
    fn apply(&self, updates: &[EntryUpdate]) -> Result<()>;

    /// Remove entries from the index.
    fn remove(&self, ids: &[String]) -> Result<()>;

    /// Note an entry observed on the read path; best effort, must never
    /// fail the read.
    fn observe(&self, entry: &ContentEntry);
}

/// Pipeline interceptor on the write/observation side of indexing.
///
/// Consumes write-side commands outright and, on the read path, reports
/// entries flowing back so newly observed content reaches the index. Must
/// run somewhere before the terminal reader; it assumes nothing else about
/// chain order.
#[derive(Debug)]
pub struct IndexingInterceptor {
    feed: Arc<dyn IndexFeed>,
}

impl IndexingInterceptor {
    /// Create the interceptor over an index feed.
    pub fn new(feed: Arc<dyn IndexFeed>) -> Self {
        IndexingInterceptor { feed }
    }
}

impl Interceptor for IndexingInterceptor {
    fn invoke(
        &self,
        context: &InvocationContext,
        command: &Command,
        next: NextInterceptor<'_>,
    ) -> Result<CommandOutput> {
        match command {
            Command::Write(WriteCommand::IndexEntries { entries }) => {
                debug!(count = entries.len(), "applying index entries");
                self.feed.apply(entries)?;
                Ok(CommandOutput::Accepted)
            }
            Command::Write(WriteCommand::RemoveEntries { ids }) => {
                debug!(count = ids.len(), "removing index entries");
                self.feed.remove(ids)?;
                Ok(CommandOutput::Accepted)
            }
            Command::Read(_) => {
                let output = next.proceed(context, command)?;
                match &output {
                    CommandOutput::Entry(entry) => self.feed.observe(entry),
                    CommandOutput::Entries(entries) => {
                        for entry in entries {
                            self.feed.observe(entry);
                        }
                    }
                    CommandOutput::Accepted => {}
                }
                Ok(output)
            }
        }
    }
}
