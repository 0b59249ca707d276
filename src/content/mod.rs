//! Content access pipeline: commands, interceptors and content entries.
//!
//! All content reads flow through an ordered interceptor chain whose
//! terminal element adapts the backing storage; everything upstream is a
//! cross-cutting concern such as feeding the index-update path.

pub mod command;
pub mod entry;
pub mod indexing;
pub mod pipeline;
pub mod reader;
pub mod store;
pub mod value;

pub use self::command::{
    Command, CommandOutput, EntryUpdate, InvocationContext, ReadCommand, WriteCommand,
};
pub use self::entry::{ContentEntry, PropertyLoader};
pub use self::indexing::{IndexFeed, IndexingInterceptor};
pub use self::pipeline::{ContentPipeline, Interceptor, NextInterceptor};
pub use self::reader::ContentReader;
pub use self::store::{ContentStore, InMemoryContentStore, ObjectSummary, StoredObject};
pub use self::value::PropertyValue;
