//! Document Adapter - DocumentSourcePort 实现

mod in_memory;
mod text_directory;

pub use in_memory::InMemoryDocumentSource;
pub use text_directory::TextDirectorySource;
