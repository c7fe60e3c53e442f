//! Storage Adapter - 合并用的临时文件工作区

mod scratch_workspace;

pub use scratch_workspace::{ScratchStorage, ScratchWorkspace};
