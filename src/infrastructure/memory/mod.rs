//! Memory Layer - In-Memory State
//!
//! 不落盘的 StateStore 实现（测试、一次性会话）

mod state_store;

pub use state_store::InMemoryStateStore;
