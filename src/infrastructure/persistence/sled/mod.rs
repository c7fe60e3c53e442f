//! Sled 存储实现

mod state_store;

pub use state_store::{SledStateStore, SledStateStoreConfig};
