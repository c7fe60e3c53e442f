//! In-Memory State Store

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::ports::{StateStorePort, StoreError};

/// 内存键值存储，进程退出即丢失
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, String>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateStorePort for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
