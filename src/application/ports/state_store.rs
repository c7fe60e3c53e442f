//! State Store Port - 键值存储抽象
//!
//! 用于保存播放进度，语义为 last-write-wins，无事务保证

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// State Store Port
#[async_trait]
pub trait StateStorePort: Send + Sync {
    /// 读取，不存在时返回 None
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 写入（覆盖）
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}
