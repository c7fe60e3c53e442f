//! Sled-based Playback State Store

use async_trait::async_trait;
use sled::Db;
use std::path::Path;

use crate::application::ports::{StateStorePort, StoreError};

/// Sled 状态存储配置
#[derive(Debug, Clone)]
pub struct SledStateStoreConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledStateStoreConfig {
    fn default() -> Self {
        Self {
            db_path: "data/playback.sled".to_string(),
        }
    }
}

/// Sled 播放进度存储
///
/// 值按 UTF-8 字符串存放，同一 key 后写覆盖先写
pub struct SledStateStore {
    db: Db,
}

impl SledStateStore {
    pub fn new(config: &SledStateStoreConfig) -> Result<Self, StoreError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        tracing::info!(
            db_path = %config.db_path,
            entries = db.len(),
            "SledStateStore initialized"
        );

        Ok(Self { db })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::new(&SledStateStoreConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        })
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl StateStorePort for SledStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.db.get(key) {
            Ok(Some(data)) => {
                let value = String::from_utf8(data.to_vec())
                    .map_err(|e| StoreError::SerializationError(e.to_string()))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::DatabaseError(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.db
            .insert(key, value.into_bytes())
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path().join("state.sled")).unwrap();

        assert_eq!(store.get("playback:book").await.unwrap(), None);

        store.set("playback:book", "first".to_string()).await.unwrap();
        store.set("playback:book", "second".to_string()).await.unwrap();
        assert_eq!(
            store.get("playback:book").await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.sled");

        {
            let store = SledStateStore::open(&path).unwrap();
            store.set("k", "v".to_string()).await.unwrap();
            store.flush().unwrap();
        }

        let store = SledStateStore::open(&path).unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
