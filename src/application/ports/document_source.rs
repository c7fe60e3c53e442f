//! Document Source Port - 文档源抽象
//!
//! 文档容器（EPUB 等）的解析在本系统之外，
//! 这里只要求：有序的内容单元列表 + 按单元取纯文本

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ContentUnit;

/// 文档源错误
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Content unit not found: {0}")]
    UnitNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// Document Source Port
#[async_trait]
pub trait DocumentSourcePort: Send + Sync {
    /// 文档标识（播放进度按此存储）
    fn document_id(&self) -> &str;

    /// 按阅读顺序列出所有内容单元
    async fn list_content_units(&self) -> Result<Vec<ContentUnit>, DocumentError>;

    /// 读取一个单元的纯文本
    async fn load_text(&self, unit: &ContentUnit) -> Result<String, DocumentError>;
}
