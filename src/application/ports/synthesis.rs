//! Synthesis Port - 文档级合成抽象
//!
//! 客户端（播放管理器）通过此端口把一个章节的文本变成完整音频，
//! 可以是进程内的 SynthesisService，也可以是远端 HTTP 服务

use async_trait::async_trait;

use crate::application::error::SynthesisError;
use crate::domain::AudioArtifact;

/// Synthesis Port
#[async_trait]
pub trait SynthesisPort: Send + Sync {
    async fn synthesize_document(&self, text: &str) -> Result<AudioArtifact, SynthesisError>;
}
