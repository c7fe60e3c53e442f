//! TTS Engine Port - 语音合成供应商抽象
//!
//! 一次调用合成一个文本片段，具体实现在 infrastructure/adapters 层。
//! 本层不做重试，重试策略由 ChunkOrchestrator 决定。

use async_trait::async_trait;
use thiserror::Error;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    /// 网络层失败（连接、读取响应体）
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout")]
    Timeout,

    /// 供应商明确拒绝了该片段（非 2xx）
    #[error("Provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TtsError {
    /// 只有传输层失败值得重试；供应商拒绝通常是持久性的
    pub fn is_retryable(&self) -> bool {
        matches!(self, TtsError::Transport(_) | TtsError::Timeout)
    }
}

/// 单个片段的合成结果
#[derive(Debug, Clone)]
pub struct SynthesisResponse {
    /// 原始编码音频
    pub audio_data: Vec<u8>,
    /// 供应商声明的 Content-Type
    pub content_type: Option<String>,
}

/// TTS Engine Port
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 合成一段文本
    async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, TtsError>;

    /// 检查 TTS 服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
