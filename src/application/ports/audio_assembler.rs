//! Audio Assembler Port - 音频合并抽象
//!
//! 把有序的 AudioChunk 合并为一个可播放的 AudioArtifact。
//! 实现只做结构性拼接：保持顺序，不改动、不重编码任何 chunk 内容。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AudioArtifact, AudioChunk, AudioFormat};

/// 合并错误
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No chunks to assemble")]
    NoChunks,

    #[error("Incompatible chunks: {0}")]
    IncompatibleChunks(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Merge tool failed: {0}")]
    ToolFailed(String),
}

impl From<std::io::Error> for AssemblyError {
    fn from(err: std::io::Error) -> Self {
        AssemblyError::IoError(err.to_string())
    }
}

/// 合并策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyStrategy {
    /// 内存中直接拼接
    #[default]
    Concat,
    /// 写临时文件 + ffmpeg concat demuxer (-c copy)
    Demux,
}

impl std::fmt::Display for AssemblyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyStrategy::Concat => write!(f, "concat"),
            AssemblyStrategy::Demux => write!(f, "demux"),
        }
    }
}

/// 校验 chunk 非空、顺序正确且格式一致，返回公共格式
pub fn common_format(chunks: &[AudioChunk]) -> Result<AudioFormat, AssemblyError> {
    let first = chunks.first().ok_or(AssemblyError::NoChunks)?;

    for (position, chunk) in chunks.iter().enumerate() {
        if chunk.index != position {
            return Err(AssemblyError::InvalidInput(format!(
                "chunk at position {} has index {}",
                position, chunk.index
            )));
        }
        if chunk.format != first.format {
            return Err(AssemblyError::IncompatibleChunks(format!(
                "chunk {} is {}, expected {}",
                chunk.index, chunk.format, first.format
            )));
        }
    }

    Ok(first.format)
}

/// Audio Assembler Port
#[async_trait]
pub trait AudioAssemblerPort: Send + Sync {
    /// 按顺序合并 chunks
    ///
    /// chunks 必须按 index 从 0 连续排列
    async fn assemble(&self, chunks: Vec<AudioChunk>) -> Result<AudioArtifact, AssemblyError>;

    /// 策略名（日志用）
    fn strategy(&self) -> AssemblyStrategy;
}
