//! 应用层错误定义
//!
//! 文档级合成请求与客户端播放的错误分类

use thiserror::Error;

use crate::application::ports::{AssemblyError, DocumentError};

/// 合成请求错误
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// 没有可合成的文本（用户可修正，不重试）
    #[error("No text provided")]
    EmptyInput,

    /// 至少一个片段用尽重试预算，整个请求失败
    #[error("Synthesis failed for segments {failed_indices:?} of {total}")]
    PartialSynthesis {
        failed_indices: Vec<usize>,
        total: usize,
    },

    /// 合并失败
    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    /// 远端合成服务不可用（仅客户端适配器使用）
    #[error("Synthesis service unavailable: {0}")]
    Unavailable(String),
}

impl SynthesisError {
    pub fn partial(mut failed_indices: Vec<usize>, total: usize) -> Self {
        failed_indices.sort_unstable();
        failed_indices.dedup();
        Self::PartialSynthesis {
            failed_indices,
            total,
        }
    }
}

/// 播放管理器错误
///
/// 只在管理器内部流转，对外表现为 PlayerCommand::Failed
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Unknown content unit: {0}")]
    UnknownUnit(String),

    #[error("Document has no content units")]
    NoContentUnits,
}
