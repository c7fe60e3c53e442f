//! Concat Assembler - 内存中直接拼接
//!
//! - MP3 / OGG: 按字节顺序拼接（帧流 / 串联流）
//! - WAV: 解析每个 RIFF 头，数据块拼接后重写一个头

use async_trait::async_trait;

use super::probe::probe_in_background;
use super::wav::merge_wav;
use crate::application::ports::{
    common_format, AssemblyError, AssemblyStrategy, AudioAssemblerPort,
};
use crate::domain::{AudioArtifact, AudioChunk};

/// 直接拼接的合并器
#[derive(Debug, Default, Clone)]
pub struct ConcatAssembler;

impl ConcatAssembler {
    pub fn new() -> Self {
        Self
    }

    fn join_bytes(chunks: &[AudioChunk]) -> Vec<u8> {
        let total: usize = chunks.iter().map(AudioChunk::len).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in chunks {
            out.extend_from_slice(&chunk.audio_data);
        }
        out
    }
}

#[async_trait]
impl AudioAssemblerPort for ConcatAssembler {
    async fn assemble(&self, chunks: Vec<AudioChunk>) -> Result<AudioArtifact, AssemblyError> {
        let format = common_format(&chunks)?;
        let chunk_count = chunks.len();

        let audio_data = if format.is_byte_concatenable() {
            Self::join_bytes(&chunks)
        } else {
            merge_wav(&chunks)?
        };
        drop(chunks);

        let (audio_data, duration_ms) = probe_in_background(audio_data, format).await?;

        tracing::debug!(
            format = %format,
            chunk_count,
            audio_size = audio_data.len(),
            "Chunks concatenated"
        );

        Ok(AudioArtifact {
            audio_data,
            format,
            duration_ms,
            chunk_count,
        })
    }

    fn strategy(&self) -> AssemblyStrategy {
        AssemblyStrategy::Concat
    }
}
