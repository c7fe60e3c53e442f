//! Demux Concat Assembler - ffmpeg concat demuxer 合并
//!
//! 每个请求:
//! 1. 在独占临时目录写入各片段 + 有序清单
//! 2. ffmpeg -f concat -safe 0 -i 清单 -c copy 输出（只做流拷贝）
//! 3. 读回输出，删除临时目录（成功和失败路径都删除）

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::probe::probe_in_background;
use crate::application::ports::{
    common_format, AssemblyError, AssemblyStrategy, AudioAssemblerPort,
};
use crate::domain::{AudioArtifact, AudioChunk, AudioFormat};
use crate::infrastructure::adapters::storage::{ScratchStorage, ScratchWorkspace};

/// ffmpeg stderr 最多保留的字符数
const MAX_STDERR_CHARS: usize = 500;

/// Demux Assembler 配置
#[derive(Debug, Clone)]
pub struct DemuxConcatAssemblerConfig {
    /// ffmpeg 可执行文件
    pub ffmpeg_path: PathBuf,
    /// 临时目录根
    pub scratch_dir: PathBuf,
}

impl Default for DemuxConcatAssemblerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            scratch_dir: std::env::temp_dir().join("chaptercast"),
        }
    }
}

/// 基于 ffmpeg concat demuxer 的合并器
pub struct DemuxConcatAssembler {
    config: DemuxConcatAssemblerConfig,
    storage: ScratchStorage,
}

impl DemuxConcatAssembler {
    pub async fn new(config: DemuxConcatAssemblerConfig) -> Result<Self, AssemblyError> {
        let storage = ScratchStorage::new(&config.scratch_dir).await?;
        Ok(Self { config, storage })
    }

    async fn merge_in(
        &self,
        workspace: &ScratchWorkspace,
        chunks: &[AudioChunk],
        format: AudioFormat,
    ) -> Result<Vec<u8>, AssemblyError> {
        let mut paths = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            paths.push(workspace.save_chunk(chunk).await?);
        }
        let manifest = workspace.write_manifest(&paths).await?;
        let output = workspace.output_path(format);

        tracing::debug!(
            request_id = %workspace.request_id(),
            ffmpeg = %self.config.ffmpeg_path.display(),
            chunks = chunks.len(),
            "Running ffmpeg concat demuxer"
        );

        // future 被丢弃时子进程随之被杀
        let result = Command::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&manifest)
            .args(["-c", "copy", "-y"])
            .arg(&output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AssemblyError::ToolFailed(format!(
                    "failed to run {}: {}",
                    self.config.ffmpeg_path.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stderr: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            return Err(AssemblyError::ToolFailed(format!(
                "ffmpeg exited with {}: {}",
                result.status, stderr
            )));
        }

        Ok(tokio::fs::read(&output).await?)
    }
}

#[async_trait]
impl AudioAssemblerPort for DemuxConcatAssembler {
    async fn assemble(&self, chunks: Vec<AudioChunk>) -> Result<AudioArtifact, AssemblyError> {
        let format = common_format(&chunks)?;
        let chunk_count = chunks.len();

        let workspace = self.storage.create_workspace()?;
        let request_id = workspace.request_id();
        let merged = self.merge_in(&workspace, &chunks, format).await;
        drop(chunks);

        if let Err(e) = workspace.cleanup() {
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                "Failed to remove scratch workspace"
            );
        }

        let audio_data = merged?;
        let (audio_data, duration_ms) = probe_in_background(audio_data, format).await?;

        tracing::debug!(
            request_id = %request_id,
            format = %format,
            chunk_count,
            audio_size = audio_data.len(),
            "Chunks merged with ffmpeg"
        );

        Ok(AudioArtifact {
            audio_data,
            format,
            duration_ms,
            chunk_count,
        })
    }

    fn strategy(&self) -> AssemblyStrategy {
        AssemblyStrategy::Demux
    }
}
