//! Scratch Workspace - 每个合并请求独占的临时目录
//!
//! 目录名带 uuid，请求之间互不共享；
//! 显式 cleanup 或 Drop 时整个目录被删除

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use uuid::Uuid;

use crate::domain::{AudioChunk, AudioFormat};

/// 临时工作区的根目录
#[derive(Debug, Clone)]
pub struct ScratchStorage {
    base_dir: PathBuf,
}

impl ScratchStorage {
    /// 创建根目录（不存在时）
    pub async fn new(base_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 为一个请求创建独占工作区
    pub fn create_workspace(&self) -> std::io::Result<ScratchWorkspace> {
        let request_id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("assemble-{}-", request_id))
            .tempdir_in(&self.base_dir)?;

        tracing::debug!(
            request_id = %request_id,
            path = %dir.path().display(),
            "Created scratch workspace"
        );

        Ok(ScratchWorkspace {
            request_id,
            dir: Some(dir),
        })
    }
}

/// 单个请求的临时目录
///
/// 离开作用域时目录随 TempDir 一起删除
#[derive(Debug)]
pub struct ScratchWorkspace {
    request_id: Uuid,
    dir: Option<TempDir>,
}

impl ScratchWorkspace {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// 片段文件路径，文件名按序号补零保证字典序即播放序
    pub fn chunk_path(&self, index: usize, format: AudioFormat) -> PathBuf {
        self.path()
            .join(format!("segment_{:05}.{}", index, format.extension()))
    }

    pub fn output_path(&self, format: AudioFormat) -> PathBuf {
        self.path().join(format!("merged.{}", format.extension()))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("concat.txt")
    }

    /// 写入一个片段
    pub async fn save_chunk(&self, chunk: &AudioChunk) -> std::io::Result<PathBuf> {
        let path = self.chunk_path(chunk.index, chunk.format);
        fs::write(&path, &chunk.audio_data).await?;
        Ok(path)
    }

    /// 写入 ffmpeg concat demuxer 清单
    pub async fn write_manifest(&self, paths: &[PathBuf]) -> std::io::Result<PathBuf> {
        let mut manifest = String::new();
        for path in paths {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            manifest.push_str(&format!("file '{}'\n", escaped));
        }

        let manifest_path = self.manifest_path();
        fs::write(&manifest_path, manifest).await?;
        Ok(manifest_path)
    }

    /// 删除工作区
    pub fn cleanup(mut self) -> std::io::Result<()> {
        match self.dir.take() {
            Some(dir) => {
                tracing::debug!(request_id = %self.request_id, "Removing scratch workspace");
                dir.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if self.dir.is_some() {
            tracing::debug!(
                request_id = %self.request_id,
                "Scratch workspace dropped without cleanup, removing"
            );
        }
    }
}
