//! Assembler Adapter - AudioAssemblerPort 实现
//!
//! - concat: 内存拼接（MP3/OGG 按字节，WAV 重写头）
//! - demux: 临时文件 + ffmpeg concat demuxer

mod concat_assembler;
mod demux_assembler;
mod probe;
mod wav;

use std::sync::Arc;

pub use concat_assembler::ConcatAssembler;
pub use demux_assembler::{DemuxConcatAssembler, DemuxConcatAssemblerConfig};

use crate::application::ports::{AssemblyError, AssemblyStrategy, AudioAssemblerPort};

/// 按策略创建合并器
pub async fn create_assembler(
    strategy: AssemblyStrategy,
    demux_config: DemuxConcatAssemblerConfig,
) -> Result<Arc<dyn AudioAssemblerPort>, AssemblyError> {
    match strategy {
        AssemblyStrategy::Concat => Ok(Arc::new(ConcatAssembler::new())),
        AssemblyStrategy::Demux => Ok(Arc::new(DemuxConcatAssembler::new(demux_config).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assembler_by_strategy() {
        let scratch = tempfile::tempdir().unwrap();
        let demux_config = DemuxConcatAssemblerConfig {
            scratch_dir: scratch.path().to_path_buf(),
            ..Default::default()
        };

        let concat = create_assembler(AssemblyStrategy::Concat, demux_config.clone())
            .await
            .unwrap();
        assert_eq!(concat.strategy(), AssemblyStrategy::Concat);

        let demux = create_assembler(AssemblyStrategy::Demux, demux_config)
            .await
            .unwrap();
        assert_eq!(demux.strategy(), AssemblyStrategy::Demux);
    }
}
