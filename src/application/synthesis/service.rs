//! Synthesis Service - 文档级合成用例
//!
//! 文本 → 分段 → 并发合成 → 合并 → AudioArtifact

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::orchestrator::ChunkOrchestrator;
use crate::application::error::SynthesisError;
use crate::application::ports::{AudioAssemblerPort, SynthesisPort};
use crate::domain::{segment_text, AudioArtifact, AudioFormat, SegmentConfig};

/// 空文本的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyTextPolicy {
    /// 返回 EmptyInput 错误
    #[default]
    Reject,
    /// 返回零长度音频，不调用供应商
    EmptyArtifact,
}

/// Synthesis Service 配置
#[derive(Debug, Clone, Default)]
pub struct SynthesisServiceConfig {
    pub segment: SegmentConfig,
    pub empty_text_policy: EmptyTextPolicy,
}

/// 文档级合成服务
pub struct SynthesisService {
    config: SynthesisServiceConfig,
    orchestrator: ChunkOrchestrator,
    assembler: Arc<dyn AudioAssemblerPort>,
}

impl SynthesisService {
    pub fn new(
        config: SynthesisServiceConfig,
        orchestrator: ChunkOrchestrator,
        assembler: Arc<dyn AudioAssemblerPort>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            assembler,
        }
    }

    /// 把一段文本合成为一个完整音频
    pub async fn synthesize_document(&self, text: &str) -> Result<AudioArtifact, SynthesisError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("synthesize", request_id = %request_id);
        self.run(text).instrument(span).await
    }

    async fn run(&self, text: &str) -> Result<AudioArtifact, SynthesisError> {
        let segments = segment_text(text, &self.config.segment);

        if segments.iter().all(|s| s.is_empty()) {
            return match self.config.empty_text_policy {
                EmptyTextPolicy::Reject => {
                    tracing::warn!("Rejecting synthesis request with empty text");
                    Err(SynthesisError::EmptyInput)
                }
                EmptyTextPolicy::EmptyArtifact => {
                    tracing::info!("Empty text, returning empty artifact");
                    Ok(AudioArtifact::empty(AudioFormat::default()))
                }
            };
        }

        let started = Instant::now();
        tracing::info!(
            text_chars = text.chars().count(),
            segments = segments.len(),
            "Synthesizing document"
        );

        let chunks = self.orchestrator.synthesize_all(&segments).await?;
        let synthesized_ms = started.elapsed().as_millis() as u64;

        // chunks 移交给 assembler，合并结束即释放
        let artifact = self.assembler.assemble(chunks).await.map_err(|e| {
            tracing::error!(
                strategy = %self.assembler.strategy(),
                error = %e,
                "Audio assembly failed"
            );
            SynthesisError::from(e)
        })?;

        tracing::info!(
            format = %artifact.format,
            audio_size = artifact.len(),
            duration_ms = ?artifact.duration_ms,
            chunks = artifact.chunk_count,
            synthesized_ms,
            total_ms = started.elapsed().as_millis() as u64,
            "Document synthesized"
        );

        Ok(artifact)
    }
}

#[async_trait]
impl SynthesisPort for SynthesisService {
    async fn synthesize_document(&self, text: &str) -> Result<AudioArtifact, SynthesisError> {
        SynthesisService::synthesize_document(self, text).await
    }
}
