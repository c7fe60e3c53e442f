//! Chunk Orchestrator - 片段并发合成
//!
//! - Semaphore 限制并发数
//! - 传输层失败按指数退避重试，供应商拒绝不重试
//! - 结果按输入位置归位，完成顺序不影响输出顺序
//! - 任一片段用尽重试预算：中止其余任务，丢弃已完成的 chunk，整体失败

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::application::error::SynthesisError;
use crate::application::ports::{SynthesisResponse, TtsEnginePort, TtsError};
use crate::domain::{AudioChunk, AudioFormat, TextSegment};

/// 退避指数上限，避免移位溢出
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Orchestrator 配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 最大并发请求数
    pub max_concurrent: usize,
    /// 每个片段的最大重试次数（不含首次）
    pub max_retries: u32,
    /// 首次重试前的等待时间，之后每次翻倍
    pub retry_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT))
    }
}

/// 单个片段带重试的合成
async fn synthesize_with_retry(
    engine: &dyn TtsEnginePort,
    text: &str,
    segment_index: usize,
    policy: RetryPolicy,
) -> Result<SynthesisResponse, TtsError> {
    let mut attempt = 0;
    loop {
        match engine.synthesize(text).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    segment_index,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Segment synthesis failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 片段并发合成编排器
pub struct ChunkOrchestrator {
    config: OrchestratorConfig,
    tts_engine: Arc<dyn TtsEnginePort>,
}

impl ChunkOrchestrator {
    pub fn new(config: OrchestratorConfig, tts_engine: Arc<dyn TtsEnginePort>) -> Self {
        Self { config, tts_engine }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            backoff: self.config.retry_backoff,
        }
    }

    /// 合成全部片段
    ///
    /// 返回的 chunk 与输入片段一一对应、顺序相同；
    /// 失败时不返回任何 chunk
    pub async fn synthesize_all(
        &self,
        segments: &[TextSegment],
    ) -> Result<Vec<AudioChunk>, SynthesisError> {
        let total = segments.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let policy = self.retry_policy();
        let mut tasks = JoinSet::new();

        for (position, segment) in segments.iter().enumerate() {
            let semaphore = semaphore.clone();
            let tts_engine = self.tts_engine.clone();
            let text = segment.content.clone();
            let segment_index = segment.index;

            tasks.spawn(async move {
                // 持有 permit 直到该片段（含重试）结束
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let closed = TtsError::Transport("worker pool closed".to_string());
                    return (position, segment_index, Err(closed));
                };
                let result =
                    synthesize_with_retry(tts_engine.as_ref(), &text, segment_index, policy).await;
                (position, segment_index, result)
            });
        }

        let mut slots: Vec<Option<AudioChunk>> = (0..total).map(|_| None).collect();
        let mut failed_indices = Vec::new();
        let mut worker_panicked = false;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, segment_index, Ok(response))) => {
                    let format = AudioFormat::detect(
                        response.content_type.as_deref(),
                        &response.audio_data,
                    );
                    slots[position] = Some(AudioChunk::new(
                        segment_index,
                        response.audio_data,
                        format,
                    ));
                }
                Ok((_, segment_index, Err(e))) => {
                    tracing::error!(
                        segment_index,
                        error = %e,
                        "Segment synthesis failed permanently, aborting request"
                    );
                    failed_indices.push(segment_index);
                    tasks.abort_all();
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Synthesis worker panicked");
                    worker_panicked = true;
                    tasks.abort_all();
                }
            }
        }

        if !failed_indices.is_empty() || worker_panicked {
            let completed = slots.iter().filter(|s| s.is_some()).count();
            tracing::debug!(completed, total, "Discarding partially synthesized chunks");
            return Err(SynthesisError::partial(failed_indices, total));
        }

        let chunks: Option<Vec<AudioChunk>> = slots.into_iter().collect();
        chunks.ok_or_else(|| SynthesisError::partial(Vec::new(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{segment_text, SegmentConfig};
    use crate::infrastructure::adapters::tts::{FakeFailure, FakeTtsClient};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn segments(texts: &[&str]) -> Vec<TextSegment> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| TextSegment {
                index,
                content: t.to_string(),
                char_count: t.chars().count(),
            })
            .collect()
    }

    fn config(max_concurrent: usize, max_retries: u32) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent,
            max_retries,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_output_order_ignores_completion_order() {
        // 越靠后的片段越早完成
        let texts = ["s0", "s1", "s2", "s3", "s4"];
        let mut fake = FakeTtsClient::with_defaults();
        for (i, t) in texts.iter().enumerate() {
            fake = fake.with_latency(t, Duration::from_millis(20 * (texts.len() - i) as u64));
        }
        let orchestrator = ChunkOrchestrator::new(config(8, 0), Arc::new(fake));

        let chunks = orchestrator.synthesize_all(&segments(&texts)).await.unwrap();

        assert_eq!(chunks.len(), texts.len());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.audio_data, FakeTtsClient::fake_audio(texts[i]));
            assert_eq!(chunk.format, AudioFormat::Mp3);
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let fake = Arc::new(
            FakeTtsClient::with_defaults().failing_times("s1", 2, FakeFailure::Transport),
        );
        let orchestrator = ChunkOrchestrator::new(config(4, 2), fake.clone());

        let chunks = orchestrator
            .synthesize_all(&segments(&["s0", "s1", "s2"]))
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(fake.calls_for("s1"), 3);
        assert_eq!(fake.calls_for("s0"), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_whole_request() {
        let fake = Arc::new(
            FakeTtsClient::with_defaults().failing_times("s1", 10, FakeFailure::Timeout),
        );
        let orchestrator = ChunkOrchestrator::new(config(4, 2), fake.clone());

        let err = orchestrator
            .synthesize_all(&segments(&["s0", "s1", "s2"]))
            .await
            .unwrap_err();

        match err {
            SynthesisError::PartialSynthesis {
                failed_indices,
                total,
            } => {
                assert_eq!(failed_indices, vec![1]);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fake.calls_for("s1"), 3);
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let fake = Arc::new(
            FakeTtsClient::with_defaults().always_failing("s2", FakeFailure::Provider(400)),
        );
        let orchestrator = ChunkOrchestrator::new(config(4, 3), fake.clone());

        let result = orchestrator
            .synthesize_all(&segments(&["s0", "s1", "s2"]))
            .await;

        assert!(matches!(
            result,
            Err(SynthesisError::PartialSynthesis { .. })
        ));
        assert_eq!(fake.calls_for("s2"), 1);
    }

    /// 记录同时在途请求数的引擎
    struct CountingEngine {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    #[async_trait]
    impl TtsEnginePort for CountingEngine {
        async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, TtsError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(SynthesisResponse {
                audio_data: text.as_bytes().to_vec(),
                content_type: Some("audio/mpeg".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let engine = Arc::new(CountingEngine {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        let orchestrator = ChunkOrchestrator::new(config(2, 0), engine.clone());

        let texts: Vec<String> = (0..8).map(|i| format!("segment {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let chunks = orchestrator.synthesize_all(&segments(&refs)).await.unwrap();

        assert_eq!(chunks.len(), 8);
        assert!(engine.max_seen.load(Ordering::SeqCst) <= 2);
        assert!(engine.max_seen.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_segmenter_output_round_trips_in_order() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let segs = segment_text(text, &SegmentConfig { max_chars: 25 });
        assert_eq!(segs.len(), 3);

        let orchestrator =
            ChunkOrchestrator::new(config(3, 0), Arc::new(FakeTtsClient::with_defaults()));
        let chunks = orchestrator.synthesize_all(&segs).await.unwrap();

        for (seg, chunk) in segs.iter().zip(&chunks) {
            assert_eq!(chunk.audio_data, FakeTtsClient::fake_audio(&seg.content));
        }
    }

    #[tokio::test]
    async fn test_no_segments() {
        let orchestrator =
            ChunkOrchestrator::new(config(3, 0), Arc::new(FakeTtsClient::with_defaults()));
        assert!(orchestrator.synthesize_all(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
