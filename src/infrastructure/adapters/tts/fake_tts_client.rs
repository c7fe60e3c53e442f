//! Fake TTS Client - 用于测试的 TTS 客户端
//!
//! 不实际调用 TTS 服务：音频内容由文本决定，
//! 可以按文本注入延迟和失败序列

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{SynthesisResponse, TtsEnginePort, TtsError};
use crate::domain::AudioFormat;

/// 注入的失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Transport,
    Timeout,
    Provider(u16),
}

impl FakeFailure {
    fn to_error(self) -> TtsError {
        match self {
            FakeFailure::Transport => TtsError::Transport("connection reset".to_string()),
            FakeFailure::Timeout => TtsError::Timeout,
            FakeFailure::Provider(status) => TtsError::Provider {
                status,
                message: "rejected by fake provider".to_string(),
            },
        }
    }
}

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 默认推理延迟
    pub latency: Duration,
    /// 返回的音频格式
    pub format: AudioFormat,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(5),
            format: AudioFormat::Mp3,
        }
    }
}

/// Fake TTS Client
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    /// 按文本覆盖的延迟
    latencies: DashMap<String, Duration>,
    /// 按文本排队的失败，用完后成功
    failures: DashMap<String, VecDeque<FakeFailure>>,
    /// 总是失败的文本
    permanent_failures: DashMap<String, FakeFailure>,
    /// 每个文本的调用次数
    calls: DashMap<String, usize>,
    total_calls: AtomicUsize,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        Self {
            config,
            latencies: DashMap::new(),
            failures: DashMap::new(),
            permanent_failures: DashMap::new(),
            calls: DashMap::new(),
            total_calls: AtomicUsize::new(0),
        }
    }

    /// 使用默认配置创建
    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    /// 文本对应的假音频内容
    pub fn fake_audio(text: &str) -> Vec<u8> {
        format!("<{}>", text).into_bytes()
    }

    pub fn with_latency(self, text: &str, latency: Duration) -> Self {
        self.latencies.insert(text.to_string(), latency);
        self
    }

    /// 前 times 次调用失败，之后成功
    pub fn failing_times(self, text: &str, times: usize, failure: FakeFailure) -> Self {
        self.failures
            .insert(text.to_string(), std::iter::repeat(failure).take(times).collect());
        self
    }

    pub fn always_failing(self, text: &str, failure: FakeFailure) -> Self {
        self.permanent_failures.insert(text.to_string(), failure);
        self
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.calls.get(text).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, TtsError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.entry(text.to_string()).or_insert(0) += 1;

        let latency = self
            .latencies
            .get(text)
            .map(|l| *l)
            .unwrap_or(self.config.latency);

        tracing::debug!(
            text_len = text.len(),
            latency_ms = latency.as_millis() as u64,
            "FakeTtsClient: synthesizing"
        );

        tokio::time::sleep(latency).await;

        if let Some(failure) = self.permanent_failures.get(text) {
            return Err(failure.to_error());
        }
        let queued = self
            .failures
            .get_mut(text)
            .and_then(|mut queue| queue.pop_front());
        if let Some(failure) = queued {
            return Err(failure.to_error());
        }

        Ok(SynthesisResponse {
            audio_data: Self::fake_audio(text),
            content_type: Some(self.config.format.mime_type().to_string()),
        })
    }
}
