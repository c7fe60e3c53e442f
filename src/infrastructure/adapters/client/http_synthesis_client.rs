//! HTTP Synthesis Client - 调用本服务的 /api/tts
//!
//! 实现 SynthesisPort，供播放管理器在另一个进程里使用
//!
//! POST {base_url}/api/tts  {"text": "..."}
//! - 200: 音频字节 + x-audio-duration-ms / x-chunk-count
//! - 400: 空文本
//! - 其它: {"errno", "error", "data"}

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::application::error::SynthesisError;
use crate::application::ports::SynthesisPort;
use crate::domain::{AudioArtifact, AudioFormat};
use crate::infrastructure::http::dto::{
    SynthesizeRequest, AUDIO_DURATION_HEADER, CHUNK_COUNT_HEADER,
};
use crate::infrastructure::http::error::{ErrorResponse, NO_TEXT_MESSAGE};

/// HTTP 合成客户端配置
#[derive(Debug, Clone)]
pub struct HttpSynthesisClientConfig {
    /// 合成服务地址，如 http://127.0.0.1:5060
    pub base_url: String,
    /// 整个章节的请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for HttpSynthesisClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5060".to_string(),
            timeout_secs: 300,
        }
    }
}

impl HttpSynthesisClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/tts", self.base_url.trim_end_matches('/'))
    }
}

/// HTTP 合成客户端
pub struct HttpSynthesisClient {
    client: Client,
    config: HttpSynthesisClientConfig,
}

impl HttpSynthesisClient {
    pub fn new(config: HttpSynthesisClientConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?;

        Ok(Self { client, config })
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// 把非 200 响应还原成 SynthesisError
///
/// 只有服务端明确报告空文本时才是 EmptyInput，其它 4xx（过大、格式错误）都是 Unavailable
async fn error_from_response(status: StatusCode, response: reqwest::Response) -> SynthesisError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    if status == StatusCode::BAD_REQUEST && message == NO_TEXT_MESSAGE {
        return SynthesisError::EmptyInput;
    }
    SynthesisError::Unavailable(format!("synthesis service returned {}: {}", status, message))
}

#[async_trait]
impl SynthesisPort for HttpSynthesisClient {
    async fn synthesize_document(&self, text: &str) -> Result<AudioArtifact, SynthesisError> {
        let url = self.config.endpoint();
        tracing::debug!(url = %url, text_len = text.len(), "Requesting remote synthesis");

        let response = self
            .client
            .post(&url)
            .json(&SynthesizeRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(error_from_response(status, response).await);
        }

        let headers = response.headers().clone();
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let duration_ms = header_value::<u64>(&headers, AUDIO_DURATION_HEADER);
        let chunk_count = header_value::<usize>(&headers, CHUNK_COUNT_HEADER).unwrap_or(1);

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?
            .to_vec();
        let format = AudioFormat::detect(content_type, &audio_data);

        tracing::debug!(
            format = %format,
            audio_size = audio_data.len(),
            chunk_count,
            "Remote synthesis finished"
        );

        Ok(AudioArtifact {
            audio_data,
            format,
            duration_ms,
            chunk_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        ChunkOrchestrator, OrchestratorConfig, SynthesisService, SynthesisServiceConfig,
    };
    use crate::infrastructure::adapters::assembler::ConcatAssembler;
    use crate::infrastructure::adapters::tts::{FakeFailure, FakeTtsClient};
    use crate::infrastructure::http::server::build_router;
    use crate::infrastructure::http::AppState;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// 在随机端口上启动一个真实的合成服务
    async fn spawn_server(tts: FakeTtsClient) -> String {
        spawn_server_with_limit(tts, 1024 * 1024).await
    }

    async fn spawn_server_with_limit(tts: FakeTtsClient, max_body_bytes: usize) -> String {
        let orchestrator = ChunkOrchestrator::new(OrchestratorConfig::default(), Arc::new(tts));
        let service = SynthesisService::new(
            SynthesisServiceConfig::default(),
            orchestrator,
            Arc::new(ConcatAssembler::new()),
        );
        let router = build_router(Arc::new(AppState::new(Arc::new(service))), max_body_bytes);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> HttpSynthesisClient {
        let config = HttpSynthesisClientConfig::new(base_url).with_timeout(10);
        HttpSynthesisClient::new(config).unwrap()
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = HttpSynthesisClientConfig::new("http://localhost:5060/");
        assert_eq!(config.endpoint(), "http://localhost:5060/api/tts");
    }

    #[tokio::test]
    async fn test_round_trip_through_server() {
        let base = spawn_server(FakeTtsClient::with_defaults()).await;

        let artifact = client(base)
            .synthesize_document("A short chapter.")
            .await
            .unwrap();

        assert_eq!(artifact.audio_data, FakeTtsClient::fake_audio("A short chapter."));
        assert_eq!(artifact.format, AudioFormat::Mp3);
        assert_eq!(artifact.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_empty_text_maps_to_empty_input() {
        let base = spawn_server(FakeTtsClient::with_defaults()).await;

        let err = client(base).synthesize_document("  ").await.unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyInput));
    }

    #[tokio::test]
    async fn test_oversized_chapter_is_not_empty_input() {
        let base = spawn_server_with_limit(FakeTtsClient::with_defaults(), 1024).await;
        let chapter = "A very long chapter. ".repeat(250);

        let err = client(base).synthesize_document(&chapter).await.unwrap_err();
        match err {
            SynthesisError::Unavailable(msg) => assert!(msg.contains("413"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_failure_is_unavailable() {
        let tts =
            FakeTtsClient::with_defaults().always_failing("Broken.", FakeFailure::Provider(500));
        let base = spawn_server(tts).await;

        let err = client(base).synthesize_document("Broken.").await.unwrap_err();
        match err {
            SynthesisError::Unavailable(msg) => assert!(msg.contains("502")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let err = client("http://127.0.0.1:9".to_string())
            .synthesize_document("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Unavailable(_)));
    }
}
