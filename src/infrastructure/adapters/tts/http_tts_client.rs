//! HTTP TTS Client - 调用外部 TTS HTTP 服务
//!
//! 实现 TtsEnginePort trait，每个片段一次 GET 请求
//!
//! 外部 TTS API:
//! GET {base_url}?ie=UTF-8&tl={language}&client=tw-ob&q={text}
//! Response: 2xx + 音频字节（通常为 audio/mpeg）

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

use crate::application::ports::{SynthesisResponse, TtsEnginePort, TtsError};

/// 错误响应体最多记录的字符数
const MAX_ERROR_BODY_CHARS: usize = 200;

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 服务 URL
    pub base_url: String,
    /// 语言代码
    pub language: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// User-Agent（部分供应商拒绝默认 UA）
    pub user_agent: String,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://translate.google.com/translate_tts".to_string(),
            language: "en".to_string(),
            timeout_secs: 30,
            user_agent: concat!("chaptercast/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpTtsClientConfig {
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

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// HTTP TTS 客户端
///
/// 连接池由 reqwest::Client 管理，响应体在每次调用内读完或随 Response 一起释放
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TtsError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 使用默认配置创建客户端
    pub fn with_default_config() -> Result<Self, TtsError> {
        Self::new(HttpTtsClientConfig::default())
    }

    /// 构造请求的查询参数
    fn query_params<'a>(&'a self, text: &'a str) -> [(&'static str, &'a str); 4] {
        [
            ("ie", "UTF-8"),
            ("tl", self.config.language.as_str()),
            ("client", "tw-ob"),
            ("q", text),
        ]
    }
}

fn map_send_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::Transport(format!("Cannot connect to TTS service: {}", e))
    } else {
        TtsError::Transport(e.to_string())
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, TtsError> {
        tracing::debug!(
            url = %self.config.base_url,
            text_len = text.chars().count(),
            "Sending TTS request"
        );

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&self.query_params(text)[..])
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message: String = error_text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(TtsError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // 读取响应体时断开也算传输错误
        let audio_data = response.bytes().await.map_err(map_send_error)?.to_vec();

        if audio_data.is_empty() {
            return Err(TtsError::InvalidResponse("empty audio body".to_string()));
        }

        tracing::debug!(
            content_type = ?content_type,
            audio_size = audio_data.len(),
            "TTS segment synthesized"
        );

        Ok(SynthesisResponse {
            audio_data,
            content_type,
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(&self.config.base_url)
            .query(&self.query_params("ok")[..])
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
