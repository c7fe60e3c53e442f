//! Configuration Types
//!
//! 定义所有配置结构体，以及到各组件配置的转换

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::ports::AssemblyStrategy;
use crate::application::{
    EmptyTextPolicy, OrchestratorConfig, PlaybackConfig as ManagerPlaybackConfig,
    SynthesisServiceConfig,
};
use crate::domain::{SegmentConfig, DEFAULT_MAX_CHARS};
use crate::infrastructure::adapters::{DemuxConcatAssemblerConfig, HttpTtsClientConfig};
use crate::infrastructure::http::ServerConfig as HttpServerConfig;
use crate::infrastructure::persistence::SledStateStoreConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// TTS 引擎配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 合成流水线配置
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// 合并配置
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// 连续播放配置
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5060
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn to_http_config(&self) -> HttpServerConfig {
        HttpServerConfig::new(self.host.clone(), self.port).with_max_body_bytes(self.max_body_bytes)
    }
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// TTS 服务 URL
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// 语言代码
    #[serde(default = "default_language")]
    pub language: String,

    /// 单个片段请求超时（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 覆盖默认 User-Agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_tts_url() -> String {
    "https://translate.google.com/translate_tts".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: default_tts_url(),
            language: default_language(),
            timeout_secs: default_tts_timeout(),
            user_agent: None,
        }
    }
}

impl TtsConfig {
    pub fn to_client_config(&self) -> HttpTtsClientConfig {
        let mut config = HttpTtsClientConfig::new(self.url.clone())
            .with_timeout(self.timeout_secs)
            .with_language(self.language.clone());
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

/// 合成流水线配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// 单个片段最大字符数
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,

    /// 同时进行的 TTS 请求上限
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 可重试错误的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 首次重试的等待时间（毫秒），之后翻倍
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// 空文本处理：reject / empty_artifact
    #[serde(default)]
    pub empty_text_policy: EmptyTextPolicy,
}

fn default_max_segment_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_max_concurrent() -> usize {
    8
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: default_max_segment_chars(),
            max_concurrent: default_max_concurrent(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            empty_text_policy: EmptyTextPolicy::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent: self.max_concurrent,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn service_config(&self) -> SynthesisServiceConfig {
        SynthesisServiceConfig {
            segment: SegmentConfig {
                max_chars: self.max_segment_chars,
            },
            empty_text_policy: self.empty_text_policy,
        }
    }
}

/// 合并配置
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyConfig {
    /// concat / demux
    #[serde(default)]
    pub strategy: AssemblyStrategy,

    /// ffmpeg 可执行文件（仅 demux）
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// 临时目录根（仅 demux）
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_ffmpeg_path() -> PathBuf {
    DemuxConcatAssemblerConfig::default().ffmpeg_path
}

fn default_scratch_dir() -> PathBuf {
    DemuxConcatAssemblerConfig::default().scratch_dir
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            strategy: AssemblyStrategy::default(),
            ffmpeg_path: default_ffmpeg_path(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl AssemblyConfig {
    pub fn demux_config(&self) -> DemuxConcatAssemblerConfig {
        DemuxConcatAssemblerConfig {
            ffmpeg_path: self.ffmpeg_path.clone(),
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

/// 连续播放配置（客户端）
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// 播放进度达到该比例时预取下一章，取值 (0, 1]
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: f64,

    /// 去掉章节正文开头重复的标题
    #[serde(default = "default_strip_duplicate_headings")]
    pub strip_duplicate_headings: bool,

    /// 播放进度数据库路径
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

fn default_prefetch_threshold() -> f64 {
    0.8
}

fn default_strip_duplicate_headings() -> bool {
    true
}

fn default_state_path() -> String {
    "data/playback.sled".to_string()
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            prefetch_threshold: default_prefetch_threshold(),
            strip_duplicate_headings: default_strip_duplicate_headings(),
            state_path: default_state_path(),
        }
    }
}

impl PlaybackConfig {
    pub fn manager_config(&self) -> ManagerPlaybackConfig {
        ManagerPlaybackConfig {
            prefetch_threshold: self.prefetch_threshold,
            strip_duplicate_headings: self.strip_duplicate_headings,
        }
    }

    pub fn state_store_config(&self) -> SledStateStoreConfig {
        SledStateStoreConfig {
            db_path: self.state_path.clone(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
