//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "CHAPTERCAST";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `CHAPTERCAST_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `CHAPTERCAST_SERVER__PORT=8080`
/// - `CHAPTERCAST_TTS__URL=http://tts-server:8000/tts`
/// - `CHAPTERCAST_SYNTHESIS__MAX_CONCURRENT=4`
/// - `CHAPTERCAST_ASSEMBLY__STRATEGY=demux`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// `config_path` 为 None 时使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5060)?
        .set_default("synthesis.max_concurrent", 8)?
        .set_default("synthesis.max_retries", 2)?
        .set_default("synthesis.retry_backoff_ms", 250)?
        .set_default("synthesis.empty_text_policy", "reject")?
        .set_default("assembly.strategy", "concat")?
        .set_default("playback.prefetch_threshold", 0.8)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: CHAPTERCAST_TTS__URL=http://tts-server:8000/tts
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.tts.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS URL cannot be empty".to_string(),
        ));
    }

    if config.synthesis.max_segment_chars == 0 {
        return Err(ConfigError::ValidationError(
            "synthesis.max_segment_chars must be at least 1".to_string(),
        ));
    }

    if config.synthesis.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "synthesis.max_concurrent must be at least 1".to_string(),
        ));
    }

    let threshold = config.playback.prefetch_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "playback.prefetch_threshold must be in (0, 1], got {}",
            threshold
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Max Body: {} bytes", config.server.max_body_bytes);
    tracing::info!("TTS URL: {}", config.tts.url);
    tracing::info!("TTS Language: {}", config.tts.language);
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!(
        "Synthesis: max_segment_chars={}, max_concurrent={}, max_retries={}, retry_backoff={}ms",
        config.synthesis.max_segment_chars,
        config.synthesis.max_concurrent,
        config.synthesis.max_retries,
        config.synthesis.retry_backoff_ms
    );
    tracing::info!("Empty Text Policy: {:?}", config.synthesis.empty_text_policy);
    tracing::info!("Assembly Strategy: {}", config.assembly.strategy);
    if config.assembly.strategy == crate::application::AssemblyStrategy::Demux {
        tracing::info!("ffmpeg: {:?}", config.assembly.ffmpeg_path);
        tracing::info!("Scratch Directory: {:?}", config.assembly.scratch_dir);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
