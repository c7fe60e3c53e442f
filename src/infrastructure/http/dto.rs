//! Data Transfer Objects

use serde::{Deserialize, Serialize};

/// 音频时长响应头（毫秒）
pub const AUDIO_DURATION_HEADER: &str = "x-audio-duration-ms";
/// 合并的 chunk 数响应头
pub const CHUNK_COUNT_HEADER: &str = "x-chunk-count";

/// 合成请求
///
/// text 缺省视为空文本，由 EmptyTextPolicy 决定结果
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub text: String,
}

/// Ping 响应
#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub version: String,
}
