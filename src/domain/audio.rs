//! 音频值对象
//!
//! - AudioFormat: 供应商返回的编码格式
//! - AudioChunk: 单个文本片段合成出的音频
//! - AudioArtifact: 合并后可直接播放的完整音频

use serde::{Deserialize, Serialize};

/// 音频编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MP3 - 帧可直接按字节拼接
    #[default]
    Mp3,
    /// WAV/PCM - 需要重写 RIFF 头
    Wav,
    /// OGG 容器 - 串联流 (chained stream)
    Ogg,
}

impl AudioFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Ogg => "audio/ogg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// 按字节直接拼接是否仍是合法流
    pub fn is_byte_concatenable(&self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::Ogg)
    }

    /// 从 Content-Type 解析格式
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some(AudioFormat::Mp3),
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some(AudioFormat::Wav),
            "audio/ogg" | "audio/opus" | "application/ogg" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }

    /// 根据魔数识别格式
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            return Some(AudioFormat::Wav);
        }
        if data.len() >= 4 && &data[0..4] == b"OggS" {
            return Some(AudioFormat::Ogg);
        }
        if data.len() >= 3 && &data[0..3] == b"ID3" {
            return Some(AudioFormat::Mp3);
        }
        // MPEG 帧同步字: 11 个 1
        if data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xE0) == 0xE0 {
            return Some(AudioFormat::Mp3);
        }
        None
    }

    /// 先看 Content-Type，再看魔数，最后回退到 MP3
    pub fn detect(content_type: Option<&str>, data: &[u8]) -> Self {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| Self::sniff(data))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// 单个片段的合成结果
///
/// 不变量: index 与对应 TextSegment 的 index 相同
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub index: usize,
    pub audio_data: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioChunk {
    pub fn new(index: usize, audio_data: Vec<u8>, format: AudioFormat) -> Self {
        Self {
            index,
            audio_data,
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.audio_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_data.is_empty()
    }
}

/// 一个内容单元的完整音频
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub audio_data: Vec<u8>,
    pub format: AudioFormat,
    /// 探测到的时长，探测失败时为 None
    pub duration_ms: Option<u64>,
    /// 由多少个 chunk 合并而来
    pub chunk_count: usize,
}

impl AudioArtifact {
    /// 空文本对应的空音频
    pub fn empty(format: AudioFormat) -> Self {
        Self {
            audio_data: Vec::new(),
            format,
            duration_ms: Some(0),
            chunk_count: 0,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// 建议的下载文件名
    pub fn file_name(&self) -> String {
        format!("chapter.{}", self.format.extension())
    }

    pub fn len(&self) -> usize {
        self.audio_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_data.is_empty()
    }
}
