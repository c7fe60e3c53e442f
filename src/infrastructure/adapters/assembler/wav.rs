//! WAV 头解析与无损合并
//!
//! 只重写 RIFF 头：PCM 数据按顺序原样拼接，不重采样、不重编码

use crate::application::ports::AssemblyError;
use crate::domain::AudioChunk;

/// RIFF 头 + fmt 头 + data 头的固定开销
const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// fmt chunk 中关心的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FmtChunk {
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

/// 一个 WAV 文件的布局
#[derive(Debug, Clone)]
pub(crate) struct WavLayout {
    pub fmt: FmtChunk,
    /// fmt chunk 原始负载，合并时原样写回
    pub fmt_payload: Vec<u8>,
    pub data_start: usize,
    pub data_size: usize,
}

impl WavLayout {
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.data_start..self.data_start + self.data_size]
    }

    /// PCM 时长（毫秒）
    pub fn duration_ms(&self) -> Option<u64> {
        if self.fmt.byte_rate == 0 {
            return None;
        }
        Some(self.data_size as u64 * 1000 / self.fmt.byte_rate as u64)
    }
}

fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// 解析 WAV 头
pub(crate) fn parse_wav(data: &[u8]) -> Result<WavLayout, AssemblyError> {
    if data.len() < RIFF_HEADER_LEN + CHUNK_HEADER_LEN {
        return Err(AssemblyError::InvalidInput("WAV data too short".to_string()));
    }
    if &data[0..4] != b"RIFF" {
        return Err(AssemblyError::InvalidInput(
            "Invalid WAV: missing RIFF header".to_string(),
        ));
    }
    if &data[8..12] != b"WAVE" {
        return Err(AssemblyError::InvalidInput(
            "Invalid WAV: missing WAVE identifier".to_string(),
        ));
    }

    let mut pos = RIFF_HEADER_LEN;
    let mut fmt: Option<(FmtChunk, Vec<u8>)> = None;

    while pos + CHUNK_HEADER_LEN <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32(data, pos + 4) as usize;
        let body = pos + CHUNK_HEADER_LEN;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 || body + chunk_size > data.len() {
                    return Err(AssemblyError::InvalidInput(
                        "Invalid fmt chunk size".to_string(),
                    ));
                }
                let chunk = FmtChunk {
                    audio_format: read_u16(data, body),
                    num_channels: read_u16(data, body + 2),
                    sample_rate: read_u32(data, body + 4),
                    byte_rate: read_u32(data, body + 8),
                    block_align: read_u16(data, body + 12),
                    bits_per_sample: read_u16(data, body + 14),
                };
                fmt = Some((chunk, data[body..body + chunk_size].to_vec()));
            }
            b"data" => {
                let (fmt, fmt_payload) = fmt.ok_or_else(|| {
                    AssemblyError::InvalidInput("Invalid WAV: data before fmt chunk".to_string())
                })?;
                // 流式写出的 WAV 常把 data 大小写成 0 或 0xFFFFFFFF，以实际长度为准
                let available = data.len() - body;
                let data_size = if chunk_size == 0 || chunk_size > available {
                    available
                } else {
                    chunk_size
                };
                return Ok(WavLayout {
                    fmt,
                    fmt_payload,
                    data_start: body,
                    data_size,
                });
            }
            _ => {}
        }

        // chunk 按偶数字节对齐
        pos = body + chunk_size + (chunk_size & 1);
    }

    Err(AssemblyError::InvalidInput(
        "Invalid WAV: missing data chunk".to_string(),
    ))
}

/// 合并多个 WAV chunk
///
/// 所有 chunk 的 fmt 必须完全相同；输出只有 fmt 和 data 两个子块
pub(crate) fn merge_wav(chunks: &[AudioChunk]) -> Result<Vec<u8>, AssemblyError> {
    let layouts = chunks
        .iter()
        .map(|chunk| {
            parse_wav(&chunk.audio_data).map_err(|e| match e {
                AssemblyError::InvalidInput(msg) => {
                    AssemblyError::InvalidInput(format!("chunk {}: {}", chunk.index, msg))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let first = layouts.first().ok_or(AssemblyError::NoChunks)?;

    for (chunk, layout) in chunks.iter().zip(&layouts) {
        if layout.fmt_payload != first.fmt_payload {
            return Err(AssemblyError::IncompatibleChunks(format!(
                "chunk {} is {} Hz / {} ch / {} bit, expected {} Hz / {} ch / {} bit",
                chunk.index,
                layout.fmt.sample_rate,
                layout.fmt.num_channels,
                layout.fmt.bits_per_sample,
                first.fmt.sample_rate,
                first.fmt.num_channels,
                first.fmt.bits_per_sample,
            )));
        }
    }

    let data_size: usize = layouts.iter().map(|l| l.data_size).sum();
    let fmt_len = first.fmt_payload.len();
    let fmt_pad = fmt_len & 1;
    let data_pad = data_size & 1;
    let riff_size =
        4 + CHUNK_HEADER_LEN + fmt_len + fmt_pad + CHUNK_HEADER_LEN + data_size + data_pad;

    let riff_size = u32::try_from(riff_size).map_err(|_| {
        AssemblyError::InvalidInput(format!(
            "merged WAV exceeds 4 GiB ({} bytes of PCM)",
            data_size
        ))
    })?;

    let mut out = Vec::with_capacity(riff_size as usize + CHUNK_HEADER_LEN);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&(fmt_len as u32).to_le_bytes());
    out.extend_from_slice(&first.fmt_payload);
    if fmt_pad == 1 {
        out.push(0);
    }

    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_size as u32).to_le_bytes());
    for (chunk, layout) in chunks.iter().zip(&layouts) {
        out.extend_from_slice(layout.payload(&chunk.audio_data));
    }
    if data_pad == 1 {
        out.push(0);
    }

    Ok(out)
}
