//! 时长探测
//!
//! 尽力而为：探测失败只记录日志，artifact 的 duration_ms 为 None

use std::io::Cursor;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::wav::parse_wav;
use crate::application::ports::AssemblyError;
use crate::domain::AudioFormat;

/// 探测音频时长（毫秒）
pub(crate) fn probe_duration_ms(data: &[u8], format: AudioFormat) -> Option<u64> {
    if data.is_empty() {
        return Some(0);
    }
    if format == AudioFormat::Wav {
        if let Some(ms) = parse_wav(data).ok().and_then(|layout| layout.duration_ms()) {
            return Some(ms);
        }
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;
    let mut reader = probed.format;

    let track = reader.default_track()?;
    let track_id = track.id;
    let time_base = track.codec_params.time_base;
    let sample_rate = track.codec_params.sample_rate;

    // 拼接后的流里首个 chunk 的头信息只描述它自己，逐包累加才准确
    let mut total_ts: u64 = 0;
    while let Ok(packet) = reader.next_packet() {
        if packet.track_id() == track_id {
            total_ts += packet.dur;
        }
    }

    if let Some(time_base) = time_base {
        let time = time_base.calc_time(total_ts);
        return Some(time.seconds * 1000 + (time.frac * 1000.0) as u64);
    }
    sample_rate
        .filter(|rate| *rate > 0)
        .map(|rate| total_ts * 1000 / rate as u64)
}

/// 在阻塞线程池中探测，数据原样交还
pub(crate) async fn probe_in_background(
    audio_data: Vec<u8>,
    format: AudioFormat,
) -> Result<(Vec<u8>, Option<u64>), AssemblyError> {
    tokio::task::spawn_blocking(move || {
        let duration_ms = probe_duration_ms(&audio_data, format);
        if duration_ms.is_none() {
            tracing::debug!(
                format = %format,
                audio_size = audio_data.len(),
                "Could not probe artifact duration"
            );
        }
        (audio_data, duration_ms)
    })
    .await
    .map_err(|e| AssemblyError::IoError(format!("duration probe task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::super::wav::test_support::pcm_wav;
    use super::*;

    #[test]
    fn test_wav_duration() {
        let wav = pcm_wav(16000, 8000, 3);
        assert_eq!(probe_duration_ms(&wav, AudioFormat::Wav), Some(500));
    }

    #[test]
    fn test_garbage_has_no_duration() {
        let junk = b"<definitely not audio>".to_vec();
        assert_eq!(probe_duration_ms(&junk, AudioFormat::Mp3), None);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(probe_duration_ms(&[], AudioFormat::Ogg), Some(0));
    }

    #[tokio::test]
    async fn test_probe_in_background_returns_data() {
        let wav = pcm_wav(8000, 8000, 1);
        let (data, duration) = probe_in_background(wav.clone(), AudioFormat::Wav)
            .await
            .unwrap();
        assert_eq!(data, wav);
        assert_eq!(duration, Some(1000));
    }
}
