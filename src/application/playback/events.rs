//! 播放管理器的输入事件与输出命令

use std::sync::Arc;

use crate::application::error::PlaybackError;
use crate::domain::{AudioArtifact, ContentUnit};

/// 输入事件
#[derive(Debug)]
pub enum PlaybackEvent {
    /// 打开文档；selected 为用户手动选中的章节
    Open { selected_unit_id: Option<String> },
    /// 手动跳转到章节
    Navigate { unit_id: String },
    /// 播放器进度
    TimeUpdate {
        elapsed_seconds: f64,
        duration_seconds: f64,
    },
    /// 当前音频播放完毕
    Ended,
    SetPlaybackRate(f32),
    Close,
    /// 内部: 当前加载任务完成
    LoadCompleted {
        task_id: u64,
        unit_index: usize,
        start_at_seconds: f64,
        result: Result<AudioArtifact, PlaybackError>,
    },
    /// 内部: 预取任务完成
    PrefetchCompleted {
        task_id: u64,
        unit_index: usize,
        result: Result<AudioArtifact, PlaybackError>,
    },
}

/// 发给播放器的命令
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play {
        unit: ContentUnit,
        artifact: Arc<AudioArtifact>,
        start_at_seconds: f64,
        playback_rate: f32,
    },
    SetRate(f32),
    Stop,
    /// 加载失败，当前播放不受影响
    Failed { unit_id: String, message: String },
    /// 最后一个章节播放完毕
    Finished,
}
