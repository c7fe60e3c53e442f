//! 播放进度与预取状态

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::domain::AudioArtifact;

/// 持久化的播放进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_unit_id: String,
    pub elapsed_seconds: f64,
    pub playback_rate: f32,
    pub updated_at: DateTime<Utc>,
}

/// 文档播放进度的存储 key
pub fn state_key(document_id: &str) -> String {
    format!("playback:{}", document_id)
}

/// 单个章节已播放时长的存储 key
pub fn unit_elapsed_key(document_id: &str, unit_id: &str) -> String {
    format!("playback:{}:unit:{}", document_id, unit_id)
}

/// 播放阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Playing,
    Transitioning,
    Finished,
}

impl PlaybackPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackPhase::Idle => "idle",
            PlaybackPhase::Loading => "loading",
            PlaybackPhase::Playing => "playing",
            PlaybackPhase::Transitioning => "transitioning",
            PlaybackPhase::Finished => "finished",
        }
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 预取槽（最多一个）
pub(crate) enum PrefetchSlot {
    Empty,
    Pending {
        unit_index: usize,
        task_id: u64,
        handle: JoinHandle<()>,
    },
    Ready {
        unit_index: usize,
        artifact: Arc<AudioArtifact>,
    },
    /// 失败后不再重试，过渡时改为按需加载
    Failed { unit_index: usize },
}

impl PrefetchSlot {
    pub fn unit_index(&self) -> Option<usize> {
        match self {
            PrefetchSlot::Empty => None,
            PrefetchSlot::Pending { unit_index, .. }
            | PrefetchSlot::Ready { unit_index, .. }
            | PrefetchSlot::Failed { unit_index } => Some(*unit_index),
        }
    }
}

/// 预取槽的只读视图
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchStatus {
    Empty,
    Pending(String),
    Ready(String),
    Failed(String),
}
