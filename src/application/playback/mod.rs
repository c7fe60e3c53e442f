//! 客户端连续播放
//!
//! - state: 持久化进度、播放阶段、预取槽
//! - events: 输入事件 / 输出播放器命令
//! - manager: 事件驱动的状态机（预取、无缝切章、断点续播）

mod events;
mod manager;
mod state;

pub use events::{PlaybackEvent, PlayerCommand};
pub use manager::{PlaybackConfig, PlaybackContinuityManager};
pub use state::{state_key, unit_elapsed_key, PlaybackPhase, PlaybackState, PrefetchStatus};
