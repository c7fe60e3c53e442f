//! Chaptercast - 章节级文本转语音与连续播放
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 文本分段、标题去重
//! - 音频格式、片段、合并产物
//! - 内容单元（章节）
//!
//! 应用层 (application/):
//! - Ports: TtsEngine, AudioAssembler, DocumentSource, StateStore, Synthesis
//! - Synthesis: 分段 → 有界并发合成（带重试）→ 合并
//! - Playback: 连续播放状态机（预取、无缝切换、断点续播）
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: /api/tts 合成接口
//! - Adapters: TTS 客户端, 合并器, 临时工作区, 文档源, 远端合成客户端
//! - Persistence: Sled 播放进度
//! - Memory: 内存 StateStore

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
