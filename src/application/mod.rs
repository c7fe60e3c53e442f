//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TtsEngine、AudioAssembler、DocumentSource、StateStore、Synthesis）
//! - synthesis: 服务端合成流水线（分段、并发合成、合并）
//! - playback: 客户端连续播放状态机
//! - error: 应用层错误定义

pub mod error;
pub mod playback;
pub mod ports;
pub mod synthesis;

pub use error::{PlaybackError, SynthesisError};

pub use ports::{
    // Audio assembler
    common_format,
    AssemblyError,
    AssemblyStrategy,
    AudioAssemblerPort,
    // Document source
    DocumentError,
    DocumentSourcePort,
    // State store
    StateStorePort,
    StoreError,
    // Synthesis
    SynthesisPort,
    // TTS engine
    SynthesisResponse,
    TtsEnginePort,
    TtsError,
};

pub use playback::{
    PlaybackConfig, PlaybackContinuityManager, PlaybackEvent, PlaybackPhase, PlaybackState,
    PlayerCommand, PrefetchStatus,
};

pub use synthesis::{
    ChunkOrchestrator, EmptyTextPolicy, OrchestratorConfig, SynthesisService,
    SynthesisServiceConfig,
};
