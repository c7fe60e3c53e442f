//! 服务端合成流水线
//!
//! - orchestrator: 片段并发合成（限流、重试、保序）
//! - service: 文档级用例，分段 + 合成 + 合并

mod orchestrator;
mod service;

pub use orchestrator::{ChunkOrchestrator, OrchestratorConfig};
pub use service::{EmptyTextPolicy, SynthesisService, SynthesisServiceConfig};
