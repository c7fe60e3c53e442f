//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_assembler;
mod document_source;
mod state_store;
mod synthesis;
mod tts_engine;

pub use audio_assembler::{common_format, AssemblyError, AssemblyStrategy, AudioAssemblerPort};
pub use document_source::{DocumentError, DocumentSourcePort};
pub use state_store::{StateStorePort, StoreError};
pub use synthesis::SynthesisPort;
pub use tts_engine::{SynthesisResponse, TtsEnginePort, TtsError};
