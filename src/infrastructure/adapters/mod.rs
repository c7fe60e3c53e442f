//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod assembler;
pub mod client;
pub mod document;
pub mod storage;
pub mod tts;

pub use assembler::{
    create_assembler, ConcatAssembler, DemuxConcatAssembler, DemuxConcatAssemblerConfig,
};
pub use client::{HttpSynthesisClient, HttpSynthesisClientConfig};
pub use document::*;
pub use storage::*;
pub use tts::*;
