//! Domain Layer - 领域层
//!
//! - 文本: 章节规整、分段
//! - 音频: 格式、片段音频、合并产物
//! - 内容单元: 文档中的章节

mod audio;
mod content_unit;
mod text_normalizer;
mod text_segmenter;

pub use audio::{AudioArtifact, AudioChunk, AudioFormat};
pub use content_unit::ContentUnit;
pub use text_normalizer::strip_duplicate_heading;
pub use text_segmenter::{
    segment_text, segment_text_default, SegmentConfig, TextSegment, DEFAULT_MAX_CHARS,
};
