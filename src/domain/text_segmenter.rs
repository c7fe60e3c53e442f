//! 文本分割器
//!
//! 把章节文本切成不超过供应商单次请求上限的片段:
//! 1. 按句末标点切句（连续标点归入同一句）
//! 2. 贪心地把整句装入缓冲区，溢出时输出
//! 3. 单句超长时退化为按词装箱；单个词超长时整词输出，绝不在词内切断

use serde::Serialize;

/// 默认单片段最大字符数（供应商单次请求上限）
pub const DEFAULT_MAX_CHARS: usize = 200;

/// 文本分割配置
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 单个片段的最大字符数
    pub max_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// 文本片段
///
/// 不变量:
/// - index 从 0 开始连续
/// - char_count <= max_chars，除非片段是一个超长的单词
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    pub index: usize,
    pub content: String,
    pub char_count: usize,
}

impl TextSegment {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// 句末标点
#[inline]
fn is_sentence_delimiter(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！' | '.' | '?' | '!')
}

/// 折叠空白为单个空格
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let normalized = normalize_whitespace(raw);
    if !normalized.is_empty() {
        sentences.push(normalized);
    }
}

/// 按句末标点切句
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);

        if is_sentence_delimiter(ch) {
            // "?!"、"..." 之类的连续标点留在同一句
            while let Some(&next) = chars.peek() {
                if !is_sentence_delimiter(next) {
                    break;
                }
                current.push(next);
                chars.next();
            }
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }

    // 没有结尾标点的剩余部分
    push_sentence(&mut sentences, &current);

    sentences
}

/// 贪心装箱器
struct SegmentPacker {
    max_chars: usize,
    segments: Vec<String>,
    buffer: String,
    buffer_chars: usize,
}

impl SegmentPacker {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            segments: Vec::new(),
            buffer: String::new(),
            buffer_chars: 0,
        }
    }

    /// 放入一个不可再分的片（整句或单词），片之间用一个空格连接
    fn push_piece(&mut self, piece: &str, piece_chars: usize) {
        if self.buffer.is_empty() {
            self.buffer.push_str(piece);
            self.buffer_chars = piece_chars;
            return;
        }

        if self.buffer_chars + 1 + piece_chars <= self.max_chars {
            self.buffer.push(' ');
            self.buffer.push_str(piece);
            self.buffer_chars += 1 + piece_chars;
        } else {
            self.flush();
            self.buffer.push_str(piece);
            self.buffer_chars = piece_chars;
        }
    }

    fn push_sentence(&mut self, sentence: &str) {
        let sentence_chars = sentence.chars().count();
        if sentence_chars <= self.max_chars {
            self.push_piece(sentence, sentence_chars);
            return;
        }

        // 单句超长: 按词装箱
        for word in sentence.split(' ') {
            self.push_piece(word, word.chars().count());
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.segments.push(std::mem::take(&mut self.buffer));
        }
        self.buffer_chars = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.segments
    }
}

/// 对文本进行分段
///
/// 空文本（或只有空白）返回唯一一个空片段，是否拒绝由调用方决定
pub fn segment_text(text: &str, config: &SegmentConfig) -> Vec<TextSegment> {
    let mut packer = SegmentPacker::new(config.max_chars);
    for sentence in split_sentences(text) {
        packer.push_sentence(&sentence);
    }

    let packed = packer.finish();
    if packed.is_empty() {
        return vec![TextSegment {
            index: 0,
            content: String::new(),
            char_count: 0,
        }];
    }

    packed
        .into_iter()
        .enumerate()
        .map(|(index, content)| TextSegment {
            index,
            char_count: content.chars().count(),
            content,
        })
        .collect()
}

/// 使用默认配置分段（便捷方法）
pub fn segment_text_default(text: &str) -> Vec<TextSegment> {
    segment_text(text, &SegmentConfig::default())
}
