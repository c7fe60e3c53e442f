//! Content Unit - 文档中可寻址的一个章节

use serde::{Deserialize, Serialize};

/// 内容单元（章节）
///
/// 由文档源创建，创建后不可变；播放管理器只持有引用（按 id 寻址）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUnit {
    /// 唯一标识
    pub id: String,
    /// 在文档中的顺序（从 0 开始）
    pub order_index: usize,
    /// 文档内定位符
    pub href: String,
    /// 显示标题
    pub label: String,
}

impl ContentUnit {
    pub fn new(
        id: impl Into<String>,
        order_index: usize,
        href: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            order_index,
            href: href.into(),
            label: label.into(),
        }
    }
}
