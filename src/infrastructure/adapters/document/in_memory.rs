//! 内存文档源（测试、嵌入式调用）

use async_trait::async_trait;

use crate::application::ports::{DocumentError, DocumentSourcePort};
use crate::domain::ContentUnit;

/// 内存中的有序章节列表
pub struct InMemoryDocumentSource {
    document_id: String,
    units: Vec<(ContentUnit, String)>,
}

impl InMemoryDocumentSource {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            units: Vec::new(),
        }
    }

    /// 追加一个章节，id 与 href 相同
    pub fn with_unit(mut self, id: &str, label: &str, text: &str) -> Self {
        let unit = ContentUnit::new(id, self.units.len(), id, label);
        self.units.push((unit, text.to_string()));
        self
    }
}

#[async_trait]
impl DocumentSourcePort for InMemoryDocumentSource {
    fn document_id(&self) -> &str {
        &self.document_id
    }

    async fn list_content_units(&self) -> Result<Vec<ContentUnit>, DocumentError> {
        Ok(self.units.iter().map(|(unit, _)| unit.clone()).collect())
    }

    async fn load_text(&self, unit: &ContentUnit) -> Result<String, DocumentError> {
        self.units
            .iter()
            .find(|(u, _)| u.id == unit.id)
            .map(|(_, text)| text.clone())
            .ok_or_else(|| DocumentError::UnitNotFound(unit.id.clone()))
    }
}
