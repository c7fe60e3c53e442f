//! Text Directory Source - 一个目录即一本书
//!
//! 每个 .txt 文件是一个章节，按文件名排序；
//! 标题取文件第一个非空行

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{DocumentError, DocumentSourcePort};
use crate::domain::ContentUnit;

/// 标题最多保留的字符数
const MAX_LABEL_CHARS: usize = 80;

/// 文本目录文档源
pub struct TextDirectorySource {
    root: PathBuf,
    document_id: String,
}

impl TextDirectorySource {
    /// 目录名作为文档标识
    pub fn new(root: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DocumentError::InvalidDocument(format!(
                "not a directory: {}",
                root.display()
            )));
        }
        let document_id = root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        Ok(Self { root, document_id })
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = document_id.into();
        self
    }

    fn label_from(text: &str, fallback: &str) -> String {
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.chars().take(MAX_LABEL_CHARS).collect())
            .unwrap_or_else(|| fallback.to_string())
    }

    /// href 只能是根目录下的文件名
    fn resolve(&self, href: &str) -> Result<PathBuf, DocumentError> {
        let name = Path::new(href);
        if name.components().count() != 1 || name.file_name().is_none() {
            return Err(DocumentError::UnitNotFound(href.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl DocumentSourcePort for TextDirectorySource {
    fn document_id(&self) -> &str {
        &self.document_id
    }

    async fn list_content_units(&self) -> Result<Vec<ContentUnit>, DocumentError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| DocumentError::IoError(e.to_string()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DocumentError::IoError(e.to_string()))?
        {
            let path = entry.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort();

        let mut units = Vec::with_capacity(files.len());
        for (order_index, path) in files.iter().enumerate() {
            let href = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| href.clone());
            let text = fs::read_to_string(path)
                .await
                .map_err(|e| DocumentError::IoError(format!("{}: {}", path.display(), e)))?;
            let label = Self::label_from(&text, &id);
            units.push(ContentUnit::new(id, order_index, href, label));
        }

        tracing::debug!(
            document_id = %self.document_id,
            units = units.len(),
            "Listed content units"
        );

        Ok(units)
    }

    async fn load_text(&self, unit: &ContentUnit) -> Result<String, DocumentError> {
        let path = self.resolve(&unit.href)?;
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocumentError::UnitNotFound(unit.id.clone()))
            }
            Err(e) => Err(DocumentError::IoError(e.to_string())),
        }
    }
}
