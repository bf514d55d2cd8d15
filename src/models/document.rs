use std::ops::Range;

/// PDF 的 MIME 类型
pub const PDF_MIME: &str = "application/pdf";

/// 上传的原始文档，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
        }
    }

    /// 是否支持页数统计
    pub fn is_paginated(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(PDF_MIME)
    }
}

/// 限定在连续页区间内的文档片段
///
/// `pages` 为 0 起始的半开区间；不支持分页的文档固定为 `0..1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub document: SourceDocument,
    /// 原始文档名称（拆分后 `document.name` 会带上分段后缀）
    pub source_name: String,
    pub pages: Range<u32>,
    /// 分段序号（0 起始），未拆分时为 None
    pub part: Option<usize>,
}

impl DocumentChunk {
    /// 整个文档作为单个分块
    pub fn whole(document: SourceDocument, page_count: u32) -> Self {
        let source_name = document.name.clone();
        Self {
            document,
            source_name,
            pages: 0..page_count.max(1),
            part: None,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.end - self.pages.start
    }

    pub fn name(&self) -> &str {
        &self.document.name
    }
}

/// 一次模型请求发送的分块集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub chunks: Vec<DocumentChunk>,
}

impl Batch {
    pub fn page_count(&self) -> u32 {
        self.chunks.iter().map(DocumentChunk::page_count).sum()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.chunks.iter().map(DocumentChunk::name).collect()
    }
}

/// 分段名称：`原名 (Part 2, pages 251-400)`，页码按 1 起始展示
pub fn part_name(original: &str, part: usize, pages: &Range<u32>) -> String {
    format!(
        "{} (Part {}, pages {}-{})",
        original,
        part + 1,
        pages.start + 1,
        pages.end
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_name_is_one_based() {
        assert_eq!(
            part_name("strata-minutes.pdf", 1, &(250..400)),
            "strata-minutes.pdf (Part 2, pages 251-400)"
        );
    }

    #[test]
    fn test_batch_page_count() {
        let doc = SourceDocument::new("a.pdf", PDF_MIME, vec![1]);
        let batch = Batch {
            chunks: vec![
                DocumentChunk::whole(doc.clone(), 3),
                DocumentChunk::whole(doc, 4),
            ],
        };
        assert_eq!(batch.page_count(), 7);
        assert_eq!(batch.names(), vec!["a.pdf", "a.pdf"]);
    }
}
