//! 文档拆分服务 - 业务能力层
//!
//! 只负责"按页数预算拆分单个文档"，纯函数，不做网络调用。
//!
//! 拆分失败（损坏的 PDF、无法保存的子文档）时文档不能丢失：
//! 记录警告后原样作为单个分块返回。

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::SplitError;
use crate::models::document::{part_name, DocumentChunk, SourceDocument};

/// 按页数预算拆分文档
///
/// # 参数
/// - `document`: 原始文档（被消费，拆分产生新的文档实例）
/// - `budget`: 每个分块的最大页数
///
/// # 返回
/// 第 `i` 个分块覆盖 `[i·B, min((i+1)·B, total))` 页（0 起始）
pub fn split_document(document: SourceDocument, budget: u32) -> Vec<DocumentChunk> {
    let budget = budget.max(1);

    if !document.is_paginated() {
        return vec![DocumentChunk::whole(document, 1)];
    }

    let total = match count_pages(&document.content) {
        Ok(total) if total > 0 => total,
        Ok(_) => {
            warn!("⚠️ {} 页数为 0，按单个分块处理", document.name);
            return vec![DocumentChunk::whole(document, 1)];
        }
        Err(e) => {
            warn!("⚠️ 无法统计 {} 的页数，按单个分块处理: {}", document.name, e);
            return vec![DocumentChunk::whole(document, 1)];
        }
    };

    if total <= budget {
        return vec![DocumentChunk::whole(document, total)];
    }

    match split_pdf(&document, total, budget) {
        Ok(chunks) => {
            debug!("{} 共 {} 页，拆分为 {} 个分块", document.name, total, chunks.len());
            chunks
        }
        Err(e) => {
            warn!("⚠️ 拆分 {} 失败，按单个分块处理: {}", document.name, e);
            vec![DocumentChunk::whole(document, total)]
        }
    }
}

/// 统计 PDF 页数
pub fn count_pages(bytes: &[u8]) -> Result<u32, SplitError> {
    let doc = Document::load_mem(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// 计算分块页区间
pub fn page_ranges(total: u32, budget: u32) -> Vec<std::ops::Range<u32>> {
    let budget = budget.max(1);
    (0..total)
        .step_by(budget as usize)
        .map(|start| start..(start + budget).min(total))
        .collect()
}

fn split_pdf(
    document: &SourceDocument,
    total: u32,
    budget: u32,
) -> Result<Vec<DocumentChunk>, SplitError> {
    let pdf = Document::load_mem(&document.content)?;

    page_ranges(total, budget)
        .into_iter()
        .enumerate()
        .map(|(part, pages)| {
            let content = extract_pages(&pdf, total, &pages)?;
            Ok(DocumentChunk {
                document: SourceDocument::new(
                    part_name(&document.name, part, &pages),
                    document.mime_type.clone(),
                    content,
                ),
                source_name: document.name.clone(),
                pages,
                part: Some(part),
            })
        })
        .collect()
}

/// 保留 `pages`（0 起始半开区间）内的页，其余删除
fn extract_pages(
    pdf: &Document,
    total: u32,
    pages: &std::ops::Range<u32>,
) -> Result<Vec<u8>, SplitError> {
    let mut part = pdf.clone();

    // lopdf 页码从 1 开始，倒序删除保证编号不漂移
    let to_delete: Vec<u32> = (1..=total)
        .rev()
        .filter(|p| !pages.contains(&(p - 1)))
        .collect();
    part.delete_pages(&to_delete);

    part.prune_objects();
    part.compress();

    let mut buffer = Vec::new();
    part.save_to(&mut buffer)
        .map_err(|e| SplitError::Save(e.to_string()))?;

    Ok(buffer)
}
