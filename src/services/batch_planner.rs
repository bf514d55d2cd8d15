//! 批次规划服务 - 业务能力层
//!
//! 采用按页数贪心累积的策略：依次放入分块，
//! 下一个分块会让累计页数超出预算时，先封闭当前批次。
//! 单个超出预算的分块独占一个批次。

use crate::models::document::{Batch, DocumentChunk};

/// 将分块划分为批次
///
/// 每个分块恰好出现在一个批次中，批次顺序与分块顺序一致
pub fn plan_batches(chunks: Vec<DocumentChunk>, budget: u32) -> Vec<Batch> {
    let budget = budget.max(1);
    let mut batches = Vec::new();
    let mut current = Batch::default();
    let mut current_pages = 0u32;

    for chunk in chunks {
        let pages = chunk.page_count();

        if !current.is_empty() && current_pages.saturating_add(pages) > budget {
            batches.push(std::mem::take(&mut current));
            current_pages = 0;
        }

        current_pages = current_pages.saturating_add(pages);
        current.chunks.push(chunk);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::SourceDocument;

    fn chunk(name: &str, pages: u32) -> DocumentChunk {
        DocumentChunk::whole(SourceDocument::new(name, "application/pdf", vec![0]), pages)
    }

    fn names(batches: &[Batch]) -> Vec<Vec<&str>> {
        batches.iter().map(|b| b.names()).collect()
    }

    #[test]
    fn test_greedy_accumulation() {
        let chunks = vec![
            chunk("a", 100),
            chunk("b", 100),
            chunk("c", 60),
            chunk("d", 40),
            chunk("e", 10),
        ];

        let batches = plan_batches(chunks, 250);

        assert_eq!(names(&batches), vec![vec!["a", "b"], vec!["c", "d", "e"]]);
        assert!(batches.iter().all(|b| b.page_count() <= 250));
    }

    #[test]
    fn test_oversized_chunk_forms_own_batch() {
        let batches = plan_batches(vec![chunk("a", 10), chunk("huge", 900), chunk("c", 10)], 250);

        assert_eq!(names(&batches), vec![vec!["a"], vec!["huge"], vec!["c"]]);
    }

    #[test]
    fn test_partition_preserves_every_chunk_in_order() {
        let chunks: Vec<_> = (0..17)
            .map(|i| chunk(&format!("doc-{i}"), (i * 37 % 120) + 1))
            .collect();
        let expected: Vec<String> = chunks.iter().map(|c| c.name().to_string()).collect();

        let batches = plan_batches(chunks, 150);
        let flattened: Vec<String> = batches
            .iter()
            .flat_map(|b| b.chunks.iter().map(|c| c.name().to_string()))
            .collect();

        assert_eq!(flattened, expected);
        assert!(batches.iter().all(|b| !b.is_empty()));
        assert!(batches.iter().all(|b| b.page_count() <= 150 || b.len() == 1));
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        assert!(plan_batches(Vec::new(), 250).is_empty());
    }
}
