//! 分析编排器 - 编排层
//!
//! ## 职责
//!
//! 负责单次分析请求的完整流程，是请求级别的编排器：
//!
//! ```text
//! Idle -> Splitting -> Planning -> Invoking(×N) -> [Synthesizing] -> Done | Failed
//! ```
//!
//! 1. **拆分**：对每个文档调用 PageSplitter（单个文档失败不影响整体）
//! 2. **规划**：BatchPlanner 按页数预算分批
//! 3. **调用**：逐个批次顺序调用模型（不并发，保证部分证据顺序确定）
//! 4. **合成**：批次数大于 1 时合并部分报告
//!
//! 任何批次失败都会中止整个运行，不返回部分结果。
//! 所有中间对象（分块、批次、部分报告）只在单次调用内存在。

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clients::{ModelBackend, OpenAiBackend};
use crate::config::Config;
use crate::error::{AnalysisError, AnalysisResult};
use crate::models::document::{DocumentChunk, SourceDocument};
use crate::models::profile::UserProfile;
use crate::models::report::FinalReport;
use crate::services::{
    plan_batches, split_document, InvocationPayload, ModelInvoker, ReportSynthesizer,
};
use crate::utils::logging;

/// 分析阶段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisStage {
    Idle,
    Splitting,
    Planning,
    /// 正在调用第 `batch` 个批次（从 1 开始）
    Invoking { batch: usize, total: usize },
    Synthesizing,
    Done,
    Failed,
}

/// 单次分析请求
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub documents: Vec<SourceDocument>,
    pub profile: UserProfile,
}

/// 分析结果及运行统计
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: FinalReport,
    pub chunk_count: usize,
    pub batch_count: usize,
    pub synthesized: bool,
}

/// 分析编排器
///
/// 不持有任何请求级状态，多个请求可以共享同一个实例
pub struct AnalysisOrchestrator {
    page_budget: u32,
    batch_page_budget: u32,
    invoker: Arc<ModelInvoker>,
    synthesizer: ReportSynthesizer,
}

impl AnalysisOrchestrator {
    pub fn new(config: &Config, backend: Arc<dyn ModelBackend>) -> Self {
        let invoker = Arc::new(ModelInvoker::new(config, backend));
        Self {
            page_budget: config.page_budget,
            batch_page_budget: config.batch_page_budget,
            synthesizer: ReportSynthesizer::new(invoker.clone()),
            invoker,
        }
    }

    /// 使用 OpenAI 兼容服务创建
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Arc::new(OpenAiBackend::new(config)))
    }

    /// 执行一次分析，只返回最终报告
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> AnalysisResult<FinalReport> {
        let (progress, _) = watch::channel(AnalysisStage::Idle);
        self.analyze_with_progress(request, cancel, &progress)
            .await
            .map(|outcome| outcome.report)
    }

    /// 执行一次分析，并通过 `progress` 发布阶段变化
    pub async fn analyze_with_progress(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
        progress: &watch::Sender<AnalysisStage>,
    ) -> AnalysisResult<AnalysisOutcome> {
        progress.send_replace(AnalysisStage::Idle);

        let result = self.run(request, cancel, progress).await;

        match &result {
            Ok(_) => {
                progress.send_replace(AnalysisStage::Done);
            }
            Err(e) => {
                error!("❌ 分析失败: {}", e);
                progress.send_replace(AnalysisStage::Failed);
            }
        }

        result
    }

    async fn run(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
        progress: &watch::Sender<AnalysisStage>,
    ) -> AnalysisResult<AnalysisOutcome> {
        let AnalysisRequest { documents, profile } = request;

        if documents.is_empty() {
            return Err(AnalysisError::NoDocumentsProvided);
        }

        // ========== 拆分 ==========
        progress.send_replace(AnalysisStage::Splitting);
        logging::log_run_start(documents.len(), profile.persona());

        let chunks = self.split_all(documents);
        let chunk_count = chunks.len();

        // ========== 规划 ==========
        progress.send_replace(AnalysisStage::Planning);
        let batches = plan_batches(chunks, self.batch_page_budget);
        if batches.is_empty() {
            return Err(AnalysisError::NoBatchesProduced);
        }
        let total = batches.len();
        info!("📋 {} 个分块规划为 {} 个批次", chunk_count, total);

        // ========== 顺序调用 ==========
        let mut partials = Vec::with_capacity(total);
        for (index, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("⚠️ 已取消，不再调度后续批次");
                return Err(AnalysisError::Cancelled);
            }

            let batch_num = index + 1;
            progress.send_replace(AnalysisStage::Invoking {
                batch: batch_num,
                total,
            });
            logging::log_batch_start(batch_num, total, batch.len(), batch.page_count());

            let partial = self
                .invoker
                .invoke(InvocationPayload::Extraction(batch), &profile, cancel)
                .await?;

            logging::log_batch_complete(batch_num, total, partial.risk_score);
            partials.push(partial);
        }

        // ========== 合成 ==========
        let synthesized = partials.len() > 1;
        if synthesized {
            progress.send_replace(AnalysisStage::Synthesizing);
        }
        let report = self.synthesizer.synthesize(partials, &profile, cancel).await?;

        Ok(AnalysisOutcome {
            report,
            chunk_count,
            batch_count: total,
            synthesized,
        })
    }

    /// 拆分所有文档；空文档跳过，拆分失败的文档由拆分器降级为单个分块
    fn split_all(&self, documents: Vec<SourceDocument>) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for document in documents {
            if document.content.is_empty() {
                warn!("⚠️ {} 内容为空，已跳过", document.name);
                continue;
            }

            let name = document.name.clone();
            let parts = split_document(document, self.page_budget);
            if parts.len() > 1 {
                info!("✂️ {} 拆分为 {} 个分块", name, parts.len());
            }
            chunks.extend(parts);
        }

        chunks
    }
}
