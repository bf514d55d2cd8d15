//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 管理命令行应用的生命周期，不处理单个批次的细节：
//!
//! 1. **应用初始化**：创建编排器、检查输出路径可写（不预先写入任何内容）
//! 2. **加载输入**：扫描文档目录、读取用户画像
//! 3. **执行分析**：委托 `AnalysisOrchestrator`，Ctrl-C 触发协作式取消
//! 4. **写出报告**：只在分析成功后写出带运行元数据的 JSON
//! 5. **全局统计**：输出最终统计信息

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clients::{ModelBackend, OpenAiBackend};
use crate::config::Config;
use crate::models::report::FinalReport;
use crate::models::{load_all_documents, load_profile};
use crate::orchestrator::analysis_orchestrator::{
    AnalysisOrchestrator, AnalysisRequest, AnalysisStage,
};
use crate::utils::logging;

/// 写出的报告文件
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportFile<'a> {
    generated_at: String,
    model: &'a str,
    documents: Vec<String>,
    batch_count: usize,
    synthesized: bool,
    report: &'a FinalReport,
}

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: AnalysisOrchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let backend = Arc::new(OpenAiBackend::new(&config));
        Self::with_backend(config, backend)
    }

    /// 使用指定的模型服务初始化
    pub fn with_backend(config: Config, backend: Arc<dyn ModelBackend>) -> Result<Self> {
        check_output_path(Path::new(&config.output_report_file))?;

        logging::log_startup(
            &config.model_identifier,
            config.page_budget,
            config.batch_page_budget,
        );

        let orchestrator = AnalysisOrchestrator::new(&config, backend);

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        info!("\n📁 正在扫描待分析的文档...");
        let documents = load_all_documents(&self.config.input_folder).await?;
        if documents.is_empty() {
            warn!("⚠️ 没有找到待分析的文档");
        }

        let profile = load_profile(Path::new(&self.config.profile_path)).await?;
        let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();

        // Ctrl-C 触发取消：正在进行的调用结束后不再调度新批次
        let cancel = CancellationToken::new();
        let signal_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⚠️ 收到中断信号，正在取消分析...");
                signal_token.cancel();
            }
        });

        let (progress, mut stages) = watch::channel(AnalysisStage::Idle);
        let watcher = tokio::spawn(async move {
            while stages.changed().await.is_ok() {
                let stage = stages.borrow_and_update().clone();
                tracing::debug!("阶段: {:?}", stage);
            }
        });

        let request = AnalysisRequest { documents, profile };
        let result = self
            .orchestrator
            .analyze_with_progress(request, &cancel, &progress)
            .await;
        drop(progress);
        let _ = watcher.await;

        let outcome = result?;

        self.write_report(&names, outcome.batch_count, outcome.synthesized, &outcome.report)?;

        logging::print_final_stats(
            names.len(),
            outcome.chunk_count,
            outcome.batch_count,
            outcome.report.risk_score,
            &self.config.output_report_file,
        );

        Ok(())
    }

    fn write_report(
        &self,
        names: &[String],
        batch_count: usize,
        synthesized: bool,
        report: &FinalReport,
    ) -> Result<()> {
        let file = ReportFile {
            generated_at: chrono::Local::now().to_rfc3339(),
            model: &self.config.model_identifier,
            documents: names.to_vec(),
            batch_count,
            synthesized,
            report,
        };

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.config.output_report_file, json)
            .with_context(|| format!("无法写入报告文件: {}", self.config.output_report_file))?;

        Ok(())
    }
}

/// 检查报告路径可写：父目录存在且不是只读，目标本身不是目录
fn check_output_path(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let metadata = std::fs::metadata(parent)
        .with_context(|| format!("报告目录不存在: {}", parent.display()))?;
    if !metadata.is_dir() || metadata.permissions().readonly() {
        bail!("报告目录不可写: {}", parent.display());
    }
    if path.is_dir() {
        bail!("报告路径是一个目录: {}", path.display());
    }

    Ok(())
}
