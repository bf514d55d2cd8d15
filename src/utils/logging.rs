/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::profile::Persona;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则默认 info（verbose 时为 debug）
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(model: &str, page_budget: u32, batch_page_budget: u32) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 物业文档风险预测");
    info!("🤖 模型: {}", model);
    info!("📊 分块页数上限: {} / 批次页数上限: {}", page_budget, batch_page_budget);
    info!("{}", "=".repeat(60));
}

/// 记录分析开始
pub fn log_run_start(document_count: usize, persona: Persona) {
    info!("📁 共 {} 个文档，用户身份: {}", document_count, persona);
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号（从 1 开始）
/// - `total_batches`: 批次总数
/// - `chunk_count`: 本批分块数
/// - `page_count`: 本批累计页数
pub fn log_batch_start(batch_num: usize, total_batches: usize, chunk_count: usize, page_count: u32) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批分块: {} 个 / 共 {} 页", chunk_count, page_count);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, total_batches: usize, risk_score: f64) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {}/{} 批完成: 部分风险评分 {}",
        batch_num, total_batches, risk_score
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    documents: usize,
    chunks: usize,
    batches: usize,
    risk_score: f64,
    output_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 分析完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📁 文档: {} / 分块: {} / 批次: {}", documents, chunks, batches);
    info!("⚠️ 综合风险评分: {}", risk_score);
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", output_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
