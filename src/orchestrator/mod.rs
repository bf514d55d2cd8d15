//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 命令行应用
//! - 管理应用生命周期（初始化、运行）
//! - 加载文档和用户画像
//! - 写出报告、输出全局统计信息
//!
//! ### `analysis_orchestrator` - 单次分析编排器
//! - 拆分 → 规划 → 顺序调用 → 合成
//! - 发布阶段进度、响应取消
//!
//! ## 层次关系
//!
//! ```text
//! app (处理命令行输入输出)
//!     ↓
//! analysis_orchestrator (处理单次分析请求)
//!     ↓
//! services (能力层：split / plan / invoke / sanitize / synthesize)
//!     ↓
//! clients (基础设施：ModelBackend)
//! ```

pub mod analysis_orchestrator;
pub mod app;

pub use analysis_orchestrator::{
    AnalysisOrchestrator, AnalysisOutcome, AnalysisRequest, AnalysisStage,
};
pub use app::App;
