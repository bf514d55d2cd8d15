//! # Strata Forecast
//!
//! 读取物业 / 分层产权文档，结合用户画像交给大模型，生成 10 年风险与财务预测
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 持有稀缺资源（HTTP 客户端），只暴露能力
//! - `ModelBackend` - 模型服务边界，返回文本分段流
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只做一件事
//! - `page_splitter` / `batch_planner` - 拆分与分批
//! - `model_invoker` - 流式调用、超时、指数退避重试
//! - `response_sanitizer` - 修复畸形 JSON
//! - `report_synthesizer` - 合并部分报告
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/analysis_orchestrator` - 单次分析的完整流程
//! - `orchestrator/app` - 命令行应用
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{ModelBackend, OpenAiBackend};
pub use config::Config;
pub use error::{AnalysisError, AnalysisResult};
pub use models::{FinalReport, PartialReport, SourceDocument, UserProfile};
pub use orchestrator::{AnalysisOrchestrator, AnalysisRequest, AnalysisStage, App};
