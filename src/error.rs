use std::time::Duration;

use thiserror::Error;

use crate::services::model_invoker::InvocationMode;

/// 分析运行错误（返回给调用方的唯一错误类型）
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 未提供任何文档
    #[error("未提供任何文档，无法开始分析")]
    NoDocumentsProvided,

    /// 拆分后没有产生任何批次
    #[error("没有生成任何批次（所有文档均无法处理）")]
    NoBatchesProduced,

    /// 模型调用在重试耗尽后仍然失败
    #[error("模型调用失败 ({mode}, 已尝试 {attempts} 次): {source}")]
    ModelInvocationFailed {
        mode: InvocationMode,
        attempts: u32,
        #[source]
        source: InvocationError,
    },

    /// 调用方取消了本次分析
    #[error("分析已被取消")]
    Cancelled,
}

/// 单次模型调用尝试的错误
#[derive(Debug, Error)]
pub enum InvocationError {
    /// 模型返回空白文本
    #[error("模型返回内容为空")]
    EmptyModelResponse,

    /// 网络 / 传输层错误
    #[error("传输错误: {message}")]
    Transport { message: String },

    /// 等待网络分段超时
    #[error("等待模型响应超时 ({after:?})")]
    Timeout { after: Duration },

    /// 输出结构与报告结构不符
    #[error("响应结构不符合报告格式: {message}")]
    SchemaViolation { message: String },

    /// 构建请求失败
    #[error("构建模型请求失败: {message}")]
    RequestBuild { message: String },

    /// JSON 修复 / 解析失败
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    /// 流式读取过程中观察到取消
    #[error("模型调用已取消")]
    Cancelled,
}

/// 响应清洗错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizeError {
    /// 文本中找不到 JSON 对象
    #[error("响应中找不到 JSON 对象")]
    NoJsonObjectFound,

    /// 修复后仍无法解析
    #[error("无法修复的畸形响应: {message} (片段: {snippet})")]
    UnrecoverableMalformedResponse { message: String, snippet: String },
}

/// 文档拆分错误（只在拆分器内部出现，不会返回给调用方）
#[derive(Debug, Error)]
pub enum SplitError {
    /// PDF 解析失败
    #[error("PDF 解析失败: {0}")]
    Parse(String),

    /// 子文档保存失败
    #[error("子文档保存失败: {0}")]
    Save(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值非法
    #[error("配置项 {field} 非法: {reason}")]
    Invalid { field: String, reason: String },

    /// 配置文件读取 / 解析失败
    #[error("加载配置文件失败 ({path}): {message}")]
    Load { path: String, message: String },
}

// ========== 从常见错误类型转换 ==========

impl From<async_openai::error::OpenAIError> for InvocationError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        InvocationError::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for InvocationError {
    fn from(err: serde_json::Error) -> Self {
        InvocationError::SchemaViolation {
            message: err.to_string(),
        }
    }
}

impl From<lopdf::Error> for SplitError {
    fn from(err: lopdf::Error) -> Self {
        SplitError::Parse(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AnalysisError {
    /// 创建模型调用失败错误
    pub fn invocation_failed(mode: InvocationMode, attempts: u32, source: InvocationError) -> Self {
        AnalysisError::ModelInvocationFailed {
            mode,
            attempts,
            source,
        }
    }

    /// 是否为调用方主动取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }
}

impl InvocationError {
    /// 创建传输错误
    pub fn transport(message: impl Into<String>) -> Self {
        InvocationError::Transport {
            message: message.into(),
        }
    }

    /// 创建请求构建错误
    pub fn request_build(source: impl std::fmt::Display) -> Self {
        InvocationError::RequestBuild {
            message: source.to_string(),
        }
    }
}

impl ConfigError {
    /// 创建配置值非法错误
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 分析结果类型
pub type AnalysisResult<T> = Result<T, AnalysisError>;
