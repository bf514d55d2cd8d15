//! 模型调用服务 - 业务能力层
//!
//! 只负责"发出一次结构化输出请求并拿到合法报告"，不关心流程顺序。
//!
//! - 流式读取：逐段拼接到同一个缓冲区，流结束前不做任何解析
//! - 超时：每个网络分段（包括建立连接）都有等待上限
//! - 重试：有界循环 + 指数退避，任何失败（空响应、传输错误、
//!   结构不符、清洗失败）都消耗一次尝试

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::{ContentPart, GenerationParams, ModelBackend, ModelRequest};
use crate::config::Config;
use crate::error::{AnalysisError, AnalysisResult, InvocationError};
use crate::models::document::Batch;
use crate::models::profile::UserProfile;
use crate::models::report::{FinalReport, PartialReport};
use crate::services::prompts;
use crate::services::response_sanitizer;

/// 调用模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// 从文档中提取
    Extraction,
    /// 合并多个部分报告
    Synthesis,
}

impl std::fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationMode::Extraction => write!(f, "提取"),
            InvocationMode::Synthesis => write!(f, "合成"),
        }
    }
}

/// 调用载荷：提取模式附带文档，合成模式只附带部分报告
#[derive(Debug, Clone, Copy)]
pub enum InvocationPayload<'a> {
    Extraction(&'a Batch),
    Synthesis(&'a [PartialReport]),
}

impl InvocationPayload<'_> {
    pub fn mode(&self) -> InvocationMode {
        match self {
            InvocationPayload::Extraction(_) => InvocationMode::Extraction,
            InvocationPayload::Synthesis(_) => InvocationMode::Synthesis,
        }
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.base_backoff(),
        }
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时间：base · 2^(attempt-1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// 模型调用器
///
/// 不持有任何可变共享状态，可被多个并发请求复用
pub struct ModelInvoker {
    backend: Arc<dyn ModelBackend>,
    params: GenerationParams,
    retry: RetryPolicy,
    segment_timeout: Duration,
}

impl ModelInvoker {
    pub fn new(config: &Config, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            params: GenerationParams::from_config(config),
            retry: RetryPolicy::from_config(config),
            segment_timeout: config.per_attempt_timeout(),
        }
    }

    /// 发出一次调用（含重试），返回经过清洗和本地约束的报告
    pub async fn invoke(
        &self,
        payload: InvocationPayload<'_>,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> AnalysisResult<FinalReport> {
        let mode = payload.mode();
        let request = self
            .build_request(payload, profile)
            .map_err(|e| AnalysisError::invocation_failed(mode, 0, e))?;

        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }

            debug!("{}调用，第 {}/{} 次尝试", mode, attempt, self.retry.max_attempts);

            match self.attempt(&request, profile, cancel).await {
                Ok(report) => {
                    if attempt > 1 {
                        info!("✓ {}调用在第 {} 次尝试成功", mode, attempt);
                    }
                    return Ok(report);
                }
                Err(InvocationError::Cancelled) => return Err(AnalysisError::Cancelled),
                Err(e) => {
                    warn!(
                        "⚠️ {}调用第 {}/{} 次尝试失败: {}",
                        mode, attempt, self.retry.max_attempts, e
                    );
                    last_error = Some(e);
                }
            }

            if attempt < self.retry.max_attempts {
                let delay = self.retry.delay_for(attempt);
                debug!("等待 {:?} 后重试", delay);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        let source = last_error.unwrap_or(InvocationError::EmptyModelResponse);
        Err(AnalysisError::invocation_failed(
            mode,
            self.retry.max_attempts,
            source,
        ))
    }

    /// 组装请求
    pub fn build_request(
        &self,
        payload: InvocationPayload<'_>,
        profile: &UserProfile,
    ) -> Result<ModelRequest, InvocationError> {
        let persona = profile.persona();
        let mut parts = Vec::new();

        match payload {
            InvocationPayload::Extraction(batch) => {
                let listing: Vec<String> = batch
                    .chunks
                    .iter()
                    .map(|chunk| {
                        format!(
                            "- {} (pages {}-{})",
                            chunk.name(),
                            chunk.pages.start + 1,
                            chunk.pages.end
                        )
                    })
                    .collect();

                parts.push(ContentPart::Text(format!(
                    "{}\n{}\n{}\n\nBuyer profile:\n{}\n\nDocuments in this batch:\n{}",
                    prompts::EXTRACTION_INSTRUCTION,
                    prompts::persona_instruction(persona),
                    prompts::NUMERIC_RULES,
                    profile.describe(),
                    listing.join("\n")
                )));

                for chunk in &batch.chunks {
                    parts.push(ContentPart::Binary {
                        name: chunk.document.name.clone(),
                        mime_type: chunk.document.mime_type.clone(),
                        data: chunk.document.content.clone(),
                    });
                }
            }
            InvocationPayload::Synthesis(partials) => {
                let serialized = serde_json::to_string_pretty(partials)
                    .map_err(InvocationError::request_build)?;

                parts.push(ContentPart::Text(format!(
                    "{}\n{}\n{}\n\nBuyer profile:\n{}\n\nPartial reports ({}):\n{}",
                    prompts::SYNTHESIS_INSTRUCTION,
                    prompts::persona_instruction(persona),
                    prompts::NUMERIC_RULES,
                    profile.describe(),
                    partials.len(),
                    serialized
                )));
            }
        }

        Ok(ModelRequest {
            system_instruction: prompts::SYSTEM_INSTRUCTION.to_string(),
            parts,
            schema_name: prompts::SCHEMA_NAME.to_string(),
            response_schema: prompts::report_schema(persona),
            params: self.params.clone(),
        })
    }

    async fn attempt(
        &self,
        request: &ModelRequest,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<FinalReport, InvocationError> {
        let text = self.collect_stream(request, cancel).await?;

        if text.trim().is_empty() {
            return Err(InvocationError::EmptyModelResponse);
        }

        response_sanitizer::parse_report(&text, profile.persona())
    }

    /// 读取完整的流，所有分段拼接后才返回
    async fn collect_stream(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<String, InvocationError> {
        let timeout = self.segment_timeout;

        let opened = tokio::select! {
            _ = cancel.cancelled() => return Err(InvocationError::Cancelled),
            opened = tokio::time::timeout(timeout, self.backend.stream(request)) => opened,
        };
        let mut stream = opened.map_err(|_| InvocationError::Timeout { after: timeout })??;

        let mut buffer = String::new();
        let mut segments = 0usize;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(InvocationError::Cancelled),
                next = tokio::time::timeout(timeout, stream.next()) => {
                    next.map_err(|_| InvocationError::Timeout { after: timeout })?
                }
            };

            match next {
                Some(Ok(segment)) => {
                    buffer.push_str(&segment);
                    segments += 1;
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        debug!("流式响应结束，共 {} 段，{} 字符", segments, buffer.len());
        Ok(buffer)
    }
}
