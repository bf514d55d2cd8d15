//! LLM API 客户端 - 基础设施层
//!
//! 持有唯一的稀缺资源（HTTP 客户端），只暴露"发送请求并返回文本流"的能力。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行流式 API 调用
//! - 兼容 OpenAI API 的服务（通过 `llm_api_base_url` 切换）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartFile,
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, FileObject, ImageDetail, ImageUrl, ReasoningEffort as OpenAiEffort,
        ResponseFormat, ResponseFormatJsonSchema, WebSearchOptions,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Config, ReasoningEffort};
use crate::error::InvocationError;

/// 文本分段流（有限、不可重启）
pub type TextStream = BoxStream<'static, Result<String, InvocationError>>;

/// 请求内容片段
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// 指令文本
    Text(String),
    /// 二进制附件（PDF、图片等）
    Binary {
        name: String,
        mime_type: String,
        data: Vec<u8>,
    },
}

/// 生成参数
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub enable_web_search: bool,
}

impl GenerationParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model_identifier.clone(),
            temperature: config.temperature,
            reasoning_effort: config.reasoning_effort,
            enable_web_search: config.enable_web_search,
        }
    }
}

/// 一次结构化输出请求
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub parts: Vec<ContentPart>,
    pub schema_name: String,
    pub response_schema: Value,
    pub params: GenerationParams,
}

impl ModelRequest {
    /// 附件总字节数（用于日志）
    pub fn attachment_bytes(&self) -> usize {
        self.parts
            .iter()
            .map(|part| match part {
                ContentPart::Binary { data, .. } => data.len(),
                ContentPart::Text(_) => 0,
            })
            .sum()
    }
}

/// 外部模型服务边界
///
/// 实现者只负责组装网络请求并把响应转换为文本分段流，
/// 重试、超时、清洗都由调用方负责。
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn stream(&self, request: &ModelRequest) -> Result<TextStream, InvocationError>;
}

/// OpenAI 兼容服务的流式客户端
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
}

impl OpenAiBackend {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    fn build_messages(
        request: &ModelRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, InvocationError> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_instruction.as_str())
            .build()
            .map_err(InvocationError::request_build)?;

        let content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = request
            .parts
            .iter()
            .map(to_content_part)
            .collect();

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(InvocationError::request_build)?;

        Ok(vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ])
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn stream(&self, request: &ModelRequest) -> Result<TextStream, InvocationError> {
        debug!(
            "调用 LLM API，模型: {}，片段数: {}，附件大小: {} 字节",
            request.params.model,
            request.parts.len(),
            request.attachment_bytes()
        );

        let messages = Self::build_messages(request)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&request.params.model)
            .messages(messages)
            .temperature(request.params.temperature)
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: request.schema_name.clone(),
                    schema: Some(request.response_schema.clone()),
                    strict: Some(false),
                },
            })
            .stream(true);

        if let Some(effort) = request.params.reasoning_effort {
            builder.reasoning_effort(match effort {
                ReasoningEffort::Low => OpenAiEffort::Low,
                ReasoningEffort::Medium => OpenAiEffort::Medium,
                ReasoningEffort::High => OpenAiEffort::High,
            });
        }

        if request.params.enable_web_search {
            builder.web_search_options(WebSearchOptions {
                search_context_size: None,
                user_location: None,
            });
        }

        let chat_request = builder.build().map_err(InvocationError::request_build)?;

        let stream = self.client.chat().create_stream(chat_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            InvocationError::from(e)
        })?;

        let text_stream = stream.map(|item| match item {
            Ok(chunk) => Ok(chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect::<String>()),
            Err(e) => Err(InvocationError::from(e)),
        });

        Ok(text_stream.boxed())
    }
}

/// 转换为 API 的内容片段：图片走 image_url，其余二进制走 file
fn to_content_part(part: &ContentPart) -> ChatCompletionRequestUserMessageContentPart {
    match part {
        ContentPart::Text(text) => ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText { text: text.clone() },
        ),
        ContentPart::Binary {
            name,
            mime_type,
            data,
        } => {
            let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(data));
            if mime_type.starts_with("image/") {
                ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: data_url,
                            detail: Some(ImageDetail::Auto),
                        },
                    },
                )
            } else {
                ChatCompletionRequestUserMessageContentPart::File(
                    ChatCompletionRequestMessageContentPartFile {
                        // FileObject 字段为私有且无 builder，只能经 serde 构造
                        file: serde_json::from_value::<FileObject>(serde_json::json!({
                            "file_data": data_url,
                            "filename": name,
                        }))
                        .expect("FileObject deserializes from string fields"),
                    },
                )
            }
        }
    }
}
