//! LLM API 客户端
//!
//! 封装所有与 LLM API 相关的调用逻辑
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务
//!
//! 调用失败按 [`LlmCallError`] 分类，上层据此决定重试还是立即失败。
//! [`LlmBackend`] 是唯一的网络边界抽象，测试中以脚本化实现替换，
//! 评分流水线因此可以在无网络环境下完整验证。

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

/// 一次 LLM 调用的请求参数
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// LLM 响应：内容 + token 用量
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
}

/// LLM 调用失败的分类
#[derive(Debug, Clone, Error)]
pub enum LlmCallError {
    /// 网络或服务端瞬时错误
    #[error("网络或服务端瞬时错误: {0}")]
    Transient(String),
    /// 请求频率受限
    #[error("请求频率受限: {0}")]
    RateLimited(String),
    /// 服务商永久拒绝（内容政策、无效请求）
    #[error("服务商永久拒绝: {0}")]
    Rejected(String),
    /// 返回内容为空
    #[error("LLM 返回内容为空 (模型: {0})")]
    EmptyContent(String),
}

impl LlmCallError {
    /// 是否属于瞬时失败
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmCallError::Transient(_)
                | LlmCallError::RateLimited(_)
                | LlmCallError::EmptyContent(_)
        )
    }
}

/// LLM 后端能力抽象
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse, LlmCallError>;
}

/// 基于 async-openai 的 LLM 客户端（兼容 OpenAI API 的服务）
pub struct LlmClient {
    client: Client<OpenAIConfig>,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse, LlmCallError> {
        debug!("调用 LLM API，模型: {}", request.model);
        debug!("用户消息长度: {} 字符", request.user.len());

        let mut messages = Vec::new();

        if let Some(system) = &request.system {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(system.as_str())
                .build()
                .map_err(|e| LlmCallError::Rejected(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user.as_str())
            .build()
            .map_err(|e| LlmCallError::Rejected(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let api_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(|e| LlmCallError::Rejected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                classify_openai_error(e)
            })?;

        debug!("LLM API 调用成功");

        let (tokens_input, tokens_output) = response
            .usage
            .as_ref()
            .map(|u| (u.prompt_tokens as u64, u.completion_tokens as u64))
            .unwrap_or((0, 0));

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmCallError::EmptyContent(request.model.clone()))?;

        Ok(LlmResponse {
            content: content.trim().to_string(),
            tokens_input,
            tokens_output,
        })
    }
}

/// 把 async-openai 的错误归入重试分类
///
/// 429 是频率限制；内容政策与无效请求属于永久拒绝；
/// 其余（网络、超时、5xx）一律按瞬时处理。
fn classify_openai_error(err: OpenAIError) -> LlmCallError {
    match err {
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default();
            let message = api.message.clone();
            let lowered = format!("{} {}", kind, message).to_lowercase();

            if lowered.contains("rate_limit") || lowered.contains("rate limit") {
                LlmCallError::RateLimited(message)
            } else if lowered.contains("content_policy")
                || lowered.contains("content_filter")
                || lowered.contains("policy violation")
                || lowered.contains("invalid_request")
            {
                LlmCallError::Rejected(message)
            } else {
                LlmCallError::Transient(message)
            }
        }
        other => LlmCallError::Transient(other.to_string()),
    }
}
