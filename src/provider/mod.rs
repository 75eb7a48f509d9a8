use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::account::{UsageUrls, UsageWindow};
use crate::config::{ModelConfig, ProviderKind};
use crate::error::ChatError;
use crate::http::HttpResponse;
use crate::model::ModelTier;
use crate::transport::StreamFraming;
use crate::types::{Message, last_user_message};

pub mod gemini;
pub mod openai;
mod retry;

/// 图像生成请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// 供应商请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Chat(Value),
    Image(ImageRequest),
}

/// 待发送的请求 包含地址 请求体与模型分级
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: String,
    pub payload: RequestPayload,
    pub tier: ModelTier,
    /// Whether the response should be consumed as a stream. Always `false` for images.
    pub stream: bool,
}

/// 统一的 Provider Trait 只负责构建请求与解析响应 I/O 取消与节奏由客户端负责
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &'static str;

    /// 构建请求地址与请求体
    fn prepare(
        &self,
        messages: &[Message],
        config: &ModelConfig,
        stream: bool,
    ) -> Result<PreparedRequest, ChatError>;

    /// 审核接口地址
    fn moderation_url(&self) -> Option<String>;

    /// 供应商自带审核 跳过客户端审核
    fn moderates_natively(&self) -> bool {
        false
    }

    fn stream_framing(&self) -> StreamFraming;

    /// 模型列表接口地址
    fn models_url(&self) -> Option<String> {
        None
    }

    /// 用量查询接口地址
    fn usage_urls(&self, _window: &UsageWindow) -> Option<UsageUrls> {
        None
    }

    /// 解析完整响应
    fn extract(
        &self,
        request: &PreparedRequest,
        response: &HttpResponse,
    ) -> Result<String, ChatError>;

    /// Turns one stream message into a text delta.
    ///
    /// `Ok(None)` means the message carried no text. [`ChatError::Parse`] is skipped by
    /// the stream driver; any other error ends the request.
    fn extract_delta(&self, fragment: &str) -> Result<Option<String>, ChatError>;
}

/// 线程安全 Provider
pub type DynProvider = Arc<dyn ChatProvider>;

/// Trims a configured base URL, defaulting to `fallback` and to `https://`.
pub(crate) fn normalize_base_url(base_url: &str, fallback: &str) -> String {
    let base_url = base_url.trim();
    let base_url = if base_url.is_empty() {
        fallback
    } else {
        base_url
    };
    let base_url = base_url.trim_end_matches('/');
    if base_url.starts_with("http") {
        base_url.to_string()
    } else {
        format!("https://{base_url}")
    }
}

/// The text an image model is prompted with.
pub(crate) fn image_prompt(messages: &[Message]) -> String {
    last_user_message(messages)
        .map(|message| message.text_content().to_string())
        .unwrap_or_default()
}
