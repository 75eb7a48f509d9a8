//! Google Gemini generateContent / streamGenerateContent.

use crate::config::{ModelConfig, ProviderKind};
use crate::error::ChatError;
use crate::http::HttpResponse;
use crate::model::ModelTier;
use crate::provider::{ChatProvider, PreparedRequest, RequestPayload, normalize_base_url};
use crate::transport::StreamFraming;
use crate::types::Message;

mod request;
mod response;
mod types;

use request::build_gemini_request;
use response::{one_shot_text, stream_delta};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini provider. Streaming responses arrive as one JSON array decoded element by
/// element.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
}

impl GeminiProvider {
    /// Targets `base_url`, or the public Generative Language endpoint when it is empty.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref(), DEFAULT_BASE_URL),
        }
    }

    fn url(&self, model: &str, stream: bool) -> String {
        let method = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }
}

impl ChatProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn prepare(
        &self,
        messages: &[Message],
        config: &ModelConfig,
        stream: bool,
    ) -> Result<PreparedRequest, ChatError> {
        let tier = ModelTier::of(&config.model);
        if tier.is_image() {
            return Err(ChatError::Validation {
                message: format!("gemini cannot serve image model {}", config.model),
            });
        }
        let body = build_gemini_request(messages, config, tier);
        let payload = serde_json::to_value(&body).map_err(|err| ChatError::Validation {
            message: format!("failed to serialize gemini request: {err}"),
        })?;
        Ok(PreparedRequest {
            url: self.url(&config.model, stream),
            payload: RequestPayload::Chat(payload),
            tier,
            stream,
        })
    }

    fn moderation_url(&self) -> Option<String> {
        None
    }

    fn stream_framing(&self) -> StreamFraming {
        StreamFraming::JsonArray
    }

    fn extract(
        &self,
        _request: &PreparedRequest,
        response: &HttpResponse,
    ) -> Result<String, ChatError> {
        one_shot_text(&String::from_utf8_lossy(&response.body))
    }

    fn extract_delta(&self, fragment: &str) -> Result<Option<String>, ChatError> {
        stream_delta(fragment)
    }
}
