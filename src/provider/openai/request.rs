use serde_json::Value;

use crate::config::ModelConfig;
use crate::error::ChatError;
use crate::model::{ImageModel, ModelTier, canonical_model_name, is_vision_model};
use crate::provider::{ImageRequest, image_prompt};
use crate::types::{ContentPart, Message, MessageContent};

use super::types::{OpenAiChatRequest, OpenAiContent, OpenAiImageUrl, OpenAiMessage, OpenAiPart};

/// Builds a chat/completions body.
///
/// Legacy models never see `max_tokens` or `system_fingerprint`.
pub(crate) fn build_chat_body(
    messages: &[Message],
    config: &ModelConfig,
    tier: ModelTier,
    stream: bool,
) -> Result<Value, ChatError> {
    let vision = is_vision_model(&config.model);
    let extended = tier.is_extended();
    let request = OpenAiChatRequest {
        messages: messages
            .iter()
            .map(|message| convert_message(message, vision))
            .collect(),
        stream,
        model: &config.model,
        temperature: config.temperature,
        presence_penalty: config.presence_penalty,
        frequency_penalty: config.frequency_penalty,
        top_p: config.top_p,
        max_tokens: config.max_tokens.filter(|_| extended && config.use_max_tokens),
        system_fingerprint: Some(config.system_fingerprint.as_str())
            .filter(|fingerprint| extended && !fingerprint.is_empty()),
    };
    serde_json::to_value(&request).map_err(|err| ChatError::Validation {
        message: format!("failed to serialize chat request: {err}"),
    })
}

fn convert_message(message: &Message, vision: bool) -> OpenAiMessage<'_> {
    let content = match (&message.content, vision) {
        (MessageContent::Parts(parts), true) => OpenAiContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => OpenAiPart::Text { text },
                    ContentPart::ImageUrl { url } => OpenAiPart::ImageUrl {
                        image_url: OpenAiImageUrl { url },
                    },
                })
                .collect(),
        ),
        _ => OpenAiContent::Text(message.text_content()),
    };
    OpenAiMessage {
        role: message.role.as_str(),
        content,
    }
}

/// Builds an images/generations body. DALL·E 2 rejects `quality` and `style`.
pub(crate) fn build_image_request(
    messages: &[Message],
    config: &ModelConfig,
    image: ImageModel,
) -> ImageRequest {
    let (quality, style) = match image {
        ImageModel::DallE2 => (None, None),
        ImageModel::DallE3 => (Some(config.quality.clone()), Some(config.style.clone())),
    };
    ImageRequest {
        model: canonical_model_name(&config.model).to_string(),
        prompt: image_prompt(messages),
        n: config.n,
        size: config.size.clone(),
        quality,
        style,
    }
}
