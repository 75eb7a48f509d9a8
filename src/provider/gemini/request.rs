use crate::config::ModelConfig;
use crate::model::{ModelTier, is_vision_model};
use crate::types::{ContentPart, Message, Role};

use super::types::{
    GeminiBlob, GeminiContent, GeminiFile, GeminiGenerationConfig, GeminiPart, GeminiRequest,
};

/// 构建 Google Gemini GenerateContent 请求体
///
/// 模型名称通过路径参数传递 不出现在 body 中
pub(crate) fn build_gemini_request(
    messages: &[Message],
    config: &ModelConfig,
    tier: ModelTier,
) -> GeminiRequest {
    let extended = tier.is_extended();
    GeminiRequest {
        contents: build_contents(messages, is_vision_model(&config.model)),
        generation_config: GeminiGenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens.filter(|_| extended && config.use_max_tokens),
            top_p: config.top_p,
        },
    }
}

/// 将 Message 转换为 Gemini Content
///
/// Gemini 只接受 `user` 与 `model` 且不允许相邻消息角色相同 因此合并相邻同角色消息
pub(crate) fn build_contents(messages: &[Message], vision: bool) -> Vec<GeminiContent> {
    let mut contents: Vec<GeminiContent> = Vec::with_capacity(messages.len());
    for message in messages {
        let role = gemini_role(message.role);
        let parts = convert_parts(message, vision);
        match contents.last_mut() {
            Some(last) if last.role == role => last.parts.extend(parts),
            _ => contents.push(GeminiContent { role, parts }),
        }
    }
    contents
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::User => "user",
    }
}

fn convert_parts(message: &Message, vision: bool) -> Vec<GeminiPart> {
    if !vision {
        return vec![GeminiPart::Text(message.text_content().to_string())];
    }
    message
        .parts()
        .into_iter()
        .map(|part| match part {
            ContentPart::Text { text } => GeminiPart::Text(text),
            ContentPart::ImageUrl { url } => image_part(url),
        })
        .collect()
}

/// `data:` URLs are sent inline; anything else is referenced by URI.
fn image_part(url: String) -> GeminiPart {
    if let Some((mime_type, data)) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
    {
        return GeminiPart::InlineData(GeminiBlob {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        });
    }
    GeminiPart::FileData(GeminiFile {
        mime_type: guess_image_mime(&url).to_string(),
        file_uri: url,
    })
}

fn guess_image_mime(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}
