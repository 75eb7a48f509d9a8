use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiChatRequest<'a> {
    pub(crate) messages: Vec<OpenAiMessage<'a>>,
    pub(crate) stream: bool,
    pub(crate) model: &'a str,
    pub(crate) temperature: f32,
    pub(crate) presence_penalty: f32,
    pub(crate) frequency_penalty: f32,
    pub(crate) top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_fingerprint: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiMessage<'a> {
    pub(crate) role: &'static str,
    pub(crate) content: OpenAiContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum OpenAiContent<'a> {
    Text(&'a str),
    Parts(Vec<OpenAiPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum OpenAiPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: OpenAiImageUrl<'a> },
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiImageUrl<'a> {
    pub(crate) url: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiChatResponse {
    #[serde(default)]
    pub(crate) choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiChoice {
    #[serde(default)]
    pub(crate) message: Option<OpenAiText>,
    #[serde(default)]
    pub(crate) delta: Option<OpenAiText>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiText {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiStreamChunk {
    #[serde(default)]
    pub(crate) choices: Vec<OpenAiChoice>,
    /// Azure content-filter annotations.
    #[serde(default)]
    pub(crate) prompt_filter_results: Vec<Value>,
    #[serde(default)]
    pub(crate) error: Option<OpenAiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) r#type: Option<String>,
    #[serde(default)]
    pub(crate) code: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiErrorEnvelope {
    pub(crate) error: Option<OpenAiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiImageResponse {
    #[serde(default)]
    pub(crate) data: Vec<OpenAiImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiImage {
    #[serde(default)]
    pub(crate) url: Option<String>,
    #[serde(default)]
    pub(crate) b64_json: Option<String>,
    #[serde(default)]
    pub(crate) revised_prompt: Option<String>,
}
