use crate::error::ChatError;
use crate::model::{ImageModel, ModelTier};
use crate::provider::ImageRequest;

use super::types::{OpenAiChatResponse, OpenAiImageResponse, OpenAiStreamChunk};

/// `choices[0].message.content`, empty when absent.
pub(crate) fn chat_text(body: &str) -> Result<String, ChatError> {
    let response: OpenAiChatResponse = serde_json::from_str(body)
        .map_err(|err| ChatError::parse(format!("invalid chat response: {err}")))?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default())
}

/// Renders every generated image as a markdown table.
pub(crate) fn image_markdown(
    body: &str,
    request: &ImageRequest,
    tier: ModelTier,
) -> Result<String, ChatError> {
    let response: OpenAiImageResponse = serde_json::from_str(body)
        .map_err(|err| ChatError::parse(format!("invalid image response: {err}")))?;
    if response.data.is_empty() {
        return Err(ChatError::parse("image response contained no data"));
    }

    let entries: Vec<String> = response
        .data
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            let number = index + 1;
            let url = match (image.url, image.b64_json) {
                (Some(url), _) => url,
                (None, Some(data)) => format!("data:image/png;base64,{data}"),
                (None, None) => String::new(),
            };
            let ImageRequest {
                prompt,
                size,
                model,
                ..
            } = request;
            match tier {
                ModelTier::Image(ImageModel::DallE3) => {
                    let revised = image.revised_prompt.unwrap_or_default();
                    format!(
                        "| ![{revised}]({url}) |\n|---|\n| Size: {size} |\n| [Download Here]({url}) |\n\
                         | Revised Prompt ({number}): {revised} |\n| AI Models: {model} |"
                    )
                }
                _ => format!(
                    "#### {prompt} ({number})\n\n| ![{url}]({url}) |\n|---|\n| Size: {size} |\n\
                     | [Download Here]({url}) |\n| AI Models: {model} |"
                ),
            }
        })
        .collect();
    Ok(entries.join("\n\n"))
}

/// `choices[0].delta.content` of one stream chunk.
pub(crate) fn stream_delta(
    provider: &'static str,
    fragment: &str,
) -> Result<Option<String>, ChatError> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(fragment)
        .map_err(|err| ChatError::parse(format!("invalid stream chunk: {err}")))?;

    if let Some(error) = chunk.error {
        return Err(ChatError::provider(
            provider,
            error.message.unwrap_or_else(|| "stream error".to_string()),
        ));
    }
    if !chunk.prompt_filter_results.is_empty() {
        tracing::info!(
            provider,
            results = %serde_json::Value::Array(chunk.prompt_filter_results),
            "prompt filter results"
        );
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}
