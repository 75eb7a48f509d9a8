use crate::error::ChatError;

use super::types::GeminiResponse;

fn parse(body: &str) -> Result<GeminiResponse, ChatError> {
    serde_json::from_str(body)
        .map_err(|err| ChatError::parse(format!("invalid gemini response: {err}")))
}

fn block_reason(response: &GeminiResponse) -> Option<&str> {
    response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
}

fn candidate_text(response: &GeminiResponse) -> Option<&str> {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .and_then(|content| content.parts.first())
        .and_then(|part| part.text.as_deref())
        .filter(|text| !text.is_empty())
}

/// Final text of a buffered response: candidate text, else the error message, else
/// empty. A blocked prompt is an error even when the rest of the body parsed.
pub(crate) fn one_shot_text(body: &str) -> Result<String, ChatError> {
    let response = parse(body)?;
    tracing::debug!(provider = "gemini", ?response, "gemini response");
    if let Some(reason) = block_reason(&response) {
        return Err(ChatError::PromptBlocked {
            reason: reason.to_string(),
        });
    }
    let text = candidate_text(&response)
        .or_else(|| {
            response
                .error
                .as_ref()
                .and_then(|error| error.message.as_deref())
        })
        .unwrap_or_default();
    Ok(text.to_string())
}

/// Text carried by one streamed array element.
pub(crate) fn stream_delta(fragment: &str) -> Result<Option<String>, ChatError> {
    let response = parse(fragment)?;
    if let Some(reason) = block_reason(&response) {
        return Err(ChatError::PromptBlocked {
            reason: reason.to_string(),
        });
    }
    if let Some(message) = response.error.as_ref().and_then(|error| error.message.as_deref()) {
        return Err(ChatError::provider("gemini", message));
    }
    Ok(candidate_text(&response).map(str::to_string))
}
