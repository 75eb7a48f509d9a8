use std::collections::HashMap;

use crate::error::ChatError;
use crate::provider::retry::retry_after_from_headers;

use super::types::OpenAiErrorEnvelope;

/// Classifies a non-success OpenAI-style response.
pub(crate) fn parse_openai_error(
    provider: &'static str,
    status: u16,
    headers: &HashMap<String, String>,
    body: &str,
) -> ChatError {
    let Some(error) = serde_json::from_str::<OpenAiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
    else {
        return ChatError::Http {
            status,
            message: body.to_string(),
        };
    };

    let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
    if let Some(code) = error.code.filter(|code| !code.is_null()) {
        message = format!("{message} ({code})");
    } else if let Some(kind) = error.r#type {
        message = format!("{message} ({kind})");
    }
    match status {
        401 | 403 => ChatError::Auth { message },
        429 => ChatError::RateLimit {
            message,
            retry_after: retry_after_from_headers(headers),
        },
        400 => ChatError::Validation { message },
        _ => ChatError::provider(provider, message),
    }
}
