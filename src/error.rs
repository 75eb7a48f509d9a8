use std::time::Duration;

use thiserror::Error;

use crate::abort::AbortReason;

/// Aggregates every failure mode surfaced by the chat client.
///
/// Only one path reaches consumers: [`crate::ChatHandler::on_error`]. Per-chunk parse
/// failures are recovered inside the stream driver and never escape it.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Network failure, connection reset or body read error.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Non-success HTTP status that could not be classified further.
    #[error("http status {status}: {message}")]
    Http {
        /// Status code returned by the upstream endpoint.
        status: u16,
        /// Body or extracted error message.
        message: String,
    },
    /// Invalid or missing credentials.
    #[error("auth failure: {message}")]
    Auth { message: String },
    /// The provider throttled the request.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Raw message returned by the upstream provider.
        message: String,
        /// Wait duration suggested through `Retry-After`, when present.
        retry_after: Option<Duration>,
    },
    /// A response body or stream fragment was not valid JSON of the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },
    /// The request could not be built from the supplied conversation or config.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Provider configuration is incomplete. Raised before any network call.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Why the field is invalid.
        reason: String,
    },
    /// The request was cancelled by the caller or by the request timeout.
    #[error("request aborted: {reason}")]
    Aborted { reason: AbortReason },
    /// The provider refused the prompt before generating anything.
    #[error("message is being blocked for reason: {reason}")]
    PromptBlocked { reason: String },
    /// The moderation pre-check could not produce a verdict.
    #[error("moderation failed: {message}")]
    Moderation { message: String },
    /// Provider-defined error that does not fit another variant.
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Name of the provider, such as `openai`.
        provider: &'static str,
        /// Human-readable error message returned by the provider.
        message: String,
    },
}

impl ChatError {
    /// Creates a [`ChatError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley_chat::ChatError;
    ///
    /// let err = ChatError::transport("connection reset");
    /// assert!(matches!(err, ChatError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a [`ChatError::Parse`].
    pub fn parse<T: Into<String>>(message: T) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a [`ChatError::Provider`] tagged with the provider name.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley_chat::ChatError;
    ///
    /// let err = ChatError::provider("gemini", "quota exhausted");
    /// assert!(matches!(err, ChatError::Provider { provider: "gemini", .. }));
    /// ```
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Creates a [`ChatError::InvalidConfig`].
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors the stream driver swallows instead of terminating on.
    pub fn is_recoverable_chunk_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
