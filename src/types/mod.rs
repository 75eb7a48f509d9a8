//! Conversation and request types shared by every provider.

use serde::{Deserialize, Serialize};

use crate::abort::AbortHandle;
use crate::config::{ModelConfig, ModelConfigOverride};
use crate::error::ChatError;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One multimodal fragment of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Image referenced by URL. `data:` URLs carry the bytes inline.
    ImageUrl { url: String },
}

/// Message body: either plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A conversation turn. The client only ever reads messages.
///
/// # Examples
///
/// ```
/// use parley_chat::{ContentPart, Message, Role};
///
/// let plain = Message::user("hello");
/// assert_eq!(plain.text_content(), "hello");
///
/// let mixed = Message::with_parts(Role::User, vec![
///     ContentPart::ImageUrl { url: "https://example.com/cat.png".into() },
///     ContentPart::Text { text: "what is this?".into() },
/// ]);
/// assert_eq!(mixed.text_content(), "what is this?");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }

    /// Text a non-vision model sees: the string body, or the first text part.
    pub fn text_content(&self) -> &str {
        match &self.content {
            MessageContent::Text(text) => text,
            MessageContent::Parts(parts) => parts
                .iter()
                .find_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .unwrap_or_default(),
        }
    }

    /// Every text part joined with a space; what the moderation gate screens.
    pub fn joined_text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// The body as a list of parts, wrapping plain text in a single text part.
    pub fn parts(&self) -> Vec<ContentPart> {
        match &self.content {
            MessageContent::Text(text) => vec![ContentPart::Text { text: text.clone() }],
            MessageContent::Parts(parts) => parts.clone(),
        }
    }
}

/// Returns the most recent user message, if any.
pub fn last_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|message| message.role == Role::User)
}

/// Per-request selection of model and transport mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub model: String,
    #[serde(default)]
    pub stream: bool,
}

/// Everything one `chat()` call needs besides the consumer callbacks.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub messages: Vec<Message>,
    pub config: RequestConfig,
    /// Session settings layered over the client's global [`ModelConfig`].
    pub overrides: Option<ModelConfigOverride>,
    /// Skips the moderation gate for trusted requests.
    pub whitelist: bool,
}

impl ChatOptions {
    /// Options for `messages` sent to `model`, using the client's model settings.
    pub fn new(messages: Vec<Message>, model: impl Into<String>) -> Self {
        Self {
            messages,
            config: RequestConfig {
                model: model.into(),
                stream: false,
            },
            overrides: None,
            whitelist: false,
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.config.stream = stream;
        self
    }

    pub fn with_overrides(mut self, overrides: ModelConfigOverride) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn whitelisted(mut self, whitelist: bool) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// Session overrides over `global`, with the request's model name on top.
    pub(crate) fn resolve_model_config(&self, global: &ModelConfig) -> ModelConfig {
        ModelConfig {
            model: self.config.model.clone(),
            ..ModelConfig::resolve(global, self.overrides.as_ref())
        }
    }
}

/// Consumer side of a chat call.
///
/// Within one call `on_update` fires in order with monotonically growing text, and
/// exactly one of `on_finish` / `on_error` fires afterwards.
pub trait ChatHandler: Send {
    /// Cumulative visible text and the slice just revealed.
    fn on_update(&mut self, _text: &str, _delta: &str) {}

    fn on_finish(&mut self, text: String);

    fn on_error(&mut self, error: ChatError);

    /// Receives the abort handle before any request is dispatched.
    fn on_controller(&mut self, _controller: AbortHandle) {}
}

type UpdateFn = Box<dyn FnMut(&str, &str) + Send>;
type FinishFn = Box<dyn FnMut(String) + Send>;
type ErrorFn = Box<dyn FnMut(ChatError) + Send>;
type ControllerFn = Box<dyn FnMut(AbortHandle) + Send>;

/// Closure-based [`ChatHandler`].
///
/// # Examples
///
/// ```
/// use parley_chat::{ChatCallbacks, ChatHandler};
///
/// let mut callbacks = ChatCallbacks::new()
///     .on_update(|_, delta| print!("{delta}"))
///     .on_finish(|text| println!("\n{} chars", text.len()));
/// ChatHandler::on_finish(&mut callbacks, "done".to_string());
/// ```
#[derive(Default)]
pub struct ChatCallbacks {
    update: Option<UpdateFn>,
    finish: Option<FinishFn>,
    error: Option<ErrorFn>,
    controller: Option<ControllerFn>,
}

impl ChatCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update(mut self, f: impl FnMut(&str, &str) + Send + 'static) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    pub fn on_finish(mut self, f: impl FnMut(String) + Send + 'static) -> Self {
        self.finish = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(ChatError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_controller(mut self, f: impl FnMut(AbortHandle) + Send + 'static) -> Self {
        self.controller = Some(Box::new(f));
        self
    }
}

impl ChatHandler for ChatCallbacks {
    fn on_update(&mut self, text: &str, delta: &str) {
        if let Some(f) = self.update.as_mut() {
            f(text, delta);
        }
    }

    fn on_finish(&mut self, text: String) {
        if let Some(f) = self.finish.as_mut() {
            f(text);
        }
    }

    fn on_error(&mut self, error: ChatError) {
        match self.error.as_mut() {
            Some(f) => f(error),
            None => tracing::warn!(error = %error, "chat failed without an error callback"),
        }
    }

    fn on_controller(&mut self, controller: AbortHandle) {
        if let Some(f) = self.controller.as_mut() {
            f(controller);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn message_content_deserializes_from_string_or_parts() {
        let plain: Message =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).expect("plain");
        assert_eq!(plain, Message::user("hi"));

        let parts: Message = serde_json::from_str(
            r#"{"role":"assistant","content":[{"type":"text","text":"a"},{"type":"image_url","url":"u"}]}"#,
        )
        .expect("parts");
        assert_eq!(parts.role, Role::Assistant);
        assert_eq!(parts.parts().len(), 2);
    }

    #[test]
    fn joined_text_skips_images() {
        let message = Message::with_parts(
            Role::User,
            vec![
                ContentPart::Text { text: "one".into() },
                ContentPart::ImageUrl { url: "u".into() },
                ContentPart::Text { text: "two".into() },
            ],
        );
        assert_eq!(message.joined_text(), "one two");
        assert_eq!(message.text_content(), "one");
    }

    #[test]
    fn last_user_message_ignores_trailing_assistant_turns() {
        let messages = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
            Message::assistant("reply 2"),
        ];
        assert_eq!(
            last_user_message(&messages).map(Message::text_content),
            Some("second")
        );
        assert!(last_user_message(&[Message::system("s")]).is_none());
    }

    #[test]
    fn request_model_overrides_configured_model() {
        let options = ChatOptions::new(vec![Message::user("hi")], "gpt-4-1106-preview");
        assert_eq!(
            options.resolve_model_config(&ModelConfig::default()).model,
            "gpt-4-1106-preview"
        );
    }

    #[test]
    fn session_overrides_layer_over_global_settings() {
        let global = ModelConfig {
            temperature: 1.3,
            top_p: 0.4,
            ..ModelConfig::default()
        };
        let plain = ChatOptions::new(vec![Message::user("hi")], "gpt-4");
        let resolved = plain.resolve_model_config(&global);
        assert_eq!((resolved.temperature, resolved.top_p), (1.3, 0.4));

        let tuned = plain.with_overrides(ModelConfigOverride {
            temperature: Some(0.2),
            model: Some("ignored".into()),
            ..ModelConfigOverride::default()
        });
        let resolved = tuned.resolve_model_config(&global);
        assert_eq!((resolved.temperature, resolved.top_p), (0.2, 0.4));
        assert_eq!(resolved.model, "gpt-4");
    }

    #[test]
    fn callbacks_forward_to_closures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        let mut callbacks = ChatCallbacks::new()
            .on_update(move |text, delta| a.lock().unwrap().push(format!("{text}|{delta}")))
            .on_finish(move |text| b.lock().unwrap().push(format!("done:{text}")));
        ChatHandler::on_update(&mut callbacks, "he", "he");
        ChatHandler::on_finish(&mut callbacks, "hello".into());
        assert_eq!(*log.lock().unwrap(), vec!["he|he", "done:hello"]);
    }
}
