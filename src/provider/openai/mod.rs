//! OpenAI chat/completions, image generation and moderation, plus the Azure OpenAI
//! deployment variant of the same API.

use crate::account::{UsageUrls, UsageWindow};
use crate::config::{ModelConfig, ProviderKind};
use crate::error::ChatError;
use crate::http::HttpResponse;
use crate::model::ModelTier;
use crate::provider::{ChatProvider, PreparedRequest, RequestPayload, normalize_base_url};
use crate::transport::StreamFraming;
use crate::types::Message;

mod error;
mod request;
mod response;
mod types;

use error::parse_openai_error;
use request::{build_chat_body, build_image_request};
use response::{chat_text, image_markdown, stream_delta};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const CHAT_PATH: &str = "v1/chat/completions";
const IMAGE_PATH: &str = "v1/images/generations";
const MODERATION_PATH: &str = "v1/moderations";
const MODELS_PATH: &str = "v1/models";
const USAGE_PATH: &str = "dashboard/billing/usage";
const SUBSCRIPTION_PATH: &str = "dashboard/billing/subscription";

/// OpenAI-compatible provider. With an Azure API version set it targets an Azure
/// deployment instead.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    azure_api_version: Option<String>,
}

impl OpenAiProvider {
    /// Targets `base_url`, or the public OpenAI endpoint when it is empty.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref(), DEFAULT_BASE_URL),
            azure_api_version: None,
        }
    }

    /// Targets an Azure deployment URL such as
    /// `https://{resource}.openai.azure.com/openai/deployments/{deployment}`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidConfig`] when either value is empty.
    pub fn azure(
        base_url: impl AsRef<str>,
        api_version: impl Into<String>,
    ) -> Result<Self, ChatError> {
        let base_url = base_url.as_ref().trim();
        let api_version = api_version.into();
        if base_url.is_empty() || api_version.trim().is_empty() {
            return Err(ChatError::invalid_config(
                "azure",
                "incomplete azure config, please check it in your settings page",
            ));
        }
        Ok(Self {
            base_url: normalize_base_url(base_url, DEFAULT_BASE_URL),
            azure_api_version: Some(api_version.trim().to_string()),
        })
    }

    fn url(&self, path: &str) -> String {
        match &self.azure_api_version {
            Some(version) => format!("{}/{}", self.base_url, azure_path(path, version)),
            None => format!("{}/{}", self.base_url, path),
        }
    }
}

/// Azure deployments drop the `v1/` prefix and take the API version as a query.
fn azure_path(path: &str, api_version: &str) -> String {
    let path = path.replace("v1/", "");
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}api-version={api_version}")
}

impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        if self.azure_api_version.is_some() {
            ProviderKind::Azure
        } else {
            ProviderKind::OpenAi
        }
    }

    fn name(&self) -> &'static str {
        match self.kind() {
            ProviderKind::Azure => "azure",
            _ => "openai",
        }
    }

    fn prepare(
        &self,
        messages: &[Message],
        config: &ModelConfig,
        stream: bool,
    ) -> Result<PreparedRequest, ChatError> {
        let tier = ModelTier::of(&config.model);
        let prepared = match tier {
            ModelTier::Image(image) => PreparedRequest {
                url: self.url(IMAGE_PATH),
                payload: RequestPayload::Image(build_image_request(messages, config, image)),
                tier,
                stream: false,
            },
            ModelTier::Legacy | ModelTier::Extended => PreparedRequest {
                url: self.url(CHAT_PATH),
                payload: RequestPayload::Chat(build_chat_body(messages, config, tier, stream)?),
                tier,
                stream,
            },
        };
        Ok(prepared)
    }

    fn moderation_url(&self) -> Option<String> {
        Some(self.url(MODERATION_PATH))
    }

    fn moderates_natively(&self) -> bool {
        self.azure_api_version.is_some()
    }

    fn stream_framing(&self) -> StreamFraming {
        StreamFraming::EventStream
    }

    fn models_url(&self) -> Option<String> {
        Some(self.url(MODELS_PATH))
    }

    fn usage_urls(&self, window: &UsageWindow) -> Option<UsageUrls> {
        Some(UsageUrls {
            usage: self.url(&format!(
                "{USAGE_PATH}?start_date={}&end_date={}",
                window.start.format("%Y-%m-%d"),
                window.end.format("%Y-%m-%d")
            )),
            subscription: self.url(SUBSCRIPTION_PATH),
        })
    }

    fn extract(
        &self,
        request: &PreparedRequest,
        response: &HttpResponse,
    ) -> Result<String, ChatError> {
        let body = String::from_utf8_lossy(&response.body);
        if !response.is_success() {
            return Err(parse_openai_error(
                self.name(),
                response.status,
                &response.headers,
                &body,
            ));
        }
        match &request.payload {
            RequestPayload::Image(image) => image_markdown(&body, image, request.tier),
            RequestPayload::Chat(_) => chat_text(&body),
        }
    }

    fn extract_delta(&self, fragment: &str) -> Result<Option<String>, ChatError> {
        stream_delta(self.name(), fragment)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::ImageModel;

    #[test]
    fn azure_paths_drop_version_prefix_and_append_query() {
        assert_eq!(
            azure_path("v1/chat/completions", "2023-12-01-preview"),
            "chat/completions?api-version=2023-12-01-preview"
        );
        assert_eq!(azure_path("v1/x?y=1", "v"), "x?y=1&api-version=v");
    }

    #[test]
    fn azure_requires_url_and_version() {
        assert!(matches!(
            OpenAiProvider::azure("", "2023-12-01-preview"),
            Err(ChatError::InvalidConfig { .. })
        ));
        let err = OpenAiProvider::azure("https://r.openai.azure.com", " ").expect_err("invalid");
        assert!(err.to_string().contains("incomplete azure config"));
    }

    #[test]
    fn urls_follow_the_provider_variant() {
        let openai = OpenAiProvider::new("");
        assert_eq!(
            openai.moderation_url().as_deref(),
            Some("https://api.openai.com/v1/moderations")
        );
        assert!(!openai.moderates_natively());

        let azure = OpenAiProvider::azure(
            "https://r.openai.azure.com/openai/deployments/gpt4/",
            "2023-12-01-preview",
        )
        .expect("azure");
        let prepared = azure
            .prepare(&[Message::user("hi")], &ModelConfig::default(), true)
            .expect("prepared");
        assert_eq!(
            prepared.url,
            "https://r.openai.azure.com/openai/deployments/gpt4/chat/completions?api-version=2023-12-01-preview"
        );
        assert!(azure.moderates_natively());
        assert_eq!(azure.kind(), ProviderKind::Azure);
    }

    #[test]
    fn account_endpoints_share_the_base_url() {
        let window = UsageWindow::month_to_date(
            chrono::NaiveDate::from_ymd_opt(2024, 3, 15).expect("date"),
        );
        let openai = OpenAiProvider::new("https://proxy.local");
        assert_eq!(
            openai.models_url().as_deref(),
            Some("https://proxy.local/v1/models")
        );
        assert_eq!(
            openai.usage_urls(&window),
            Some(UsageUrls {
                usage: "https://proxy.local/dashboard/billing/usage?start_date=2024-03-01&end_date=2024-03-16"
                    .into(),
                subscription: "https://proxy.local/dashboard/billing/subscription".into(),
            })
        );

        let azure = OpenAiProvider::azure("https://r.openai.azure.com", "v").expect("azure");
        assert_eq!(
            azure.usage_urls(&window).map(|urls| urls.usage),
            Some(
                "https://r.openai.azure.com/dashboard/billing/usage?start_date=2024-03-01&end_date=2024-03-16&api-version=v"
                    .into()
            )
        );
    }

    #[test]
    fn image_models_never_stream() {
        let provider = OpenAiProvider::new("https://proxy.local");
        let config = ModelConfig {
            model: "dall-e-3".into(),
            ..ModelConfig::default()
        };
        let prepared = provider
            .prepare(&[Message::user("a fox")], &config, true)
            .expect("prepared");
        assert_eq!(prepared.url, "https://proxy.local/v1/images/generations");
        assert_eq!(prepared.tier, ModelTier::Image(ImageModel::DallE3));
        assert!(!prepared.stream);
    }

    #[test]
    fn extract_maps_failures_through_error_parser() {
        let provider = OpenAiProvider::new("");
        let prepared = provider
            .prepare(&[Message::user("hi")], &ModelConfig::default(), false)
            .expect("prepared");
        let response = HttpResponse {
            status: 401,
            headers: HashMap::new(),
            body: br#"{"error":{"message":"bad key"}}"#.to_vec(),
        };
        assert!(matches!(
            provider.extract(&prepared, &response),
            Err(ChatError::Auth { .. })
        ));
    }
}
