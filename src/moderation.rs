//! Optional content-policy pre-check of the latest user message.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::json;

use crate::config::ModerationConfig;
use crate::error::ChatError;
use crate::http::HttpRequest;
use crate::locale::Locale;
use crate::provider::ChatProvider;
use crate::transport::Transport;

/// One moderation result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModerationResult {
    pub flagged: bool,
    #[serde(default)]
    pub categories: BTreeMap<String, bool>,
}

impl ModerationResult {
    /// Categories marked true, in name order.
    pub fn flagged_categories(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .filter(|(_, flagged)| **flagged)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

/// Outcome of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationVerdict {
    Allowed,
    /// The request must not be sent; `message` is the whole answer.
    Blocked { message: String },
}

/// Screens prompts against the moderation endpoint with a latest/stable model pair.
#[derive(Debug, Clone)]
pub struct ModerationGate {
    config: ModerationConfig,
    locale: Locale,
}

impl ModerationGate {
    pub fn new(config: ModerationConfig, locale: Locale) -> Self {
        Self { config, locale }
    }

    /// Returns the moderation URL when `text` has to be screened.
    pub fn endpoint_for(
        &self,
        provider: &dyn ChatProvider,
        whitelist: bool,
        text: &str,
    ) -> Option<String> {
        if !self.config.enabled || whitelist || text.is_empty() || provider.moderates_natively()
        {
            return None;
        }
        provider.moderation_url()
    }

    /// Screens `text`.
    ///
    /// The latest model is asked first. When it does not flag the text the stable model
    /// is asked as well and its answer is used.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Moderation`] when either call fails or the response has no
    /// results.
    pub async fn check(
        &self,
        transport: &dyn Transport,
        url: &str,
        headers: &HashMap<String, String>,
        text: &str,
    ) -> Result<ModerationVerdict, ChatError> {
        let latest = self.query(transport, url, headers, text, &self.config.latest_model).await?;
        let Some(mut result) = latest else {
            return Err(ChatError::Moderation {
                message: "moderation response is empty".to_string(),
            });
        };

        if !result.flagged {
            let stable = self.query(transport, url, headers, text, &self.config.stable_model).await?;
            if let Some(stable) = stable {
                result = stable;
            }
        }

        tracing::info!(flagged = result.flagged, "text moderation");
        if !result.flagged {
            return Ok(ModerationVerdict::Allowed);
        }
        let categories: Vec<&str> = result.flagged_categories().collect();
        tracing::info!(?categories, "text moderation flagged categories");
        Ok(ModerationVerdict::Blocked {
            message: self.block_message(&result),
        })
    }

    async fn query(
        &self,
        transport: &dyn Transport,
        url: &str,
        headers: &HashMap<String, String>,
        text: &str,
        model: &str,
    ) -> Result<Option<ModerationResult>, ChatError> {
        let request = HttpRequest::json(url, &json!({ "input": text, "model": model }))?
            .with_headers(headers.clone());
        let response = transport.send(request).await.map_err(|err| ChatError::Moderation {
            message: err.to_string(),
        })?;
        if !response.is_success() {
            return Err(ChatError::Moderation {
                message: format!("[{}] Failed to get moderation response", response.status),
            });
        }
        let parsed: ModerationResponse =
            serde_json::from_slice(&response.body).map_err(|err| ChatError::Moderation {
                message: format!("invalid moderation response: {err}"),
            })?;
        Ok(parsed.results.into_iter().next())
    }

    /// Content-policy notice listing the localized flagged categories.
    pub fn block_message(&self, result: &ModerationResult) -> String {
        let labels: Vec<&str> = result
            .flagged_categories()
            .map(|category| self.locale.category_label(category))
            .collect();
        format!(
            "{}\n{}: {}\n{}\n",
            self.locale.content_policy_title,
            self.locale.content_policy_reason_title,
            labels.join(", "),
            self.locale.content_policy_subtitle,
        )
    }
}
