//! Model listing and billing queries.

use chrono::{Datelike, Days, NaiveDate};
use serde::Deserialize;

use crate::config::ProviderKind;
use crate::error::ChatError;
use crate::http::HttpResponse;
use crate::locale::Locale;

/// Model names offered when listing is disabled.
pub const DEFAULT_MODELS: &[(&str, ProviderKind)] = &[
    ("gpt-4", ProviderKind::OpenAi),
    ("gpt-4-1106-preview", ProviderKind::OpenAi),
    ("gpt-4-vision-preview", ProviderKind::OpenAi),
    ("gpt-3.5-turbo", ProviderKind::OpenAi),
    ("gpt-3.5-turbo-1106", ProviderKind::OpenAi),
    ("dall-e-2", ProviderKind::OpenAi),
    ("dall-e-3", ProviderKind::OpenAi),
    ("gemini-pro", ProviderKind::Gemini),
    ("gemini-pro-vision", ProviderKind::Gemini),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub available: bool,
    pub provider: ProviderKind,
}

pub fn default_models() -> Vec<ModelInfo> {
    DEFAULT_MODELS
        .iter()
        .map(|(name, provider)| ModelInfo {
            name: (*name).to_string(),
            available: true,
            provider: *provider,
        })
        .collect()
}

/// Spend so far and account limits, in USD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub used: Option<f64>,
    pub hard_limit_usd: Option<f64>,
    pub system_hard_limit_usd: Option<f64>,
}

/// Date range a usage query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl UsageWindow {
    /// First day of `today`'s month through tomorrow.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use parley_chat::account::UsageWindow;
    ///
    /// let window = UsageWindow::month_to_date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    /// assert_eq!(window.start.to_string(), "2024-02-01");
    /// assert_eq!(window.end.to_string(), "2024-03-01");
    /// ```
    pub fn month_to_date(today: NaiveDate) -> Self {
        Self {
            start: today.with_day(1).unwrap_or(today),
            end: today.checked_add_days(Days::new(1)).unwrap_or(today),
        }
    }

    pub fn current() -> Self {
        Self::month_to_date(chrono::Local::now().date_naive())
    }
}

/// Endpoints queried together for [`Usage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageUrls {
    pub usage: String,
    pub subscription: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Option<Vec<ListedModel>>,
}

#[derive(Deserialize)]
struct ListedModel {
    id: String,
}

#[derive(Deserialize)]
struct UsageBody {
    total_usage: Option<f64>,
    error: Option<UsageError>,
}

#[derive(Deserialize)]
struct UsageError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionBody {
    hard_limit_usd: Option<f64>,
    system_hard_limit_usd: Option<f64>,
}

/// Chat models (`gpt-` prefix) of a `/v1/models` listing.
pub(crate) fn parse_model_list(
    body: &[u8],
    provider: ProviderKind,
) -> Result<Vec<ModelInfo>, ChatError> {
    let list: ModelList = serde_json::from_slice(body)
        .map_err(|err| ChatError::parse(format!("invalid model list: {err}")))?;
    let models: Vec<ModelInfo> = list
        .data
        .unwrap_or_default()
        .into_iter()
        .filter(|model| model.id.starts_with("gpt-"))
        .map(|model| ModelInfo {
            name: model.id,
            available: true,
            provider,
        })
        .collect();
    tracing::debug!(count = models.len(), "listed chat models");
    Ok(models)
}

/// Combines the usage and subscription responses. Usage arrives in cents.
pub(crate) fn parse_usage(
    provider: &'static str,
    usage: &HttpResponse,
    subscription: &HttpResponse,
    locale: &Locale,
) -> Result<Usage, ChatError> {
    if usage.status == 401 {
        return Err(ChatError::Auth {
            message: locale.unauthorized.clone(),
        });
    }
    for response in [usage, subscription] {
        if !response.is_success() {
            return Err(ChatError::Http {
                status: response.status,
                message: format!("Failed to query usage from {provider}"),
            });
        }
    }

    let used: UsageBody = serde_json::from_slice(&usage.body)
        .map_err(|err| ChatError::parse(format!("invalid usage response: {err}")))?;
    let limits: SubscriptionBody = serde_json::from_slice(&subscription.body)
        .map_err(|err| ChatError::parse(format!("invalid subscription response: {err}")))?;
    if let Some(error) = used.error.filter(|error| error.kind.is_some()) {
        return Err(ChatError::provider(
            provider,
            error.message.unwrap_or_else(|| "usage query failed".to_string()),
        ));
    }

    Ok(Usage {
        used: used.total_usage.map(|cents| cents.round() / 100.0),
        hard_limit_usd: limits.hard_limit_usd.map(round_cents),
        system_hard_limit_usd: limits.system_hard_limit_usd.map(round_cents),
    })
}

fn round_cents(dollars: f64) -> f64 {
    (dollars * 100.0).round() / 100.0
}
