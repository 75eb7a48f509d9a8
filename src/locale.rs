//! User-visible strings emitted by the client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Labels the client writes into responses. Defaults are English; hosts replace them
/// with their own translations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locale {
    /// Hint appended to a failed stream answered with HTTP 401.
    pub unauthorized: String,
    pub content_policy_title: String,
    pub content_policy_subtitle: String,
    pub content_policy_reason_title: String,
    /// Moderation category name to display label.
    pub categories: BTreeMap<String, String>,
}

impl Default for Locale {
    fn default() -> Self {
        let categories = [
            ("sexual", "Sexual"),
            ("hate", "Hate"),
            ("harassment", "Harassment"),
            ("self-harm", "Self-harm"),
            ("sexual/minors", "Sexual involving minors"),
            ("hate/threatening", "Hateful threatening"),
            ("violence/graphic", "Graphic violence"),
            ("self-harm/intent", "Self-harm intent"),
            ("self-harm/instructions", "Self-harm instructions"),
            ("harassment/threatening", "Harassment threatening"),
            ("violence", "Violence"),
        ]
        .into_iter()
        .map(|(key, label)| (key.to_string(), label.to_string()))
        .collect();

        Self {
            unauthorized: "Unauthorized access, please enter access code or API key in the \
                           [auth](/#/auth) page."
                .to_string(),
            content_policy_title: "Your request got flagged because of a Content Policy Violation."
                .to_string(),
            content_policy_subtitle:
                "Read Here: https://platform.openai.com/docs/guides/moderation/overview"
                    .to_string(),
            content_policy_reason_title: "Reason".to_string(),
            categories,
        }
    }
}

impl Locale {
    /// Display label for a moderation category, falling back to the raw name.
    pub fn category_label<'a>(&'a self, category: &'a str) -> &'a str {
        self.categories
            .get(category)
            .map(String::as_str)
            .unwrap_or(category)
    }
}
