//! Model-name classification, resolved once per call.

/// Image generation model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageModel {
    DallE2,
    DallE3,
}

impl ImageModel {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageModel::DallE2 => "dall-e-2",
            ImageModel::DallE3 => "dall-e-3",
        }
    }
}

/// Which request shape a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Chat models that reject `max_tokens` and `system_fingerprint`.
    Legacy,
    /// Chat models that accept token limits and fingerprints.
    Extended,
    /// Image generation models.
    Image(ImageModel),
}

impl ModelTier {
    /// Classifies `model` after alias mapping.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley_chat::model::{ImageModel, ModelTier};
    ///
    /// assert_eq!(ModelTier::of("gpt-3.5-turbo"), ModelTier::Legacy);
    /// assert_eq!(ModelTier::of("gpt-4-1106-preview"), ModelTier::Extended);
    /// assert_eq!(ModelTier::of("gemini-pro"), ModelTier::Extended);
    /// assert_eq!(
    ///     ModelTier::of("dall-e-3-beta-instruct-vision"),
    ///     ModelTier::Image(ImageModel::DallE3)
    /// );
    /// ```
    pub fn of(model: &str) -> Self {
        let model = canonical_model_name(model);
        if model.starts_with("dall-e-3") {
            ModelTier::Image(ImageModel::DallE3)
        } else if model.starts_with("dall-e") {
            ModelTier::Image(ImageModel::DallE2)
        } else if model.ends_with("-preview") || model.starts_with("gemini-") {
            ModelTier::Extended
        } else {
            ModelTier::Legacy
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, ModelTier::Image(_))
    }

    pub fn is_extended(self) -> bool {
        self == ModelTier::Extended
    }
}

/// Maps instruct-vision aliases to the model the API actually serves.
pub fn canonical_model_name(model: &str) -> &str {
    match model {
        "dall-e-2-beta-instruct-vision" => ImageModel::DallE2.as_str(),
        "dall-e-3-beta-instruct-vision" => ImageModel::DallE3.as_str(),
        other => other,
    }
}

/// Vision models receive multimodal message parts.
pub fn is_vision_model(model: &str) -> bool {
    model.contains("vision")
}
