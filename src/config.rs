//! 客户端配置 均为纯数据 由调用方注入

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::locale::Locale;
use crate::provider::DynProvider;
use crate::provider::gemini::GeminiProvider;
use crate::provider::openai::OpenAiProvider;

/// 供应商类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Azure,
    Gemini,
}

/// 模型参数 全局默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// 生成图片数量
    pub n: u32,
    /// 图片质量 仅 DALL·E 3
    pub quality: String,
    pub size: String,
    /// 图片风格 仅 DALL·E 3
    pub style: String,
    /// 向支持的模型发送 `max_tokens`
    pub use_max_tokens: bool,
    pub system_fingerprint: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.5,
            top_p: 1.0,
            max_tokens: Some(2000),
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            n: 1,
            quality: "hd".to_string(),
            size: "1024x1024".to_string(),
            style: "vivid".to_string(),
            use_max_tokens: false,
            system_fingerprint: String::new(),
        }
    }
}

/// 会话级覆盖 未设置的字段沿用全局配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfigOverride {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub n: Option<u32>,
    pub quality: Option<String>,
    pub size: Option<String>,
    pub style: Option<String>,
    pub use_max_tokens: Option<bool>,
    pub system_fingerprint: Option<String>,
}

impl ModelConfig {
    /// 会话覆盖全局 之后将数值字段限制在合法范围内
    ///
    /// # Examples
    ///
    /// ```
    /// use parley_chat::config::{ModelConfig, ModelConfigOverride};
    ///
    /// let global = ModelConfig { temperature: 0.7, ..ModelConfig::default() };
    /// let session = ModelConfigOverride { temperature: Some(5.0), n: Some(3), ..Default::default() };
    /// let resolved = ModelConfig::resolve(&global, Some(&session));
    /// assert_eq!(resolved.temperature, 2.0);
    /// assert_eq!(resolved.n, 3);
    /// assert_eq!(resolved.model, global.model);
    /// ```
    pub fn resolve(global: &ModelConfig, session: Option<&ModelConfigOverride>) -> ModelConfig {
        let mut merged = global.clone();
        if let Some(session) = session {
            let s = session.clone();
            if let Some(v) = s.model {
                merged.model = v;
            }
            if let Some(v) = s.temperature {
                merged.temperature = v;
            }
            if let Some(v) = s.top_p {
                merged.top_p = v;
            }
            if s.max_tokens.is_some() {
                merged.max_tokens = s.max_tokens;
            }
            if let Some(v) = s.presence_penalty {
                merged.presence_penalty = v;
            }
            if let Some(v) = s.frequency_penalty {
                merged.frequency_penalty = v;
            }
            if let Some(v) = s.n {
                merged.n = v;
            }
            if let Some(v) = s.quality {
                merged.quality = v;
            }
            if let Some(v) = s.size {
                merged.size = v;
            }
            if let Some(v) = s.style {
                merged.style = v;
            }
            if let Some(v) = s.use_max_tokens {
                merged.use_max_tokens = v;
            }
            if let Some(v) = s.system_fingerprint {
                merged.system_fingerprint = v;
            }
        }
        merged.clamped()
    }

    /// 限制取值范围
    pub fn clamped(mut self) -> Self {
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.top_p = self.top_p.clamp(0.0, 1.0);
        self.presence_penalty = self.presence_penalty.clamp(-2.0, 2.0);
        self.frequency_penalty = self.frequency_penalty.clamp(-2.0, 2.0);
        self.max_tokens = self.max_tokens.map(|tokens| tokens.min(512_000));
        self.n = self.n.clamp(1, 10);
        self
    }
}

/// 内容审核配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub enabled: bool,
    pub latest_model: String,
    pub stable_model: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latest_model: "text-moderation-latest".to_string(),
            stable_model: "text-moderation-stable".to_string(),
        }
    }
}

/// 打字动画配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// 每帧展示 待展示字符数除以该值 越小越快
    pub speed: u32,
    pub tick_interval_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            speed: 60,
            tick_interval_ms: 16,
        }
    }
}

impl AnimationConfig {
    pub fn speed(&self) -> u32 {
        self.speed.clamp(1, 200)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// 顶层客户端配置
///
/// # Examples
///
/// ```
/// use parley_chat::config::{ClientConfig, ProviderKind};
///
/// let config = ClientConfig::from_toml_str(r#"
///     provider = "azure"
///     base_url = "https://example.openai.azure.com/openai/deployments/gpt4"
///     azure_api_version = "2023-12-01-preview"
///
///     [moderation]
///     enabled = false
/// "#).unwrap();
/// assert_eq!(config.provider, ProviderKind::Azure);
/// assert!(!config.moderation.enabled);
/// assert_eq!(config.animation.speed, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub provider: ProviderKind,
    /// 接口地址 留空时使用供应商公开地址
    pub base_url: Option<String>,
    pub azure_api_version: Option<String>,
    /// 等待响应头的时限 流式响应建立后不再计时
    pub request_timeout_ms: u64,
    /// 开启后从模型列表接口查询 否则返回内置列表
    pub list_models: bool,
    pub moderation: ModerationConfig,
    pub animation: AnimationConfig,
    /// 全局模型参数 会话可经 [`ModelConfig::resolve`] 覆盖
    pub model: ModelConfig,
    pub locale: Locale,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            azure_api_version: None,
            request_timeout_ms: 60_000,
            list_models: false,
            moderation: ModerationConfig::default(),
            animation: AnimationConfig::default(),
            model: ModelConfig::default(),
            locale: Locale::default(),
        }
    }
}

impl ClientConfig {
    /// 解析 TOML 缺省字段取默认值
    pub fn from_toml_str(source: &str) -> Result<Self, ChatError> {
        toml::from_str(source).map_err(|err| ChatError::invalid_config("config", err.to_string()))
    }

    /// 读取并解析 TOML 文件
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| {
            ChatError::invalid_config(path.display().to_string(), err.to_string())
        })?;
        Self::from_toml_str(&source)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// 根据配置构建 Provider
///
/// Azure 缺少 base URL 或 API version 时返回 [`ChatError::InvalidConfig`]
pub fn build_provider(config: &ClientConfig) -> Result<DynProvider, ChatError> {
    let base_url = config.base_url.clone().unwrap_or_default();
    let provider: DynProvider = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(base_url)),
        ProviderKind::Azure => {
            let version = config.azure_api_version.clone().unwrap_or_default();
            Arc::new(OpenAiProvider::azure(base_url, version)?)
        }
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(base_url)),
    };
    Ok(provider)
}
