use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::abort::AbortHandle;
use crate::account::{ModelInfo, Usage, UsageWindow, default_models, parse_model_list, parse_usage};
use crate::animation::{Animator, IntervalTicker, TickSource};
use crate::config::{AnimationConfig, ClientConfig, ModelConfig, build_provider};
use crate::error::ChatError;
use crate::headers::{DynHeaderSource, HeaderSource, StaticHeaders};
use crate::http::reqwest::default_dyn_transport;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::locale::Locale;
use crate::moderation::{ModerationGate, ModerationVerdict};
use crate::provider::DynProvider;
use crate::session::Session;
use crate::transport::{DynTransport, SseTransport};
use crate::types::{ChatHandler, ChatOptions, Message, last_user_message};

/// 聊天调用入口 构建后只读 可放入 Arc 并发共享
pub struct ChatClient {
    provider: DynProvider,
    transport: DynTransport,
    headers: DynHeaderSource,
    moderation: ModerationGate,
    animation: AnimationConfig,
    timeout: Duration,
    locale: Locale,
    model: ModelConfig,
    list_models: bool,
}

impl ChatClient {
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder {
            config: ClientConfig::default(),
            provider: None,
            transport: None,
            headers: None,
        }
    }

    /// 使用默认 reqwest 传输层构建
    pub fn from_config(
        config: ClientConfig,
        headers: impl HeaderSource + 'static,
    ) -> Result<Self, ChatError> {
        Self::builder().config(config).headers(headers).build()
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// 发起一次聊天请求 流式输出按配置的间隔逐帧展示
    ///
    /// 返回前 [`ChatHandler::on_finish`] 与 [`ChatHandler::on_error`] 恰好触发其一。
    /// 审核拦截时直接以提示文本结束 不会请求聊天接口。
    pub async fn chat(&self, options: ChatOptions, handler: &mut dyn ChatHandler) {
        let mut ticker = IntervalTicker::new(self.animation.tick_interval());
        self.chat_with_ticker(options, handler, &mut ticker).await;
    }

    /// 同 [`ChatClient::chat`] 动画帧由 `ticker` 驱动
    pub async fn chat_with_ticker(
        &self,
        options: ChatOptions,
        handler: &mut dyn ChatHandler,
        ticker: &mut dyn TickSource,
    ) {
        let provider = self.provider.as_ref();
        let name = provider.name();
        let headers = self.headers.headers();

        let text = last_user_message(&options.messages)
            .map(Message::joined_text)
            .unwrap_or_default();
        if let Some(url) = self.moderation.endpoint_for(provider, options.whitelist, &text) {
            match self
                .moderation
                .check(self.transport.as_ref(), &url, &headers, &text)
                .await
            {
                Ok(ModerationVerdict::Allowed) => {}
                Ok(ModerationVerdict::Blocked { message }) => {
                    handler.on_finish(message);
                    return;
                }
                Err(err) => {
                    tracing::warn!(provider = name, error = %err, "moderation request failed");
                    handler.on_error(err);
                    return;
                }
            }
        }

        let model_config = options.resolve_model_config(&self.model);
        let prepared =
            match provider.prepare(&options.messages, &model_config, options.config.stream) {
                Ok(prepared) => prepared,
                Err(err) => {
                    handler.on_error(err);
                    return;
                }
            };
        tracing::info!(provider = name, url = %prepared.url, stream = prepared.stream, "chat request");
        tracing::debug!(provider = name, payload = ?prepared.payload, "request payload");
        let request = match HttpRequest::json(prepared.url.as_str(), &prepared.payload) {
            Ok(request) => request.with_headers(headers),
            Err(err) => {
                handler.on_error(err);
                return;
            }
        };

        let abort = AbortHandle::new();
        handler.on_controller(abort.clone());
        let session = Session {
            provider,
            transport: self.transport.as_ref(),
            locale: &self.locale,
            abort: &abort,
            deadline: Instant::now() + self.timeout,
        };
        if prepared.stream {
            let animator = Animator::new(self.animation.speed());
            session.stream(request, animator, ticker, handler).await;
        } else {
            session.one_shot(&prepared, request, handler).await;
        }
        tracing::debug!(provider = name, aborted = abort.is_aborted(), "request settled");
    }

    /// 列出可用的聊天模型
    ///
    /// 未开启 [`ClientConfig::list_models`] 时返回内置列表 不支持列表的供应商返回空
    pub async fn models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        let Some(url) = self.provider.models_url() else {
            return Ok(Vec::new());
        };
        if !self.list_models {
            return Ok(default_models());
        }
        let request = HttpRequest::get(url).with_headers(self.headers.headers());
        let response = self.transport.send(request).await?;
        parse_model_list(&response.body, self.provider.kind())
    }

    /// 查询本月用量与额度
    pub async fn usage(&self) -> Result<Usage, ChatError> {
        self.usage_for(&UsageWindow::current()).await
    }

    /// 查询指定时间窗口的用量 密钥无效时返回携带本地化提示的 [`ChatError::Auth`]
    pub async fn usage_for(&self, window: &UsageWindow) -> Result<Usage, ChatError> {
        let name = self.provider.name();
        let Some(urls) = self.provider.usage_urls(window) else {
            return Err(ChatError::provider(name, "usage query is not supported"));
        };
        let headers = self.headers.headers();
        let (usage, subscription) = futures_util::future::join(
            self.transport
                .send(HttpRequest::get(urls.usage).with_headers(headers.clone())),
            self.transport
                .send(HttpRequest::get(urls.subscription).with_headers(headers)),
        )
        .await;
        let usage = parse_usage(name, &usage?, &subscription?, &self.locale)?;
        tracing::info!(provider = name, used = ?usage.used, "usage queried");
        Ok(usage)
    }

    /// 在运行时上后台执行 [`ChatClient::chat`] 结束后交还 handler
    pub fn spawn<H>(self: &Arc<Self>, options: ChatOptions, mut handler: H) -> JoinHandle<H>
    where
        H: ChatHandler + 'static,
    {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.chat(options, &mut handler).await;
            handler
        })
    }
}

/// 构建 ChatClient 的 Builder 未设置的部分由 ClientConfig 推导
pub struct ChatClientBuilder {
    config: ClientConfig,
    provider: Option<DynProvider>,
    transport: Option<DynTransport>,
    headers: Option<DynHeaderSource>,
}

impl ChatClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// 替换由配置构建的 Provider
    pub fn provider(mut self, provider: DynProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn transport(mut self, transport: DynTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 使用自定义 HTTP 传输层
    pub fn http_transport(self, http: DynHttpTransport) -> Self {
        self.transport(Arc::new(SseTransport::new(http)))
    }

    pub fn headers(mut self, headers: impl HeaderSource + 'static) -> Self {
        self.headers = Some(Arc::new(headers));
        self
    }

    /// 构建最终的 ChatClient 供应商配置不完整时返回 [`ChatError::InvalidConfig`]
    pub fn build(self) -> Result<ChatClient, ChatError> {
        let provider = match self.provider {
            Some(provider) => provider,
            None => build_provider(&self.config)?,
        };
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(SseTransport::new(default_dyn_transport()?)),
        };
        let headers = self
            .headers
            .unwrap_or_else(|| Arc::new(StaticHeaders::default()));
        let timeout = self.config.request_timeout();
        let ClientConfig {
            list_models,
            moderation,
            animation,
            locale,
            model,
            ..
        } = self.config;
        Ok(ChatClient {
            provider,
            transport,
            headers,
            moderation: ModerationGate::new(moderation, locale.clone()),
            animation,
            timeout,
            locale,
            model,
            list_models,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::stream;

    use super::*;
    use crate::config::ProviderKind;
    use crate::http::{HttpResponse, HttpStreamResponse, HttpTransport};
    use crate::types::ChatCallbacks;

    /// Replies to every request with the same canned body and records the URLs hit.
    struct RecordingHttp {
        status: u16,
        content_type: &'static str,
        body: &'static str,
        urls: Mutex<Vec<String>>,
        headers: Mutex<Vec<HashMap<String, String>>>,
    }

    impl RecordingHttp {
        fn new(status: u16, content_type: &'static str, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                content_type,
                body,
                urls: Mutex::new(Vec::new()),
                headers: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, request: &HttpRequest) {
            self.urls.lock().unwrap().push(request.url.clone());
            self.headers.lock().unwrap().push(request.headers.clone());
        }

        fn response_headers(&self) -> HashMap<String, String> {
            HashMap::from([("content-type".to_string(), self.content_type.to_string())])
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingHttp {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError> {
            self.record(&request);
            Ok(HttpResponse {
                status: self.status,
                headers: self.response_headers(),
                body: self.body.as_bytes().to_vec(),
            })
        }

        async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, ChatError> {
            self.record(&request);
            Ok(HttpStreamResponse {
                status: self.status,
                headers: self.response_headers(),
                body: Box::pin(stream::iter([Ok::<_, ChatError>(
                    self.body.as_bytes().to_vec(),
                )])),
            })
        }
    }

    fn config_without_moderation(provider: ProviderKind) -> ClientConfig {
        let mut config = ClientConfig {
            provider,
            base_url: Some("https://proxy.local".into()),
            azure_api_version: Some("2024-02-01".into()),
            ..ClientConfig::default()
        };
        config.moderation.enabled = false;
        config
    }

    fn outcome() -> (ChatCallbacks, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (finish, error) = (log.clone(), log.clone());
        let callbacks = ChatCallbacks::new()
            .on_finish(move |text| finish.lock().unwrap().push(format!("finish:{text}")))
            .on_error(move |err| error.lock().unwrap().push(format!("error:{err}")));
        (callbacks, log)
    }

    #[tokio::test]
    async fn headers_from_the_source_reach_the_wire() {
        let http = RecordingHttp::new(
            200,
            "application/json",
            r#"{"choices":[{"message":{"content":"ok"}}]}"#,
        );
        let client = ChatClient::builder()
            .config(config_without_moderation(ProviderKind::OpenAi))
            .http_transport(http.clone())
            .headers(StaticHeaders::bearer("sk-test"))
            .build()
            .expect("client");
        let (mut callbacks, log) = outcome();
        client
            .chat(ChatOptions::new(vec![Message::user("hi")], "gpt-4"), &mut callbacks)
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["finish:ok"]);
        let headers = http.headers.lock().unwrap();
        assert_eq!(
            headers[0].get("Authorization").map(String::as_str),
            Some("Bearer sk-test")
        );
        assert_eq!(
            headers[0].get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn gemini_image_model_reports_validation_error_without_network() {
        let http = RecordingHttp::new(200, "application/json", "{}");
        let client = ChatClient::builder()
            .config(config_without_moderation(ProviderKind::Gemini))
            .http_transport(http.clone())
            .build()
            .expect("client");
        let (mut callbacks, log) = outcome();
        client
            .chat(ChatOptions::new(vec![Message::user("a fox")], "dall-e-3"), &mut callbacks)
            .await;

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].starts_with("error:invalid request"), "{log:?}");
        assert!(http.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawned_chat_returns_the_handler() {
        let http = RecordingHttp::new(
            200,
            "application/json",
            r#"{"candidates":[{"content":{"parts":[{"text":"hola"}]}}]}"#,
        );
        let client = Arc::new(
            ChatClient::builder()
                .config(config_without_moderation(ProviderKind::Gemini))
                .http_transport(http.clone())
                .build()
                .expect("client"),
        );
        let (callbacks, log) = outcome();
        let handle = client.spawn(
            ChatOptions::new(vec![Message::user("hi")], "gemini-pro"),
            callbacks,
        );
        handle.await.expect("join");
        assert_eq!(*log.lock().unwrap(), vec!["finish:hola"]);
        assert_eq!(
            http.urls.lock().unwrap()[0],
            "https://proxy.local/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn incomplete_azure_config_fails_to_build() {
        let config = ClientConfig {
            provider: ProviderKind::Azure,
            ..ClientConfig::default()
        };
        let http = RecordingHttp::new(200, "application/json", "{}");
        assert!(matches!(
            ChatClient::builder().config(config).http_transport(http).build(),
            Err(ChatError::InvalidConfig { .. })
        ));
    }
}
