//! Per-request drivers. Each settles its handler exactly once.

use futures_util::StreamExt;
use tokio::time::{Instant, sleep_until};

use crate::abort::{AbortHandle, AbortReason};
use crate::animation::{Animator, TickSource};
use crate::error::ChatError;
use crate::http::HttpRequest;
use crate::locale::Locale;
use crate::provider::{ChatProvider, PreparedRequest};
use crate::transport::{ResponseHead, Transport, TransportEvent};
use crate::types::ChatHandler;

/// Collaborators shared by both drivers for one request.
pub(crate) struct Session<'a> {
    pub(crate) provider: &'a dyn ChatProvider,
    pub(crate) transport: &'a dyn Transport,
    pub(crate) locale: &'a Locale,
    pub(crate) abort: &'a AbortHandle,
    pub(crate) deadline: Instant,
}

impl Session<'_> {
    /// Records a timeout and returns whichever reason won.
    fn expire(&self) -> AbortReason {
        self.abort.abort_with(AbortReason::Timeout);
        self.abort.reason().unwrap_or(AbortReason::Timeout)
    }

    /// Buffered request: the body is interpreted once and handed over whole.
    pub(crate) async fn one_shot(
        &self,
        prepared: &PreparedRequest,
        request: HttpRequest,
        handler: &mut dyn ChatHandler,
    ) {
        let outcome = tokio::select! {
            biased;
            reason = self.abort.aborted() => Err(ChatError::Aborted { reason }),
            () = sleep_until(self.deadline) => Err(ChatError::Aborted { reason: self.expire() }),
            response = self.transport.send(request) => response
                .and_then(|response| self.provider.extract(prepared, &response)),
        };
        match outcome {
            Ok(text) => handler.on_finish(text),
            Err(err) => {
                tracing::warn!(provider = self.provider.name(), error = %err, "chat request failed");
                handler.on_error(err);
            }
        }
    }

    /// Streamed request: deltas are buffered in `animator` and revealed on each tick.
    ///
    /// The deadline only bounds the wait for the response head; once the response is
    /// open the stream runs until it ends or the caller aborts. Abort and timeout finish
    /// with everything received so far. A response that is not a stream finishes with a
    /// diagnostic built from its body.
    pub(crate) async fn stream(
        &self,
        request: HttpRequest,
        mut animator: Animator,
        ticker: &mut dyn TickSource,
        handler: &mut dyn ChatHandler,
    ) {
        let provider = self.provider.name();
        let framing = self.provider.stream_framing();
        let opened = tokio::select! {
            biased;
            reason = self.abort.aborted() => Err(reason),
            () = sleep_until(self.deadline) => Err(self.expire()),
            opened = self.transport.open(request, framing) => Ok(opened),
        };
        let mut events = match opened {
            Ok(Ok(events)) => events,
            Ok(Err(err)) => {
                tracing::warn!(provider, error = %err, "failed to open stream");
                handler.on_error(err);
                return;
            }
            Err(reason) => {
                finish_aborted(&mut animator, reason, handler);
                return;
            }
        };

        let mut head: Option<ResponseHead> = None;
        let mut closed = false;
        loop {
            if animator.is_drained() {
                tracing::debug!(provider, "response animation finished");
                if let Some(text) = animator.finish() {
                    handler.on_finish(text);
                }
                return;
            }

            tokio::select! {
                biased;
                reason = self.abort.aborted() => {
                    finish_aborted(&mut animator, reason, handler);
                    return;
                }
                () = sleep_until(self.deadline), if head.is_none() => {
                    self.expire();
                }
                event = events.next(), if !closed => match event {
                    Some(Ok(TransportEvent::Open(opened))) => {
                        tracing::info!(
                            provider,
                            status = opened.status,
                            content_type = ?opened.content_type,
                            "response content type"
                        );
                        head = Some(opened);
                    }
                    Some(Ok(TransportEvent::Message(fragment))) => {
                        match self.provider.extract_delta(&fragment) {
                            Ok(Some(delta)) => animator.feed(&delta),
                            Ok(None) => {}
                            Err(err) if err.is_recoverable_chunk_error() => {
                                tracing::warn!(provider, error = %err, chunk = %fragment, "skipping stream chunk");
                            }
                            Err(err) => {
                                tracing::warn!(provider, error = %err, "stream chunk rejected");
                                fail_mid_stream(&mut animator, err, handler);
                                return;
                            }
                        }
                    }
                    Some(Ok(TransportEvent::Body(body))) => {
                        let text = settle_body(head.as_ref(), body, &mut animator, self.locale);
                        handler.on_finish(text);
                        return;
                    }
                    Some(Ok(TransportEvent::Done)) | None => {
                        closed = true;
                        animator.close();
                    }
                    Some(Err(err)) => {
                        tracing::warn!(provider, error = %err, "stream failed");
                        fail_mid_stream(&mut animator, err, handler);
                        return;
                    }
                },
                () = ticker.tick(), if animator.has_pending() => {
                    if let Some(delta) = animator.tick() {
                        handler.on_update(animator.shown(), &delta);
                    }
                }
            }
        }
    }
}

fn finish_aborted(animator: &mut Animator, reason: AbortReason, handler: &mut dyn ChatHandler) {
    animator.abort();
    if let Some(text) = animator.finish() {
        tracing::info!(reason = %reason, chars = text.chars().count(), "stream aborted");
        handler.on_finish(text);
    }
}

/// Received text survives a broken stream: it is finished with the error appended.
/// Without any text the error is reported as is.
fn fail_mid_stream(animator: &mut Animator, err: ChatError, handler: &mut dyn ChatHandler) {
    let partial = animator.finish().unwrap_or_default();
    if partial.is_empty() {
        handler.on_error(err);
    } else {
        handler.on_finish(format!("{partial}\n\n```\n{err}\n```"));
    }
}

/// Final text for a response that did not stream: plain text is the answer itself,
/// anything else becomes partial text, an auth hint and the body.
fn settle_body(
    head: Option<&ResponseHead>,
    body: String,
    animator: &mut Animator,
    locale: &Locale,
) -> String {
    let partial = animator.finish().unwrap_or_default();
    if head.is_some_and(ResponseHead::is_plain_text) {
        return body;
    }

    let status = head.map(|head| head.status);
    tracing::warn!(?status, "request failed or returned an unexpected content type");
    let diagnostic = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => pretty_json(&json),
        Err(_) => body,
    };
    let mut parts = vec![partial];
    if status == Some(401) {
        parts.push(locale.unauthorized.clone());
    }
    parts.push(diagnostic);
    parts.retain(|part| !part.is_empty());
    parts.join("\n\n")
}

fn pretty_json(value: &serde_json::Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{pretty}\n```")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::types::ChatCallbacks;

    #[derive(Default)]
    struct Settled {
        finished: Vec<String>,
        errors: Vec<ChatError>,
    }

    fn settled() -> (ChatCallbacks, Arc<Mutex<Settled>>) {
        let settled = Arc::new(Mutex::new(Settled::default()));
        let (f, e) = (settled.clone(), settled.clone());
        let callbacks = ChatCallbacks::new()
            .on_finish(move |text| f.lock().unwrap().finished.push(text))
            .on_error(move |err| e.lock().unwrap().errors.push(err));
        (callbacks, settled)
    }

    fn head(status: u16, content_type: &str) -> ResponseHead {
        ResponseHead {
            status,
            content_type: Some(content_type.to_string()),
        }
    }

    #[test]
    fn plain_text_body_is_the_answer() {
        let mut animator = Animator::new(60);
        let text = settle_body(
            Some(&head(200, "text/plain")),
            "proxy says hi".into(),
            &mut animator,
            &Locale::default(),
        );
        assert_eq!(text, "proxy says hi");
    }

    #[test]
    fn unauthorized_json_gets_hint_and_pretty_body() {
        let mut animator = Animator::new(60);
        let text = settle_body(
            Some(&head(401, "application/json")),
            r#"{"error":"bad key"}"#.into(),
            &mut animator,
            &Locale::default(),
        );
        let locale = Locale::default();
        assert_eq!(
            text,
            format!(
                "{}\n\n```json\n{{\n  \"error\": \"bad key\"\n}}\n```",
                locale.unauthorized
            )
        );
    }

    #[test]
    fn partial_text_leads_the_diagnostic_and_empty_parts_are_dropped() {
        let mut animator = Animator::new(60);
        animator.feed("half an ans");
        let text = settle_body(
            Some(&head(502, "text/html")),
            "<html>bad gateway</html>".into(),
            &mut animator,
            &Locale::default(),
        );
        assert_eq!(text, "half an ans\n\n<html>bad gateway</html>");

        let mut empty = Animator::new(60);
        let text = settle_body(
            Some(&head(500, "text/html")),
            String::new(),
            &mut empty,
            &Locale::default(),
        );
        assert_eq!(text, "");
    }

    #[test]
    fn broken_stream_appends_the_error_to_received_text() {
        let mut animator = Animator::new(60);
        animator.feed("half");
        animator.tick();
        let (mut callbacks, settled) = settled();
        fail_mid_stream(&mut animator, ChatError::transport("reset"), &mut callbacks);

        let settled = settled.lock().unwrap();
        assert!(settled.errors.is_empty());
        assert_eq!(settled.finished, ["half\n\n```\ntransport error: reset\n```"]);
    }

    #[test]
    fn broken_stream_without_text_is_an_error() {
        let mut animator = Animator::new(60);
        let (mut callbacks, settled) = settled();
        fail_mid_stream(&mut animator, ChatError::transport("reset"), &mut callbacks);

        let settled = settled.lock().unwrap();
        assert!(settled.finished.is_empty());
        assert!(matches!(
            settled.errors.as_slice(),
            [ChatError::Transport { .. }]
        ));
    }
}
