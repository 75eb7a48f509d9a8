//! Uniform event interface over streamed and buffered HTTP responses.
//!
//! Both transports turn a response into the same sequence: one [`TransportEvent::Open`]
//! carrying the response head, then either framed [`TransportEvent::Message`]s (ended by
//! [`TransportEvent::Done`] or end of stream) or a single [`TransportEvent::Body`] when the
//! response is not a stream of the expected framing.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::{StreamExt, stream};

use crate::error::ChatError;
use crate::http::{DynHttpTransport, HttpBodyStream, HttpRequest, HttpResponse, collect_body};

mod json_array;
mod sse;

use json_array::JsonArrayDecoder;
use sse::SseDecoder;

/// How a streaming response body is split into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// `text/event-stream` with `data:` lines; `[DONE]` terminates.
    EventStream,
    /// A JSON array whose elements arrive incrementally.
    JsonArray,
}

impl StreamFraming {
    /// Content type a well-formed streaming response carries.
    pub fn content_type(self) -> &'static str {
        match self {
            StreamFraming::EventStream => "text/event-stream",
            StreamFraming::JsonArray => "application/json",
        }
    }

    fn decoder(self) -> Box<dyn FrameDecoder> {
        match self {
            StreamFraming::EventStream => Box::new(SseDecoder::default()),
            StreamFraming::JsonArray => Box::new(JsonArrayDecoder::default()),
        }
    }
}

/// Status line and content type of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ResponseHead {
    pub fn is_plain_text(&self) -> bool {
        self.status == 200
            && self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("text/plain"))
    }

    fn carries(&self, framing: StreamFraming) -> bool {
        self.status == 200
            && self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with(framing.content_type()))
    }
}

/// One step of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open(ResponseHead),
    /// One framed payload, for example the data of an SSE event.
    Message(String),
    /// Whole body of a response that was not a stream of the expected framing.
    Body(String),
    Done,
}

/// Events of one response.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<TransportEvent, ChatError>> + Send>>;

/// Request/response seam used by the client. Dropping a returned stream cancels the
/// underlying request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and yields its response as events.
    async fn open(
        &self,
        request: HttpRequest,
        framing: StreamFraming,
    ) -> Result<EventStream, ChatError>;

    /// Sends `request` and returns the buffered response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynTransport = Arc<dyn Transport>;

/// Streams the body as it arrives.
pub struct SseTransport {
    http: DynHttpTransport,
}

impl SseTransport {
    pub fn new(http: DynHttpTransport) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(
        &self,
        request: HttpRequest,
        framing: StreamFraming,
    ) -> Result<EventStream, ChatError> {
        let response = self.http.send_stream(request).await?;
        let head = ResponseHead {
            status: response.status,
            content_type: response.content_type().map(str::to_string),
        };
        tracing::debug!(
            status = head.status,
            content_type = ?head.content_type,
            "stream opened"
        );
        Ok(events_for(head, response.body, framing))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError> {
        self.http.send(request).await
    }
}

/// Buffers every response. [`Transport::open`] replays the buffered body through the
/// same framing decoder, for proxies that cannot stream.
pub struct OneShotTransport {
    http: DynHttpTransport,
}

impl OneShotTransport {
    pub fn new(http: DynHttpTransport) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for OneShotTransport {
    async fn open(
        &self,
        request: HttpRequest,
        framing: StreamFraming,
    ) -> Result<EventStream, ChatError> {
        let response = self.http.send(request).await?;
        let head = ResponseHead {
            status: response.status,
            content_type: response.content_type().map(str::to_string),
        };
        let body: HttpBodyStream = Box::pin(stream::iter([Ok::<_, ChatError>(response.body)]));
        Ok(events_for(head, body, framing))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError> {
        self.http.send(request).await
    }
}

fn events_for(head: ResponseHead, body: HttpBodyStream, framing: StreamFraming) -> EventStream {
    let framed = head.carries(framing);
    let open = stream::iter([Ok(TransportEvent::Open(head))]);
    if framed {
        Box::pin(open.chain(FramedStream::new(body, framing.decoder())))
    } else {
        let whole = stream::once(async move {
            let bytes = collect_body(body).await?;
            Ok::<_, ChatError>(TransportEvent::Body(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        });
        Box::pin(open.chain(whole))
    }
}

/// Incremental splitter from raw bytes into [`TransportEvent::Message`]s.
trait FrameDecoder: Send {
    fn decode(&mut self, bytes: &[u8], out: &mut VecDeque<Result<TransportEvent, ChatError>>);

    /// Flushes whatever is buffered once the body ends.
    fn finish(&mut self, out: &mut VecDeque<Result<TransportEvent, ChatError>>);
}

struct FramedStream {
    body: HttpBodyStream,
    decoder: Box<dyn FrameDecoder>,
    pending: VecDeque<Result<TransportEvent, ChatError>>,
    eof: bool,
    done: bool,
}

impl FramedStream {
    fn new(body: HttpBodyStream, decoder: Box<dyn FrameDecoder>) -> Self {
        Self {
            body,
            decoder,
            pending: VecDeque::new(),
            eof: false,
            done: false,
        }
    }
}

impl Stream for FramedStream {
    type Item = Result<TransportEvent, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                if matches!(event, Ok(TransportEvent::Done)) {
                    this.done = true;
                    this.pending.clear();
                }
                return Poll::Ready(Some(event));
            }
            if this.done || this.eof {
                this.done = true;
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.decoder.decode(&bytes, &mut this.pending),
                Poll::Ready(Some(Err(err))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.eof = true;
                    this.decoder.finish(&mut this.pending);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
