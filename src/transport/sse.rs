use std::collections::VecDeque;

use crate::error::ChatError;

use super::{FrameDecoder, TransportEvent};

/// Server-sent events: `data:` lines accumulate until a blank line ends the event.
#[derive(Default)]
pub(super) struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<Vec<u8>>,
}

impl SseDecoder {
    fn handle_line(&mut self, line: Vec<u8>) {
        // `event:`, `id:`, `retry:` and `:` comments carry nothing the client uses.
        if let Some(data) = line.strip_prefix(b"data:") {
            let data = data.strip_prefix(b" ").unwrap_or(data);
            self.data_lines.push(data.to_vec());
        }
    }

    fn flush_event(&mut self, out: &mut VecDeque<Result<TransportEvent, ChatError>>) {
        if self.data_lines.is_empty() {
            return;
        }
        let joined = self.data_lines.drain(..).collect::<Vec<_>>().join(&b'\n');
        if joined.is_empty() {
            return;
        }
        match String::from_utf8(joined) {
            Ok(data) if data.trim() == "[DONE]" => out.push_back(Ok(TransportEvent::Done)),
            Ok(data) => out.push_back(Ok(TransportEvent::Message(data))),
            Err(err) => out.push_back(Err(ChatError::parse(format!(
                "invalid UTF-8 in stream chunk: {err}"
            )))),
        }
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl FrameDecoder for SseDecoder {
    fn decode(&mut self, bytes: &[u8], out: &mut VecDeque<Result<TransportEvent, ChatError>>) {
        self.buffer.extend_from_slice(bytes);
        while let Some(line) = Self::drain_line(&mut self.buffer) {
            if line.is_empty() {
                self.flush_event(out);
            } else {
                self.handle_line(line);
            }
        }
    }

    fn finish(&mut self, out: &mut VecDeque<Result<TransportEvent, ChatError>>) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.handle_line(line);
        }
        self.flush_event(out);
    }
}
