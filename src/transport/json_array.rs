use std::collections::VecDeque;

use crate::error::ChatError;

use super::{FrameDecoder, TransportEvent};

/// Splits a streamed JSON array (`[{...},{...}]`) into its top-level objects.
///
/// Tracks nesting and string state byte by byte, so objects may straddle chunk
/// boundaries and braces inside strings are ignored. A bare top-level object is
/// emitted the same way as an array element.
#[derive(Default)]
pub(super) struct JsonArrayDecoder {
    current: Vec<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonArrayDecoder {
    fn emit(&mut self, out: &mut VecDeque<Result<TransportEvent, ChatError>>) {
        let bytes = std::mem::take(&mut self.current);
        match String::from_utf8(bytes) {
            Ok(object) => out.push_back(Ok(TransportEvent::Message(object))),
            Err(err) => out.push_back(Err(ChatError::parse(format!(
                "invalid UTF-8 in stream element: {err}"
            )))),
        }
    }
}

impl FrameDecoder for JsonArrayDecoder {
    fn decode(&mut self, bytes: &[u8], out: &mut VecDeque<Result<TransportEvent, ChatError>>) {
        for &byte in bytes {
            if self.depth == 0 {
                // Between elements only `[`, `,`, `]` and whitespace appear.
                match byte {
                    b'{' => {
                        self.current.push(byte);
                        self.depth = 1;
                    }
                    b']' => out.push_back(Ok(TransportEvent::Done)),
                    _ => {}
                }
                continue;
            }

            self.current.push(byte);
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.emit(out);
                    }
                }
                _ => {}
            }
        }
    }

    fn finish(&mut self, out: &mut VecDeque<Result<TransportEvent, ChatError>>) {
        if !self.current.is_empty() {
            self.current.clear();
            self.depth = 0;
            self.in_string = false;
            self.escaped = false;
            out.push_back(Err(ChatError::parse("stream ended inside a JSON element")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(chunks: &[&str]) -> Vec<String> {
        let mut decoder = JsonArrayDecoder::default();
        let mut out = VecDeque::new();
        for chunk in chunks {
            decoder.decode(chunk.as_bytes(), &mut out);
        }
        decoder.finish(&mut out);
        out.into_iter()
            .filter_map(|event| match event {
                Ok(TransportEvent::Message(object)) => Some(object),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn objects_split_across_chunks_are_reassembled() {
        let objects = messages(&["[{\"a\":", "{\"b\":[1,2]}}", ",\r\n{\"c\":3}", "]"]);
        assert_eq!(objects, vec!["{\"a\":{\"b\":[1,2]}}", "{\"c\":3}"]);
        for object in &objects {
            serde_json::from_str::<serde_json::Value>(object).expect("valid json");
        }
    }

    #[test]
    fn braces_inside_strings_do_not_change_depth() {
        let objects = messages(&[r#"[{"text":"} { \"quoted\" ]"}]"#]);
        assert_eq!(objects, vec![r#"{"text":"} { \"quoted\" ]"}"#]);
    }

    #[test]
    fn closing_bracket_signals_done() {
        let mut decoder = JsonArrayDecoder::default();
        let mut out = VecDeque::new();
        decoder.decode(b"[{\"x\":1}]", &mut out);
        assert!(matches!(out.pop_back(), Some(Ok(TransportEvent::Done))));
    }

    #[test]
    fn truncated_element_reports_parse_error() {
        let mut decoder = JsonArrayDecoder::default();
        let mut out = VecDeque::new();
        decoder.decode(b"[{\"x\":", &mut out);
        decoder.finish(&mut out);
        assert!(matches!(
            out.pop_front(),
            Some(Err(ChatError::Parse { .. }))
        ));
    }

    #[test]
    fn multibyte_text_survives_chunk_splits() {
        let source = "[{\"t\":\"héllo\"}]".as_bytes();
        let (left, right) = source.split_at(9);
        let mut decoder = JsonArrayDecoder::default();
        let mut out = VecDeque::new();
        decoder.decode(left, &mut out);
        decoder.decode(right, &mut out);
        assert!(matches!(
            out.pop_front(),
            Some(Ok(TransportEvent::Message(object))) if object == "{\"t\":\"héllo\"}"
        ));
    }
}
