//! Streaming decoders (Bytes -> JSON Value)
//!
//! Decoders handle framing only (SSE, NDJSON). What each frame means is left to the adapter.

use crate::{BoxStream, Error};
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::Value;

/// Turns a raw byte stream into a stream of JSON frames.
pub trait Decoder: Send + Sync {
    fn decode_stream(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, Value>;
}

/// SSE decoder:
/// - splits by blank line
/// - strips `data:` prefix
/// - stops on `done_signal` (default "[DONE]")
#[derive(Debug, Clone)]
pub struct SseDecoder {
    done_signal: String,
}

impl SseDecoder {
    pub fn new(done_signal: Option<String>) -> Self {
        Self {
            done_signal: done_signal.unwrap_or_else(|| "[DONE]".to_string()),
        }
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Text buffer fed with raw chunks; a multi-byte character split across
/// chunks is held back until its remaining bytes arrive.
#[derive(Debug, Default)]
struct Utf8Buffer {
    text: String,
    pending: Vec<u8>,
}

impl Utf8Buffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.text.push_str(s);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is still pending at end of input.
    fn finish(&mut self) {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}

fn is_done(frame: &str, done_signal: &str) -> bool {
    frame
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .any(|l| {
            l == done_signal
                || l.strip_prefix("data:")
                    .map(|rest| rest.trim() == done_signal)
                    .unwrap_or(false)
        })
}

/// Parse one SSE frame; comment lines and `event:`/`id:` fields are skipped,
/// multiple `data:` lines are joined.
fn parse_sse_frame(frame: &str) -> Option<Value> {
    let mut data = Vec::new();
    for line in frame.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.trim_start());
        } else if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:")
        {
            continue;
        } else {
            data.push(line.trim());
        }
    }
    if data.is_empty() {
        return None;
    }
    serde_json::from_str(&data.join("\n")).ok()
}

impl Decoder for SseDecoder {
    fn decode_stream(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, Value> {
        let done_signal = self.done_signal.clone();

        let stream = stream::unfold(
            (input, Utf8Buffer::default(), false),
            move |(mut input, mut buf, finished)| {
                let done_signal = done_signal.clone();
                async move {
                    if finished {
                        return None;
                    }
                    loop {
                        if let Some(idx) = buf.text.find("\n\n") {
                            let frame = buf.text[..idx].to_string();
                            buf.text.drain(..idx + 2);

                            if is_done(&frame, &done_signal) {
                                return None;
                            }
                            if let Some(v) = parse_sse_frame(&frame) {
                                return Some((Ok(v), (input, buf, false)));
                            }
                            // Skip non-json frames; keep looping.
                            continue;
                        }

                        match input.next().await {
                            Some(Ok(bytes)) => {
                                buf.push(&bytes);
                                if buf.text.contains("\r\n") {
                                    buf.text = buf.text.replace("\r\n", "\n");
                                }
                            }
                            Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                            None => {
                                // EOF: try parse remaining buffer once
                                buf.finish();
                                if is_done(&buf.text, &done_signal) {
                                    return None;
                                }
                                return parse_sse_frame(&buf.text)
                                    .map(|v| (Ok(v), (input, Utf8Buffer::default(), true)));
                            }
                        }
                    }
                }
            },
        );

        Box::pin(stream)
    }
}

/// NDJSON / JSONL decoder (one JSON object per line).
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonDecoder;

impl Decoder for NdjsonDecoder {
    fn decode_stream(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, Value> {
        let stream = stream::unfold(
            (input, Utf8Buffer::default(), false),
            move |(mut input, mut buf, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some(idx) = buf.text.find('\n') {
                        let line = buf.text[..idx].trim().to_string();
                        buf.text.drain(..idx + 1);
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Value>(&line) {
                            Ok(v) => return Some((Ok(v), (input, buf, false))),
                            Err(e) => {
                                return Some((Err(Error::Serialization(e)), (input, buf, false)))
                            }
                        }
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => buf.push(&bytes),
                        Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                        None => {
                            buf.finish();
                            let line = buf.text.trim();
                            if line.is_empty() {
                                return None;
                            }
                            return serde_json::from_str::<Value>(line)
                                .ok()
                                .map(|v| (Ok(v), (input, Utf8Buffer::default(), true)));
                        }
                    }
                }
            },
        );

        Box::pin(stream)
    }
}
