//! 流式处理模块：SSE/NDJSON 帧解码与合成流。
//!
//! Streaming support: SSE and NDJSON frame decoding for backends with a real
//! streaming endpoint, and paced synthetic chunking for those without one.

pub mod decode;
pub mod synthetic;

use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;

use crate::BoxStream;

pub use decode::{Decoder, NdjsonDecoder, SseDecoder};
pub use synthetic::{chunk_text, paced_chunks, SimulatedStream};

/// Map decoded frames to text deltas, dropping frames that carry no text.
///
/// `done` ends the stream once a frame reports completion (after emitting its text).
pub fn text_deltas<F, D>(
    frames: BoxStream<'static, Value>,
    extract: F,
    done: D,
) -> BoxStream<'static, String>
where
    F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    D: Fn(&Value) -> bool + Send + Sync + 'static,
{
    let extract = Arc::new(extract);
    let done = Arc::new(done);
    let stream = futures::stream::unfold((frames, false), move |(mut frames, finished)| {
        let extract = Arc::clone(&extract);
        let done = Arc::clone(&done);
        async move {
            if finished {
                return None;
            }
            loop {
                match frames.next().await? {
                    Ok(frame) => {
                        let is_done = done(&frame);
                        match extract(&frame) {
                            Some(text) if !text.is_empty() => {
                                return Some((Ok(text), (frames, is_done)))
                            }
                            _ if is_done => return None,
                            _ => continue,
                        }
                    }
                    Err(e) => return Some((Err(e), (frames, true))),
                }
            }
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_text_deltas_skip_empty_and_stop_on_done() {
        let frames: Vec<crate::Result<Value>> = vec![
            Ok(json!({"t": "Hel"})),
            Ok(json!({"t": ""})),
            Ok(json!({"other": 1})),
            Ok(json!({"t": "lo", "done": true})),
            Ok(json!({"t": "ignored"})),
        ];
        let out: Vec<String> = text_deltas(
            Box::pin(futures::stream::iter(frames)),
            |v| v["t"].as_str().map(String::from),
            |v| v["done"].as_bool().unwrap_or(false),
        )
        .try_collect()
        .await
        .unwrap();
        assert_eq!(out, vec!["Hel", "lo"]);
    }
}
