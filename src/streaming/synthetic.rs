//! Synthetic streaming for backends without a streaming endpoint.

use async_trait::async_trait;
use futures::stream;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::drivers::{LanguageModel, TextGenerator};
use crate::facade::provider::Provider;
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{BoxStream, Result};

pub const DEFAULT_CHUNK_CHARS: usize = 10;
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(20);

/// Split text into windows of `size` characters (never splitting a char).
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Yield `text` in fixed windows with `delay` between consecutive chunks.
pub fn paced_chunks(text: &str, size: usize, delay: Duration) -> BoxStream<'static, String> {
    let chunks = chunk_text(text, size);
    let stream = stream::unfold((chunks.into_iter(), true), move |(mut it, first)| async move {
        let chunk = it.next()?;
        if !first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Some((Ok(chunk), (it, false)))
    });
    Box::pin(stream)
}

/// Decorator giving any [`TextGenerator`] a `stream` built from one `generate` call.
#[derive(Debug)]
pub struct SimulatedStream<M> {
    inner: M,
    chunk_chars: usize,
    delay: Duration,
}

impl<M: TextGenerator> SimulatedStream<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            delay: DEFAULT_CHUNK_DELAY,
        }
    }

    pub fn with_pacing(mut self, chunk_chars: usize, delay: Duration) -> Self {
        self.chunk_chars = chunk_chars;
        self.delay = delay;
        self
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: TextGenerator> TextGenerator for SimulatedStream<M> {
    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    fn config(&self) -> &ModelConfig {
        self.inner.config()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.inner.generate(request).await
    }
}

#[async_trait]
impl<M: TextGenerator> LanguageModel for SimulatedStream<M> {
    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>> {
        let response = self.inner.generate(request).await?;
        Ok(paced_chunks(&response.text, self.chunk_chars, self.delay))
    }
}
