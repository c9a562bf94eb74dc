//! 多模态图像解析模块 — 将 URL、本地路径或字节缓冲统一解析为 base64 与 MIME 类型
//!
//! Image source resolution: turns a URL, a local path or a raw buffer into
//! base64 data plus a MIME type, and flattens a request into its ordered
//! text/image parts.

use base64::Engine as _;
use std::path::Path;
use std::sync::Arc;

use crate::transport::HttpTransport;
use crate::types::{ContentPart, GenerateRequest, ImageSource};
use crate::{Error, ErrorContext, Result};

const SOURCE: &str = "image_resolver";
const DEFAULT_MIME: &str = "image/jpeg";

/// A fully loaded image.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// Base64 (standard alphabet, padded).
    pub data: String,
    pub mime_type: String,
}

impl std::fmt::Debug for ResolvedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedImage")
            .field("data", &format_args!("<{} base64 chars>", self.data.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ResolvedImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// `data:<mime>;base64,<data>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Raw bytes again, for multipart uploads.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| {
                Error::runtime_with_context(
                    format!("invalid base64 image data: {}", e),
                    ErrorContext::new().with_source(SOURCE),
                )
            })
    }

    /// File extension matching the MIME type (multipart file names).
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            "image/svg+xml" => "svg",
            _ => "jpg",
        }
    }
}

/// One element of a request's effective content, images already loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPart {
    Text(String),
    Image(ResolvedImage),
}

impl ResolvedPart {
    pub fn as_image(&self) -> Option<&ResolvedImage> {
        match self {
            ResolvedPart::Image(img) => Some(img),
            ResolvedPart::Text(_) => None,
        }
    }
}

/// Text of every text part, joined by newlines.
pub fn joined_text(parts: &[ResolvedPart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            ResolvedPart::Text(t) => Some(t.as_str()),
            ResolvedPart::Image(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every image part, in order.
pub fn images(parts: &[ResolvedPart]) -> Vec<&ResolvedImage> {
    parts.iter().filter_map(ResolvedPart::as_image).collect()
}

/// MIME type from a path's or URL's extension, case-insensitive.
///
/// For URLs only the path is considered; query and fragment are ignored.
/// Unknown or missing extensions map to `image/jpeg`.
pub fn mime_type_for(location: &str) -> &'static str {
    let path = match url::Url::parse(location) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => u.path().to_string(),
        _ => location.to_string(),
    };
    let ext = Path::new(&path)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => DEFAULT_MIME,
    }
}

fn as_http_url(location: &str) -> Option<url::Url> {
    url::Url::parse(location)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
}

/// Loads images for adapters. Holds no cache; every call reads its source once.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    transport: Arc<HttpTransport>,
}

impl ImageResolver {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn resolve(&self, source: &ImageSource) -> Result<ResolvedImage> {
        match source {
            ImageSource::Buffer(bytes) => Ok(ResolvedImage::from_bytes(bytes, DEFAULT_MIME)),
            ImageSource::Reference(location) => {
                if let Some(url) = as_http_url(location) {
                    return self.fetch(url.as_str(), location).await;
                }
                let is_file = tokio::fs::metadata(location)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false);
                if is_file {
                    return self.read_file(location).await;
                }
                Err(Error::validation_with_context(
                    format!(
                        "Invalid image source '{}': not an http(s) URL or an existing file",
                        location
                    ),
                    ErrorContext::new()
                        .with_field_path("request.image")
                        .with_source(SOURCE),
                ))
            }
        }
    }

    async fn fetch(&self, url: &str, location: &str) -> Result<ResolvedImage> {
        let bytes = self.transport.get_bytes(url).await.map_err(|e| {
            Error::runtime_with_context(
                format!("Failed to fetch image from URL: {}", e),
                ErrorContext::new()
                    .with_details(location.to_string())
                    .with_source(SOURCE),
            )
        })?;
        tracing::debug!(url = location, bytes = bytes.len(), "fetched image");
        Ok(ResolvedImage::from_bytes(&bytes, mime_type_for(location)))
    }

    async fn read_file(&self, location: &str) -> Result<ResolvedImage> {
        let bytes = tokio::fs::read(location).await.map_err(|e| {
            Error::runtime_with_context(
                format!("Failed to read image file: {}", e),
                ErrorContext::new()
                    .with_details(location.to_string())
                    .with_source(SOURCE),
            )
        })?;
        Ok(ResolvedImage::from_bytes(&bytes, mime_type_for(location)))
    }

    /// Flatten a request into prompt text, then the convenience image, then
    /// `content` parts in order. Images resolve sequentially.
    pub async fn resolve_all(&self, request: &GenerateRequest) -> Result<Vec<ResolvedPart>> {
        let mut parts = Vec::with_capacity(2 + request.content.len());
        if !request.prompt.is_empty() {
            parts.push(ResolvedPart::Text(request.prompt.clone()));
        }
        if let Some(image) = &request.image {
            parts.push(ResolvedPart::Image(self.resolve(image).await?));
        }
        for part in &request.content {
            match part {
                ContentPart::Text { text } => parts.push(ResolvedPart::Text(text.clone())),
                ContentPart::Image { source } => {
                    parts.push(ResolvedPart::Image(self.resolve(source).await?))
                }
            }
        }
        Ok(parts)
    }
}
