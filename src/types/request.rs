//! Normalized request shared by every backend

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::types::tool::{FunctionCallMode, FunctionDefinition};

/// Where an image comes from.
///
/// `Reference` holds either an absolute http(s) URL or a local file path; which
/// one is decided when the image is resolved.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Buffer(Vec<u8>),
    Reference(String),
}

impl ImageSource {
    pub fn buffer(bytes: impl Into<Vec<u8>>) -> Self {
        ImageSource::Buffer(bytes.into())
    }

    pub fn reference(location: impl Into<String>) -> Self {
        ImageSource::Reference(location.into())
    }
}

// Buffers can be megabytes; keep Debug output readable.
impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Buffer(b) => write!(f, "Buffer({} bytes)", b.len()),
            ImageSource::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Buffer(bytes)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        ImageSource::Buffer(bytes.to_vec())
    }
}

impl From<String> for ImageSource {
    fn from(location: String) -> Self {
        ImageSource::Reference(location)
    }
}

impl From<&str> for ImageSource {
    fn from(location: &str) -> Self {
        ImageSource::Reference(location.to_string())
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Reference(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Reference(path.to_string_lossy().into_owned())
    }
}

/// One ordered piece of structured content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(source: impl Into<ImageSource>) -> Self {
        ContentPart::Image {
            source: source.into(),
        }
    }
}

/// Backend-agnostic generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentPart>,
    /// Convenience single image, sent after the prompt and before `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallMode>,
    /// Per-call override merged over the adapter's instance config.
    #[serde(default)]
    pub options: ModelConfig,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn image(mut self, source: impl Into<ImageSource>) -> Self {
        self.image = Some(source.into());
        self
    }

    pub fn part(mut self, part: ContentPart) -> Self {
        self.content.push(part);
        self
    }

    pub fn content(mut self, parts: Vec<ContentPart>) -> Self {
        self.content = parts;
        self
    }

    pub fn functions(mut self, functions: Vec<FunctionDefinition>) -> Self {
        self.functions = functions;
        self
    }

    pub fn function_call(mut self, mode: FunctionCallMode) -> Self {
        self.function_call = Some(mode);
        self
    }

    pub fn options(mut self, options: ModelConfig) -> Self {
        self.options = options;
        self
    }

    pub fn has_images(&self) -> bool {
        self.image.is_some()
            || self
                .content
                .iter()
                .any(|p| matches!(p, ContentPart::Image { .. }))
    }

    /// Image data or any structured content part is present.
    pub fn has_structured_content(&self) -> bool {
        self.image.is_some() || !self.content.is_empty()
    }

    /// Function definitions are present and calling is not forbidden.
    pub fn wants_functions(&self) -> bool {
        !self.functions.is_empty() && !matches!(self.function_call, Some(FunctionCallMode::Forbid))
    }

    /// Name of the function the caller forces, if any.
    pub fn forced_function(&self) -> Option<&str> {
        match &self.function_call {
            Some(FunctionCallMode::Force(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}
