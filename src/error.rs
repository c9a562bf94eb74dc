use crate::error_code::ErrorClass;
use crate::facade::provider::Provider;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "request.image", "config.api_key")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "image_resolver", "config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Which actionable hint a [`Error::Guidance`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuidanceKind {
    /// The model likely cannot take image input; a vision model is suggested.
    Multimodal,
    /// The credential has no access to the model.
    Permission,
    /// The model is not present on the local daemon and must be pulled.
    PullModel,
}

/// One rejected payload shape in a multimodal format negotiation.
#[derive(Debug)]
pub struct FormatAttempt {
    pub format: &'static str,
    pub error: Box<Error>,
}

/// Unified error type for the facade.
/// Low-level failures are aggregated into actionable, high-level categories.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote error from {provider}: HTTP {status} ({class}): {message}")]
    Remote {
        provider: Provider,
        status: u16,
        class: ErrorClass,
        message: String,
        /// Unmodified response body
        body: String,
    },

    #[error("{message} (original error: {source})")]
    Guidance {
        kind: GuidanceKind,
        message: String,
        #[source]
        source: Box<Error>,
    },

    #[error(
        "All multimodal payload formats failed for model '{model}': {}. Try a known vision model such as '{suggestion}'",
        format_attempts(.attempts)
    )]
    FormatsExhausted {
        model: String,
        attempts: Vec<FormatAttempt>,
        suggestion: String,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_attempts(attempts: &[FormatAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("[{}] {}", a.format, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::validation_with_context(msg, ErrorContext::new())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Build a remote error from a non-2xx response, keeping the raw body.
    ///
    /// The display message prefers the backend's own `error.message` / `error` /
    /// `message` field and falls back to the body text.
    pub fn remote(provider: Provider, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .or_else(|| v.get("error"))
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| body.clone());
        Error::Remote {
            provider,
            status,
            class: ErrorClass::from_http_status(status),
            message,
            body,
        }
    }

    /// Rewrite this error into a guidance error; the original stays as `source`.
    pub fn with_guidance(self, kind: GuidanceKind, message: impl Into<String>) -> Self {
        Error::Guidance {
            kind,
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// HTTP status of the underlying remote failure, looking through guidance wrappers.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            Error::Guidance { source, .. } => source.http_status(),
            Error::Transport(crate::transport::TransportError::Http(e)) => {
                e.status().map(|s| s.as_u16())
            }
            _ => None,
        }
    }

    /// Message and body the backend sent, for remote failures only.
    ///
    /// Transport failures have no backend text; their display carries the
    /// request URL and is never inspected for markers.
    pub fn remote_text(&self) -> Option<String> {
        match self {
            Error::Remote { message, body, .. } => Some(format!("{}\n{}", message, body)),
            _ => None,
        }
    }

    /// Guidance kind, if this error was rewritten with one.
    pub fn guidance_kind(&self) -> Option<GuidanceKind> {
        match self {
            Error::Guidance { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
