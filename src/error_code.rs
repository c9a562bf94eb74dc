//! HTTP 错误分类：将后端返回的状态码映射为统一的错误类别。
//!
//! Error classes for remote (non-2xx) backend failures.
//!
//! Every adapter reports HTTP failures through [`crate::Error::Remote`], tagged with
//! an [`ErrorClass`] derived from the status code. Guidance rewriting (see
//! `client::error_classification`) keys off the status plus the body text.
//!
//! ## Example
//!
//! ```rust
//! use ai_facade::error_code::ErrorClass;
//!
//! let class = ErrorClass::from_http_status(415);
//! assert_eq!(class.name(), "unsupported_media_type");
//! assert_eq!(class.to_string(), "unsupported_media_type");
//! ```

use std::fmt;

/// Canonical class of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// 400: malformed request or invalid parameters
    InvalidRequest,
    /// 401: missing or invalid credentials
    Authentication,
    /// 403: valid credentials without access to the model
    PermissionDenied,
    /// 404: unknown model or endpoint
    NotFound,
    /// 408 / 504: request timed out
    Timeout,
    /// 413: payload or context too large
    RequestTooLarge,
    /// 415: the backend refused the payload's content type
    UnsupportedMediaType,
    /// 422: well-formed but semantically rejected input
    Unprocessable,
    /// 429: rate limited
    RateLimited,
    /// 500: backend internal error
    ServerError,
    /// 502 / 503 / 529: backend overloaded or model still loading
    Overloaded,
    /// Anything else
    Unknown,
}

impl ErrorClass {
    /// Returns the standard name (e.g., `"invalid_request"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::RequestTooLarge => "request_too_large",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::Unprocessable => "unprocessable",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Unknown => "unknown",
        }
    }

    /// Maps an HTTP status code to the most likely class.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            413 => Self::RequestTooLarge,
            415 => Self::UnsupportedMediaType,
            422 => Self::Unprocessable,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502 | 503 | 529 => Self::Overloaded,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorClass::from_http_status(403), ErrorClass::PermissionDenied);
        assert_eq!(ErrorClass::from_http_status(404), ErrorClass::NotFound);
        assert_eq!(ErrorClass::from_http_status(415), ErrorClass::UnsupportedMediaType);
        assert_eq!(ErrorClass::from_http_status(503), ErrorClass::Overloaded);
        assert_eq!(ErrorClass::from_http_status(418), ErrorClass::Unknown);
    }
}
