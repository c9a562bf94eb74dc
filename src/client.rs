//! Unified client over every supported backend.
//!
//! Keep the public surface small: build an [`AiClient`] once, then dispatch by
//! [`Provider`](crate::facade::provider::Provider) tag.

pub mod builder;
pub mod core;
pub(crate) mod error_classification;

pub use builder::AiClientBuilder;
pub use core::AiClient;
