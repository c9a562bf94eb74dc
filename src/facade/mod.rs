//! Developer-friendly facade layer.
//!
//! Provider tags and a prelude; dispatch itself lives in [`crate::client`].

pub mod prelude;
pub mod provider;
