//! Small helpers shared across adapters.

pub mod json_repair;

pub use json_repair::{balance_brackets, repair_arguments, scan_balanced, scan_string};
