//! The shared library for Botscope, a small backend that records bot-detection
//! session telemetry.
//!
//! This library holds the data model exchanged over the HTTP API, typed ids,
//! error types and the logging setup used by the backend.

pub mod data;
pub mod errors;
pub mod id;
pub mod log;

pub use serde;
pub use serde_json;
pub use tracing;
