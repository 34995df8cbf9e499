//! Backend services for session telemetry.
//!
//! This module provides the service layer abstraction over the session store
//! and its in-memory implementation.

pub mod sessions;

pub use sessions::*;
