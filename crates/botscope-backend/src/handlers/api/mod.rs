//! Handlers for the `/api` routes.

pub mod headers;
pub mod sessions;
