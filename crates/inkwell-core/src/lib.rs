//! Shared plumbing for Inkwell services: tracing, configuration, request ids,
//! shutdown signalling and serde helpers.

pub mod config;
pub mod middleware;
pub mod serde;
pub mod shutdown;
pub mod tracing;
