//! # Token Relay Library
//!
//! Reverse-proxy filter that keeps one shared bearer token, injects it into
//! every forwarded request and transparently refreshes it when the upstream
//! answers that the token was rejected, replaying the original request.
//!
//! Modules:
//! - `config`: YAML configuration, loading and validation
//! - `cache`: single-flight token cache
//! - `sources`: token endpoint client
//! - `parser`: token extraction and the invalid-token condition language
//! - `injection`: credential placement rules
//! - `resilience`: per-exchange retry context and coordinator
//! - `server`: axum proxy surface

pub mod cache;
pub mod config;
pub mod error;
pub mod injection;
pub mod observability;
pub mod parser;
pub mod resilience;
pub mod server;
pub mod sources;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use crate::config::service::ServiceConfig;
