//! # HTTP client collaborator.
//!
//! A thin JSON-over-REST client at the boundary of the crate. Nothing in the
//! concurrency kernel depends on it; tasks call it like any other async API.
//!
//! - [`ApiConfig`] / [`LogLevel`] construction inputs (deserializable)
//! - [`ApiFactory`] builds the transport, [`JsonApiFactory`] the default factory
//! - [`ApiClient`] `get` / `post` / `put` / `delete` with JSON bodies
//! - [`ApiError`] every failure, decoded or synthesized

mod client;
mod config;
mod error;
mod factory;

pub use client::ApiClient;
pub use config::{ApiConfig, LogLevel};
pub use error::ApiError;
pub use factory::{ApiFactory, JsonApiFactory};
