//! Utilities shared by the connectors and the upstream API clients

pub mod retry;

pub use retry::{RetryConfig, retry, retry_if, retry_with_backoff};
