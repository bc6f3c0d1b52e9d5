//! Helpers for calling upstream HTTP APIs.
pub mod retry;

pub use retry::{RetryConfig, Retryable, retry_idempotent};
