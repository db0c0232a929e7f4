//! Connect-attempt policy.
//!
//! ```text
//! connect() → [attempt] → fail → [RetryPolicy::next_delay] → sleep → [attempt] → …
//! ```

pub mod retry;

pub use retry::{BackoffConfig, RetryPolicy, DEFAULT_NUM_RETRIES};
