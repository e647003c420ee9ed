//! LLM Provider implementations for Sleuth.
//!
//! All providers implement the `sleuth_core::Provider` trait.
//! The router selects the correct provider based on configuration and
//! layers retry and concurrency limiting on top.

pub mod limiter;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use limiter::ConcurrencyLimitedProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
pub use router::{ProviderRouter, build_from_config, build_provider};
