//! # Sleuth Core
//!
//! Domain types, traits, and error definitions shared by every Sleuth crate.
//! This crate has **no transport dependencies**: it defines the model that
//! the provider, tool, agent and pipeline crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`] for the model gateway
//! - [`SearchProvider`] / [`FetchProvider`] for the web
//! - [`CodeSandbox`] for isolated code execution
//!
//! Implementations live in their respective crates, so loops can be driven
//! end-to-end by scripted mocks in tests.

pub mod error;
pub mod evaluation;
pub mod event;
pub mod finding;
pub mod message;
pub mod provider;
pub mod sandbox;
pub mod search;
pub mod text;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use evaluation::{Aspect, AspectEvaluation, Evaluation, OverallAssessment, Verdict};
pub use event::{DomainEvent, EventBus};
pub use finding::{Finding, VisitedSet};
pub use message::{Context, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use sandbox::{CodeSandbox, ExecutionOutput};
pub use search::{FetchProvider, FetchedPage, SearchHit, SearchProvider};
