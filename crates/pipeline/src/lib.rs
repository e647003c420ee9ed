//! Orchestration for Sleuth: research a query, evaluate the report,
//! persist the result. Batches run concurrently with input order kept.

pub mod pipeline;
pub mod result;
pub mod store;

pub use pipeline::ResearchPipeline;
pub use result::{PipelineResult, RunMetadata};
pub use store::{ResultStore, sanitize_query};
