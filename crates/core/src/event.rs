//! Domain event system — progress reporting decoupled from the loops.
//!
//! Loops and the pipeline publish events as they make progress. The CLI
//! subscribes in verbose mode; with no subscribers publishing is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A model call finished
    ModelInvoked {
        task_id: String,
        model: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A search hit was fetched and summarized
    SourceProcessed {
        task_id: String,
        url: String,
        useful: bool,
        timestamp: DateTime<Utc>,
    },

    /// A research iteration finished
    IterationCompleted {
        task_id: String,
        iteration: usize,
        findings: usize,
        complete: bool,
        timestamp: DateTime<Utc>,
    },

    /// A code step ran in the sandbox
    StepExecuted {
        task_id: String,
        step: usize,
        observation_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A task aborted
    TaskFailed {
        task_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A task produced its outcome
    TaskCompleted {
        task_id: String,
        rounds_used: usize,
        done: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
