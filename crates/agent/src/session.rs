//! Model session — one task instance's transcript plus its gateway.
//!
//! A session owns the [`Context`] exclusively. Every model call goes
//! through [`ModelSession::respond`], which applies the error policy:
//! fatal provider errors abort the task, transient ones (already retried
//! by the gateway) are absorbed as an inline `Error: …` reply.

use async_trait::async_trait;
use chrono::Utc;
use sleuth_core::error::{Error, ProviderError, Result};
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::message::{Context, Role};
use sleuth_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A model reply after the error policy has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The model answered.
    Text(String),
    /// The call failed transiently; holds the `Error: …` text recorded in the transcript.
    Failed(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(t) | Self::Failed(t) => t,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

pub struct ModelSession {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    stop: Vec<String>,
    system_prompt: String,
    context: Context,
    task_id: String,
    events: Option<Arc<EventBus>>,
    cancel: Option<CancellationToken>,
}

impl ModelSession {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            stop: Vec::new(),
            context: Context::with_system(system_prompt.clone()),
            system_prompt,
            task_id: String::new(),
            events: None,
            cancel: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Stop sequences sent with every request.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Start a new task: fresh id, context reset to the system prompt.
    pub fn begin_task(&mut self) -> String {
        self.task_id = uuid::Uuid::new_v4().to_string();
        self.reset();
        self.task_id.clone()
    }

    /// Reset the context to the single system message.
    pub fn reset(&mut self) {
        self.context.reset(self.system_prompt.clone());
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.context.append(role, content);
    }

    pub fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Fail with [`Error::Cancelled`] once the task's token has fired.
    pub fn ensure_active(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Raw gateway call over the current context. Does not touch the context.
    pub async fn call_model(&self) -> std::result::Result<String, ProviderError> {
        let request = ProviderRequest::new(&self.model, self.context.messages().to_vec())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_stop(self.stop.clone());

        debug!(
            model = %self.model,
            messages = self.context.len(),
            estimated_tokens = self.context.estimated_tokens(),
            "Calling model"
        );

        let started = Instant::now();
        let result = self.provider.complete(request).await;

        self.publish(DomainEvent::ModelInvoked {
            task_id: self.task_id.clone(),
            model: self.model.clone(),
            success: result.is_ok(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });

        result.map(|response| response.message.content)
    }

    /// Call the model and append its reply to the context.
    pub async fn respond(&mut self) -> Result<Reply> {
        self.ensure_active()?;

        let result = match self.cancel.clone() {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                result = self.call_model() => result,
            },
            None => self.call_model().await,
        };

        match result {
            Ok(text) => {
                self.context.append(Role::Assistant, text.clone());
                Ok(Reply::Text(text))
            }
            Err(e) if e.is_fatal() => Err(Error::Provider(e)),
            Err(e) => {
                warn!(error = %e, "Model call failed, continuing with error text");
                let text = format!("Error: {e}");
                self.context.append(Role::Assistant, text.clone());
                Ok(Reply::Failed(text))
            }
        }
    }

    /// Append `prompt` as a user message, then [`respond`](Self::respond).
    pub async fn ask(&mut self, prompt: String) -> Result<Reply> {
        self.context.append(Role::User, prompt);
        self.respond().await
    }
}

/// The capability surface shared by every agent.
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: ?Sized + Sync;
    type Output: Send;

    fn session(&self) -> &ModelSession;

    fn session_mut(&mut self) -> &mut ModelSession;

    /// Run one top-level task from a fresh context.
    async fn process(&mut self, input: &Self::Input) -> Result<Self::Output>;

    fn add_to_context(&mut self, role: Role, content: &str) {
        self.session_mut().push(role, content);
    }

    fn clear_context(&mut self) {
        self.session_mut().reset();
    }

    async fn call_model(&self) -> std::result::Result<String, ProviderError> {
        self.session().call_model().await
    }
}
