use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use super::base::{ModelResponse, Provider, Usage};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// A mock provider that returns pre-configured responses for testing
///
/// Every request is recorded so tests can check what the model was shown.
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<ModelResponse, String>>>>,
    repeat: Option<ModelResponse>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            repeat: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that answers every request with the same response
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    /// Queue a transport failure after the configured responses
    pub fn then_fail<S: Into<String>>(self, message: S) -> Self {
        lock(&self.responses).push(Err(message.into()));
        self
    }

    /// The messages sent with each request so far
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(ModelResponse, Usage)> {
        lock(&self.requests).push(messages.to_vec());

        if let Some(response) = &self.repeat {
            return Ok((response.clone(), Usage::default()));
        }

        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((ModelResponse::text(""), Usage::default()))
        } else {
            match responses.remove(0) {
                Ok(response) => Ok((response, Usage::default())),
                Err(message) => Err(anyhow!(message)),
            }
        }
    }
}

// a panic in another test thread leaves the recorded state readable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
