//! Scripted model client for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{CallConfig, LLMError, Message, ModelClient};

/// A request observed by [`DummyLM`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub config: CallConfig,
}

enum Scripted {
    Reply(Vec<String>),
    Fail(String),
}

/// A [`ModelClient`] that answers from a queue of canned responses.
///
/// When the queue is empty the fallback response is returned, so a single
/// canned answer can serve any number of calls. Every request is recorded.
pub struct DummyLM {
    name: String,
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl DummyLM {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every unscripted call with `response`.
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Sleep before answering, to keep calls in flight during tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a single-candidate reply.
    pub fn push_response(&self, response: impl Into<String>) {
        self.queue().push_back(Scripted::Reply(vec![response.into()]));
    }

    /// Queue a reply carrying several candidates.
    pub fn push_candidates(&self, candidates: Vec<String>) {
        self.queue().push_back(Scripted::Reply(candidates));
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.queue().push_back(Scripted::Fail(reason.into()));
    }

    /// Every request received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Scripted>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ModelClient for DummyLM {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        messages: &[Message],
        config: &CallConfig,
    ) -> Result<Vec<String>, LLMError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                messages: messages.to_vec(),
                config: config.clone(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.queue().pop_front();
        match next {
            Some(Scripted::Reply(candidates)) => Ok(candidates),
            Some(Scripted::Fail(reason)) => Err(LLMError::RequestFailed(reason)),
            None => match &self.fallback {
                Some(response) => Ok(vec![response.clone()]),
                None => Err(LLMError::InvalidResponse(format!(
                    "{} has no scripted response left",
                    self.name
                ))),
            },
        }
    }
}
