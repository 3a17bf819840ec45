//! Scripted backend for tests: replays queued responses in order and
//! records every request.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ChatError;
use crate::providers::ChatBackend;
use crate::types::{Completion, CompletionRequest};

pub struct ScriptedBackend {
    model: String,
    script: Mutex<VecDeque<Result<Completion, ChatError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn reply(self, content: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        self.script.lock().push_back(Ok(Completion {
            content: content.into(),
            input_tokens,
            output_tokens,
        }));
        self
    }

    /// Queue a failure.
    pub fn fail(self, error: ChatError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ChatError> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::InvalidResponse("script exhausted".into())))
    }
}
