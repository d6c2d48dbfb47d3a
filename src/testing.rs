//! Test doubles shared by unit tests across modules.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::agent::message::{ChatRequest, ChatResponse};
use crate::agent::provider::LlmProvider;
use crate::error::{AgentError, StorageError};
use crate::storage::CacheStore;

/// Provider that replays canned replies in order and records requests.
///
/// Once the script is exhausted the last reply repeats.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    fail: bool,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// A provider whose every call fails as an unreachable backend.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        if self.fail {
            return Err(AgentError::BackendUnavailable {
                message: "connection refused".to_string(),
                status: None,
            });
        }

        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        let mut last = self.last.lock().map_err(|_| AgentError::Runtime {
            message: "poisoned".to_string(),
        })?;
        let content = match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last.clone().unwrap_or_default(),
        };
        Ok(ChatResponse {
            content,
            ..ChatResponse::default()
        })
    }
}

/// Cache whose reads and writes always fail.
#[derive(Debug, Default)]
pub struct BrokenCache;

impl CacheStore for BrokenCache {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Corrupt {
            message: "unreadable entry".to_string(),
        })
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::LockPoisoned)
    }
}
