//! Scripted reasoning backend
//!
//! Deterministic stand-in for a model server. Replies are configured per
//! prompt kind: a FIFO queue is consumed first, then the standing reply is
//! used for every further call. Useful for offline runs and for driving the
//! workflow through exact component outcome sequences in tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::{RagError, Result};
use crate::llm::{CompletionOptions, ReasoningBackend};
use crate::rag::prompts::PromptKind;

type Judge = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// One scripted reply
#[derive(Clone)]
pub enum Reply {
    /// Fixed completion text
    Text(String),
    /// Backend error with this message
    Fail(String),
    /// Completion computed from the prompt
    Judge(Judge),
    /// Never answers; only a timeout or cancellation ends the call
    Hang,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn judge<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Reply::Judge(Arc::new(f))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Text(t) => write!(f, "Text({:?})", t),
            Reply::Fail(m) => write!(f, "Fail({:?})", m),
            Reply::Judge(_) => write!(f, "Judge(..)"),
            Reply::Hang => write!(f, "Hang"),
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Reply>,
    standing: Option<Reply>,
    delay: Option<Duration>,
}

/// Backend answering from per-kind scripts
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<PromptKind, Script>>,
    calls: Mutex<HashMap<PromptKind, usize>>,
    transcript: Mutex<Vec<(PromptKind, String)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script(self, kind: PromptKind, edit: impl FnOnce(&mut Script)) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
            edit(scripts.entry(kind).or_default());
        }
        self
    }

    /// Standing reply for every call of this kind
    pub fn reply(self, kind: PromptKind, reply: Reply) -> Self {
        self.with_script(kind, |s| s.standing = Some(reply))
    }

    /// Standing text reply
    pub fn text(self, kind: PromptKind, text: &str) -> Self {
        self.reply(kind, Reply::text(text))
    }

    /// Replies consumed in order before the standing reply
    pub fn sequence<I>(self, kind: PromptKind, replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        self.with_script(kind, |s| s.queue.extend(replies))
    }

    /// Every call of this kind fails
    pub fn failing(self, kind: PromptKind, message: &str) -> Self {
        self.reply(kind, Reply::Fail(message.to_string()))
    }

    /// Sleep before answering calls of this kind
    pub fn delayed(self, kind: PromptKind, delay: Duration) -> Self {
        self.with_script(kind, |s| s.delay = Some(delay))
    }

    /// Number of calls received for a kind
    pub fn calls(&self, kind: PromptKind) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Prompts received for a kind, in call order
    pub fn prompts(&self, kind: PromptKind) -> Vec<String> {
        self.transcript
            .lock()
            .map(|t| {
                t.iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn next_reply(&self, kind: PromptKind) -> (Option<Reply>, Option<Duration>) {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        match scripts.get_mut(&kind) {
            Some(script) => {
                let reply = script.queue.pop_front().or_else(|| script.standing.clone());
                (reply, script.delay)
            }
            None => (None, None),
        }
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        let kind = PromptKind::detect(prompt)
            .ok_or_else(|| RagError::Backend("Unrecognized prompt".to_string()))?;

        {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            *calls.entry(kind).or_insert(0) += 1;
            let mut transcript = self.transcript.lock().unwrap_or_else(|e| e.into_inner());
            transcript.push((kind, prompt.to_string()));
        }

        let (reply, delay) = self.next_reply(kind);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Judge(judge)) => Ok(judge(prompt)),
            Some(Reply::Fail(message)) => Err(RagError::Backend(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(RagError::Backend(format!(
                "No scripted reply for {} prompt",
                kind.as_str()
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
