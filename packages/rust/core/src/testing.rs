//! In-memory backend and extractor fakes for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use docdigest_extract::TextExtractor;
use docdigest_llm::ChatBackend;
use docdigest_shared::{DigestError, Result};

enum Mode {
    Echo,
    Fixed(String),
    Replies(Mutex<VecDeque<String>>),
}

/// Backend that records every prompt and answers from a script.
pub(crate) struct ScriptedBackend {
    mode: Mode,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Answers with the prompt itself.
    pub(crate) fn echo() -> Self {
        Self::with_mode(Mode::Echo)
    }

    /// Answers every prompt with the same text.
    pub(crate) fn fixed(answer: &str) -> Self {
        Self::with_mode(Mode::Fixed(answer.to_string()))
    }

    /// Answers with each reply in turn, then fails.
    pub(crate) fn replies<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        let queue = replies.into_iter().map(Into::into).collect();
        Self::with_mode(Mode::Replies(Mutex::new(queue)))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt received so far.
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of calls received so far.
    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.mode {
            Mode::Echo => Ok(prompt.to_string()),
            Mode::Fixed(answer) => Ok(answer.clone()),
            Mode::Replies(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DigestError::Backend("script exhausted".into())),
        }
    }
}

/// Extractor serving canned text per file name; unknown files fail.
pub(crate) struct MapExtractor(pub(crate) HashMap<PathBuf, String>);

#[async_trait]
impl TextExtractor for MapExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| DigestError::extraction(path, "no canned text"))
    }
}
