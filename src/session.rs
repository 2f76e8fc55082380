//! One chat session: the transcript plus the backend that answers it.
//!
//! A submission is validated locally, appended as a user turn, and then
//! answered by exactly one backend call. Remote failures never escape as
//! errors: they become a single assistant notice and the session stays usable.

use crate::ai::{ChatBackend, StreamOutcome, StreamStats};
use crate::error::{StreamError, StreamResult, SubmitError};
use crate::transcript::{TranscriptStore, TurnStatus};
use crate::types::{ChatMessage, ChatRequest, Language};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed(StreamStats),
    /// Stopped by the caller; any partial answer is kept and flagged truncated.
    Cancelled(StreamStats),
    /// The notice was appended to the transcript; `reason` is for logs and status lines.
    Failed { reason: String },
}

pub struct ChatSession<B> {
    backend: B,
    store: TranscriptStore,
    language: Language,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B, language: Language) -> Self {
        Self {
            backend,
            store: TranscriptStore::new(),
            language,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        self.store.messages()
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn limit_reached(&self) -> bool {
        self.store.limit_reached()
    }

    pub fn status(&self) -> TurnStatus {
        self.store.status()
    }

    pub async fn submit(&mut self, prompt: &str) -> Result<TurnOutcome, SubmitError> {
        self.submit_with_cancel(prompt, &CancellationToken::new())
            .await
    }

    pub async fn submit_with_cancel(
        &mut self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, SubmitError> {
        self.submit_observed(prompt, cancel, &mut |_: &str| {}).await
    }

    /// Submit a prompt, calling `observer` with every increment after it is applied.
    pub async fn submit_observed(
        &mut self,
        prompt: &str,
        cancel: &CancellationToken,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> Result<TurnOutcome, SubmitError> {
        let history = self.store.messages().to_vec();
        self.store.append_user(prompt)?;
        self.store.begin_stream()?;

        let request = ChatRequest {
            prompt: prompt.to_string(),
            language: self.language,
            history,
        };
        info!(
            language = %request.language,
            turn = self.store.submissions(),
            "submitting prompt"
        );

        let store = &mut self.store;
        let mut sink = |delta: &str| {
            store.apply_increment(delta);
            observer(delta);
        };
        let result = if self.backend.supports_streaming() {
            self.backend.stream(&request, &mut sink, cancel).await
        } else {
            complete_once(&self.backend, &request, &mut sink, cancel).await
        };

        Ok(match result {
            Ok(StreamOutcome::Completed(stats)) => {
                self.store.finish_stream();
                TurnOutcome::Completed(stats)
            }
            Ok(StreamOutcome::Cancelled(stats)) => {
                self.store.truncate_stream();
                info!(increments = stats.increments, "turn cancelled");
                TurnOutcome::Cancelled(stats)
            }
            Err(err) => {
                warn!(error = %err, "turn failed");
                self.store.fail_stream();
                TurnOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        })
    }

    /// End the session: transcript and usage counter start over.
    pub fn end(&mut self) {
        info!(turns = self.store.submissions(), "session ended");
        self.store.reset();
    }
}

/// Answer a turn through the non-streaming endpoint, delivered as one increment.
async fn complete_once<B: ChatBackend>(
    backend: &B,
    request: &ChatRequest,
    sink: &mut (dyn FnMut(&str) + Send),
    cancel: &CancellationToken,
) -> StreamResult<StreamOutcome> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled(StreamStats::default())),
        response = backend.complete(request) => response?,
    };
    if response.answer.is_empty() {
        return Err(StreamError::BodyMissing);
    }
    sink(&response.answer);
    Ok(StreamOutcome::Completed(StreamStats {
        increments: 1,
        bytes: response.answer.len(),
    }))
}
