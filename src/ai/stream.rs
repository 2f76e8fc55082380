use super::decoder::{DecodeMode, Utf8StreamDecoder};
use crate::error::{StreamError, StreamResult};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type ByteStream = Pin<Box<dyn Stream<Item = StreamResult<Bytes>> + Send>>;

/// Receives decoded text increments in the order they arrive.
pub trait IncrementSink {
    fn apply(&mut self, delta: &str);
}

impl<F> IncrementSink for F
where
    F: FnMut(&str),
{
    fn apply(&mut self, delta: &str) {
        self(delta)
    }
}

/// Lifecycle of one call against the chat endpoint.
///
/// `Connecting` is only ever reported in logs: an [`IncrementStream`] exists
/// once a response is open, so it starts in `Streaming`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamPhase::Completed | StreamPhase::Failed | StreamPhase::Cancelled
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub increments: usize,
    pub bytes: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(StreamStats),
    Cancelled(StreamStats),
}

/// Finite, non-restartable sequence of text increments decoded from a response body.
pub struct IncrementStream {
    body: ByteStream,
    decoder: Utf8StreamDecoder,
    phase: StreamPhase,
    stats: StreamStats,
}

impl IncrementStream {
    pub fn new(body: ByteStream, mode: DecodeMode) -> Self {
        Self {
            body,
            decoder: Utf8StreamDecoder::new(mode),
            phase: StreamPhase::Streaming,
            stats: StreamStats::default(),
        }
    }

    pub fn from_response(response: reqwest::Response, mode: DecodeMode) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from));
        Self::new(Box::pin(body), mode)
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Next decoded increment, or `None` once the stream has ended.
    ///
    /// Chunks that decode to nothing (a lone fragment of a multi-byte
    /// character) are folded into the following read.
    pub async fn next_increment(&mut self) -> Option<StreamResult<String>> {
        loop {
            if self.phase.is_terminal() {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    self.stats.bytes += chunk.len();
                    match self.decoder.decode(&chunk) {
                        Ok(text) if text.is_empty() => continue,
                        Ok(text) => return Some(Ok(self.emit(text))),
                        Err(err) => return Some(Err(self.fail(err))),
                    }
                }
                Some(Err(err)) => return Some(Err(self.fail(err))),
                None => return self.end_of_body(),
            }
        }
    }

    /// Stop reading. Later calls to [`next_increment`](Self::next_increment) yield nothing.
    pub fn cancel(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = StreamPhase::Cancelled;
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamResult<String>> + Send {
        stream::unfold(self, |mut increments| async move {
            increments
                .next_increment()
                .await
                .map(|item| (item, increments))
        })
    }

    /// A successful response that carried zero bytes is `BodyMissing`, not an
    /// empty answer, so the caller shows the error notice instead of nothing.
    fn end_of_body(&mut self) -> Option<StreamResult<String>> {
        if self.stats.bytes == 0 {
            return Some(Err(self.fail(StreamError::BodyMissing)));
        }
        match self.decoder.finish() {
            Ok(tail) => {
                self.phase = StreamPhase::Completed;
                if tail.is_empty() {
                    None
                } else {
                    Some(Ok(self.emit(tail)))
                }
            }
            Err(err) => Some(Err(self.fail(err))),
        }
    }

    fn emit(&mut self, text: String) -> String {
        self.stats.increments += 1;
        text
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        self.phase = StreamPhase::Failed;
        err
    }
}

/// Drive `increments` to completion, handing each one to `sink`.
///
/// Cancellation stops delivery immediately and drops the body.
pub async fn pump(
    increments: &mut IncrementStream,
    sink: &mut (dyn IncrementSink + Send),
    cancel: &CancellationToken,
) -> StreamResult<StreamOutcome> {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                increments.cancel();
                let stats = increments.stats();
                debug!(increments = stats.increments, bytes = stats.bytes, "stream cancelled");
                return Ok(StreamOutcome::Cancelled(stats));
            }
            item = increments.next_increment() => match item {
                Some(Ok(delta)) => sink.apply(&delta),
                Some(Err(err)) => {
                    let stats = increments.stats();
                    warn!(error = %err, increments = stats.increments, "stream failed");
                    return Err(err);
                }
                None => {
                    let stats = increments.stats();
                    debug!(increments = stats.increments, bytes = stats.bytes, "stream completed");
                    return Ok(StreamOutcome::Completed(stats));
                }
            },
        }
    }
}
