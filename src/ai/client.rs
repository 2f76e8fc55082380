use super::decoder::DecodeMode;
use super::stream::{IncrementSink, IncrementStream, StreamOutcome, StreamPhase, StreamStats, pump};
use crate::config::Config;
use crate::error::{StreamError, StreamResult};
use crate::types::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Anything that can answer a [`ChatRequest`], streamed or in one piece.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stream the answer into `sink`, one increment at a time, in receipt order.
    async fn stream(
        &self,
        request: &ChatRequest,
        sink: &mut (dyn IncrementSink + Send),
        cancel: &CancellationToken,
    ) -> StreamResult<StreamOutcome>;

    async fn complete(&self, request: &ChatRequest) -> StreamResult<ChatResponse>;

    fn supports_streaming(&self) -> bool {
        true
    }
}

/// HTTP client for `POST <base>/chat`.
///
/// Opens one connection per call. No retries: a failed call is reported and
/// the caller decides what to do.
pub struct StreamClient {
    client: Client,
    endpoint: String,
    decode_mode: DecodeMode,
    max_stream_duration: Duration,
    streaming: bool,
}

impl StreamClient {
    pub fn new(config: &Config) -> StreamResult<Self> {
        let endpoint = config.chat_endpoint();
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| StreamError::Client(err.to_string()))?;
        let decode_mode = if config.strict_decoding {
            DecodeMode::Strict
        } else {
            DecodeMode::Lossy
        };
        Ok(Self {
            client,
            endpoint,
            decode_mode,
            max_stream_duration: config.max_stream_duration,
            streaming: config.streaming,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Open the endpoint and return the answer as a lazy sequence of increments.
    pub async fn open(&self, request: &ChatRequest) -> StreamResult<IncrementStream> {
        let body = serde_json::to_vec(request)?;
        debug!(
            phase = ?StreamPhase::Connecting,
            endpoint = %self.endpoint,
            language = %request.language,
            history = request.history.len(),
            "opening chat stream"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| StreamError::Connection {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "chat endpoint rejected request");
            return Err(StreamError::Status { status, body });
        }
        if matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) {
            return Err(StreamError::BodyMissing);
        }

        debug!(phase = ?StreamPhase::Streaming, %status, "chat stream open");
        Ok(IncrementStream::from_response(response, self.decode_mode))
    }

    fn timeout_error(&self) -> StreamError {
        StreamError::Timeout {
            secs: self.max_stream_duration.as_secs(),
        }
    }
}

#[async_trait]
impl ChatBackend for StreamClient {
    async fn stream(
        &self,
        request: &ChatRequest,
        sink: &mut (dyn IncrementSink + Send),
        cancel: &CancellationToken,
    ) -> StreamResult<StreamOutcome> {
        let call = async {
            let mut increments = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("cancelled before the stream opened");
                    return Ok(StreamOutcome::Cancelled(StreamStats::default()));
                }
                opened = self.open(request) => opened?,
            };
            pump(&mut increments, sink, cancel).await
        };

        let outcome = tokio::time::timeout(self.max_stream_duration, call)
            .await
            .map_err(|_| self.timeout_error())??;

        if let StreamOutcome::Completed(stats) = outcome {
            info!(
                increments = stats.increments,
                bytes = stats.bytes,
                "chat stream finished"
            );
        }
        Ok(outcome)
    }

    async fn complete(&self, request: &ChatRequest) -> StreamResult<ChatResponse> {
        let body = serde_json::to_vec(request)?;
        let call = async {
            let response = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|source| StreamError::Connection {
                    endpoint: self.endpoint.clone(),
                    source,
                })?;

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(StreamError::Status { status, body: text });
            }
            serde_json::from_str::<ChatResponse>(&text)
                .map_err(|err| StreamError::InvalidResponse(err.to_string()))
        };

        tokio::time::timeout(self.max_stream_duration, call)
            .await
            .map_err(|_| self.timeout_error())?
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }
}
