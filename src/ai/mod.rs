//! Streaming client for the SAHAB chat endpoint.
//!
//! The endpoint answers `POST <base>/chat` with an unframed text body. This
//! module turns that body into ordered text increments.
//!
//! # Architecture
//!
//! - `decoder` - incremental UTF-8 decoding that survives arbitrary chunk boundaries
//! - `stream` - the lazy increment sequence and the driver that feeds a sink
//! - `client` - the HTTP client and the [`ChatBackend`] seam used by sessions
//!
//! # Usage
//!
//! ```rust,no_run
//! use sahab::ai::{ChatBackend, StreamClient};
//! use sahab::config::Config;
//! use sahab::types::{ChatRequest, Language};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = StreamClient::new(&Config::from_env()?)?;
//! let request = ChatRequest {
//!     prompt: "What is Section 420 of IPC?".into(),
//!     language: Language::English,
//!     history: Vec::new(),
//! };
//! let mut answer = String::new();
//! let mut sink = |delta: &str| answer.push_str(delta);
//! client.stream(&request, &mut sink, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod decoder;
mod stream;

pub use client::{ChatBackend, StreamClient};
pub use decoder::{DecodeMode, Utf8StreamDecoder};
pub use stream::{
    ByteStream, IncrementSink, IncrementStream, StreamOutcome, StreamPhase, StreamStats, pump,
};
